use serde::Serialize;

/// One parsed descriptor unit: the message types, services, and options a
/// single schema file declared. Immutable once produced by the reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaFile {
    pub name:     String,
    pub package:  Option<String>,
    pub imports:  Vec<String>,
    pub messages: Vec<MessageType>,
    pub services: Vec<ServiceDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageType {
    pub name:   String,
    pub fields: Vec<MessageField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageField {
    pub name:      String,
    pub type_name: String,
}

/// The entity-kind annotation attached to a service. Anything the wire format
/// does not recognize decodes as `Unspecified` and is left to the model
/// builder to reject or default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ServiceKind {
    Unspecified = 0,
    Action      = 1,
    EventSourced = 2,
    Value       = 3,
    Replicated  = 4,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDefinition {
    pub name:           String,
    pub kind:           ServiceKind,
    pub persistence_id: Option<String>,
    pub state_type:     Option<String>,
    /// Declared event message types, in declaration order.
    pub events:         Vec<String>,
    pub methods:        Vec<MethodDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDefinition {
    pub name:        String,
    pub input_type:  String,
    pub output_type: String,
    /// Field path on the input message that carries the entity identity.
    pub entity_key:  Option<String>,
}
