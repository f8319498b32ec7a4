use std::collections::HashMap;

use serde::Serialize;

use entigen_descriptor::types::{SchemaFile, ServiceDefinition, ServiceKind};

use crate::{
    error::ModelError,
    names::{entity_type_name, to_snake_case},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EntityKind {
    EventSourced,
    Value,
    Replicated,
}

/// One service method, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub name:        String,
    pub input_type:  String,
    pub output_type: String,
    /// Always present on entity commands; never set on action commands.
    pub entity_key:  Option<String>,
}

/// A stateful service classified into a typed entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDefinition {
    pub kind:           EntityKind,
    pub service_name:   String,
    /// Derived generated type name, unique across the whole model.
    pub type_name:      String,
    pub persistence_id: String,
    pub state_type:     String,
    /// Declared event types for event-sourced kinds, first-declaration order,
    /// duplicates removed. Always empty for other kinds.
    pub events:         Vec<String>,
    pub commands:       Vec<Command>,
}

/// A stateless service with no persistent identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub service_name: String,
    pub type_name:    String,
    pub commands:     Vec<Command>,
}

/// Entities and actions in first-seen order across the input schema files.
/// This order is preserved verbatim into generated output so repeated runs
/// stay diffable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub entities: Vec<EntityDefinition>,
    pub actions:  Vec<ActionDefinition>,
}

/// Classify schema services into a model. Deterministic, no I/O.
pub fn build_model(files: &[SchemaFile]) -> Result<Model, ModelError> {
    let mut entities = Vec::new();
    let mut actions = Vec::new();

    // name -> declaring service, for the global uniqueness checks
    let mut seen_type_names: HashMap<String, String> = HashMap::new();
    let mut seen_persistence_ids: HashMap<String, String> = HashMap::new();

    for file in files {
        for service in &file.services {
            match classify(service)? {
                Classified::Entity(kind) => {
                    let entity = build_entity(service, kind)?;
                    check_unique(&mut seen_type_names, &entity.type_name, &entity.service_name)?;
                    check_unique(
                        &mut seen_persistence_ids,
                        &entity.persistence_id,
                        &entity.service_name,
                    )?;
                    entities.push(entity);
                }
                Classified::Action => {
                    let action = ActionDefinition {
                        service_name: service.name.clone(),
                        type_name:    entity_type_name(&service.name),
                        commands:     service
                            .methods
                            .iter()
                            .map(|method| Command {
                                name:        method.name.clone(),
                                input_type:  method.input_type.clone(),
                                output_type: method.output_type.clone(),
                                entity_key:  None,
                            })
                            .collect(),
                    };
                    check_unique(&mut seen_type_names, &action.type_name, &action.service_name)?;
                    actions.push(action);
                }
            }
        }
    }

    Ok(Model { entities, actions })
}

enum Classified {
    Entity(EntityKind),
    Action,
}

fn classify(service: &ServiceDefinition) -> Result<Classified, ModelError> {
    let ambiguous = || ModelError::AmbiguousKind {
        service: service.name.clone(),
    };

    match service.kind {
        ServiceKind::EventSourced => Ok(Classified::Entity(EntityKind::EventSourced)),
        ServiceKind::Value => {
            // Declared events only make sense for event-sourced kinds.
            if service.events.is_empty() {
                Ok(Classified::Entity(EntityKind::Value))
            } else {
                Err(ambiguous())
            }
        }
        ServiceKind::Replicated => {
            if service.events.is_empty() {
                Ok(Classified::Entity(EntityKind::Replicated))
            } else {
                Err(ambiguous())
            }
        }
        ServiceKind::Action => {
            // An action carrying state or events is a conflicting annotation.
            if service.state_type.is_none() && service.events.is_empty() {
                Ok(Classified::Action)
            } else {
                Err(ambiguous())
            }
        }
        ServiceKind::Unspecified => {
            if service.methods.is_empty() {
                Ok(Classified::Action)
            } else {
                Err(ambiguous())
            }
        }
    }
}

fn build_entity(service: &ServiceDefinition, kind: EntityKind) -> Result<EntityDefinition, ModelError> {
    let state_type = service
        .state_type
        .clone()
        .ok_or_else(|| ModelError::MissingStateType {
            service: service.name.clone(),
        })?;

    let mut commands = Vec::with_capacity(service.methods.len());
    for method in &service.methods {
        let entity_key = method
            .entity_key
            .clone()
            .ok_or_else(|| ModelError::MissingEntityKey {
                service: service.name.clone(),
                method:  method.name.clone(),
            })?;
        commands.push(Command {
            name:        method.name.clone(),
            input_type:  method.input_type.clone(),
            output_type: method.output_type.clone(),
            entity_key:  Some(entity_key),
        });
    }

    // Declaration order, duplicates dropped on second sight.
    let mut events = Vec::new();
    for event in &service.events {
        if !events.contains(event) {
            events.push(event.clone());
        }
    }

    let type_name = entity_type_name(&service.name);
    let persistence_id = service
        .persistence_id
        .clone()
        .unwrap_or_else(|| to_snake_case(&type_name));

    Ok(EntityDefinition {
        kind,
        service_name: service.name.clone(),
        type_name,
        persistence_id,
        state_type,
        events,
        commands,
    })
}

fn check_unique(
    seen: &mut HashMap<String, String>,
    name: &str,
    service: &str,
) -> Result<(), ModelError> {
    if let Some(first) = seen.get(name) {
        return Err(ModelError::DuplicateEntityName {
            name:   name.to_string(),
            first:  first.clone(),
            second: service.to_string(),
        });
    }
    seen.insert(name.to_string(), service.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigen_descriptor::types::MethodDefinition;

    fn method(name: &str, key: Option<&str>) -> MethodDefinition {
        MethodDefinition {
            name:        name.to_string(),
            input_type:  name.to_string(),
            output_type: "Empty".to_string(),
            entity_key:  key.map(|k| k.to_string()),
        }
    }

    fn service(name: &str, kind: ServiceKind) -> ServiceDefinition {
        ServiceDefinition {
            name:           name.to_string(),
            kind,
            persistence_id: None,
            state_type:     None,
            events:         vec![],
            methods:        vec![],
        }
    }

    fn file_with(services: Vec<ServiceDefinition>) -> SchemaFile {
        SchemaFile {
            name: "test.schema".to_string(),
            package: None,
            imports: vec![],
            messages: vec![],
            services,
        }
    }

    fn counter_service() -> ServiceDefinition {
        ServiceDefinition {
            name:           "CounterService".to_string(),
            kind:           ServiceKind::EventSourced,
            persistence_id: Some("counter".to_string()),
            state_type:     Some("CounterState".to_string()),
            events:         vec!["ValueIncreased".to_string(), "ValueDecreased".to_string()],
            methods:        vec![
                method("Increase", Some("counter_id")),
                method("Decrease", Some("counter_id")),
            ],
        }
    }

    #[test]
    fn classifies_an_event_sourced_entity() {
        let model = build_model(&[file_with(vec![counter_service()])]).unwrap();
        assert_eq!(model.actions.len(), 0);
        assert_eq!(model.entities.len(), 1);

        let entity = &model.entities[0];
        assert_eq!(entity.kind, EntityKind::EventSourced);
        assert_eq!(entity.type_name, "Counter");
        assert_eq!(entity.persistence_id, "counter");
        assert_eq!(entity.state_type, "CounterState");
        assert_eq!(entity.events, vec!["ValueIncreased", "ValueDecreased"]);
        assert_eq!(entity.commands[0].name, "Increase");
        assert_eq!(entity.commands[1].name, "Decrease");
    }

    #[test]
    fn preserves_first_seen_order_across_files() {
        let mut cart = service("CartService", ServiceKind::Value);
        cart.state_type = Some("CartState".to_string());
        let first = file_with(vec![cart]);
        let second = file_with(vec![counter_service(), service("ReportAction", ServiceKind::Action)]);

        let model = build_model(&[first, second]).unwrap();
        assert_eq!(model.entities[0].type_name, "Cart");
        assert_eq!(model.entities[1].type_name, "Counter");
        assert_eq!(model.actions[0].type_name, "ReportAction");
    }

    #[test]
    fn event_order_is_declaration_order_with_duplicates_dropped() {
        let mut svc = counter_service();
        svc.events = vec![
            "ValueDecreased".to_string(),
            "ValueIncreased".to_string(),
            "ValueDecreased".to_string(),
        ];
        let model = build_model(&[file_with(vec![svc])]).unwrap();
        assert_eq!(model.entities[0].events, vec!["ValueDecreased", "ValueIncreased"]);
    }

    #[test]
    fn methodless_unannotated_service_defaults_to_action() {
        let model = build_model(&[file_with(vec![service("Health", ServiceKind::Unspecified)])]).unwrap();
        assert_eq!(model.actions.len(), 1);
        assert_eq!(model.actions[0].type_name, "Health");
    }

    #[test]
    fn unannotated_service_with_methods_is_ambiguous() {
        let mut svc = service("Mystery", ServiceKind::Unspecified);
        svc.methods.push(method("Do", None));
        let err = build_model(&[file_with(vec![svc])]).unwrap_err();
        assert!(matches!(err, ModelError::AmbiguousKind { service } if service == "Mystery"));
    }

    #[test]
    fn action_with_state_type_is_ambiguous() {
        let mut svc = service("ReportAction", ServiceKind::Action);
        svc.state_type = Some("ReportState".to_string());
        let err = build_model(&[file_with(vec![svc])]).unwrap_err();
        assert!(matches!(err, ModelError::AmbiguousKind { .. }));
    }

    #[test]
    fn value_entity_with_events_is_ambiguous() {
        let mut svc = service("CartService", ServiceKind::Value);
        svc.state_type = Some("CartState".to_string());
        svc.events.push("ItemAdded".to_string());
        let err = build_model(&[file_with(vec![svc])]).unwrap_err();
        assert!(matches!(err, ModelError::AmbiguousKind { .. }));
    }

    #[test]
    fn stateful_service_without_state_type_fails() {
        let mut svc = counter_service();
        svc.state_type = None;
        let err = build_model(&[file_with(vec![svc])]).unwrap_err();
        assert!(matches!(err, ModelError::MissingStateType { service } if service == "CounterService"));
    }

    #[test]
    fn stateful_method_without_entity_key_fails_naming_the_method() {
        let mut svc = counter_service();
        svc.methods[1].entity_key = None;
        let err = build_model(&[file_with(vec![svc])]).unwrap_err();
        match err {
            ModelError::MissingEntityKey { service, method } => {
                assert_eq!(service, "CounterService");
                assert_eq!(method, "Decrease");
            }
            other => panic!("expected MissingEntityKey but got {:?}", other),
        }
    }

    #[test]
    fn duplicate_derived_type_names_fail_naming_both_services() {
        let mut other = counter_service();
        other.name = "Counter".to_string();
        other.persistence_id = Some("counter2".to_string());
        let err = build_model(&[file_with(vec![counter_service(), other])]).unwrap_err();
        match err {
            ModelError::DuplicateEntityName { name, first, second } => {
                assert_eq!(name, "Counter");
                assert_eq!(first, "CounterService");
                assert_eq!(second, "Counter");
            }
            other => panic!("expected DuplicateEntityName but got {:?}", other),
        }
    }

    #[test]
    fn duplicate_persistence_ids_fail() {
        let mut other = counter_service();
        other.name = "TallyService".to_string();
        let err = build_model(&[file_with(vec![counter_service(), other])]).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateEntityName { name, .. } if name == "counter"));
    }

    #[test]
    fn missing_persistence_id_defaults_to_the_snake_case_type_name() {
        let mut svc = counter_service();
        svc.persistence_id = None;
        let model = build_model(&[file_with(vec![svc])]).unwrap();
        assert_eq!(model.entities[0].persistence_id, "counter");
    }

    #[test]
    fn action_methods_do_not_need_an_entity_key() {
        let mut svc = service("ReportAction", ServiceKind::Action);
        svc.methods.push(method("Summarize", None));
        let model = build_model(&[file_with(vec![svc])]).unwrap();
        assert_eq!(model.actions[0].commands[0].name, "Summarize");
        assert_eq!(model.actions[0].commands[0].entity_key, None);
    }
}
