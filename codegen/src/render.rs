//! Rendering of generated artifacts.
//!
//! Skeleton artifacts are rendered as complete files; concrete and test
//! artifacts are expressed as `MergePlan`s so the generator can either
//! scaffold them fresh or splice missing declarations into an existing file.
//! Generated code targets the `entigen_runtime` framework crate and expects
//! schema message types under `crate::proto`.

use crate::{
    merge::{canonical, ImplPlan, MergePlan, RequiredMember},
    model::{ActionDefinition, Command, EntityDefinition, EntityKind, Model},
    names::{escape_rust_keyword, last_segment, to_snake_case},
};

/// Stable marker separating the user-editable header of the registration
/// artifact from the generator-owned body below it.
pub const REGISTRATION_MARKER: &str = "// entigen: registration (do not edit below this marker)";

pub fn skeleton_file_name(type_name: &str) -> String {
    format!("abstract_{}.rs", to_snake_case(type_name))
}

pub fn concrete_file_name(type_name: &str) -> String {
    format!("{}.rs", to_snake_case(type_name))
}

pub fn test_file_name(type_name: &str) -> String {
    format!("{}_test.rs", to_snake_case(type_name))
}

pub fn registration_file_name(main_name: &str) -> String {
    format!("{}.rs", to_snake_case(last_segment(main_name)))
}

fn handler_name(command_or_event: &str) -> String {
    escape_rust_keyword(&to_snake_case(command_or_event))
}

fn command_signature(entity: &EntityDefinition, command: &Command, stub: bool) -> String {
    let underscore = if stub { "_" } else { "" };
    format!(
        "fn {}(&self, {u}state: &{}, {u}command: {}, {u}ctx: &mut CommandContext) -> Result<{}, CommandError>",
        handler_name(&command.name),
        entity.state_type,
        command.input_type,
        command.output_type,
        u = underscore,
    )
}

fn event_signature(entity: &EntityDefinition, event: &str, stub: bool) -> String {
    let underscore = if stub { "_" } else { "" };
    format!(
        "fn {}(&self, {u}state: {}, {u}event: {}) -> {}",
        handler_name(event),
        entity.state_type,
        event,
        entity.state_type,
        u = underscore,
    )
}

fn action_signature(command: &Command, stub: bool) -> String {
    let underscore = if stub { "_" } else { "" };
    format!(
        "fn {}(&self, {u}command: {}, {u}ctx: &mut ActionContext) -> Result<{}, CommandError>",
        handler_name(&command.name),
        command.input_type,
        command.output_type,
        u = underscore,
    )
}

/// Fully generated skeleton for one entity: the abstract trait, and for
/// event-sourced kinds the event enum plus its dispatch function, with match
/// arms in declaration order.
pub fn skeleton_entity(entity: &EntityDefinition) -> String {
    let mut out = String::new();
    out.push_str("//! Generated by entigen. Do not edit: this file is rewritten on every run.\n\n");
    out.push_str("use entigen_runtime::{CommandContext, CommandError};\n\n");
    out.push_str("use crate::proto::*;\n\n");

    out.push_str(&format!(
        "/// Abstract shape of the `{}` entity. A concrete implementation provides\n/// every command handler{} declared by the schema.\n",
        entity.type_name,
        if entity.kind == EntityKind::EventSourced { " and event handler" } else { "" },
    ));
    out.push_str(&format!("pub trait Abstract{} {{\n", entity.type_name));
    out.push_str(&format!(
        "    /// State of the entity before anything has happened to it.\n    fn initial_state(&self) -> {};\n",
        entity.state_type
    ));
    for command in &entity.commands {
        out.push('\n');
        out.push_str(&format!("    {};\n", command_signature(entity, command, false)));
    }
    if entity.kind == EntityKind::EventSourced {
        for event in &entity.events {
            out.push('\n');
            out.push_str(&format!("    {};\n", event_signature(entity, event, false)));
        }
    }
    out.push_str("}\n");

    if entity.kind == EntityKind::EventSourced {
        out.push('\n');
        out.push_str(&format!(
            "/// Events of `{}`, in schema declaration order.\n",
            entity.type_name
        ));
        out.push_str(&format!("pub enum {}Event {{\n", entity.type_name));
        for event in &entity.events {
            out.push_str(&format!("    {}({}),\n", event, event));
        }
        out.push_str("}\n\n");

        out.push_str("/// Dispatch one event to its handler. Arms follow declaration order.\n");
        out.push_str(&format!(
            "pub fn apply_event<E: Abstract{}>(entity: &E, state: {}, event: {}Event) -> {} {{\n",
            entity.type_name, entity.state_type, entity.type_name, entity.state_type
        ));
        out.push_str("    match event {\n");
        for event in &entity.events {
            out.push_str(&format!(
                "        {}Event::{}(event) => entity.{}(state, event),\n",
                entity.type_name,
                event,
                handler_name(event)
            ));
        }
        out.push_str("    }\n}\n");
    }

    out
}

/// Fully generated skeleton for one stateless action.
pub fn skeleton_action(action: &ActionDefinition) -> String {
    let mut out = String::new();
    out.push_str("//! Generated by entigen. Do not edit: this file is rewritten on every run.\n\n");
    out.push_str("use entigen_runtime::{ActionContext, CommandError};\n\n");
    out.push_str("use crate::proto::*;\n\n");
    out.push_str(&format!(
        "/// Abstract shape of the `{}` action.\n",
        action.type_name
    ));
    out.push_str(&format!("pub trait Abstract{} {{\n", action.type_name));
    for (i, command) in action.commands.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("    {};\n", action_signature(command, false)));
    }
    out.push_str("}\n");
    out
}

fn stub(signature: &str, what: &str, subject: &str) -> String {
    format!(
        "    {} {{\n        unimplemented!(\"the {} for `{}` is not implemented, yet\")\n    }}",
        signature, what, subject
    )
}

/// Merge plan for the user-owned concrete artifact of an entity.
pub fn concrete_plan_entity(entity: &EntityDefinition) -> MergePlan {
    let kind_doc = match entity.kind {
        EntityKind::EventSourced => "An event-sourced entity",
        EntityKind::Value => "A value entity",
        EntityKind::Replicated => "A replicated entity",
    };

    let mut members = Vec::new();
    members.push(RequiredMember {
        name:        "initial_state".to_string(),
        param_types: vec![],
        text:        stub(
            &format!("fn initial_state(&self) -> {}", entity.state_type),
            "initial state",
            &entity.type_name,
        ),
    });
    for command in &entity.commands {
        members.push(RequiredMember {
            name:        handler_name(&command.name),
            param_types: vec![
                canonical(&format!("&{}", entity.state_type)),
                canonical(&command.input_type),
                canonical("&mut CommandContext"),
            ],
            text: stub(
                &command_signature(entity, command, true),
                "command handler",
                &command.name,
            ),
        });
    }
    if entity.kind == EntityKind::EventSourced {
        for event in &entity.events {
            members.push(RequiredMember {
                name:        handler_name(event),
                param_types: vec![canonical(&entity.state_type), canonical(event)],
                text:        stub(&event_signature(entity, event, true), "event handler", event),
            });
        }
    }

    MergePlan {
        header: format!(
            "//! Concrete `{}` entity. Your method bodies are yours; the generator only\n//! inserts declarations it owns.",
            entity.type_name
        ),
        uses: vec![
            "use entigen_runtime::{CommandContext, CommandError};".to_string(),
            format!("use crate::{}::Abstract{};", snake_skeleton_module(&entity.type_name), entity.type_name),
            "use crate::proto::*;".to_string(),
        ],
        struct_decl: Some((
            entity.type_name.clone(),
            format!(
                "/// {} with persistence id `{}`.\npub struct {};",
                kind_doc, entity.persistence_id, entity.type_name
            ),
        )),
        impl_block: Some(ImplPlan {
            trait_name: format!("Abstract{}", entity.type_name),
            type_name:  entity.type_name.clone(),
            members,
        }),
        free_members: vec![],
    }
}

/// Merge plan for the user-owned concrete artifact of an action.
pub fn concrete_plan_action(action: &ActionDefinition) -> MergePlan {
    let members = action
        .commands
        .iter()
        .map(|command| RequiredMember {
            name:        handler_name(&command.name),
            param_types: vec![canonical(&command.input_type), canonical("&mut ActionContext")],
            text:        stub(&action_signature(command, true), "handler", &command.name),
        })
        .collect();

    MergePlan {
        header: format!(
            "//! Concrete `{}` action. Your method bodies are yours; the generator only\n//! inserts declarations it owns.",
            action.type_name
        ),
        uses: vec![
            "use entigen_runtime::{ActionContext, CommandError};".to_string(),
            format!(
                "use crate::{}::Abstract{};",
                snake_skeleton_module(&action.type_name),
                action.type_name
            ),
            "use crate::proto::*;".to_string(),
        ],
        struct_decl: Some((
            action.type_name.clone(),
            format!("/// A stateless action.\npub struct {};", action.type_name),
        )),
        impl_block: Some(ImplPlan {
            trait_name: format!("Abstract{}", action.type_name),
            type_name:  action.type_name.clone(),
            members,
        }),
        free_members: vec![],
    }
}

fn snake_skeleton_module(type_name: &str) -> String {
    format!("abstract_{}", to_snake_case(type_name))
}

fn test_member(command: &Command) -> RequiredMember {
    let name = format!("{}_test", handler_name(&command.name));
    RequiredMember {
        param_types: vec![],
        text: format!(
            "#[test]\nfn {}() {{\n    unimplemented!(\"write a test for the `{}` handler\");\n}}",
            name, command.name
        ),
        name,
    }
}

/// Merge plan for the companion test artifact of an entity.
pub fn test_plan_entity(entity: &EntityDefinition) -> MergePlan {
    MergePlan {
        header: format!("//! Tests for the `{}` entity.", entity.type_name),
        uses: vec![format!(
            "use crate::{}::{};",
            to_snake_case(&entity.type_name),
            entity.type_name
        )],
        struct_decl: None,
        impl_block: None,
        free_members: entity.commands.iter().map(test_member).collect(),
    }
}

/// Merge plan for the companion test artifact of an action.
pub fn test_plan_action(action: &ActionDefinition) -> MergePlan {
    MergePlan {
        header: format!("//! Tests for the `{}` action.", action.type_name),
        uses: vec![format!(
            "use crate::{}::{};",
            to_snake_case(&action.type_name),
            action.type_name
        )],
        struct_decl: None,
        impl_block: None,
        free_members: action.commands.iter().map(test_member).collect(),
    }
}

/// Generator-owned body of the registration artifact: one registration call
/// per entity and per action, in model order.
pub fn registration_body(model: &Model) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("/// Registers every entity and action with the runtime, in model order.\n");
    out.push_str("pub fn register_all(registry: &mut EntityRegistry) {\n");
    for entity in &model.entities {
        let module = to_snake_case(&entity.type_name);
        let call = match entity.kind {
            EntityKind::EventSourced => "event_sourced",
            EntityKind::Value => "value_entity",
            EntityKind::Replicated => "replicated",
        };
        out.push_str(&format!(
            "    registry.{}::<crate::{}::{}>(\"{}\");\n",
            call, module, entity.type_name, entity.persistence_id
        ));
    }
    for action in &model.actions {
        let module = to_snake_case(&action.type_name);
        out.push_str(&format!(
            "    registry.action::<crate::{}::{}>();\n",
            module, action.type_name
        ));
    }
    out.push_str("}\n");
    out
}

/// The complete registration artifact, used when no existing file (or no
/// marker) is found.
pub fn registration(model: &Model) -> String {
    format!(
        "//! Entity registration.\n//!\n//! Everything above the marker line is yours to edit; the body below it is\n//! rewritten on every run.\n\nuse entigen_runtime::EntityRegistry;\n\n{}\n{}",
        REGISTRATION_MARKER,
        registration_body(model)
    )
}
