#![cfg(test)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use entigen_codegen::{build_model, generate};
use entigen_descriptor::types::{
    MessageType, MethodDefinition, SchemaFile, ServiceDefinition, ServiceKind,
};
use entigen_descriptor::{encode_descriptor_set, read};

fn message(name: &str) -> MessageType {
    MessageType {
        name:   name.to_string(),
        fields: vec![],
    }
}

fn counter_schema() -> Vec<SchemaFile> {
    vec![SchemaFile {
        name:    "counter.schema".to_string(),
        package: None,
        imports: vec![],
        messages: vec![
            message("Increase"),
            message("Decrease"),
            message("Empty"),
            message("CounterState"),
            message("ValueIncreased"),
            message("ValueDecreased"),
        ],
        services: vec![ServiceDefinition {
            name:           "CounterService".to_string(),
            kind:           ServiceKind::EventSourced,
            persistence_id: Some("counter".to_string()),
            state_type:     Some("CounterState".to_string()),
            events:         vec!["ValueIncreased".to_string(), "ValueDecreased".to_string()],
            methods:        vec![
                MethodDefinition {
                    name:        "Increase".to_string(),
                    input_type:  "Increase".to_string(),
                    output_type: "Empty".to_string(),
                    entity_key:  Some("counter_id".to_string()),
                },
                MethodDefinition {
                    name:        "Decrease".to_string(),
                    input_type:  "Decrease".to_string(),
                    output_type: "Empty".to_string(),
                    entity_key:  Some("counter_id".to_string()),
                },
            ],
        }],
    }]
}

struct Roots {
    _dir:     TempDir,
    main:     PathBuf,
    test:     PathBuf,
    skeleton: PathBuf,
}

fn roots() -> Roots {
    let dir = TempDir::new().expect("tempdir failed");
    Roots {
        main:     dir.path().join("src"),
        test:     dir.path().join("tests"),
        skeleton: dir.path().join("generated"),
        _dir:     dir,
    }
}

fn run(roots: &Roots, files: &[SchemaFile]) -> Vec<PathBuf> {
    let model = build_model(files).expect("model build failed");
    generate(&model, &roots.main, &roots.test, &roots.skeleton, "registry").expect("generate failed")
}

#[test]
fn end_to_end_counter_produces_exactly_the_expected_artifacts() {
    let roots = roots();

    // Round-trip through the descriptor set on disk so the whole pipeline runs.
    let dir = TempDir::new().unwrap();
    let desc_path = dir.path().join("user-function.desc");
    fs::write(&desc_path, encode_descriptor_set(&counter_schema())).unwrap();
    let files = read(&desc_path).expect("descriptor read failed");

    let written = run(&roots, &files);
    assert_eq!(
        written,
        vec![
            roots.skeleton.join("abstract_counter.rs"),
            roots.main.join("counter.rs"),
            roots.test.join("counter_test.rs"),
            roots.main.join("registry.rs"),
        ]
    );

    let skeleton = fs::read_to_string(roots.skeleton.join("abstract_counter.rs")).unwrap();
    assert!(skeleton.contains("pub trait AbstractCounter {"));
    assert!(skeleton.contains("pub enum CounterEvent {"));

    let concrete = fs::read_to_string(roots.main.join("counter.rs")).unwrap();
    assert!(concrete.contains("pub struct Counter;"));
    assert!(concrete.contains("fn increase(&self"));
    assert!(concrete.contains("fn decrease(&self"));
    assert!(concrete.contains("fn value_increased(&self"));
    assert!(concrete.contains("is not implemented, yet"));

    let tests = fs::read_to_string(roots.test.join("counter_test.rs")).unwrap();
    assert!(tests.contains("fn increase_test()"));
    assert!(tests.contains("fn decrease_test()"));

    let registry = fs::read_to_string(roots.main.join("registry.rs")).unwrap();
    assert!(registry.contains("registry.event_sourced::<crate::counter::Counter>(\"counter\");"));
}

#[test]
fn a_second_run_reports_zero_changed_paths() {
    let roots = roots();
    let files = counter_schema();
    let first = run(&roots, &files);
    assert_eq!(first.len(), 4);

    let second = run(&roots, &files);
    assert!(second.is_empty(), "second run rewrote {:?}", second);
}

#[test]
fn user_edits_in_the_concrete_artifact_survive_regeneration() {
    let roots = roots();
    let files = counter_schema();
    run(&roots, &files);

    let concrete_path = roots.main.join("counter.rs");
    let mut edited = fs::read_to_string(&concrete_path).unwrap();
    edited.push_str("\nfn my_private_helper(x: u32) -> u32 {\n    x + 1\n}\n");
    fs::write(&concrete_path, &edited).unwrap();

    let written = run(&roots, &files);
    assert!(written.is_empty(), "regeneration rewrote {:?}", written);
    let after = fs::read_to_string(&concrete_path).unwrap();
    assert_eq!(after, edited);
}

#[test]
fn missing_required_members_are_inserted_without_touching_the_rest() {
    let roots = roots();
    let files = counter_schema();
    run(&roots, &files);

    // Rebuild the concrete artifact with one handler and one helper only.
    let concrete_path = roots.main.join("counter.rs");
    let reduced = "\
use entigen_runtime::{CommandContext, CommandError};
use crate::abstract_counter::AbstractCounter;
use crate::proto::*;

pub struct Counter;

impl AbstractCounter for Counter {
    fn increase(&self, state: &CounterState, command: Increase, ctx: &mut CommandContext) -> Result<Empty, CommandError> {
        // business logic the generator must not touch
        todo!()
    }

    fn helper(&self) -> u32 {
        7
    }
}
";
    fs::write(&concrete_path, reduced).unwrap();

    let written = run(&roots, &files);
    assert_eq!(written, vec![concrete_path.clone()]);

    let merged = fs::read_to_string(&concrete_path).unwrap();
    assert!(merged.contains("// business logic the generator must not touch"));
    assert!(merged.contains("fn helper(&self) -> u32 {\n        7\n    }"));
    assert!(merged.contains("fn decrease(&self"));
    assert!(merged.contains("fn initial_state(&self) -> CounterState"));
    assert!(merged.contains("fn value_decreased(&self"));

    // And the merge converges: one more run changes nothing.
    assert!(run(&roots, &files).is_empty());
}

#[test]
fn an_incompatible_signature_is_a_conflict_and_the_file_is_untouched() {
    let roots = roots();
    let files = counter_schema();
    run(&roots, &files);

    let concrete_path = roots.main.join("counter.rs");
    let conflicting = "\
use crate::abstract_counter::AbstractCounter;

pub struct Counter;

impl AbstractCounter for Counter {
    fn increase(&self, amount: u32) -> u32 {
        amount
    }
}
";
    fs::write(&concrete_path, conflicting).unwrap();

    let model = build_model(&files).unwrap();
    let err = generate(&model, &roots.main, &roots.test, &roots.skeleton, "registry").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("increase"), "unexpected error: {}", message);
    assert!(message.contains("counter.rs"), "unexpected error: {}", message);

    let after = fs::read_to_string(&concrete_path).unwrap();
    assert_eq!(after, conflicting);
}

#[test]
fn a_conflicting_entity_commits_none_of_its_artifacts() {
    let roots = roots();
    let files = counter_schema();

    // A hand-written counter.rs with an incompatible handler, before any
    // generator run ever touched this tree.
    let concrete_path = roots.main.join("counter.rs");
    fs::create_dir_all(&roots.main).unwrap();
    let conflicting = "\
pub struct Counter;

impl AbstractCounter for Counter {
    fn increase(&self, amount: u32) -> u32 {
        amount
    }
}
";
    fs::write(&concrete_path, conflicting).unwrap();

    let model = build_model(&files).unwrap();
    let err = generate(&model, &roots.main, &roots.test, &roots.skeleton, "registry").unwrap_err();
    assert!(err.to_string().contains("increase"));

    // The whole artifact set of the failed entity stays off disk, the
    // skeleton included, and the conflicting file is untouched.
    assert!(!roots.skeleton.join("abstract_counter.rs").exists());
    assert!(!roots.test.join("counter_test.rs").exists());
    assert!(!roots.main.join("registry.rs").exists());
    assert_eq!(fs::read_to_string(&concrete_path).unwrap(), conflicting);
}

#[test]
fn a_failed_entity_leaves_earlier_entities_committed() {
    let roots = roots();
    let mut files = counter_schema();
    files[0].messages.push(message("TallyState"));
    files[0].services.push(ServiceDefinition {
        name:           "AuditService".to_string(),
        kind:           ServiceKind::Value,
        persistence_id: Some("audit".to_string()),
        state_type:     Some("TallyState".to_string()),
        events:         vec![],
        methods:        vec![],
    });

    // Only the second entity's concrete artifact conflicts.
    fs::create_dir_all(&roots.main).unwrap();
    fs::write(
        roots.main.join("audit.rs"),
        "pub struct Audit;\n\nimpl AbstractAudit for Audit {\n    fn initial_state(&self, seed: u32) -> TallyState {\n        todo!()\n    }\n}\n",
    )
    .unwrap();

    let model = build_model(&files).unwrap();
    let err = generate(&model, &roots.main, &roots.test, &roots.skeleton, "registry").unwrap_err();
    assert!(err.to_string().contains("audit.rs"));

    // Counter's full set made it to disk; nothing of Audit's did.
    assert!(roots.skeleton.join("abstract_counter.rs").exists());
    assert!(roots.main.join("counter.rs").exists());
    assert!(roots.test.join("counter_test.rs").exists());
    assert!(!roots.skeleton.join("abstract_audit.rs").exists());
    assert!(!roots.test.join("audit_test.rs").exists());
}

#[test]
fn hand_edits_to_the_skeleton_are_lost_by_design() {
    let roots = roots();
    let files = counter_schema();
    run(&roots, &files);

    let skeleton_path = roots.skeleton.join("abstract_counter.rs");
    let pristine = fs::read_to_string(&skeleton_path).unwrap();
    fs::write(&skeleton_path, "// my edits\n").unwrap();

    let written = run(&roots, &files);
    assert_eq!(written, vec![skeleton_path.clone()]);
    assert_eq!(fs::read_to_string(&skeleton_path).unwrap(), pristine);
}

#[test]
fn registration_header_above_the_marker_is_preserved() {
    let roots = roots();
    let files = counter_schema();
    run(&roots, &files);

    let registry_path = roots.main.join("registry.rs");
    let generated = fs::read_to_string(&registry_path).unwrap();
    let custom = generated.replacen(
        "use entigen_runtime::EntityRegistry;",
        "use entigen_runtime::EntityRegistry;\nuse crate::my_extras::*;",
        1,
    );
    fs::write(&registry_path, &custom).unwrap();

    // Grow the model so the body below the marker has to change.
    let mut files = files;
    files[0].messages.push(message("ReportRequest"));
    files[0].messages.push(message("Report"));
    files[0].services.push(ServiceDefinition {
        name:           "ReportAction".to_string(),
        kind:           ServiceKind::Action,
        persistence_id: None,
        state_type:     None,
        events:         vec![],
        methods:        vec![MethodDefinition {
            name:        "Summarize".to_string(),
            input_type:  "ReportRequest".to_string(),
            output_type: "Report".to_string(),
            entity_key:  None,
        }],
    });

    let written = run(&roots, &files);
    assert!(written.contains(&registry_path));

    let after = fs::read_to_string(&registry_path).unwrap();
    assert!(after.contains("use crate::my_extras::*;"));
    assert!(after.contains("registry.action::<crate::report_action::ReportAction>();"));
}

#[test]
fn registration_lists_services_in_declaration_order() {
    let roots = roots();
    let mut files = counter_schema();
    files[0].messages.push(message("TallyState"));
    // Declared after CounterService but alphabetically before it.
    files[0].services.push(ServiceDefinition {
        name:           "AuditService".to_string(),
        kind:           ServiceKind::Value,
        persistence_id: Some("audit".to_string()),
        state_type:     Some("TallyState".to_string()),
        events:         vec![],
        methods:        vec![],
    });

    run(&roots, &files);
    let registry = fs::read_to_string(roots.main.join("registry.rs")).unwrap();
    let counter_pos = registry.find("crate::counter::Counter").unwrap();
    let audit_pos = registry.find("crate::audit::Audit").unwrap();
    assert!(counter_pos < audit_pos, "registration order is not declaration order");
}

#[test]
fn a_missing_entity_key_fails_before_any_file_is_written() {
    let roots = roots();
    let mut files = counter_schema();
    files[0].services[0].methods[1].entity_key = None;

    let err = build_model(&files).unwrap_err();
    assert!(err.to_string().contains("Decrease"));
    assert!(!roots.main.exists());
    assert!(!roots.skeleton.exists());
}
