//! Discovery over in-memory projects.

use std::sync::Arc;

use crate::model::{ConfigModel, IncludeKind};
use crate::position::LineCol;
use crate::test_utils::{discovered_model, MemoryFileAccessor};

fn paths(model: &ConfigModel) -> Vec<String> {
    model.get_all_files().into_iter().map(|file| file.path).collect()
}

#[tokio::test]
async fn discovery_is_idempotent() {
    let (accessor, model) = discovered_model(&[
        ("configuration.yaml", "automation: !include automations.yaml\nscript: !include_dir_named scripts\n"),
        ("automations.yaml", "- alias: Porch\n  trigger: []\n"),
        ("scripts/porch.yaml", "sequence:\n  - service: light.turn_on\n"),
    ])
    .await;

    let mut again = ConfigModel::new(accessor.clone());
    again.discover_files().await;
    again.discover_files().await;

    assert_eq!(model.get_all_files(), again.get_all_files());
    assert_eq!(model.get_includes(), again.get_includes());
    assert_eq!(model.get_scripts(), again.get_scripts());
}

#[tokio::test]
async fn shared_includes_are_read_once() {
    let (accessor, model) = discovered_model(&[
        ("configuration.yaml", "a: !include a.yaml\nb: !include b.yaml\n"),
        ("a.yaml", "shared: !include shared.yaml\n"),
        ("b.yaml", "shared: !include shared.yaml\n"),
        ("shared.yaml", "value: 1\n"),
    ])
    .await;

    assert_eq!(
        paths(&model),
        vec!["configuration.yaml", "a.yaml", "shared.yaml", "b.yaml"]
    );
    for path in ["configuration.yaml", "a.yaml", "b.yaml", "shared.yaml"] {
        assert_eq!(accessor.reads(path), 1, "{path} should be read exactly once");
    }
}

#[tokio::test]
async fn self_include_terminates() {
    let (accessor, model) = discovered_model(&[(
        "configuration.yaml",
        "homeassistant:\n  customize: !include configuration.yaml\n",
    )])
    .await;

    assert_eq!(paths(&model), vec!["configuration.yaml"]);
    assert_eq!(accessor.reads("configuration.yaml"), 1);
    assert_eq!(model.include_cycles(), vec![vec!["configuration.yaml".to_string()]]);
}

#[tokio::test]
async fn transitive_cycle_terminates_and_is_reported() {
    let (accessor, model) = discovered_model(&[
        ("configuration.yaml", "a: !include a.yaml\n"),
        ("a.yaml", "b: !include b.yaml\n"),
        ("b.yaml", "a: !include a.yaml\n"),
    ])
    .await;

    assert_eq!(paths(&model), vec!["configuration.yaml", "a.yaml", "b.yaml"]);
    assert_eq!(accessor.total_reads(), 3);
    assert_eq!(
        model.include_cycles(),
        vec![vec!["a.yaml".to_string(), "b.yaml".to_string()]]
    );
}

#[tokio::test]
async fn directory_includes_only_take_immediate_yaml_files() {
    let (_accessor, model) = discovered_model(&[
        ("configuration.yaml", "sensor: !include_dir_merge_list sensors/\n"),
        ("sensors/a.yaml", "- platform: time_date\n"),
        ("sensors/b.yml", "- platform: template\n"),
        ("sensors/notes.md", "# notes\n"),
        ("sensors/nested/c.yaml", "- platform: uptime\n"),
    ])
    .await;

    let includes = model.get_includes();
    assert_eq!(includes.len(), 1);
    assert!(includes.contains_key("sensors/a.yaml"));
    assert_eq!(paths(&model), vec!["configuration.yaml", "sensors/a.yaml"]);
}

#[tokio::test]
async fn directory_kinds_are_tagged_per_reference() {
    let (_accessor, model) = discovered_model(&[
        (
            "configuration.yaml",
            "script: !include_dir_named scripts\nautomation: !include_dir_list automations\n",
        ),
        ("scripts/one.yaml", "sequence: []\n"),
        ("scripts/two.yaml", "sequence: []\n"),
        ("automations/morning.yaml", "alias: Morning\n"),
        ("automations/evening.yaml", "alias: Evening\n"),
    ])
    .await;

    let includes = model.get_includes();
    assert_eq!(includes.len(), 4);

    let kind_of = |target: &str| includes[target].kind;
    assert_eq!(kind_of("scripts/one.yaml"), IncludeKind::DirNamed);
    assert_eq!(kind_of("scripts/two.yaml"), IncludeKind::DirNamed);
    assert_eq!(kind_of("automations/morning.yaml"), IncludeKind::DirList);
    assert_eq!(kind_of("automations/evening.yaml"), IncludeKind::DirList);

    let morning = &includes["automations/morning.yaml"];
    assert_eq!(morning.source_file, "configuration.yaml");
    assert_eq!(morning.context_path, "configuration.yaml/automation");
    assert_eq!(morning.start, LineCol::new(1, 12));
}

#[tokio::test]
async fn empty_directory_include_is_not_an_error() {
    let (_accessor, model) = discovered_model(&[(
        "configuration.yaml",
        "automation: !include_dir_merge_list automations/\n",
    )])
    .await;

    assert!(model.get_includes().is_empty());

    let root = model.file("configuration.yaml").unwrap();
    assert!(root.is_valid().is_valid);
    assert!(root.is_valid().errors.is_empty());
    assert_eq!(root.unresolved_includes().len(), 1);
    assert_eq!(root.unresolved_includes()[0].argument, "automations");
    assert_eq!(root.unresolved_includes()[0].kind, IncludeKind::DirMergeList);
}

#[tokio::test]
async fn missing_include_target_stays_registered_with_a_warning() {
    let (accessor, model) = discovered_model(&[(
        "configuration.yaml",
        "automation: !include automations.yaml\n",
    )])
    .await;

    assert_eq!(paths(&model), vec!["configuration.yaml", "automations.yaml"]);
    assert_eq!(accessor.reads("automations.yaml"), 1);

    let missing = model.file("automations.yaml").unwrap();
    assert!(missing.is_loaded());
    assert!(missing.is_valid().is_valid);
    assert_eq!(missing.is_valid().warnings.len(), 1);
    assert!(missing.is_valid().warnings[0].starts_with("Could not read file"));
}

#[tokio::test]
async fn invalid_files_stay_visible_but_contribute_nothing() {
    let (_accessor, model) = discovered_model(&[
        ("configuration.yaml", "script: !include scripts.yaml\n"),
        ("scripts.yaml", "porch:\n  sequence: []\nporch:\n  sequence: []\n"),
    ])
    .await;

    let broken = model.file("scripts.yaml").unwrap();
    assert!(!broken.is_valid().is_valid);
    assert!(!broken.scripts().is_empty());
    assert!(model.get_scripts().is_empty());
}

#[tokio::test]
async fn invalid_root_does_not_recurse() {
    let (accessor, model) = discovered_model(&[
        ("configuration.yaml", "automation: !include automations.yaml\nbad: [\n"),
        ("automations.yaml", "[]\n"),
    ])
    .await;

    assert_eq!(paths(&model), vec!["configuration.yaml"]);
    assert_eq!(accessor.reads("automations.yaml"), 0);
    assert!(!model.file("configuration.yaml").unwrap().is_valid().is_valid);
}

#[tokio::test]
async fn every_root_kind_seeds_discovery() {
    let (_accessor, model) = discovered_model(&[
        ("blueprints/automation/motion.yaml", "blueprint:\n  name: Motion\n"),
        ("blueprints/script/notify.yaml", "blueprint:\n  name: Notify\n"),
        ("configuration.yaml", "default_config:\n"),
        ("ui-lovelace.yaml", "views: !include lovelace/views.yaml\n"),
        ("lovelace/views.yaml", "- title: Home\n"),
    ])
    .await;

    assert_eq!(
        paths(&model),
        vec![
            "blueprints/automation/motion.yaml",
            "blueprints/script/notify.yaml",
            "configuration.yaml",
            "ui-lovelace.yaml",
            "lovelace/views.yaml",
        ]
    );
    assert_eq!(model.implicit_root(), None);
}

#[tokio::test]
async fn nested_configuration_folder_becomes_the_implicit_root() {
    let (_accessor, model) = discovered_model(&[
        ("README.md", "# my home\n"),
        ("config/configuration.yaml", "script: !include scripts.yaml\n"),
        ("config/scripts.yaml", "porch_on:\n  sequence: []\n"),
    ])
    .await;

    assert_eq!(model.implicit_root(), Some("config"));
    assert_eq!(paths(&model), vec!["config/configuration.yaml", "config/scripts.yaml"]);

    let files = model.get_all_files();
    assert_eq!(files[0].context_path, "configuration.yaml");
    assert_eq!(files[1].context_path, "configuration.yaml/script");
    assert_eq!(model.get_scripts()["porch_on"].file, "config/scripts.yaml");
}

#[tokio::test]
async fn project_without_roots_is_empty() {
    let (_accessor, model) = discovered_model(&[("notes.yaml", "a: 1\n")]).await;

    assert!(model.get_all_files().is_empty());
    assert!(model.get_includes().is_empty());
}

#[tokio::test]
async fn include_at_finds_the_directive_under_the_cursor() {
    let text = "automation: !include automations.yaml\nscript: !include_dir_named scripts\n";
    let (_accessor, model) = discovered_model(&[
        ("configuration.yaml", text),
        ("automations.yaml", "[]\n"),
        ("scripts/a.yaml", "sequence: []\n"),
        ("scripts/b.yaml", "sequence: []\n"),
    ])
    .await;

    let on_tag = text.find("!include automations").unwrap();
    let found = model.include_at("configuration.yaml", on_tag);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].target_file, "automations.yaml");

    let on_folder = text.find("scripts\n").unwrap();
    let found = model.include_at("configuration.yaml", on_folder);
    assert_eq!(found.len(), 2);

    assert!(model.include_at("configuration.yaml", 0).is_empty());
    assert!(model.include_at("unknown.yaml", 0).is_empty());
}

#[tokio::test]
async fn rediscovery_replaces_the_graph() {
    let accessor = Arc::new(MemoryFileAccessor::new(&[
        ("configuration.yaml", "automation: !include automations.yaml\n"),
        ("automations.yaml", "[]\n"),
    ]));
    let mut model = ConfigModel::new(accessor.clone());
    model.discover_files().await;
    assert_eq!(paths(&model), vec!["configuration.yaml", "automations.yaml"]);

    accessor.write("configuration.yaml", "default_config:\n");
    model.discover_files().await;
    assert_eq!(paths(&model), vec!["configuration.yaml"]);
}

#[tokio::test]
async fn includes_inside_script_bodies_stay_out_of_the_graph() {
    let (accessor, model) = discovered_model(&[
        ("configuration.yaml", "script:\n  porch:\n    sequence: !include seq.yaml\n"),
        ("seq.yaml", "- service: light.turn_on\n"),
    ])
    .await;

    assert_eq!(paths(&model), vec!["configuration.yaml"]);
    assert_eq!(accessor.reads("seq.yaml"), 0);
    assert_eq!(model.get_scripts().len(), 1);
    assert!(model.get_includes().is_empty());
}
