//! Incremental updates of single files.

use crate::model::UpdateOutcome;
use crate::test_utils::discovered_model;

#[tokio::test]
async fn unknown_path_asks_for_rediscovery_without_reading() {
    let (accessor, mut model) = discovered_model(&[("configuration.yaml", "default_config:\n")]).await;
    accessor.reset_reads();

    let outcome = model.update_file("packages/new.yaml").await;

    assert_eq!(
        outcome,
        UpdateOutcome {
            is_valid_yaml: true,
            new_files_found: true,
        }
    );
    assert_eq!(accessor.total_reads(), 0);
    assert!(!model.contains("packages/new.yaml"));
}

#[tokio::test]
async fn edit_within_known_files_is_applied_in_place() {
    let (accessor, mut model) = discovered_model(&[
        ("configuration.yaml", "script: !include scripts.yaml\n"),
        ("scripts.yaml", "porch_on:\n  sequence: []\n"),
    ])
    .await;

    accessor.write("scripts.yaml", "porch_on:\n  sequence: []\nporch_off:\n  sequence: []\n");
    let outcome = model.update_file("scripts.yaml").await;

    assert_eq!(
        outcome,
        UpdateOutcome {
            is_valid_yaml: true,
            new_files_found: false,
        }
    );
    assert_eq!(model.get_scripts().len(), 2);

    let files = model.get_all_files();
    assert_eq!(files[1].path, "scripts.yaml");
    assert_eq!(files[1].context_path, "configuration.yaml/script");
}

#[tokio::test]
async fn new_include_target_is_reported_and_picked_up_by_rediscovery() {
    let (accessor, mut model) = discovered_model(&[
        ("configuration.yaml", "automation: !include automations.yaml\n"),
        ("automations.yaml", "[]\n"),
        ("scripts.yaml", "porch_on:\n  sequence: []\n"),
    ])
    .await;
    assert!(!model.contains("scripts.yaml"));

    accessor.write(
        "configuration.yaml",
        "automation: !include automations.yaml\nscript: !include scripts.yaml\n",
    );
    let outcome = model.update_file("configuration.yaml").await;
    assert!(outcome.is_valid_yaml);
    assert!(outcome.new_files_found);

    model.discover_files().await;
    assert!(model.contains("scripts.yaml"));
    assert!(model.get_scripts().contains_key("porch_on"));
}

#[tokio::test]
async fn broken_edit_keeps_the_file_but_drops_its_contributions() {
    let (accessor, mut model) = discovered_model(&[
        ("configuration.yaml", "script: !include scripts.yaml\n"),
        ("scripts.yaml", "porch_on:\n  sequence: []\n"),
    ])
    .await;
    assert_eq!(model.get_scripts().len(), 1);

    accessor.write("scripts.yaml", "porch_on:\n  sequence: [\n");
    let outcome = model.update_file("scripts.yaml").await;

    assert!(!outcome.is_valid_yaml);
    assert!(!outcome.new_files_found);
    assert!(model.contains("scripts.yaml"));
    assert!(model.get_scripts().is_empty());
    assert_eq!(model.get_all_files().len(), 2);
}

#[tokio::test]
async fn implicit_script_survives_an_update() {
    let (accessor, mut model) = discovered_model(&[
        ("configuration.yaml", "script: !include_dir_named scripts\n"),
        ("scripts/notify.yaml", "sequence: []\n"),
    ])
    .await;

    accessor.write("scripts/notify.yaml", "alias: Notify\nsequence: []\n");
    model.update_file("scripts/notify.yaml").await;

    let scripts = model.get_scripts();
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts["notify"].end.line, 1);
}
