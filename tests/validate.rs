use std::path::Path;

use waypoint_cli::commands::validate::ValidateCommand;

fn write_config(dir: &Path, source: &str) -> std::path::PathBuf {
    let file = dir.join("waypoint.toml");
    std::fs::write(&file, source).unwrap();
    file
}

#[test]
fn valid_file_passes() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(
        dir.path(),
        r#"
        project = "demo"
        [app.web.build]
        use = "docker"
        [app.web.deploy]
        use = "nomad"
        "#,
    );
    ValidateCommand { file }.run().unwrap();
}

#[test]
fn every_problem_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(
        dir.path(),
        r#"
        project = "demo"

        [labels]
        "waypoint/owner" = "me"

        [app.web.build]
        use = "docker"

        [app.api.deploy]
        use = "nomad"
        "#,
    );
    let err = ValidateCommand { file: file.clone() }.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("{} is not valid", file.display())
    );

    let cause = err.chain().nth(1).unwrap().to_string();
    assert!(cause.starts_with("3 errors occurred:"), "{cause}");
    assert!(cause.contains(r#"app "web""#), "{cause}");
    assert!(cause.contains(r#"app "api""#), "{cause}");
    assert!(cause.contains("label[waypoint/owner]"), "{cause}");
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("missing.toml");
    let err = ValidateCommand { file: file.clone() }.run().unwrap_err();
    assert_eq!(err.to_string(), format!("failed to read {}", file.display()));
}
