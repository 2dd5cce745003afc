//! The binary fails loudly, before any model call, on bad inputs

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn shelf(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shelf"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("SHELFMARK_CONFIG")
        .output()
        .expect("failed to run shelf")
}

fn write_config(dir: &Path, body: &str) -> String {
    let path = dir.join("shelf.toml");
    std::fs::write(&path, body).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_enrich() {
    let dir = TempDir::new().unwrap();
    let output = shelf(&["--help"], dir.path());
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("enrich"));
}

#[test]
fn test_missing_input_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let output = shelf(
        &["enrich", "-i", "nope.json", "-o", "out.json", "-C", &config],
        dir.path(),
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope.json"), "stderr: {stderr}");
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn test_missing_taxonomy_document_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.json"), r#"[{"title": "Claw Hammer"}]"#).unwrap();
    let config = write_config(dir.path(), "[paths]\ntaxonomy_doc = \"missing/TAXONOMY.md\"\n");

    let output = shelf(
        &["enrich", "-i", "in.json", "-o", "out.json", "-C", &config],
        dir.path(),
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("taxonomy document"), "stderr: {stderr}");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "[mapping]\ntop_k = 0\n");
    let output = shelf(
        &["enrich", "-i", "in.json", "-o", "out.json", "-C", &config],
        dir.path(),
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("top_k"));
}

#[test]
fn test_missing_api_key_names_the_variable() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.json"), r#"[{"title": "Claw Hammer"}]"#).unwrap();
    std::fs::write(dir.path().join("TAXONOMY.md"), "**Product Type:** `Tools`\n").unwrap();
    std::fs::write(dir.path().join("VOICE.md"), "Plain and friendly.\n").unwrap();
    let config = write_config(
        dir.path(),
        "[paths]\ntaxonomy_doc = \"TAXONOMY.md\"\nvoice_tone_doc = \"VOICE.md\"\n",
    );

    let output = shelf(
        &["enrich", "-i", "in.json", "-o", "out.json", "-C", &config],
        dir.path(),
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ANTHROPIC_API_KEY"));
}
