use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const ROYAL_CATERERS: &str =
    "Royal Caterers\nBuffet for 500 guests\nTotal: Rs 8,50,000\nDate: 12/01/2025\n";

fn wedx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("wedx");
    path
}

/// Config with local recognition and no storage, plus a scratch dir.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let scratch_dir = root.join("scratch");
    fs::create_dir_all(&scratch_dir).unwrap();

    let config_content = format!(
        r#"[scan]
scratch_dir = "{}"

[storage]
provider = "disabled"

[recognition]
provider = "local"
"#,
        scratch_dir.display()
    );

    let config_path = config_dir.join("wedx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_wedx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = wedx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run wedx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_scan_text_receipt_end_to_end() {
    let (tmp, config_path) = setup_test_env();
    let receipt = tmp.path().join("royal.txt");
    fs::write(&receipt, ROYAL_CATERERS).unwrap();

    let (stdout, stderr, success) = run_wedx(&config_path, &["scan", receipt.to_str().unwrap()]);
    assert!(success, "scan failed: stdout={}, stderr={}", stdout, stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["vendor_name"], "Royal Caterers");
    assert_eq!(json["amount"], "850000");
    assert_eq!(json["date"], "2025-01-12");
    assert_eq!(json["category"], "Catering");
    assert_eq!(json["receipt_url"], "");
    assert_eq!(json["confidence"], 70.0);
    assert_eq!(json["raw_text"], ROYAL_CATERERS);
}

#[test]
fn test_scan_image_degrades_without_failing() {
    let (tmp, config_path) = setup_test_env();
    let image = tmp.path().join("bill.jpg");
    fs::write(&image, [0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]).unwrap();

    let (stdout, stderr, success) = run_wedx(&config_path, &["scan", image.to_str().unwrap()]);
    assert!(success, "scan failed: stdout={}, stderr={}", stdout, stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["vendor_name"], "");
    assert!(json["amount"].is_null());
    assert!(json["date"].is_null());
    assert_eq!(json["category"], "Miscellaneous");
    assert_eq!(json["raw_text"], "");
    assert_eq!(json["confidence"], 0.0);
}

#[test]
fn test_scan_leaves_no_scratch_files() {
    let (tmp, config_path) = setup_test_env();
    let receipt = tmp.path().join("royal.txt");
    fs::write(&receipt, ROYAL_CATERERS).unwrap();

    let (_, stderr, success) = run_wedx(&config_path, &["scan", receipt.to_str().unwrap()]);
    assert!(success, "scan failed: {}", stderr);
    let leftovers = fs::read_dir(tmp.path().join("scratch")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_scan_media_type_override() {
    let (tmp, config_path) = setup_test_env();
    let receipt = tmp.path().join("quote.dat");
    fs::write(&receipt, "Shree Decorators\nStage decor and floral mandap\nGrand Total: ₹1,20,000\n").unwrap();

    let (stdout, stderr, success) = run_wedx(
        &config_path,
        &["scan", receipt.to_str().unwrap(), "--media-type", "text/plain"],
    );
    assert!(success, "scan failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["vendor_name"], "Shree Decorators");
    assert_eq!(json["amount"], "120000");
    assert_eq!(json["category"], "Decoration & Flowers");
}

#[test]
fn test_scan_missing_file_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope.jpg");
    let (_, stderr, success) = run_wedx(&config_path, &["scan", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to read"));
}

#[test]
fn test_scan_requires_valid_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("wedx.toml");
    fs::write(&config_path, "[storage]\nprovider = \"s3\"\n").unwrap();
    let receipt = tmp.path().join("r.txt");
    fs::write(&receipt, "x").unwrap();

    let (_, stderr, success) = run_wedx(&config_path, &["scan", receipt.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("storage.bucket"));
}

#[test]
fn test_extract_from_file() {
    let (tmp, config_path) = setup_test_env();
    let text = tmp.path().join("ocr.txt");
    fs::write(&text, ROYAL_CATERERS).unwrap();

    let (stdout, stderr, success) = run_wedx(&config_path, &["extract", text.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["vendor_name"], "Royal Caterers");
    assert_eq!(json["amount"], "850000");
    assert_eq!(json["date"], "2025-01-12");
    assert_eq!(json["category"], "Catering");
}

#[test]
fn test_extract_from_stdin_without_config() {
    let tmp = TempDir::new().unwrap();
    let mut child = Command::new(wedx_binary())
        .arg("--config")
        .arg(tmp.path().join("missing.toml"))
        .args(["extract", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"Glam Studio\nBridal makeup\nINR 25,000 paid on 5/3/24\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["vendor_name"], "Glam Studio");
    assert_eq!(json["amount"], "25000");
    assert_eq!(json["date"], "2024-03-05");
}

#[test]
fn test_extract_empty_text() {
    let (tmp, config_path) = setup_test_env();
    let text = tmp.path().join("empty.txt");
    fs::write(&text, "\n\n").unwrap();

    let (stdout, _, success) = run_wedx(&config_path, &["extract", text.to_str().unwrap()]);
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["vendor_name"], "");
    assert!(json["amount"].is_null());
    assert!(json["date"].is_null());
    assert_eq!(json["category"], "Miscellaneous");
}

#[test]
fn test_categorize_description() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_wedx(&config_path, &["categorize", "Sherwani and safa for the groom"]);
    assert!(success);
    assert_eq!(stdout.trim(), "Groom Clothing");
}

#[test]
fn test_categorize_no_match_is_default() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_wedx(&config_path, &["categorize", "xyz"]);
    assert!(success);
    assert_eq!(stdout.trim(), "Miscellaneous");
}

#[test]
fn test_taxonomy_lists_builtin_in_order() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_wedx(&config_path, &["taxonomy"]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].starts_with("Venue: venue, hall"));
    assert!(lines[1].starts_with("Catering: "));
    assert_eq!(lines.len(), 18);
    assert_eq!(lines[17], "(default: Miscellaneous)");
}

#[test]
fn test_taxonomy_from_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("wedx.toml");
    fs::write(
        &config_path,
        r#"
[taxonomy]
default_category = "Other"

[[taxonomy.categories]]
name = "Tent"
terms = ["Tent", "shamiana"]
"#,
    )
    .unwrap();

    let (stdout, _, success) = run_wedx(&config_path, &["taxonomy"]);
    assert!(success);
    assert_eq!(stdout, "Tent: tent, shamiana\n(default: Other)\n");

    let (stdout, _, success) = run_wedx(&config_path, &["categorize", "Shamiana rental"]);
    assert!(success);
    assert_eq!(stdout.trim(), "Tent");
}

#[test]
fn test_invalid_taxonomy_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("wedx.toml");
    fs::write(
        &config_path,
        r#"
[[taxonomy.categories]]
name = "Tent"
terms = ["tent"]

[[taxonomy.categories]]
name = "Tent"
terms = ["shamiana"]
"#,
    )
    .unwrap();

    let (stdout, stderr, success) = run_wedx(&config_path, &["categorize", "Shamiana tent"]);
    assert!(!success, "categorize should fail: stdout={}", stdout);
    assert!(stdout.is_empty());
    assert!(stderr.contains("duplicate taxonomy category: 'Tent'"), "stderr: {}", stderr);

    let (_, stderr, success) = run_wedx(&config_path, &["taxonomy"]);
    assert!(!success);
    assert!(stderr.contains("duplicate taxonomy category"));
}

#[test]
fn test_unparsable_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("wedx.toml");
    fs::write(&config_path, "[taxonomy\ndefault_category = ").unwrap();

    let text = tmp.path().join("ocr.txt");
    fs::write(&text, ROYAL_CATERERS).unwrap();
    let (_, stderr, success) = run_wedx(&config_path, &["extract", text.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to parse config file"), "stderr: {}", stderr);
}
