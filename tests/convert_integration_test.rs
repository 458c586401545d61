//! Integration tests for the dump-translate binary.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn dump_translate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dump-translate"))
}

const DUMP: &str = r#"-- MySQL dump 10.13
SET NAMES utf8mb4;
CREATE TABLE `comments` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `post_id` int(11) NOT NULL,
  `body` text NOT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `comments_post` FOREIGN KEY (`post_id`) REFERENCES `posts` (`id`)
) ENGINE=InnoDB;
CREATE TABLE `posts` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `title` varchar(200) NOT NULL,
  `published` tinyint(1) NOT NULL DEFAULT '0',
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
INSERT INTO `posts` VALUES (1,'Hello; world',1),(2,'Draft',0);
INSERT INTO `comments` VALUES (1,1,'First!'),(2,1,'it\'s, \"quoted\"');
"#;

fn write_input(dir: &Path, sql: &str) -> std::path::PathBuf {
    let path = dir.join("dump.sql");
    fs::write(&path, sql).unwrap();
    path
}

#[test]
fn test_convert_full_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);
    let output = temp_dir.path().join("out.sql");

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap(), "-o", output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(result.status.success(), "Command failed: {:?}", result);

    let sql = fs::read_to_string(&output).unwrap();
    assert!(sql.starts_with("--"));
    assert!(sql.contains("SET session_replication_role = 'replica';"));
    assert!(sql.find("CREATE TABLE \"posts\"").unwrap() < sql.find("CREATE TABLE \"comments\"").unwrap());
    assert!(sql.contains("(1, 'Hello; world', TRUE)"));
    assert!(sql.contains("'it''s, \"quoted\"'"));
    assert!(sql.contains("SELECT setval("));
    assert!(!sql.contains('`'));
    assert!(!sql.contains("SET NAMES"));
}

#[test]
fn test_convert_to_stdout() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(result.status.success());

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("INSERT INTO \"comments\" VALUES"));
}

#[test]
fn test_schema_mode_has_no_rows() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);
    let output = temp_dir.path().join("schema.sql");

    let result = dump_translate()
        .args([
            "convert",
            input.to_str().unwrap(),
            "--mode",
            "schema",
            "-o",
            output.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(result.status.success());

    let sql = fs::read_to_string(&output).unwrap();
    assert!(sql.contains("CREATE TABLE \"comments\""));
    assert!(!sql.contains("INSERT INTO"));
    assert!(!sql.contains("session_replication_role"));
    assert!(sql.contains("ALTER TABLE \"comments\" ADD CONSTRAINT \"comments_post\""));
}

#[test]
fn test_rows_mode_writes_csv_per_table() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);
    let out_dir = temp_dir.path().join("csv");

    let result = dump_translate()
        .args([
            "convert",
            input.to_str().unwrap(),
            "--mode",
            "rows",
            "-o",
            out_dir.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(result.status.success(), "Command failed: {:?}", result);

    let posts = fs::read_to_string(out_dir.join("posts.csv")).unwrap();
    assert_eq!(posts, "1,Hello; world,1\n2,Draft,0\n");
    let comments = fs::read_to_string(out_dir.join("comments.csv")).unwrap();
    assert_eq!(comments, "1,1,First!\n2,1,\"it's, \"\"quoted\"\"\"\n");
}

#[test]
fn test_rows_mode_requires_output() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap(), "--mode", "rows"])
        .output()
        .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("--output"));
}

#[test]
fn test_unsupported_target_dialect() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap(), "--to", "mysql"])
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn test_missing_input_file() {
    let result = dump_translate()
        .args(["convert", "/nonexistent/dump.sql"])
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("does not exist"));
}

#[test]
fn test_strict_exits_with_two_on_diagnostics() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "CREATE TABLE t (a int, b int);\nINSERT INTO t VALUES (1);\n",
    );
    let output = temp_dir.path().join("out.sql");

    let result = dump_translate()
        .args([
            "convert",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--strict",
        ])
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(2));
    assert!(output.exists());
}

#[test]
fn test_strict_succeeds_on_clean_dump() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "CREATE TABLE t (a int, b varchar(5));\nINSERT INTO t VALUES (1,'x');\n",
    );
    let output = temp_dir.path().join("out.sql");

    let result = dump_translate()
        .args([
            "convert",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--strict",
        ])
        .output()
        .unwrap();
    assert!(result.status.success(), "Command failed: {:?}", result);
}

#[test]
fn test_report_file_and_json() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);
    let output = temp_dir.path().join("out.sql");
    let report = temp_dir.path().join("report.json");

    let result = dump_translate()
        .args([
            "convert",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();
    assert!(result.status.success(), "Command failed: {:?}", result);

    let printed: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(printed, saved);
    assert_eq!(saved["mode"], "full");
    assert_eq!(saved["stats"]["rows"], 4);
    assert_eq!(saved["plan"]["order"], serde_json::json!(["posts", "comments"]));
}

#[test]
fn test_json_without_output_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(!result.status.success());
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);
    let output = temp_dir.path().join("out.sql");

    let result = dump_translate()
        .args([
            "convert",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--dry-run",
        ])
        .output()
        .unwrap();
    assert!(result.status.success());
    assert!(!output.exists());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Dry run"));
}

#[test]
fn test_gzip_input() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("dump.sql.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(DUMP.as_bytes()).unwrap();
    fs::write(&input, encoder.finish().unwrap()).unwrap();

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(result.status.success(), "Command failed: {:?}", result);
    assert!(String::from_utf8_lossy(&result.stdout).contains("'Hello; world'"));
}

#[test]
fn test_config_file_sets_mode() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);
    let config = temp_dir.path().join("translate.yaml");
    fs::write(&config, "mode: schema\ndrop_tables: true\n").unwrap();

    let result = dump_translate()
        .args(["convert", input.to_str().unwrap(), "-c", config.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(result.status.success(), "Command failed: {:?}", result);

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("DROP TABLE IF EXISTS \"comments\" CASCADE;"));
    assert!(!stdout.contains("INSERT INTO"));
}

#[test]
fn test_order_command() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), DUMP);

    let result = dump_translate()
        .args(["order", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(result.status.success());
    assert_eq!(String::from_utf8_lossy(&result.stdout), "posts\ncomments\n");

    let pinned = dump_translate()
        .args(["order", input.to_str().unwrap(), "--pin", "comments", "--json"])
        .output()
        .unwrap();
    assert!(pinned.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&pinned.stdout).unwrap();
    assert_eq!(plan["order"], serde_json::json!(["comments", "posts"]));
    assert_eq!(plan["deferred"][0]["constraint"], "comments_post");
}

#[test]
fn test_report_schema_command() {
    let result = dump_translate().args(["report-schema"]).output().unwrap();
    assert!(result.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert!(schema["properties"]["stats"].is_object());
    assert!(schema["properties"]["diagnostics"].is_object());
}

#[test]
fn test_completions_command() {
    let result = dump_translate()
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(result.status.success());
    assert!(String::from_utf8_lossy(&result.stdout).contains("dump-translate"));
}
