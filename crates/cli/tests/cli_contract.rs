use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Single-page PDF of the given size in points
fn write_pdf(dir: &Path, name: &str, width: i64, height: i64) -> PathBuf {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1_i64,
            "Kids" => vec![Object::Reference(page_id)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    fs::write(&path, bytes).expect("pdf should be written");
    path
}

fn write_script(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("script.json");
    fs::write(&path, script).expect("script should be written");
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

fn temp() -> TempDir {
    tempfile::tempdir().expect("temp dir should be created")
}

const RECT_CIRCLE_UNDO_LINE: &str = r#"[
    {"action": "set_tool", "tool": "rectangle"},
    {"action": "pointer_down", "x": 10, "y": 10},
    {"action": "pointer_move", "x": 30, "y": 20},
    {"action": "pointer_up", "x": 60, "y": 40},
    {"action": "set_tool", "tool": "circle"},
    {"action": "pointer_down", "x": 200, "y": 200},
    {"action": "pointer_up", "x": 220, "y": 200},
    {"action": "undo"},
    {"action": "set_tool", "tool": "line"},
    {"action": "pointer_down", "x": 0, "y": 0},
    {"action": "pointer_up", "x": 30, "y": 40}
]"#;

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("takeoff-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_emits_stable_json_contract() {
    let dir = temp();
    let pdf = write_pdf(dir.path(), "plan.pdf", 595, 842);

    let output = cargo_bin_cmd!("takeoff-cli")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["page_count"], 1);
    assert_eq!(value["version"], "1.7");
    assert_eq!(value["first_page_size_pt"]["width"], 595.0);
    assert_eq!(value["first_page_size_pt"]["height"], 842.0);
}

#[test]
fn info_fails_for_missing_file() {
    let dir = temp();
    cargo_bin_cmd!("takeoff-cli")
        .arg("info")
        .arg(dir.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let dir = temp();
    let path = dir.path().join("invalid.pdf");
    fs::write(&path, "this is not a pdf").expect("write");

    cargo_bin_cmd!("takeoff-cli")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_rejects_non_pdf_file() {
    let dir = temp();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "hello").expect("write");

    cargo_bin_cmd!("takeoff-cli")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let dir = temp();
    let path = dir.path().join("locked.pdf");
    fs::write(&path, "%PDF-1.4\ntrailer << /Encrypt 4 0 R >>").expect("write");

    cargo_bin_cmd!("takeoff-cli")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn render_writes_scaled_png() {
    let dir = temp();
    let pdf = write_pdf(dir.path(), "plan.pdf", 100, 50);
    let output_path = dir.path().join("out/page.png");

    cargo_bin_cmd!("takeoff-cli")
        .arg("render")
        .arg(&pdf)
        .arg("--scale")
        .arg("2")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("page.png"));

    let image = image::open(&output_path).expect("render should be a readable image");
    assert_eq!((image.width(), image.height()), (200, 100));
}

#[test]
fn render_uses_configured_scale_by_default() {
    let dir = temp();
    let pdf = write_pdf(dir.path(), "plan.pdf", 100, 50);

    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("render")
        .arg(&pdf)
        .env_remove("TAKEOFF_RENDER_SCALE")
        .assert()
        .success();

    let image =
        image::open(dir.path().join("plan-page-1.png")).expect("default output should exist");
    assert_eq!((image.width(), image.height()), (150, 75));
}

#[test]
fn scale_parses_ratio() {
    let output = cargo_bin_cmd!("takeoff-cli")
        .arg("scale")
        .arg("1:50")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(stdout_json(&output)["scale_factor"], 0.02);
}

#[test]
fn scale_rejects_expressions() {
    cargo_bin_cmd!("takeoff-cli")
        .arg("scale")
        .arg("1/50")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid scale ratio"));
}

#[test]
fn calibrate_reports_scale_factor() {
    let dir = temp();
    let output = cargo_bin_cmd!("takeoff-cli")
        .args(["calibrate", "--from", "0,0", "--to", "100,0", "--length", "250", "--unit", "m"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["pixel_distance"], 100.0);
    assert_eq!(value["scale_factor"], 2.5);
    assert_eq!(value["unit"], "m");
}

#[test]
fn calibrate_rejects_coincident_points() {
    let dir = temp();
    cargo_bin_cmd!("takeoff-cli")
        .args(["calibrate", "--from", "5,5", "--to", "5,5", "--length", "10"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("calibration points coincide"));
}

#[test]
fn calibrate_rejects_non_numeric_length() {
    let dir = temp();
    cargo_bin_cmd!("takeoff-cli")
        .args(["calibrate", "--from", "0,0", "--to", "10,0", "--length", "ten"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn measure_prints_label() {
    let dir = temp();
    cargo_bin_cmd!("takeoff-cli")
        .args(["measure", "--from", "0,0", "--to", "40,0", "--scale-factor", "2.5", "--unit", "m"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("100.00 m\n"));
}

#[test]
fn replay_rect_circle_undo_line() {
    let dir = temp();
    let script = write_script(dir.path(), RECT_CIRCLE_UNDO_LINE);
    let scene_path = dir.path().join("scene.json");
    let csv_path = dir.path().join("quantities.csv");

    let output = cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("replay")
        .arg(&script)
        .arg("--output")
        .arg(&scene_path)
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary = stdout_json(&output);
    assert_eq!(summary["shapes"], 2);
    assert_eq!(summary["history_len"], 2);
    assert_eq!(summary["history_index"], 1);

    let scene: Value =
        serde_json::from_str(&fs::read_to_string(&scene_path).expect("scene written"))
            .expect("scene should be json");
    let types: Vec<&str> = scene["shapes"]
        .as_array()
        .expect("shapes array")
        .iter()
        .filter_map(|shape| shape["type"].as_str())
        .collect();
    assert_eq!(types, ["rectangle", "line"]);

    let csv = fs::read_to_string(&csv_path).expect("csv written");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "ID,Type,Length,Perimeter,Area,Unit,Area Unit,Label");
    assert!(lines[1].contains(",rectangle,,160.00,1500.00,px,px²,"));
    assert!(lines[2].contains(",line,50.00,,,px,,"));
}

#[test]
fn replay_with_calibration_and_measure() {
    let dir = temp();
    let script = write_script(
        dir.path(),
        r#"[
            {"action": "set_tool", "tool": "calibrate"},
            {"action": "calibrate", "x": 0, "y": 0},
            {"action": "calibrate", "x": 100, "y": 0, "length": "250"},
            {"action": "measure", "from": [0, 50], "to": [40, 50]}
        ]"#,
    );
    let scene_path = dir.path().join("scene.json");

    let output = cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("replay")
        .arg(&script)
        .arg("--output")
        .arg(&scene_path)
        .env_remove("TAKEOFF_UNIT")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary = stdout_json(&output);
    assert_eq!(summary["scale_factor"], 2.5);
    assert_eq!(summary["unit"], "m");

    let scene = fs::read_to_string(&scene_path).expect("scene written");
    assert!(scene.contains("\"real_distance\": 100.0"));
}

#[test]
fn replay_reports_failing_action() {
    let dir = temp();
    let script = write_script(dir.path(), r#"[{"action": "rotate", "angle": 30}]"#);

    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("action 1")
                .and(predicate::str::contains("no shape is selected")),
        );
}

#[test]
fn replay_snaps_to_page_corner() {
    let dir = temp();
    let pdf = write_pdf(dir.path(), "plan.pdf", 200, 100);
    let script = write_script(
        dir.path(),
        r#"[
            {"action": "set_tool", "tool": "line"},
            {"action": "pointer_down", "x": 4, "y": 3},
            {"action": "pointer_up", "x": 100, "y": 60}
        ]"#,
    );
    let scene_path = dir.path().join("scene.json");

    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("replay")
        .arg(&script)
        .arg("--pdf")
        .arg(&pdf)
        .arg("--output")
        .arg(&scene_path)
        .env("TAKEOFF_POINT_SNAPPING", "1")
        .assert()
        .success();

    let scene: Value =
        serde_json::from_str(&fs::read_to_string(&scene_path).expect("scene written"))
            .expect("scene should be json");
    assert_eq!(scene["shapes"][0]["from"]["x"], 0.0);
    assert_eq!(scene["shapes"][0]["from"]["y"], 0.0);
}

#[test]
fn saved_project_can_be_listed_and_exported() {
    let dir = temp();
    let data_dir = dir.path().join("data");
    let script = write_script(dir.path(), RECT_CIRCLE_UNDO_LINE);

    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("replay")
        .arg(&script)
        .arg("--save-project")
        .arg("level-1")
        .assert()
        .success();

    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("projects")
        .assert()
        .success()
        .stdout(predicate::str::diff("level-1\n"));

    let output = cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("export")
        .arg("level-1")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(stdout_json(&output)["shapes"].as_array().map(Vec::len), Some(2));
}

#[test]
fn export_fails_for_unknown_project() {
    let dir = temp();
    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("export")
        .arg("nowhere")
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found"));
}

#[test]
fn config_applies_env_overrides_and_saves() {
    let dir = temp();

    let output = cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("config")
        .arg("--save")
        .env("TAKEOFF_ANGLE_SNAP", "45")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(stdout_json(&output)["angle_snap_increment"], 45.0);

    let saved = fs::read_to_string(dir.path().join("config.json")).expect("config saved");
    let envelope: Value = serde_json::from_str(&saved).expect("config should be json");
    assert_eq!(envelope["version"], 1);
    assert_eq!(envelope["config"]["angle_snap_increment"], 45.0);
}

#[test]
fn config_rejects_bad_env_override() {
    let dir = temp();
    cargo_bin_cmd!("takeoff-cli")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("config")
        .env("TAKEOFF_SNAP_THRESHOLD", "close")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TAKEOFF_SNAP_THRESHOLD"));
}
