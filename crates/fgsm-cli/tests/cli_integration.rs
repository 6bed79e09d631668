//! CLI integration tests for the fgsm binary.

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fgsm() -> Command {
    Command::cargo_bin("fgsm").expect("Failed to find fgsm binary")
}

/// Small geometry and class count so debug builds stay fast.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("fgsm.toml");
    std::fs::write(
        &path,
        "num_classes = 10\nmodel_seed = 5\nresize = 24\nimage_size = 16\nepsilons = [0.0, 0.1]\n",
    )
    .unwrap();
    path
}

fn write_png(path: &Path, shade: u8) {
    RgbImage::from_fn(20, 18, |x, y| {
        Rgb([
            shade.wrapping_add((x * 9) as u8),
            (y * 13) as u8,
            shade.wrapping_mul(3),
        ])
    })
    .save(path)
    .unwrap();
}

// ============================================================================
// Help and Version
// ============================================================================

#[test]
fn test_help_lists_subcommands() {
    fgsm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("attack"))
        .stdout(predicate::str::contains("eval"))
        .stdout(predicate::str::contains("bounds"));
}

#[test]
fn test_version() {
    fgsm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fgsm"));
}

// ============================================================================
// bounds
// ============================================================================

#[test]
fn test_bounds_imagenet_text() {
    fgsm()
        .arg("bounds")
        .assert()
        .success()
        .stdout(predicate::str::contains("-2.117904"))
        .stdout(predicate::str::contains("2.640000"));
}

#[test]
fn test_bounds_json() {
    let output = fgsm().args(["bounds", "--json"]).output().unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 3);
    assert_eq!(rows[1]["channel"], 1);
}

#[test]
fn test_missing_config_file() {
    fgsm()
        .args(["bounds", "--config", "/no/such/fgsm.toml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("File not found"));
}

// ============================================================================
// attack
// ============================================================================

#[test]
fn test_attack_json_report() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let image = dir.path().join("cat.png");
    write_png(&image, 40);

    let output = fgsm()
        .arg("attack")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .args(["--epsilon", "0.05", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let clean = report["clean_prediction"].as_u64().unwrap();
    let adv = report["adversarial_prediction"].as_u64().unwrap();
    assert_eq!(report["attack_success"].as_bool().unwrap(), clean != adv);
    assert!(report["max_abs_perturbation"].as_f64().unwrap() <= 0.05 + 1e-6);
}

#[test]
fn test_attack_writes_images_and_labels() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let image = dir.path().join("cat.png");
    write_png(&image, 90);
    let labels = dir.path().join("labels.txt");
    std::fs::write(&labels, (0..10).map(|i| format!("class{i}\n")).collect::<String>()).unwrap();
    let out = dir.path().join("out");

    fgsm()
        .arg("attack")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .arg("--labels")
        .arg(&labels)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Clean prediction"))
        .stdout(predicate::str::contains("(class"));

    for name in ["clean.png", "adversarial.png"] {
        let written = image::open(out.join(name)).unwrap();
        assert_eq!((written.width(), written.height()), (16, 16));
    }
}

#[test]
fn test_attack_rejects_label_out_of_range() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let image = dir.path().join("cat.png");
    write_png(&image, 10);

    fgsm()
        .arg("attack")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .args(["--label", "10"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_attack_rejects_negative_epsilon() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let image = dir.path().join("cat.png");
    write_png(&image, 10);

    fgsm()
        .arg("attack")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .arg("--epsilon=-0.1")
        .assert()
        .code(5);
}

#[test]
fn test_attack_rejects_non_image() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.png");
    std::fs::write(&file, "plain text, not a picture").unwrap();

    fgsm()
        .arg("attack")
        .arg(&file)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("unsupported media type"));
}

#[test]
fn test_attack_missing_image() {
    fgsm()
        .args(["attack", "/no/such/image.png"])
        .assert()
        .code(3);
}

// ============================================================================
// eval
// ============================================================================

#[test]
fn test_eval_writes_csv() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    write_png(&images.join("b.png"), 20);
    write_png(&images.join("a.png"), 200);
    let csv = dir.path().join("results.csv");

    fgsm()
        .arg("eval")
        .arg(&images)
        .arg("--config")
        .arg(&config)
        .arg("-o")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("FGSM Evaluation"));

    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "image,epsilon,clean_pred,adv_pred,success");
    assert_eq!(lines.len(), 1 + 2 * 2);
    assert!(lines[1].starts_with("a.png,0,"));
    assert!(lines[1].ends_with(",0"));
    assert!(lines[3].starts_with("b.png,0,"));
}

#[test]
fn test_eval_epsilon_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    write_png(&images.join("only.png"), 77);

    let output = fgsm()
        .arg("eval")
        .arg(&images)
        .arg("--config")
        .arg(&config)
        .args(["--epsilons", "0.01,0.02,0.03"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1 + 3);
}

#[test]
fn test_eval_empty_directory() {
    let dir = TempDir::new().unwrap();
    fgsm()
        .arg("eval")
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No images"));
}
