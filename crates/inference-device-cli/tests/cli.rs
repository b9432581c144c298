#![cfg(not(target_arch = "wasm32"))]

use std::process::Command;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_inference-device"))
}

#[test]
fn runs_one_command_and_dumps_output() {
    let output = cli()
        .args(["--input", "deadbeef", "--latency-ms", "0", "--reset-first"])
        .output()
        .expect("failed to run inference-device CLI");

    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status: busy=0 done=1 error=0"), "{stdout}");
    assert!(stdout.contains("status: 0x00000002"), "{stdout}");
    assert!(
        stdout.contains("0000: 01 01 01 01 01 01 01 01 01 01 01 01 01 01 01 01"),
        "{stdout}"
    );
}

#[test]
fn reads_config_and_input_files() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let config = tmp.path().join("device.json");
    std::fs::write(&config, r#"{"compute_latency_ms": 0, "output_fill": 171}"#).unwrap();
    let input = tmp.path().join("input.bin");
    std::fs::write(&input, [0xEF, 0xBE, 0xAD, 0xDE]).unwrap();

    let output = cli()
        .arg("--config")
        .arg(&config)
        .arg("--input")
        .arg(format!("@{}", input.display()))
        .args(["--dump-bytes", "4"])
        .output()
        .expect("failed to run inference-device CLI");

    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0000: ab ab ab ab"), "{stdout}");
}

#[test]
fn rejects_unknown_config_fields() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let config = tmp.path().join("device.json");
    std::fs::write(&config, r#"{"compute_latency": 5}"#).unwrap();

    let output = cli()
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run inference-device CLI");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}
