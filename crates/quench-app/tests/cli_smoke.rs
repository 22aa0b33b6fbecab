use std::process::{Command, Output};

fn quench(args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_quench");
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("QUENCH_SEED")
        .env_remove("QUENCH_THREADS")
        .env_remove("QUENCH_FORMAT")
        .output()
        .expect("failed to run quench binary")
}

#[test]
fn walk_emits_aligned_json_history() {
    let output = quench(&[
        "--seed", "42", "--format", "json", "walk", "--sim-time", "200", "--table-size", "50",
    ]);
    assert!(output.status.success(), "walk failed: {output:?}");
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("walk json");
    let positions = value["positions"].as_array().expect("positions");
    let times = value["times"].as_array().expect("times");
    assert_eq!(positions.len(), times.len());
    assert_eq!(positions[0]["x"], 0);
    assert_eq!(positions[0]["y"], 0);
    let last = times.last().and_then(serde_json::Value::as_f64).expect("time");
    assert!(last >= 200.0);
}

#[test]
fn seeded_runs_print_identical_output() {
    let args = [
        "--seed", "9", "mean-moments", "--runs", "20", "--time-finish", "100", "--time-step",
        "50", "--table-size", "30",
    ];
    let first = quench(&args);
    let second = quench(&args);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let mut sequential_args = vec!["--sequential"];
    sequential_args.extend_from_slice(&args);
    let sequential = quench(&sequential_args);
    assert_eq!(first.stdout, sequential.stdout);
}

#[test]
fn small_width_sweep_completes() {
    let output = quench(&[
        "--seed", "3", "sweep", "--repeats", "2", "--width-finish", "10", "--width-step", "5",
        "--runs", "30", "--time-finish", "300", "--time-step", "100", "--table-size", "20",
    ]);
    assert!(output.status.success(), "sweep failed: {output:?}");
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(text.lines().count(), 4, "header plus one row per width:\n{text}");
}

#[test]
fn invalid_table_size_exits_nonzero() {
    let output = quench(&["--seed", "1", "walk", "--table-size", "0"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
