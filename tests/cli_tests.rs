use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    dir: TempDir,
    input: PathBuf,
}

impl TestContext {
    /// A straight line over five frames plus two scattered points.
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let input = dir.path().join("input.txt");

        let mut f = File::create(&input).unwrap();
        writeln!(f, "type = PointsFile v.1.0").unwrap();
        writeln!(f, "width = 1000").unwrap();
        writeln!(f, "height = 1000").unwrap();
        writeln!(f, "uid = 777").unwrap();
        writeln!(f, "DATA").unwrap();
        for k in 0..5 {
            writeln!(f, "{} x:{} y:{} t:0", k, 100 + 10 * k, 200 + 5 * k).unwrap();
        }
        writeln!(f, "1 x:900 y:40 t:-1").unwrap();
        writeln!(f, "3 x:15 y:750 t:-1").unwrap();

        Self { dir, input }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn astre(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_astre"))
        .args(args)
        .output()
        .expect("Failed to execute binary")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn test_cli_detect_writes_annotated_file() {
    let ctx = TestContext::new();
    let output = ctx.path("out.txt");
    let out = astre(&[
        "detect",
        ctx.input.to_str().unwrap(),
        output.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let text = std::fs::read_to_string(&output).unwrap();
    let header = Regex::new(r"(?m)^traj:0:lNFA = (-?[0-9.e+-]+)$").unwrap();
    let caps = header.captures(&text).expect("missing NFA header");
    let log_nfa: f64 = caps[1].parse().unwrap();
    assert!(log_nfa < -10.0);
    assert!(text.lines().any(|l| l == "f:2 x:120 y:210 t:0 t:0"));
    assert!(text.lines().any(|l| l == "f:1 x:900 y:40 t:-1 t:-1"));
    assert!(stdout(&out).contains("Round"));
}

#[test]
fn test_cli_detect_json_and_csv_summary() {
    let ctx = TestContext::new();
    let csv_path = ctx.path("summary.csv");
    let out = astre(&[
        "detect",
        ctx.input.to_str().unwrap(),
        "--json",
        "--summary",
        csv_path.to_str().unwrap(),
    ]);
    assert!(out.status.success());

    let summary: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(summary["frames"], 5);
    assert_eq!(summary["points"], 7);
    assert_eq!(summary["trajectories"][0]["size"], 5);
    assert_eq!(summary["trajectories"][0]["descriptor"], "S0 P0 P0 P0 P0 P0");

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "logNfa"));
    assert_eq!(reader.records().count(), 1);
}

#[test]
fn test_cli_params_file_overrides_flags() {
    let ctx = TestContext::new();
    let params = ctx.path("params.json");
    std::fs::write(&params, r#"{ "max_log_nfa": -100.0 }"#).unwrap();

    let out = astre(&[
        "detect",
        ctx.input.to_str().unwrap(),
        "--json",
        "-e",
        "5",
        "--params",
        params.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    let summary: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(summary["trajectories"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_cli_info() {
    let ctx = TestContext::new();
    let out = astre(&[
        "info",
        ctx.input.to_str().unwrap(),
        "S0 P0 P0 P0 P0 P0",
        "--json",
    ]);
    assert!(out.status.success());
    let c: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(c["size"], 5);
    assert_eq!(c["runs"], 1);
    assert!(c["log_nfa"].as_f64().unwrap() < -10.0);

    let bad = astre(&["info", ctx.input.to_str().unwrap(), "P0 S0"]);
    assert!(!bad.status.success());
}

#[test]
fn test_cli_stats_against_itself() {
    let ctx = TestContext::new();
    let out = astre(&[
        "stats",
        ctx.input.to_str().unwrap(),
        ctx.input.to_str().unwrap(),
        "--json",
    ]);
    assert!(out.status.success());
    let s: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(s["real_links"], 4);
    assert_eq!(s["recall"], 1.0);
}

#[test]
fn test_cli_generate_then_detect() {
    let ctx = TestContext::new();
    let scene = ctx.path("scene.txt");
    let out = astre(&[
        "generate",
        scene.to_str().unwrap(),
        "-K",
        "6",
        "-n",
        "2",
        "-N",
        "3",
        "--width",
        "500",
        "--height",
        "500",
        "--seed",
        "42",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let detected = ctx.path("detected.txt");
    let out = astre(&[
        "detect",
        scene.to_str().unwrap(),
        detected.to_str().unwrap(),
    ]);
    assert!(out.status.success());

    let out = astre(&[
        "stats",
        scene.to_str().unwrap(),
        detected.to_str().unwrap(),
        "--json",
    ]);
    assert!(out.status.success());
    let s: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(s["real_links"], 10);

    // The detection output carries both columns: ground truth third, result last
    let out = astre(&["stats", detected.to_str().unwrap(), "--json"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let single: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(single, s);
}

#[test]
fn test_cli_cripple() {
    let ctx = TestContext::new();
    let crippled = ctx.path("crippled.txt");
    let out = astre(&[
        "cripple",
        ctx.input.to_str().unwrap(),
        crippled.to_str().unwrap(),
        "-r",
        "100",
        "--traj-field",
        "-1",
        "--seed",
        "3",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    // Only the middle point of the five-frame line can go
    let text = std::fs::read_to_string(&crippled).unwrap();
    assert!(!text.lines().any(|l| l == "f:2 x:120 y:210 t:0"));
    assert!(text.lines().any(|l| l == "f:3 x:130 y:215 t:0"));
    assert!(text.lines().any(|l| l == "f:1 x:900 y:40 t:-1"));

    let bad = astre(&[
        "cripple",
        ctx.input.to_str().unwrap(),
        crippled.to_str().unwrap(),
        "-r",
        "150",
    ]);
    assert_eq!(bad.status.code(), Some(1));
}

#[test]
fn test_cli_fails_on_missing_input() {
    let out = astre(&["detect", "/nonexistent/input.txt"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Could not open points file"));
}
