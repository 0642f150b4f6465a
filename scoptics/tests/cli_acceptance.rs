use scoptics_core::{Database, EventFilter};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("scoptics/tracking.db")
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("scoptics");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }
}

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../scoptics-core/tests/fixtures/match_001.jsonl")
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    let bin_path = match bin_name {
        "scoptics" => PathBuf::from(assert_cmd::cargo::cargo_bin!("scoptics")),
        "scoptics-load" => PathBuf::from(assert_cmd::cargo::cargo_bin!("scoptics-load")),
        "scoptics-process" => PathBuf::from(assert_cmd::cargo::cargo_bin!("scoptics-process")),
        "scoptics-events" => PathBuf::from(assert_cmd::cargo::cargo_bin!("scoptics-events")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn load_fixture(env: &CliTestEnv) {
    let fixture = fixture_path();
    let args = [fixture.to_str().expect("fixture path is not UTF-8"), "--home-team", "home"];
    let output = run_bin(env, "scoptics-load", &args);
    assert_success("scoptics-load", &args, &output);
}

#[test]
fn load_populates_tracking_and_match_metadata() {
    let env = CliTestEnv::new();
    load_fixture(&env);

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );

    let db = Database::open(&db_path).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    assert_eq!(
        db.tracking_for_match("match_001")
            .expect("failed to read tracking")
            .len(),
        45
    );
    let info = db
        .get_match("match_001")
        .expect("failed to read match")
        .expect("match metadata should be stored");
    assert_eq!(info.home_team_id.as_deref(), Some("home"));
}

#[test]
fn load_process_and_list_events() {
    let env = CliTestEnv::new();
    load_fixture(&env);

    let args = ["match_001", "home"];
    let output = run_bin(&env, "scoptics-process", &args);
    assert_success("scoptics-process", &args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Events stored:    2"),
        "expected process summary in stdout, got:\n{stdout}"
    );

    let args = ["--match", "match_001", "--format", "json"];
    let output = run_bin(&env, "scoptics-events", &args);
    assert_success("scoptics-events", &args, &output);
    let events: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("events output should be JSON");
    let events = events.as_array().expect("events output should be an array");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["start_frame"], 10);
    assert_eq!(events[1]["end_frame"], 41);

    let db = Database::open(&env.db_path()).expect("failed to open db");
    let stored = db
        .find_events(&EventFilter {
            from_frame: Some(30),
            ..Default::default()
        })
        .expect("failed to query events");
    assert_eq!(stored.len(), 1);
}

#[test]
fn process_respects_max_gap_override() {
    let env = CliTestEnv::new();
    load_fixture(&env);

    let args = ["match_001", "home", "--max-gap", "50", "--format", "json"];
    let output = run_bin(&env, "scoptics-process", &args);
    assert_success("scoptics-process", &args, &output);
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("process output should be JSON");
    assert_eq!(summary["detections"], 5);
    assert_eq!(summary["events"], 1);
}

#[test]
fn process_unknown_match_reports_no_data() {
    let env = CliTestEnv::new();

    let args = ["nope", "home"];
    let output = run_bin(&env, "scoptics-process", &args);
    assert_success("scoptics-process", &args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No tracking data found"));
}

#[test]
fn events_lists_matches() {
    let env = CliTestEnv::new();
    load_fixture(&env);

    let args = ["--matches"];
    let output = run_bin(&env, "scoptics-events", &args);
    assert_success("scoptics-events", &args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("match_001  45 tracking rows, 0 events"));
}

#[test]
fn load_rejects_invalid_records() {
    let env = CliTestEnv::new();
    let bad = env.home.join("bad.jsonl");
    fs::write(
        &bad,
        "{\"match_id\": \"m\", \"frame\": -1, \"timestamp_iso\": \"2025-01-01T00:00:00Z\", \"x\": 1.0, \"y\": 1.0}\n",
    )
    .expect("failed to write bad fixture");

    let output = run_bin(&env, "scoptics-load", &[bad.to_str().expect("path is not UTF-8")]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("index 0"));
}

#[test]
fn ask_requires_llm_config() {
    let env = CliTestEnv::new();
    env.write_config("[pipeline]\nmax_heal_retries = 1\n");

    let output = run_bin(&env, "scoptics", &["when", "did", "we", "press?"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("[llm] section is required"));
}

#[test]
fn ask_rejects_empty_question() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "scoptics", &["  "]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("question must not be empty"));
}
