use gamidash_core::db::query::{Query, Table};
use gamidash_core::{Database, StatsStore};
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
        self.xdg_data.join("gamidash/data.db")
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("gamidash");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("gamidash"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute gamidash: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
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
        "gamidash {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_bin(env, args);
    assert_success(args, &output);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn migrate_creates_database_in_xdg_data() {
    let env = CliTestEnv::new();

    let stdout = run_ok(&env, &["migrate"]);
    assert!(stdout.contains("Database ready at"));
    assert!(
        env.db_path().exists(),
        "database file should exist at {}",
        env.db_path().display()
    );
    assert!(env.xdg_state.join("gamidash").exists(), "log dir missing");
}

#[test]
fn seed_then_stats_json_reports_all_history() {
    let env = CliTestEnv::new();

    let seeded = run_ok(&env, &["seed"]);
    assert!(seeded.contains("Seeded 7 users"), "got:\n{seeded}");

    let again = run_ok(&env, &["seed"]);
    assert!(again.contains("nothing seeded"));

    let args = ["stats", "--format", "json", "--period", "semua"];
    let stdout = run_ok(&env, &args);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("stats output is JSON");
    let data = &json["data"];

    assert_eq!(data["period"], "all_time");
    assert_eq!(data["range"]["enabled"], false);
    assert_eq!(data["total_students"], 4);
    assert_eq!(data["total_teachers"], 1);
    assert_eq!(data["total_parents"], 1);
    assert_eq!(data["total_active_users"], 6);
    assert_eq!(data["active_individual_challenges"], 1);
    assert_eq!(data["active_group_challenges"], 1);
    assert_eq!(data["top_students"][0]["name"], "Citra Dewi");
    assert_eq!(data["habit_trends"].as_array().unwrap().len(), 5);
    assert!(data.get("degraded").is_none());

    let db = Database::open(&env.db_path()).expect("failed to open db");
    let users = db
        .count(&Query::table(Table::Users))
        .expect("failed to count users");
    assert_eq!(users, 7);
}

#[test]
fn stats_text_uses_period_token() {
    let env = CliTestEnv::new();
    run_ok(&env, &["seed"]);

    let stdout = run_ok(&env, &["stats", "--period", "minggu ini"]);
    assert!(stdout.contains("Dashboard (this_week)"), "got:\n{stdout}");
    assert!(stdout.contains("Users:        4 students"));
    assert!(stdout.contains("Top students:"));
}

#[test]
fn database_flag_and_config_file_are_honored() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[dashboard]
utc_offset = "+07:00"
top_students_limit = 2
"#,
    );
    let custom_db = env.home.join("school.db");
    let custom = custom_db.to_str().expect("utf-8 temp path");

    run_ok(&env, &["--database", custom, "seed"]);
    assert!(custom_db.exists());
    assert!(!env.db_path().exists());

    let stdout = run_ok(
        &env,
        &["--database", custom, "stats", "--format", "json", "--period", "all"],
    );
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("stats output is JSON");
    assert_eq!(json["data"]["top_students"].as_array().unwrap().len(), 2);
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    env.write_config("[dashboard]\nquery_timeout_ms = 0\n");

    let output = run_bin(&env, &["migrate"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "got:\n{stderr}");
}
