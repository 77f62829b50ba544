use std::env;
use std::sync::{Mutex, OnceLock};

use parkbot_cli::commands::{merge_clients, migrate, recount_leads, reset_session};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_config_failure_without_a_bot_token() {
    with_env(&[("PARKBOT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn store_commands_run_against_a_migrated_database() {
    let dir = TempDir::new().expect("tempdir");
    let db_url = format!("sqlite://{}/parkbot.db?mode=rwc", dir.path().display());

    with_env(
        &[
            ("PARKBOT_DATABASE_URL", &db_url),
            ("PARKBOT_TELEGRAM_BOT_TOKEN", "12345:TEST-token"),
            ("PARKBOT_TELEGRAM_STAFF_CHAT_ID", "-1000123"),
        ],
        || {
            let result = migrate::run();
            let payload = parse_payload(&result.output);
            assert_eq!(result.exit_code, 0, "migrate should succeed: {}", result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");

            let result = recount_leads::run();
            let payload = parse_payload(&result.output);
            assert_eq!(result.exit_code, 0, "recount should succeed: {}", result.output);
            assert_eq!(payload["message"], "recounted leads for 0 clients");

            let result = merge_clients::run();
            let payload = parse_payload(&result.output);
            assert_eq!(result.exit_code, 0, "merge should succeed: {}", result.output);
            assert_eq!(payload["message"], "merged 0 duplicate client records");

            // No such conversation yet; the command reports it rather than
            // silently succeeding.
            let result = reset_session::run("tg_404");
            let payload = parse_payload(&result.output);
            assert_eq!(result.exit_code, 5);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "session_reset");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be JSON")
}

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const MANAGED_VARS: &[&str] = &[
    "PARKBOT_DATABASE_URL",
    "PARKBOT_TELEGRAM_BOT_TOKEN",
    "PARKBOT_TELEGRAM_STAFF_CHAT_ID",
    "PARKBOT_VK_ENABLED",
    "PARKBOT_LLM_PROVIDER",
];

fn with_env(vars: &[(&str, &str)], body: impl FnOnce()) {
    let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock");

    for var in MANAGED_VARS {
        env::remove_var(var);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    body();

    for var in MANAGED_VARS {
        env::remove_var(var);
    }
}
