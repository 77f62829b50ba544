use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parkbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "PARKBOT_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "PARKBOT_DATABASE_MAX_CONNECTIONS"),
    ));

    lines.push(render_line(
        "telegram.bot_token",
        &redact_token(config.telegram.bot_token.expose_secret()),
        source("telegram.bot_token", "PARKBOT_TELEGRAM_BOT_TOKEN"),
    ));
    lines.push(render_line(
        "telegram.staff_chat_id",
        &config.telegram.staff_chat_id,
        source("telegram.staff_chat_id", "PARKBOT_TELEGRAM_STAFF_CHAT_ID"),
    ));

    lines.push(render_line(
        "vk.enabled",
        &config.vk.enabled.to_string(),
        source("vk.enabled", "PARKBOT_VK_ENABLED"),
    ));
    let vk_token = match &config.vk.access_token {
        Some(_) => "<redacted>",
        None => "<unset>",
    };
    lines.push(render_line(
        "vk.access_token",
        vk_token,
        source("vk.access_token", "PARKBOT_VK_ACCESS_TOKEN"),
    ));
    lines.push(render_line(
        "vk.group_id",
        &config.vk.group_id.map_or_else(|| "<unset>".to_string(), |id| id.to_string()),
        source("vk.group_id", "PARKBOT_VK_GROUP_ID"),
    ));

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", "PARKBOT_LLM_PROVIDER"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "PARKBOT_LLM_MODEL")));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", "PARKBOT_LLM_BASE_URL"),
    ));
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "llm.api_key",
        llm_api_key,
        source("llm.api_key", "PARKBOT_LLM_API_KEY"),
    ));

    lines.push(render_line(
        "crm.enabled",
        &config.crm.enabled.to_string(),
        source("crm.enabled", "PARKBOT_CRM_ENABLED"),
    ));
    lines.push(render_line(
        "crm.base_url",
        config.crm.base_url.as_deref().unwrap_or("<unset>"),
        source("crm.base_url", "PARKBOT_CRM_BASE_URL"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "PARKBOT_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", "PARKBOT_SERVER_HEALTH_CHECK_PORT"),
    ));

    lines.push(render_line(
        "business.park",
        &config.business.park,
        source("business.park", "PARKBOT_BUSINESS_PARK"),
    ));
    lines.push(render_line(
        "business.contact_phone",
        &config.business.contact_phone,
        source("business.contact_phone", "PARKBOT_BUSINESS_CONTACT_PHONE"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "PARKBOT_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "PARKBOT_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("parkbot.toml"), PathBuf::from("config/parkbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Telegram bot tokens look like `<bot id>:<secret>`; keep the id so staff
/// can tell which bot is configured.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn bot_tokens_keep_the_id_and_hide_the_secret() {
        assert_eq!(redact_token("12345:AAF-secret"), "12345:***");
        assert_eq!(redact_token(""), "<empty>");
        assert_eq!(redact_token("no-colon"), "<redacted>");
    }

    #[test]
    fn dotted_paths_walk_nested_tables() {
        let doc: toml::Value = "[telegram]\nbot_token = \"1:x\"".parse().expect("toml");
        assert!(contains_path(&doc, "telegram.bot_token"));
        assert!(!contains_path(&doc, "telegram.staff_chat_id"));
        assert!(!contains_path(&doc, "vk.enabled"));
    }
}
