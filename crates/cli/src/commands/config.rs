use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use homecord_core::config::{AppConfig, LoadOptions, LogFormat};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// One rendered setting: dotted key, effective value, and the env keys that can set it.
struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Entry {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", entry.key, entry.value));
    }

    CommandResult::raw(0, lines.join("\n"))
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    vec![
        Entry::new("database.url", &config.database.url, &["HOMECORD_DATABASE_URL"]),
        Entry::new(
            "database.max_connections",
            config.database.max_connections,
            &["HOMECORD_DATABASE_MAX_CONNECTIONS"],
        ),
        Entry::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["HOMECORD_DATABASE_TIMEOUT_SECS"],
        ),
        Entry::new(
            "discord.bot_token",
            redact_token(config.discord.bot_token.expose_secret()),
            &["HOMECORD_DISCORD_BOT_TOKEN"],
        ),
        Entry::new(
            "discord.api_base_url",
            &config.discord.api_base_url,
            &["HOMECORD_DISCORD_API_BASE_URL"],
        ),
        Entry::new(
            "discord.request_timeout_secs",
            config.discord.request_timeout_secs,
            &["HOMECORD_DISCORD_REQUEST_TIMEOUT_SECS"],
        ),
        Entry::new(
            "server.bind_address",
            &config.server.bind_address,
            &["HOMECORD_SERVER_BIND_ADDRESS"],
        ),
        Entry::new(
            "server.health_check_port",
            config.server.health_check_port,
            &["HOMECORD_SERVER_HEALTH_CHECK_PORT"],
        ),
        Entry::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs,
            &["HOMECORD_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Entry::new(
            "engine.counter_ttl_secs",
            config.engine.counter_ttl_secs,
            &["HOMECORD_ENGINE_COUNTER_TTL_SECS"],
        ),
        Entry::new(
            "engine.reaction_cooldown_secs",
            config.engine.reaction_cooldown_secs,
            &["HOMECORD_ENGINE_REACTION_COOLDOWN_SECS"],
        ),
        Entry::new(
            "engine.event_debounce_secs",
            config.engine.event_debounce_secs,
            &["HOMECORD_ENGINE_EVENT_DEBOUNCE_SECS"],
        ),
        Entry::new(
            "engine.max_content_age_secs",
            config.engine.max_content_age_secs,
            &["HOMECORD_ENGINE_MAX_CONTENT_AGE_SECS"],
        ),
        Entry::new(
            "engine.sweep_interval_ms",
            config.engine.sweep_interval_ms,
            &["HOMECORD_ENGINE_SWEEP_INTERVAL_MS"],
        ),
        Entry::new("engine.showcase_purge_secs", config.engine.showcase_purge_secs, &[]),
        Entry::new("showcase.max_messages", config.showcase.max_messages, &[]),
        Entry::new("showcase.max_announcements", config.showcase.max_announcements, &[]),
        Entry::new("showcase.max_threads", config.showcase.max_threads, &[]),
        Entry::new("showcase.max_events", config.showcase.max_events, &[]),
        Entry::new(
            "logging.level",
            &config.logging.level,
            &["HOMECORD_LOGGING_LEVEL", "HOMECORD_LOG_LEVEL"],
        ),
        Entry::new(
            "logging.format",
            log_format_name(config.logging.format),
            &["HOMECORD_LOGGING_FORMAT", "HOMECORD_LOG_FORMAT"],
        ),
    ]
}

fn log_format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn detect_config_path() -> Option<PathBuf> {
    ["homecord.toml", "config/homecord.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

/// Keeps the first token segment, which only encodes the bot's user id.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('.') {
        Some((prefix, _)) => format!("{prefix}.***"),
        None => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_first_segment() {
        assert_eq!(redact_token("MTAx.GhIjKl.abcDEF123"), "MTAx.***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_nested_tables() {
        let doc: Value = "[showcase]\nmax_threads = 4\n".parse().expect("toml");
        assert!(contains_path(&doc, "showcase.max_threads"));
        assert!(!contains_path(&doc, "showcase.max_events"));
        assert!(!contains_path(&doc, "engine.counter_ttl_secs"));
    }
}
