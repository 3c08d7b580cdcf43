use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheTtls;
use crate::domain::showcase::ShowcaseLimits;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub showcase: ShowcaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub counter_ttl_secs: u64,
    pub reaction_cooldown_secs: u64,
    pub event_debounce_secs: u64,
    pub max_content_age_secs: u64,
    pub sweep_interval_ms: u64,
    pub showcase_purge_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShowcaseConfig {
    pub max_messages: u32,
    pub max_announcements: u32,
    pub max_threads: u32,
    pub max_events: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub discord_bot_token: Option<String>,
    pub discord_api_base_url: Option<String>,
    pub health_check_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://homecord.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            discord: DiscordConfig {
                bot_token: String::new().into(),
                api_base_url: "https://discord.com/api/v10".to_string(),
                request_timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            engine: EngineConfig::default(),
            showcase: ShowcaseConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            counter_ttl_secs: 3 * 24 * 60 * 60,
            reaction_cooldown_secs: 60 * 60,
            event_debounce_secs: 60 * 60,
            max_content_age_secs: 7 * 24 * 60 * 60,
            sweep_interval_ms: 1_000,
            showcase_purge_secs: 5 * 60,
        }
    }
}

impl EngineConfig {
    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            counter: chrono::Duration::seconds(secs_i64(self.counter_ttl_secs)),
            reaction_cooldown: chrono::Duration::seconds(secs_i64(self.reaction_cooldown_secs)),
            event_debounce: chrono::Duration::seconds(secs_i64(self.event_debounce_secs)),
        }
    }

    pub fn max_content_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(secs_i64(self.max_content_age_secs))
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.sweep_interval_ms)
    }

    pub fn showcase_purge_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.showcase_purge_secs)
    }
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        let limits = ShowcaseLimits::default();
        Self {
            max_messages: limits.messages,
            max_announcements: limits.announcements,
            max_threads: limits.threads,
            max_events: limits.events,
        }
    }
}

impl ShowcaseConfig {
    pub fn limits(&self) -> ShowcaseLimits {
        ShowcaseLimits {
            messages: self.max_messages,
            announcements: self.max_announcements,
            threads: self.max_threads,
            events: self.max_events,
        }
    }
}

/// Clamped to the largest whole-second span `chrono::Duration` can hold.
fn secs_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000)
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("homecord.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(discord) = patch.discord {
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = discord.request_timeout_secs {
                self.discord.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(value) = engine.counter_ttl_secs {
                self.engine.counter_ttl_secs = value;
            }
            if let Some(value) = engine.reaction_cooldown_secs {
                self.engine.reaction_cooldown_secs = value;
            }
            if let Some(value) = engine.event_debounce_secs {
                self.engine.event_debounce_secs = value;
            }
            if let Some(value) = engine.max_content_age_secs {
                self.engine.max_content_age_secs = value;
            }
            if let Some(value) = engine.sweep_interval_ms {
                self.engine.sweep_interval_ms = value;
            }
            if let Some(value) = engine.showcase_purge_secs {
                self.engine.showcase_purge_secs = value;
            }
        }

        if let Some(showcase) = patch.showcase {
            if let Some(value) = showcase.max_messages {
                self.showcase.max_messages = value;
            }
            if let Some(value) = showcase.max_announcements {
                self.showcase.max_announcements = value;
            }
            if let Some(value) = showcase.max_threads {
                self.showcase.max_threads = value;
            }
            if let Some(value) = showcase.max_events {
                self.showcase.max_events = value;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HOMECORD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("HOMECORD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("HOMECORD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HOMECORD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HOMECORD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HOMECORD_DISCORD_BOT_TOKEN") {
            self.discord.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("HOMECORD_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("HOMECORD_DISCORD_REQUEST_TIMEOUT_SECS") {
            self.discord.request_timeout_secs =
                parse_u64("HOMECORD_DISCORD_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HOMECORD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HOMECORD_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("HOMECORD_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HOMECORD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HOMECORD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("HOMECORD_ENGINE_COUNTER_TTL_SECS") {
            self.engine.counter_ttl_secs = parse_u64("HOMECORD_ENGINE_COUNTER_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("HOMECORD_ENGINE_REACTION_COOLDOWN_SECS") {
            self.engine.reaction_cooldown_secs =
                parse_u64("HOMECORD_ENGINE_REACTION_COOLDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("HOMECORD_ENGINE_EVENT_DEBOUNCE_SECS") {
            self.engine.event_debounce_secs =
                parse_u64("HOMECORD_ENGINE_EVENT_DEBOUNCE_SECS", &value)?;
        }
        if let Some(value) = read_env("HOMECORD_ENGINE_MAX_CONTENT_AGE_SECS") {
            self.engine.max_content_age_secs =
                parse_u64("HOMECORD_ENGINE_MAX_CONTENT_AGE_SECS", &value)?;
        }
        if let Some(value) = read_env("HOMECORD_ENGINE_SWEEP_INTERVAL_MS") {
            self.engine.sweep_interval_ms =
                parse_u64("HOMECORD_ENGINE_SWEEP_INTERVAL_MS", &value)?;
        }

        let log_level =
            read_env("HOMECORD_LOGGING_LEVEL").or_else(|| read_env("HOMECORD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HOMECORD_LOGGING_FORMAT").or_else(|| read_env("HOMECORD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.discord_api_base_url {
            self.discord.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.health_check_port {
            self.server.health_check_port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_discord(&self.discord)?;
        validate_server(&self.server)?;
        validate_engine(&self.engine)?;
        validate_showcase(&self.showcase)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("homecord.toml"), PathBuf::from("config/homecord.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let token = discord.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Reset Token".to_string(),
        ));
    }
    let token = token.strip_prefix("Bot ").unwrap_or(token);
    let segments = token.split('.').collect::<Vec<_>>();
    if segments.len() != 3 || segments.iter().any(|segment| segment.is_empty()) {
        return Err(ConfigError::Validation(
            "discord.bot_token must have three dot-separated segments (hint: paste the bot token, not the client secret or application id)"
                .to_string(),
        ));
    }

    let base_url = discord.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if discord.request_timeout_secs == 0 || discord.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "discord.request_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Upper bounds for engine durations, in seconds.
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_CONTENT_AGE_SECS: u64 = 365 * 24 * 60 * 60;

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    let fields = [
        ("engine.counter_ttl_secs", engine.counter_ttl_secs),
        ("engine.reaction_cooldown_secs", engine.reaction_cooldown_secs),
        ("engine.event_debounce_secs", engine.event_debounce_secs),
        ("engine.max_content_age_secs", engine.max_content_age_secs),
        ("engine.sweep_interval_ms", engine.sweep_interval_ms),
        ("engine.showcase_purge_secs", engine.showcase_purge_secs),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
    }

    let bounded = [
        ("engine.counter_ttl_secs", engine.counter_ttl_secs, MAX_CACHE_TTL_SECS),
        ("engine.reaction_cooldown_secs", engine.reaction_cooldown_secs, MAX_CACHE_TTL_SECS),
        ("engine.event_debounce_secs", engine.event_debounce_secs, MAX_CACHE_TTL_SECS),
        ("engine.max_content_age_secs", engine.max_content_age_secs, MAX_CONTENT_AGE_SECS),
    ];
    if let Some((name, _, max)) = bounded.iter().find(|(_, value, max)| value > max) {
        return Err(ConfigError::Validation(format!("{name} must be at most {max} seconds")));
    }
    Ok(())
}

fn validate_showcase(showcase: &ShowcaseConfig) -> Result<(), ConfigError> {
    let fields = [
        ("showcase.max_messages", showcase.max_messages),
        ("showcase.max_announcements", showcase.max_announcements),
        ("showcase.max_threads", showcase.max_threads),
        ("showcase.max_events", showcase.max_events),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| *value == 0 || *value > 25) {
        return Err(ConfigError::Validation(format!("{name} must be in range 1..=25")));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    discord: Option<DiscordPatch>,
    server: Option<ServerPatch>,
    engine: Option<EnginePatch>,
    showcase: Option<ShowcasePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    counter_ttl_secs: Option<u64>,
    reaction_cooldown_secs: Option<u64>,
    event_debounce_secs: Option<u64>,
    max_content_age_secs: Option<u64>,
    sweep_interval_ms: Option<u64>,
    showcase_purge_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowcasePatch {
    max_messages: Option<u32>,
    max_announcements: Option<u32>,
    max_threads: Option<u32>,
    max_events: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
