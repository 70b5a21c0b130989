//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Parser, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "scatto";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MEDIA_DIR: &str = "media";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CLEANUP_QUEUE_DEPTH: u32 = 64;
const DEFAULT_SUBSCRIBER_BUFFER: u32 = 32;

/// Command-line arguments for the scatto binary.
#[derive(Debug, Default, Parser)]
#[command(name = "scatto", version, about = "Scatto gallery server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SCATTO_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", env = "SCATTO_DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the media storage directory.
    #[arg(long = "media-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub media_dir: Option<PathBuf>,

    /// Override the upload request body limit in bytes.
    #[arg(long = "media-max-request-bytes", value_name = "BYTES")]
    pub media_max_request_bytes: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Fully validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub stream: StreamSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
    pub cleanup_queue_depth: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub subscriber_buffer: NonZeroU32,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    logging: RawLogging,
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    media: RawMedia,
    #[serde(default)]
    stream: RawStream,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMedia {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
    cleanup_queue_depth: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStream {
    subscriber_buffer: Option<u32>,
}

/// Parse CLI arguments and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings from files and environment, then apply CLI overrides.
pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(File::from(path.as_path()));
    }

    let raw: RawSettings = builder
        .add_source(Environment::with_prefix("SCATTO").separator("__"))
        .build()?
        .try_deserialize()?;

    finalize(raw, cli)
}

fn finalize(raw: RawSettings, cli: &CliArgs) -> Result<Settings, ConfigError> {
    let host = cli
        .server_host
        .clone()
        .or(raw.server.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = cli.server_port.or(raw.server.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|err| ConfigError::invalid("server.host", err.to_string()))?;

    let graceful_shutdown = Duration::from_secs(
        cli.graceful_shutdown_seconds
            .or(raw.server.graceful_shutdown_seconds)
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
    );

    let level_text = cli.log_level.clone().or(raw.logging.level);
    let level = match level_text {
        Some(text) => LevelFilter::from_str(text.trim())
            .map_err(|_| ConfigError::invalid("logging.level", format!("unknown level `{text}`")))?,
        None => LevelFilter::INFO,
    };
    let format = match cli.log_json.or(raw.logging.json).unwrap_or(false) {
        true => LogFormat::Json,
        false => LogFormat::Compact,
    };

    let max_connections = non_zero_u32(
        "database.max_connections",
        cli.database_max_connections
            .or(raw.database.max_connections)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
    )?;

    let max_request_bytes = NonZeroU64::new(
        cli.media_max_request_bytes
            .or(raw.media.max_request_bytes)
            .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES),
    )
    .ok_or_else(|| ConfigError::invalid("media.max_request_bytes", "must be greater than zero"))?;

    let cleanup_queue_depth = non_zero_u32(
        "media.cleanup_queue_depth",
        raw.media
            .cleanup_queue_depth
            .unwrap_or(DEFAULT_CLEANUP_QUEUE_DEPTH),
    )?;

    let subscriber_buffer = non_zero_u32(
        "stream.subscriber_buffer",
        raw.stream
            .subscriber_buffer
            .unwrap_or(DEFAULT_SUBSCRIBER_BUFFER),
    )?;

    Ok(Settings {
        server: ServerSettings {
            addr,
            graceful_shutdown,
        },
        logging: LoggingSettings { level, format },
        database: DatabaseSettings {
            url: cli.database_url.clone().or(raw.database.url),
            max_connections,
        },
        media: MediaSettings {
            directory: cli
                .media_dir
                .clone()
                .or(raw.media.directory)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR)),
            max_request_bytes,
            cleanup_queue_depth,
        },
        stream: StreamSettings { subscriber_buffer },
    })
}

fn non_zero_u32(field: &'static str, value: u32) -> Result<NonZeroU32, ConfigError> {
    NonZeroU32::new(value).ok_or_else(|| ConfigError::invalid(field, "must be greater than zero"))
}
