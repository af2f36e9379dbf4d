use clap::{Parser, ValueEnum};
use portal_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "PORTAL_WRITER_GRPC_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "PORTAL_WRITER_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "PORTAL_WRITER_STORAGE_BACKEND";
pub const DYNAMODB_ENDPOINT_ENV: &str = "PORTAL_WRITER_DYNAMODB_ENDPOINT";
pub const DYNAMODB_REGION_ENV: &str = "PORTAL_WRITER_DYNAMODB_REGION";
pub const TABLE_NAME_ENV: &str = "PORTAL_WRITER_TABLE_NAME";
pub const ENSURE_TABLE_ENV: &str = "PORTAL_WRITER_ENSURE_TABLE";
pub const LOG_FORMAT_ENV: &str = "PORTAL_WRITER_LOG_FORMAT";
pub const TTL_SWEEP_INTERVAL_ENV: &str = "PORTAL_WRITER_TTL_SWEEP_INTERVAL_SECS";
pub const MAX_CODE_ATTEMPTS_ENV: &str = "PORTAL_WRITER_MAX_CODE_ATTEMPTS";
pub const GENERATOR_ENV: &str = "PORTAL_WRITER_GENERATOR";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50052";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "dynamodb")]
    DynamoDb,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::DynamoDb => write!(f, "dynamodb"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorArg {
    #[value(name = "random")]
    Random,
    #[value(name = "sequential")]
    Sequential,
}

impl Display for GeneratorArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorArg::Random => write!(f, "random"),
            GeneratorArg::Sequential => write!(f, "sequential"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "pretty")]
    Pretty,
    #[value(name = "json")]
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "portal-writer-grpc-server")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of the short URLs returned to callers.
    #[arg(long, env = BASE_URL_ENV, default_value = portal_writer::service::DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = DYNAMODB_ENDPOINT_ENV)]
    pub dynamodb_endpoint: Option<String>,

    #[arg(long, env = DYNAMODB_REGION_ENV, default_value = portal_storage::dynamo::DEFAULT_REGION)]
    pub dynamodb_region: String,

    #[arg(long, env = TABLE_NAME_ENV, default_value = portal_storage::dynamo::DEFAULT_TABLE_NAME)]
    pub table_name: String,

    /// Create the table and its indexes on startup if missing.
    #[arg(long, env = ENSURE_TABLE_ENV, default_value_t = false)]
    pub ensure_table: bool,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// How often the in-memory backend purges expired links.
    #[arg(long, env = TTL_SWEEP_INTERVAL_ENV, default_value_t = 60)]
    pub ttl_sweep_interval_secs: u64,

    #[arg(
        long,
        env = MAX_CODE_ATTEMPTS_ENV,
        default_value_t = portal_writer::service::DEFAULT_MAX_CODE_ATTEMPTS
    )]
    pub max_code_attempts: u32,

    #[arg(long, env = GENERATOR_ENV, value_enum, default_value_t = GeneratorArg::Random)]
    pub generator: GeneratorArg,
}
