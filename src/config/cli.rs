use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};
use uuid::Uuid;

use crate::domain::Role;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Command-line arguments for the VOR server binary.
#[derive(Debug, Parser)]
#[command(name = "vor", version, about = "Vehicle off-road availability service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VOR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(DatabaseOverride),
    /// Manage API keys.
    #[command(name = "api-keys")]
    ApiKeys(ApiKeysArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the API rate limit window size.
    #[arg(long = "api-rate-limit-window-seconds", value_name = "SECONDS")]
    pub api_rate_limit_window_seconds: Option<u64>,

    /// Override the API rate limit request ceiling.
    #[arg(long = "api-rate-limit-max-requests", value_name = "COUNT")]
    pub api_rate_limit_max_requests: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ApiKeysArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(subcommand)]
    pub command: ApiKeysCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ApiKeysCommand {
    /// Issue a new key and print its token once.
    Issue(IssueKeyArgs),
    /// List existing keys.
    List,
    /// Revoke a key by id.
    Revoke(RevokeKeyArgs),
}

#[derive(Debug, Args, Clone)]
pub struct IssueKeyArgs {
    /// Human readable key name.
    #[arg(long, value_name = "NAME")]
    pub name: String,

    /// Optional description shown in listings.
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Role granted to the key; repeat for several roles.
    #[arg(long = "role", value_name = "ROLE", required = true, value_parser = parse_role)]
    pub roles: Vec<Role>,

    /// Expiry date (YYYY-MM-DD); the key stops working at the start of that day.
    #[arg(long = "expires-on", value_name = "DATE", value_parser = parse_date)]
    pub expires_on: Option<Date>,
}

#[derive(Debug, Args, Clone)]
pub struct RevokeKeyArgs {
    /// Identifier of the key to revoke.
    #[arg(value_name = "ID")]
    pub id: Uuid,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>()
        .map_err(|_| format!("unknown role `{raw}` (expected viewer, editor, importer or admin)"))
}

fn parse_date(raw: &str) -> Result<Date, String> {
    Date::parse(raw, DATE_FORMAT).map_err(|err| format!("invalid date `{raw}`: {err}"))
}
