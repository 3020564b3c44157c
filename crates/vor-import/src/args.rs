//! Command-line surface for `vor-import`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "vor-import",
    version,
    about = "Post a VOR incident spreadsheet (CSV) to the VOR board API",
    long_about = None
)]
pub struct Cli {
    /// API base URL, e.g. <https://vor.example.org>
    #[arg(long, env = "VOR_SITE_URL")]
    pub site: Option<String>,

    /// Path to file containing API key (takes precedence over env)
    #[arg(long, env = "VOR_API_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// API key from env (CLI flag intentionally disabled to avoid shell history leaks)
    #[arg(hide = true, long = "api-key-env", env = "VOR_API_KEY")]
    pub api_key_env: Option<String>,

    /// Parse and validate the file without posting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// CSV file with a header row.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}
