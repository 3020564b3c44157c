use std::fs;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Response, Url};
use thiserror::Error;
use vor_api_types::{IncidentImportRequest, IncidentResponse};

use crate::args::Cli;

const IMPORT_PATH: &str = "/api/v1/incidents/import";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("site URL is required (use --site or VOR_SITE_URL)")]
    MissingSite,
    #[error("api key is required (use --key-file or VOR_API_KEY)")]
    MissingKey,
    #[error("failed to read key file: {0}")]
    KeyFile(std::io::Error),
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{failed} of {total} rows failed")]
    RowsFailed { failed: usize, total: usize },
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
    pub key: String,
}

impl Ctx {
    pub fn new(site: &str, key: String) -> Result<Self, CliError> {
        let base = Url::parse(site)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client, base, key })
    }

    pub fn user_agent() -> &'static str {
        concat!("vor-import/", env!("CARGO_PKG_VERSION"))
    }

    pub fn auth_header(&self) -> Result<HeaderValue, CliError> {
        HeaderValue::from_str(&format!("Bearer {}", self.key))
            .map_err(|e| CliError::InvalidInput(e.to_string()))
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base.join(path).map_err(CliError::Url)
    }

    /// Post a single incident row. Failures are returned to the caller; nothing is retried.
    pub async fn post_incident(
        &self,
        row: &IncidentImportRequest,
    ) -> Result<IncidentResponse, CliError> {
        let resp = self
            .client
            .post(self.url(IMPORT_PATH)?)
            .header(AUTHORIZATION, self.auth_header()?)
            .json(row)
            .send()
            .await?;
        Self::handle(resp).await
    }

    async fn handle<T: for<'de> serde::Deserialize<'de>>(resp: Response) -> Result<T, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let site = cli.site.clone().ok_or(CliError::MissingSite)?;
    let key = if let Some(path) = &cli.key_file {
        fs::read_to_string(path)
            .map_err(CliError::KeyFile)?
            .trim()
            .to_string()
    } else {
        cli.api_key_env.clone().ok_or(CliError::MissingKey)?
    };

    Ctx::new(&site, key)
}
