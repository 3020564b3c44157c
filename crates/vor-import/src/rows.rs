//! Spreadsheet row parsing.
//!
//! Each data row becomes an [`IncidentImportRequest`]; rows that cannot be
//! parsed are reported with their 1-based line number and skipped.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use vor_api_types::{IncidentImportRequest, iso_date};

use crate::client::CliError;

#[derive(Debug)]
pub struct ParsedRow {
    /// Line number in the source file, header counted as line 1.
    pub line: usize,
    pub result: Result<IncidentImportRequest, String>,
}

struct Columns {
    registration: usize,
    start_date: usize,
    description: usize,
    comments: Option<usize>,
    estimated_return: Option<usize>,
    end_date: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, CliError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };

        let required = |name: &str| {
            find(name).ok_or_else(|| {
                CliError::InvalidInput(format!("missing required column `{name}`"))
            })
        };

        Ok(Self {
            registration: required("registration")?,
            start_date: required("start_date")?,
            description: required("description")?,
            comments: find("comments"),
            estimated_return: find("estimated_return"),
            end_date: find("end_date"),
        })
    }
}

pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<ParsedRow>, CliError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| CliError::InvalidInput(format!("failed to read header row: {err}")))?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let result = match record {
            Ok(record) => parse_record(&columns, &record),
            Err(err) => Err(format!("unreadable row: {err}")),
        };
        rows.push(ParsedRow { line, result });
    }

    Ok(rows)
}

fn parse_record(columns: &Columns, record: &StringRecord) -> Result<IncidentImportRequest, String> {
    let cell = |index: usize| record.get(index).unwrap_or("").trim();
    let optional = |index: Option<usize>| {
        index
            .map(|i| cell(i))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let registration = cell(columns.registration);
    if registration.is_empty() {
        return Err("registration is empty".to_string());
    }

    let description = cell(columns.description);
    if description.is_empty() {
        return Err("description is empty".to_string());
    }

    let start_date = parse_date("start_date", cell(columns.start_date))?;
    let estimated_return = optional(columns.estimated_return)
        .map(|raw| parse_date("estimated_return", &raw))
        .transpose()?;
    let end_date = optional(columns.end_date)
        .map(|raw| parse_date("end_date", &raw))
        .transpose()?;

    Ok(IncidentImportRequest {
        registration: registration.to_string(),
        start_date,
        description: description.to_string(),
        comments: optional(columns.comments),
        estimated_return,
        end_date,
    })
}

fn parse_date(column: &str, raw: &str) -> Result<time::Date, String> {
    if raw.is_empty() {
        return Err(format!("{column} is empty"));
    }
    iso_date::parse(raw).map_err(|err| format!("{column} `{raw}` is not YYYY-MM-DD: {err}"))
}
