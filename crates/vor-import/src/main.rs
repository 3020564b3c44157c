//! vor-import: posts a VOR incident spreadsheet to the VOR board API, one row at a time.
//! Failed rows are reported and skipped; nothing is retried.

mod args;
mod client;
mod rows;

#[cfg(test)]
mod tests;

use std::fs::File;

use clap::Parser;

use args::Cli;
use client::{CliError, Ctx, build_ctx_from_cli};
use rows::{ParsedRow, parse_rows};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub total: usize,
    pub posted: usize,
    pub failed: usize,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let file = File::open(&cli.file).map_err(|source| CliError::InputFile {
        path: cli.file.display().to_string(),
        source,
    })?;
    let rows = parse_rows(file)?;

    let report = if cli.dry_run {
        check_rows(&rows)
    } else {
        let ctx = build_ctx_from_cli(&cli)?;
        post_rows(&ctx, &rows).await
    };

    println!(
        "{} rows: {} posted, {} failed",
        report.total, report.posted, report.failed
    );

    if report.failed > 0 {
        return Err(CliError::RowsFailed {
            failed: report.failed,
            total: report.total,
        });
    }
    Ok(())
}

fn check_rows(rows: &[ParsedRow]) -> ImportReport {
    let mut report = ImportReport {
        total: rows.len(),
        ..ImportReport::default()
    };
    for row in rows {
        if let Err(reason) = &row.result {
            eprintln!("row {}: {reason}", row.line);
            report.failed += 1;
        }
    }
    report
}

async fn post_rows(ctx: &Ctx, rows: &[ParsedRow]) -> ImportReport {
    let mut report = ImportReport {
        total: rows.len(),
        ..ImportReport::default()
    };

    for row in rows {
        let request = match &row.result {
            Ok(request) => request,
            Err(reason) => {
                eprintln!("row {}: {reason}", row.line);
                report.failed += 1;
                continue;
            }
        };

        match ctx.post_incident(request).await {
            Ok(incident) => {
                println!(
                    "row {}: {} recorded as incident {}",
                    row.line, request.registration, incident.id
                );
                report.posted += 1;
            }
            Err(err) => {
                eprintln!("row {}: {} rejected: {err}", row.line, request.registration);
                report.failed += 1;
            }
        }
    }

    report
}
