use std::path::PathBuf;

use httpmock::MockServer;
use tempfile::NamedTempFile;
use time::macros::date;

use crate::args::Cli;
use crate::client::{CliError, Ctx, build_ctx_from_cli};
use crate::rows::parse_rows;
use crate::{ImportReport, check_rows, post_rows};

const INCIDENT_BODY: &str = r#"{
    "id": "6f1c2d7e-8a4b-4c3d-9e2f-1a2b3c4d5e6f",
    "vehicle_id": "0b7f4a1e-3c2d-4e5f-8a9b-0c1d2e3f4a5b",
    "start_date": "2024-03-04",
    "end_date": null,
    "estimated_return": "2024-03-11",
    "description": "Tail lift fault",
    "comments": null,
    "created_at": "2024-03-04T09:00:00Z",
    "updated_at": "2024-03-04T09:00:00Z"
}"#;

const SHEET: &str = "\
registration,start_date,description,comments,estimated_return,end_date
YX21 ABC,2024-03-04,Tail lift fault,,2024-03-11,
YX21ABD,04/03/2024,Bad date,,,
YX19KLM,2024-03-05,Windscreen,chipped on M1,,2024-03-06
";

fn ctx(server: &MockServer) -> Ctx {
    Ctx::new(&server.base_url(), "key".into()).expect("ctx")
}

fn tmp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write tmp");
    file
}

fn cli(key_file: Option<PathBuf>, api_key_env: Option<&str>) -> Cli {
    Cli {
        site: Some("https://vor.example.org".to_string()),
        key_file,
        api_key_env: api_key_env.map(str::to_string),
        dry_run: false,
        file: PathBuf::from("incidents.csv"),
    }
}

#[test]
fn build_ctx_prefers_key_file() -> Result<(), CliError> {
    let file = tmp_file("file-key\n");
    let ctx = build_ctx_from_cli(&cli(Some(file.path().to_path_buf()), Some("env-key")))?;
    let header = ctx.auth_header()?;
    assert_eq!(header.to_str().expect("header str"), "Bearer file-key");
    Ok(())
}

#[test]
fn build_ctx_errors_without_key() {
    let err = build_ctx_from_cli(&cli(None, None)).expect_err("missing key should fail");
    assert!(matches!(err, CliError::MissingKey));
}

#[test]
fn parses_rows_and_reports_bad_dates_by_line() {
    let rows = parse_rows(SHEET.as_bytes()).expect("header is valid");
    assert_eq!(rows.len(), 3);

    let first = rows[0].result.as_ref().expect("first row parses");
    assert_eq!(first.registration, "YX21 ABC");
    assert_eq!(first.start_date, date!(2024 - 03 - 04));
    assert_eq!(first.estimated_return, Some(date!(2024 - 03 - 11)));
    assert_eq!(first.comments, None);
    assert_eq!(first.end_date, None);

    assert_eq!(rows[1].line, 3);
    let reason = rows[1].result.as_ref().expect_err("second row is invalid");
    assert!(reason.contains("start_date"), "{reason}");

    let third = rows[2].result.as_ref().expect("third row parses");
    assert_eq!(third.comments.as_deref(), Some("chipped on M1"));
    assert_eq!(third.end_date, Some(date!(2024 - 03 - 06)));
}

#[test]
fn missing_required_column_is_rejected() {
    let err = parse_rows("registration,description\nYX21ABC,fault\n".as_bytes())
        .expect_err("start_date column is required");
    assert!(matches!(err, CliError::InvalidInput(message) if message.contains("start_date")));
}

#[test]
fn dry_run_counts_invalid_rows_only() {
    let rows = parse_rows(SHEET.as_bytes()).expect("header is valid");
    let report = check_rows(&rows);
    assert_eq!(
        report,
        ImportReport {
            total: 3,
            posted: 0,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn posts_each_valid_row_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/api/v1/incidents/import")
            .header("authorization", "Bearer key");
        then.status(201)
            .header("content-type", "application/json")
            .body(INCIDENT_BODY);
    });

    let rows = parse_rows(SHEET.as_bytes()).expect("header is valid");
    let report = post_rows(&ctx(&server), &rows).await;

    mock.assert_hits(2);
    assert_eq!(
        report,
        ImportReport {
            total: 3,
            posted: 2,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn server_rejections_are_reported_without_retry() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/api/v1/incidents/import");
        then.status(404)
            .header("content-type", "application/json")
            .body(r#"{"error":{"code":"not_found","message":"vehicle not found"}}"#);
    });

    let rows = parse_rows(SHEET.as_bytes()).expect("header is valid");
    let report = post_rows(&ctx(&server), &rows).await;

    mock.assert_hits(2);
    assert_eq!(report.posted, 0);
    assert_eq!(report.failed, 3);
}
