use clap::Parser;

use super::*;
use crate::domain::Role;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.database.max_connections.get(), DEFAULT_DB_MAX_CONNECTIONS);
    assert!(settings.database.url.is_none());
    assert_eq!(settings.api_rate_limit.max_requests.get(), 120);
    assert_eq!(settings.auth, ClaimNames::default());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_rate_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.api_rate_limit.max_requests = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero must be rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "api_rate_limit.max_requests",
            ..
        }
    ));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn claim_names_are_configurable() {
    let mut raw = RawSettings::default();
    raw.auth.role_claim = Some("roles".to_string());
    raw.auth.permission_claim = Some("scope".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.auth.role, "roles");
    assert_eq!(settings.auth.permission, "scope");
    assert_eq!(settings.auth.subject, "sub");
}

#[test]
fn colliding_claim_names_are_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.permission_claim = Some("role".to_string());

    let err = Settings::from_raw(raw).expect_err("collision must be rejected");
    assert!(matches!(err, LoadError::Invalid { key: "auth", .. }));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["vor"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "vor",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_api_keys_issue_arguments() {
    let args = CliArgs::parse_from([
        "vor",
        "api-keys",
        "--database-url",
        "postgres://example",
        "issue",
        "--name",
        "nightly import",
        "--role",
        "importer",
        "--role",
        "viewer",
        "--expires-on",
        "2027-01-31",
    ]);

    match args.command.expect("api-keys command") {
        Command::ApiKeys(keys) => {
            assert_eq!(
                keys.database.database_url.as_deref(),
                Some("postgres://example")
            );
            match keys.command {
                ApiKeysCommand::Issue(issue) => {
                    assert_eq!(issue.name, "nightly import");
                    assert_eq!(issue.roles, vec![Role::Importer, Role::Viewer]);
                    assert_eq!(
                        issue.expires_on,
                        Some(time::macros::date!(2027 - 01 - 31))
                    );
                }
                other => panic!("wrong subcommand parsed: {other:?}"),
            }
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn unknown_role_is_rejected_by_the_parser() {
    let result = CliArgs::try_parse_from([
        "vor", "api-keys", "issue", "--name", "x", "--role", "superuser",
    ]);
    assert!(result.is_err());
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["vor", "migrate", "--database-url", "postgres://example"]);
    match args.command.expect("migrate command") {
        Command::Migrate(database) => {
            assert_eq!(database.database_url.as_deref(), Some("postgres://example"));
        }
        _ => panic!("wrong command parsed"),
    }
}
