use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vor::{
    application::{
        api_keys::{ApiKeyService, IssueApiKeyCommand},
        error::AppError,
    },
    config::{self, ApiKeysCommand, IssueKeyArgs},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState},
        telemetry,
    },
};

const CLI_ACTOR: &str = "cli";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::ApiKeys(args) => run_api_keys(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, true).await?;
    let limiter = ApiRateLimiter::new(
        Duration::from_secs(settings.api_rate_limit.window_seconds.get().into()),
        settings.api_rate_limit.max_requests.get(),
    );
    let state = ApiState::new(repositories, settings.auth.clone(), limiter);

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!(target = "vor::migrate", "database migrations applied");
    Ok(())
}

async fn run_api_keys(settings: config::Settings, command: ApiKeysCommand) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let service = ApiKeyService::new(repositories);

    match command {
        ApiKeysCommand::Issue(args) => issue_api_key(&service, args).await,
        ApiKeysCommand::List => {
            let keys = service
                .list()
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            let now = OffsetDateTime::now_utc();
            for key in keys {
                let roles: Vec<&str> = key.roles.iter().map(|role| role.as_str()).collect();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    key.id,
                    key.prefix,
                    key.name,
                    roles.join(","),
                    key.status_at(now).as_str(),
                );
            }
            Ok(())
        }
        ApiKeysCommand::Revoke(args) => {
            let record = service
                .revoke(args.id)
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            info!(
                target = "vor::api_keys",
                key_id = %record.id,
                prefix = %record.prefix,
                "api key revoked"
            );
            Ok(())
        }
    }
}

async fn issue_api_key(service: &ApiKeyService, args: IssueKeyArgs) -> Result<(), AppError> {
    let issued = service
        .issue(IssueApiKeyCommand {
            name: args.name,
            description: args.description,
            roles: args.roles,
            expires_at: args
                .expires_on
                .map(|date| date.midnight().assume_utc()),
            created_by: CLI_ACTOR.to_string(),
        })
        .await
        .map_err(|err| AppError::validation(err.to_string()))?;

    info!(
        target = "vor::api_keys",
        key_id = %issued.record.id,
        prefix = %issued.record.prefix,
        "api key issued"
    );
    // The token is only ever shown here.
    println!("{}", issued.token);
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
    migrate: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    if migrate {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(|err| AppError::from(InfraError::Migration(err.to_string())))?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "vor::http", addr = %settings.server.addr, "listening");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = stop_rx.await;
        },
    );
    let mut handle = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut handle => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(target = "vor::http", "shutdown requested, draining connections");
    let _ = stop_tx.send(());

    match tokio::time::timeout(settings.server.graceful_shutdown, handle).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "vor::http",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "vor::http", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "vor::http", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
