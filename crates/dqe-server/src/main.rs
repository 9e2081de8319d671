use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dqe_core::check;
use dqe_core::connector::factory;
use dqe_core::connector::registry::ConnectorRegistry;
use dqe_core::connector::sql::validate_table_ident;
use dqe_core::scheduler::Scheduler;
use dqe_core::view::ViewDefinition;
use dqe_db::queries::{checks, datasources, schedules, views};
use dqe_db::{config::DbConfig, pool};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use dqe_server::config::EngineConfig;
use dqe_server::{build_router, AppState};

#[derive(Parser)]
#[command(name = "dqe", about = "Multi-tenant data-quality execution engine")]
struct Cli {
    /// Overrides `DQE_DATABASE_URL` for this invocation.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server and the schedule supervisor.
    Serve {
        /// Overrides `DQE_SERVER_HOST`/`DQE_SERVER_PORT`, e.g. `0.0.0.0:9090`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create the database if needed and apply pending migrations.
    Migrate,
    /// One-off connector commands.
    Datasource {
        #[command(subcommand)]
        command: DatasourceCommand,
    },
    /// One-off check commands.
    Check {
        #[command(subcommand)]
        command: CheckCommand,
    },
    /// One-off schedule commands.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
}

#[derive(Subcommand)]
enum DatasourceCommand {
    /// Validate a connection spec read from a JSON file, without persisting it.
    Test {
        #[arg(long)]
        datasource_type: String,
        /// Path to a JSON file holding the connection object.
        #[arg(long)]
        connection_file: String,
    },
}

#[derive(Subcommand)]
enum CheckCommand {
    /// Run one check by id against its registered datasource and print the outcome.
    Run {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Fire one schedule immediately, out of band from its cron cadence.
    RunNow {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { bind } => serve(cli.database_url.as_deref(), bind.as_deref()).await,
        Commands::Migrate => migrate(cli.database_url.as_deref()).await,
        Commands::Datasource {
            command: DatasourceCommand::Test { datasource_type, connection_file },
        } => datasource_test(&datasource_type, &connection_file).await,
        Commands::Check {
            command: CheckCommand::Run { tenant, id },
        } => check_run(cli.database_url.as_deref(), &tenant, id).await,
        Commands::Schedule {
            command: ScheduleCommand::RunNow { tenant, id },
        } => schedule_run_now(cli.database_url.as_deref(), &tenant, id).await,
    }
}

async fn serve(cli_db_url: Option<&str>, cli_bind: Option<&str>) -> anyhow::Result<()> {
    let config = EngineConfig::resolve(cli_db_url, cli_bind);
    let db_pool = pool::create_pool(&config.db_config).await?;

    let state = AppState::new(db_pool, config.clone());
    hydrate_registry(&state).await;
    state.scheduler.start().await?;

    let router = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "dqe-server listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    state.scheduler.stop().await;
    Ok(())
}

/// Reconnects every active datasource into the connector registry at
/// process startup. A single datasource failing to reconnect is logged and
/// skipped rather than aborting the server -- its checks will surface
/// `status=error` until the datasource is fixed or re-saved.
async fn hydrate_registry(state: &AppState) {
    let active = match datasources::list_all_active_datasources(&state.pool).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "failed to list active datasources, registry starts empty");
            return;
        }
    };

    for datasource in active {
        let connector = match factory::build(datasource.datasource_type, &datasource.connection) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(datasource_id = %datasource.id, error = %e, "could not build connector during startup hydration");
                continue;
            }
        };
        if let Err(e) = connector.connect().await {
            tracing::warn!(datasource_id = %datasource.id, error = %e, "could not reconnect datasource during startup hydration");
            continue;
        }
        if let Err(e) = connector.ping().await {
            tracing::warn!(datasource_id = %datasource.id, error = %e, "datasource failed ping during startup hydration");
            continue;
        }
        state.registry.register(datasource.id, connector).await;
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}

async fn migrate(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let db_config = match cli_db_url {
        Some(url) => DbConfig::new(url.to_owned()),
        None => DbConfig::from_env(),
    };
    pool::ensure_database_exists(&db_config).await?;
    let db_pool = pool::create_pool(&db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    for (table, count) in counts {
        tracing::info!(table = %table, rows = count, "table ready");
    }
    Ok(())
}

async fn datasource_test(datasource_type: &str, connection_file: &str) -> anyhow::Result<()> {
    let datasource_type = datasource_type
        .parse()
        .map_err(|_| anyhow::anyhow!("unrecognized datasource type {datasource_type:?}"))?;
    let raw = std::fs::read_to_string(connection_file)?;
    let connection: serde_json::Value = serde_json::from_str(&raw)?;

    let connector = factory::build(datasource_type, &connection)?;
    connector.connect().await?;
    connector.ping().await?;
    println!("connection succeeded");
    Ok(())
}

async fn check_run(cli_db_url: Option<&str>, tenant: &str, id: Uuid) -> anyhow::Result<()> {
    let db_config = match cli_db_url {
        Some(url) => DbConfig::new(url.to_owned()),
        None => DbConfig::from_env(),
    };
    let db_pool = pool::create_pool(&db_config).await?;
    let registry = ConnectorRegistry::new();

    let check_row = checks::get_check(&db_pool, tenant, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("check {id} not found"))?;

    let datasource = datasources::get_datasource(&db_pool, tenant, check_row.datasource_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("datasource {} not found", check_row.datasource_id))?;
    let connector = factory::build(datasource.datasource_type, &datasource.connection)?;
    connector.connect().await?;
    registry.register(datasource.id, connector.clone()).await;

    let target = if let Some(view_id) = check_row.view_id {
        let view = views::get_view(&db_pool, tenant, view_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("view {view_id} not found"))?;
        let definition: ViewDefinition = serde_json::from_value(view.definition)?;
        definition.as_target()?
    } else {
        validate_table_ident(&check_row.table_name)?;
        check_row.table_name.clone()
    };

    let outcome = check::execute(connector.as_ref(), &check_row, &target).await;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "status": outcome.status,
        "actual_value": outcome.actual_value,
        "expected_value": outcome.expected_value,
        "message": outcome.message,
        "error": outcome.error,
    }))?);
    Ok(())
}

async fn schedule_datasource_ids(pool: &sqlx::PgPool, tenant: &str, schedule: &dqe_db::models::Schedule) -> anyhow::Result<Vec<Uuid>> {
    if let Some(datasource_id) = schedule.datasource_id {
        return Ok(vec![datasource_id]);
    }
    let checks = checks::get_checks_by_ids(pool, tenant, &schedule.check_ids).await?;
    let mut ids: Vec<Uuid> = checks.iter().map(|c| c.datasource_id).collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

async fn schedule_run_now(cli_db_url: Option<&str>, tenant: &str, id: Uuid) -> anyhow::Result<()> {
    let db_config = match cli_db_url {
        Some(url) => DbConfig::new(url.to_owned()),
        None => DbConfig::from_env(),
    };
    let db_pool = pool::create_pool(&db_config).await?;
    let registry = std::sync::Arc::new(ConnectorRegistry::new());

    let schedule = schedules::get_schedule(&db_pool, tenant, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("schedule {id} not found"))?;
    for datasource_id in schedule_datasource_ids(&db_pool, tenant, &schedule).await? {
        let datasource = datasources::get_datasource(&db_pool, tenant, datasource_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("datasource {datasource_id} not found"))?;
        let connector = factory::build(datasource.datasource_type, &datasource.connection)?;
        connector.connect().await?;
        registry.register(datasource.id, connector).await;
    }

    let scheduler = Scheduler::new(db_pool, registry);
    let execution = scheduler.run_now(id, tenant).await?;
    println!("{}", serde_json::to_string_pretty(&execution)?);
    Ok(())
}
