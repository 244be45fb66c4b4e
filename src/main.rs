use std::path::PathBuf;
use std::process::ExitCode;

use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod db;
mod model;
mod service;
#[cfg(test)]
mod testutil;

use app::AppState;
use model::Config;

#[derive(Parser)]
#[command(name = "errclass", version, about = "Error classification convergence pipeline")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate raw answer records into submission units
    Prepare {
        question_id: i64,
        term_id: i64,
    },
    /// Run the full classification pipeline
    Classify {
        term_id: i64,
        question_id: i64,
    },
    /// Serve the query API
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let pool = match db::create_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Prepare {
            question_id,
            term_id,
        } => match service::trigger::prepare(&config, &pool, question_id, term_id).await {
            Ok(summary) => {
                tracing::info!(
                    records = summary.record_count,
                    units = summary.unit_count,
                    artifact = %summary.artifact.display(),
                    "prepare finished"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "prepare failed");
                ExitCode::FAILURE
            }
        },
        Command::Classify {
            term_id,
            question_id,
        } => match service::trigger::classify(&config, &pool, term_id, question_id).await {
            Ok(report) => {
                tracing::info!(
                    processed = report.processed,
                    skipped = report.skipped,
                    errored = report.errored,
                    "classify finished"
                );
                if report.errored > 0 {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "classify failed");
                ExitCode::FAILURE
            }
        },
        Command::Serve => match serve(config, pool).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "server exited with error");
                ExitCode::FAILURE
            }
        },
    }
}

async fn serve(config: Config, pool: sqlx::MySqlPool) -> std::io::Result<()> {
    let bind_addr = config.server.bind_addr();
    let state = web::Data::new(AppState { pool, config });

    tracing::info!("starting errclass server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::overview::configure)
            .configure(api::clustering::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
