//! SIGEA attendance accounting engine
//!
//! Main application entry point: loads configuration, runs migrations, and
//! audits the store. Any integrity violation fails the process.

use std::process::ExitCode;
use tracing::{error, info};

use sigea::config::Settings;
use sigea::database::connection::{create_pool, run_migrations, DatabaseConfig};
use sigea::services::ServiceFactory;
use sigea::utils::logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = settings.validate() {
        eprintln!("configuration error: {e}");
        return ExitCode::FAILURE;
    }

    // The guard keeps the file writer flushing until the process exits.
    let _guard = match logging::init_logging(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("logging setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting SIGEA v{}...", sigea::VERSION);

    match run(settings).await {
        Ok(true) => {
            info!("SIGEA finished with a clean store");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("Integrity audit reported violations");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(
                error = %e,
                severity = %e.severity(),
                recoverable = e.is_recoverable(),
                "Startup failed"
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> sigea::Result<bool> {
    info!("Connecting to database...");
    let db_config = DatabaseConfig::from_settings(&settings.database);
    let pool = create_pool(&db_config).await?;

    run_migrations(&pool).await?;

    info!("Initializing services...");
    let services = ServiceFactory::new(pool, settings)?;

    let report = services.integrity.audit().await?;
    let stats = services.database.get_system_stats().await?;
    info!(
        stats = %stats,
        violations = report.violations.len(),
        "Integrity audit finished"
    );

    Ok(report.is_clean())
}
