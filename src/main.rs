use clap::Parser;
use dotenvy::dotenv;
use log::{error, info};
use service::{config::Config, logging::Logger};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Verify a captured PayPal webhook delivery against PayPal's signing certificate.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON object of the delivery's HTTP headers (name -> value)
    headers: PathBuf,

    /// File holding the raw request body exactly as received
    body: PathBuf,

    /// Give up on the certificate fetch after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = Logger::init_logger(&cli.config) {
        eprintln!("Failed to start logger: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "Verifying delivery [{}] in {} environment",
        cli.body.display(),
        cli.config.runtime_env()
    );

    let headers = match read_headers(&cli.headers).await {
        Ok(headers) => headers,
        Err(e) => {
            error!("Failed to read headers from {}: {e}", cli.headers.display());
            return ExitCode::FAILURE;
        }
    };

    let raw_body = match tokio::fs::read(&cli.body).await {
        Ok(raw_body) => raw_body,
        Err(e) => {
            error!("Failed to read body from {}: {e}", cli.body.display());
            return ExitCode::FAILURE;
        }
    };

    let verifier = match service::init_verifier(&cli.config) {
        Ok(verifier) => Arc::new(verifier),
        Err(e) => {
            error!("Failed to build webhook verifier: {e}");
            return ExitCode::FAILURE;
        }
    };
    let app_state = service::AppState::new(cli.config, &verifier);
    let verifier = app_state.verifier_ref();

    let result = match cli.deadline_ms {
        Some(ms) => {
            let deadline = Instant::now() + Duration::from_millis(ms);
            verifier
                .verify_with_deadline(&headers, &raw_body, deadline)
                .await
        }
        None => verifier.verify(&headers, &raw_body).await,
    };

    match result {
        Ok(verified) => {
            info!(
                "Signature valid: transmission {} at {} ({})",
                verified.transmission_id,
                verified.transmission_time,
                verified.auth_algo.as_str()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Signature rejected: {e}");
            if e.is_transient() {
                info!("Failure was transient; the delivery may verify on a later attempt");
            }
            ExitCode::FAILURE
        }
    }
}

async fn read_headers(
    path: &Path,
) -> Result<HashMap<String, String>, Box<dyn std::error::Error + Send + Sync>> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}
