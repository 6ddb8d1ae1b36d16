use clap::Parser;
use tracing::{error, info, warn};
use vidtube::cli::{Args, build_config, init_logging, open_database};
use vidtube::run_server;

#[tokio::main]
async fn main() {
    // A missing .env is fine, the environment may already carry everything
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_format);

    if let Err(e) = &dotenv {
        if !e.not_found() {
            warn!(error = %e, "Failed to read .env file");
        }
    }

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let port = args.port;
    let Some(config) = build_config(args, db) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
