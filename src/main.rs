use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use submerge::models::AppState;
use submerge::web_handlers::interfaces::{self, render_subscription};
use submerge::Settings;

/// Merge Clash subscription upstreams into one configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (e.g., 127.0.0.1 or 0.0.0.0)
    #[arg(short, long, value_name = "ADDRESS")]
    address: Option<String>,

    /// Listen port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Generate once from this query string instead of starting the server
    #[arg(long, value_name = "QUERY")]
    query: Option<String>,

    /// Output file for one-shot generation (must be used with --query)
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    output: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args = Args::parse();
    if args.query.is_some() != args.output.is_some() {
        anyhow::bail!("--query and -o/--output must be used together");
    }

    let mut settings = match &args.config {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path))?,
        None => Settings::default(),
    };
    if let Some(address) = args.address {
        settings.listen_address = address;
    }
    if let Some(port) = args.port {
        settings.listen_port = port;
    }

    let app_state = Arc::new(AppState::new(settings).context("Failed to initialize")?);

    if let (Some(query), Some(output)) = (args.query, args.output) {
        let rendered = render_subscription(&app_state, &query).await?;
        if !rendered.failed_upstreams.is_empty() {
            warn!(
                "Upstreams left out: {}",
                rendered.failed_upstreams.join(", ")
            );
        }
        std::fs::write(&output, rendered.body)
            .with_context(|| format!("Failed to write {}", output))?;
        info!("Wrote configuration to {}", output);
        return Ok(());
    }

    let listen_target = app_state.settings.listen_target();
    info!("submerge starting on {}", listen_target);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&app_state)))
            .configure(interfaces::config)
            // For health check
            .route("/", web::get().to(|| async { "submerge is running!" }))
    })
    .bind(listen_target)?
    .run()
    .await?;
    Ok(())
}
