use std::io::Result;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{server::AppState, settings::Settings};

mod auth;
mod contact;
mod content;
mod error;
mod pages;
mod revalidate;
mod server;
mod settings;
mod types;

/// Celikon site server: project pages, CMS webhook, contact relay
#[derive(Parser, Debug)]
#[command(name = "celikon", version, about)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "4010", env = "PORT")]
    port: u16,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables take precedence.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "celikon=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState::from_settings(Settings::from_env());
    if state.gateway.is_configured() {
        server::spawn_cache_warmup(state.clone());
    }
    if state.settings.revalidate_secret.is_none() {
        tracing::warn!("CONTENTFUL_REVALIDATE_SECRET is not set; revalidation requests will be rejected");
    }

    let addr = format!("{}:{}", cli.host, cli.port);
    tracing::info!("Server started at {}", addr);
    server::start_server(addr, state).await
}
