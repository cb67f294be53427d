use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use clap::{Parser, Subcommand};
use recipe_api::config::Configuration;
use recipe_api::telemetry;
use recipe_api::user::UserBuilder;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the YAML configuration file.
    #[arg(long, short, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Start HTTP server (default).
    Serve,
    /// Create an account with staff and superuser rights.
    CreateSuperuser {
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    telemetry::setup_logging();

    let config = Configuration::default().path(args.config).read();
    let tracer = if config.telemetry.tracing {
        Some(telemetry::setup_tracer()?)
    } else {
        None
    };

    let state = recipe_api::initialize_state(Arc::clone(&config)).await?;

    match args.cmd.unwrap_or(Commands::Serve) {
        Commands::CreateSuperuser { email, password } => {
            let user = UserBuilder::new()
                .email(email)
                .password(password)
                .build(state.db.postgres.clone(), Arc::clone(&state.crypto))
                .create_superuser()
                .await?;

            println!("Superuser {:?} has been created!", user.data.email);
        },
        Commands::Serve => {
            let mut app = recipe_api::app(state);
            if config.telemetry.metrics {
                let handle = telemetry::setup_metrics_recorder()?;
                app = app.route("/metrics", get(move || std::future::ready(handle.render())));
            }

            let listener = TcpListener::bind(&config.address).await?;
            tracing::info!(address = %config.address, "server listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %err, "cannot listen for shutdown signal");
                    }
                })
                .await?;
        },
    }

    if let Some(provider) = tracer {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "tracer provider not shut down");
        }
    }

    Ok(())
}
