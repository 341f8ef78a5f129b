use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use secnews::app::AppContext;
use secnews::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("secnews=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config)?;

    match cli.command {
        Commands::Serve { bind } => {
            commands::serve(ctx, bind).await?;
        }
        Commands::Refresh => {
            commands::refresh(&ctx).await?;
        }
        Commands::Sources => {
            commands::list_sources(&ctx)?;
        }
        Commands::List { limit, offset } => {
            commands::list_items(&ctx, limit, offset)?;
        }
    }

    Ok(())
}
