//! Qimen CLI - Points-metered divination service
//!
//! Usage:
//!   qimen init                  Initialize database
//!   qimen serve --port 3000     Start web server
//!   qimen chart                 Print the current chart
//!   qimen users add --email ... Register an account

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            static_dir,
            allowed_origins,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                static_dir.as_deref(),
                allowed_origins,
                cli.no_encrypt,
            )
            .await
        }
        Commands::Chart { at } => commands::cmd_chart(at.as_deref()),
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(UsersAction::List) => commands::cmd_users_list(&db),
                Some(UsersAction::Add { email, password }) => {
                    commands::cmd_users_add(&db, &email, &password)
                }
                Some(UsersAction::Show { id }) => commands::cmd_users_show(&db, &id),
            }
        }
        Commands::Llm { action } => match action {
            LlmAction::Test { prompt } => commands::cmd_llm_test(&prompt).await,
        },
    }
}
