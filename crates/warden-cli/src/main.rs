mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use commands::Context;
use commands::edit::Edit;
use output::print_error;

/// Exit code of `warden check` when the request is denied.
const EXIT_DENIED: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let mut cfg = config::load_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;
    if let Some(root) = &cli.root {
        cfg.policy.root = Some(root.clone());
    }
    if let Some(server) = &cli.server {
        cfg.policy.server = server.clone();
    }
    cfg.validate().map_err(|e| anyhow!(e))?;
    observability::init_tracing_with_level(&cfg.logging.level);

    let ctx = match &cli.command {
        Commands::Config => {
            println!("{}", "# effective configuration".dimmed());
            println!("{}", toml::to_string_pretty(&cfg)?);
            return Ok(0);
        }
        _ => Context::new(cfg, format)?,
    };
    tracing::debug!(
        root = %ctx.root,
        server = %ctx.config.policy.server,
        "Configuration resolved"
    );

    match &cli.command {
        Commands::Validate(args) => commands::validate::run(&ctx, args).await?,
        Commands::Check(args) => {
            let decision = commands::check::run(&ctx, args).await?;
            if decision.is_denied() {
                return Ok(EXIT_DENIED);
            }
        }
        Commands::Explain(args) => commands::explain::run(&ctx, args).await?,
        Commands::Grant(args) => {
            let edit = Edit::Grant {
                role: &args.role,
                permissions: &args.permissions,
            };
            commands::edit::run(&ctx, edit).await?;
        }
        Commands::Revoke(args) => {
            let edit = Edit::Revoke {
                role: &args.role,
                permissions: &args.permissions,
            };
            commands::edit::run(&ctx, edit).await?;
        }
        Commands::Assign(args) => {
            let edit = Edit::Assign {
                group: &args.group,
                roles: &args.roles,
            };
            commands::edit::run(&ctx, edit).await?;
        }
        Commands::Unassign(args) => {
            let edit = Edit::Unassign {
                group: &args.group,
                roles: &args.roles,
            };
            commands::edit::run(&ctx, edit).await?;
        }
        Commands::AddDatabase(args) => {
            let edit = Edit::AddDatabase {
                database: &args.database,
                locator: &args.locator,
            };
            commands::edit::run(&ctx, edit).await?;
        }
        Commands::RemoveDatabase(args) => {
            let edit = Edit::RemoveDatabase {
                database: &args.database,
            };
            commands::edit::run(&ctx, edit).await?;
        }
        Commands::Watch(args) => commands::watch::run(&ctx, args).await?,
        Commands::Config => {}
    }

    Ok(0)
}
