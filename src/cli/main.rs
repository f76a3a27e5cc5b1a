//! pricecraft command-line front end
//!
//! A thin shell over the library: every command opens the local store,
//! performs one operation and exits. Pushes that the store would normally
//! debounce are flushed before exit.

mod args;

use std::process::ExitCode;

use clap::Parser;
use pricecraft::shared::pricing::{format_currency, price_project};
use pricecraft::shared::AppConfig;
use pricecraft::state::CraftStore;
use reqwest::Url;

use args::{Cli, Commands};

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pricecraft=debug"
    } else {
        "pricecraft=info"
    };
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    tracing::debug!("Data directory: {}", config.resolved_data_dir().display());
    let store = CraftStore::open(&config).await?;

    let creating = matches!(cli.command, Commands::Create | Commands::Join { .. });
    if let (Some(passphrase), false) = (cli.passphrase.as_deref(), creating) {
        if store.workspace().is_some() && !store.unlock(passphrase).await? {
            eprintln!("Passphrase rejected; continuing view-only");
        }
    }

    match cli.command {
        Commands::Quote { project } => quote(&store, project.as_deref()),
        Commands::Export { out } => {
            let json = store.export()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", json),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            match store.import_json(&json).await {
                Ok(state) => {
                    println!(
                        "Imported {} materials and {} projects",
                        state.materials.len(),
                        state.projects.len()
                    );
                    flush(&store).await;
                    Ok(ExitCode::SUCCESS)
                }
                Err(errors) => {
                    eprintln!("Import failed:");
                    for issue in errors.issues() {
                        eprintln!("  {}", issue);
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Share { rotate } => {
            store.initialize(None).await;
            let url = if rotate {
                Some(store.rotate_share_link().await?)
            } else {
                store.shareable_url()
            };
            match url {
                Some(url) => {
                    println!("{}", url);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("No workspace is bound; run `pricecraft create` first");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Sync { url } => {
            let url = url.as_deref().map(Url::parse).transpose()?;
            store.initialize(url.as_ref()).await;
            if store.workspace().is_none() {
                println!("No workspace bound; local data only");
                return Ok(ExitCode::SUCCESS);
            }
            if !store.can_edit() {
                println!("Workspace is view-only; local copy refreshed ({})", store.status());
                return Ok(ExitCode::SUCCESS);
            }
            let pushed = store.sync().await;
            println!("Sync {}", store.status());
            Ok(if pushed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Pull => {
            store.initialize(None).await;
            let pulled = store.pull().await;
            println!("Pull {}", store.status());
            Ok(if pulled { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Create => {
            let Some(passphrase) = cli.passphrase else {
                eprintln!("Creating a workspace needs --passphrase");
                return Ok(ExitCode::FAILURE);
            };
            let workspace = store.create_workspace(&passphrase).await?;
            flush(&store).await;
            println!("Created workspace {}", workspace.id);
            if let Some(url) = store.shareable_url() {
                println!("Share link: {}", url);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Join { token } => {
            let Some(passphrase) = cli.passphrase else {
                eprintln!("Joining with edit rights needs --passphrase; use `view` otherwise");
                return Ok(ExitCode::FAILURE);
            };
            let outcome = store.join_workspace(&token, &passphrase).await?;
            if !outcome.found {
                eprintln!("Workspace not found");
                return Ok(ExitCode::FAILURE);
            }
            if !outcome.passphrase_valid {
                eprintln!("Passphrase rejected");
                return Ok(ExitCode::FAILURE);
            }
            println!("Joined workspace with edit access");
            Ok(ExitCode::SUCCESS)
        }
        Commands::View { token } => {
            if store.view_workspace(&token).await? {
                println!("Following workspace view-only");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Workspace not found");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::SignOut => {
            store.sign_out().await;
            println!("Signed out; local data kept");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset => {
            store.reset_local_state().await;
            println!("Local data cleared");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn quote(store: &CraftStore, slug: Option<&str>) -> CliResult {
    store.with_state(|state| {
        let projects: Vec<_> = state
            .projects
            .iter()
            .filter(|p| slug.map_or(true, |s| p.slug == s))
            .collect();

        if projects.is_empty() {
            match slug {
                Some(slug) => eprintln!("No project with slug {}", slug),
                None => eprintln!("No projects yet"),
            }
            return Ok(ExitCode::FAILURE);
        }

        let symbol = &state.settings.currency_symbol;
        for project in projects {
            let price = price_project(state, project);
            println!(
                "{:<30} materials {:>10}  labor {:>10}  total {:>10}",
                project.name,
                format_currency(price.materials, symbol),
                format_currency(price.labor, symbol),
                format_currency(price.total, symbol),
            );
        }
        Ok(ExitCode::SUCCESS)
    })
}

/// Push now instead of waiting for the debounce, which would not outlive
/// the process
async fn flush(store: &CraftStore) {
    if store.sync_manager().push_enabled() && !store.sync().await {
        tracing::warn!("Changes saved locally but not pushed ({})", store.status());
    }
}
