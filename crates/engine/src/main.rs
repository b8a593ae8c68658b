//! Charwright - inspect a character's choice wizard state from the terminal.
//!
//! ```text
//! charwright pending <character-id> [--offline]
//! charwright steps   <character-id> [--offline]
//! charwright resume  <character-id> [--offline]
//! ```
//!
//! `--offline` runs against the built-in demo backend instead of
//! `CHARWRIGHT_API_URL`.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use charwright_domain::{CharacterId, CharacterSnapshot};
use charwright_engine::infrastructure::config::EngineConfig;
use charwright_engine::infrastructure::in_memory::InMemoryBackend;
use charwright_engine::infrastructure::ports::{CharacterApi, CompendiumApi};
use charwright_engine::infrastructure::rules_api::RulesApiClient;
use charwright_engine::infrastructure::retry::RetryConfig;
use charwright_engine::use_cases::{
    CreationWizard, FetchPendingChoices, LevelUpError, LevelUpWizard, PendingChoiceList,
};

const USAGE: &str = "usage: charwright <pending|steps|resume> <character-id> [--offline]";

enum Command {
    Pending,
    Steps,
    Resume,
}

struct Backend {
    characters: Arc<dyn CharacterApi>,
    compendium: Arc<dyn CompendiumApi>,
    retry: RetryConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "charwright_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let offline = args.iter().any(|a| a == "--offline");
    let positional: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let (command, id) = match positional.as_slice() {
        [command, id] => (parse_command(command)?, parse_id(id)?),
        _ => bail!(USAGE),
    };

    let backend = if offline {
        offline_backend(id).await
    } else {
        let config = EngineConfig::from_env().context("Invalid configuration")?;
        tracing::info!(api_url = %config.api_url, "Using rules backend");
        let client = Arc::new(RulesApiClient::from_config(&config));
        Backend {
            characters: client.clone(),
            compendium: client,
            retry: config.retry,
        }
    };

    match command {
        Command::Pending => print_pending(&backend, id).await,
        Command::Steps => print_steps(&backend, id).await,
        Command::Resume => print_level_up(&backend, id).await,
    }
}

fn parse_command(raw: &str) -> anyhow::Result<Command> {
    match raw {
        "pending" => Ok(Command::Pending),
        "steps" => Ok(Command::Steps),
        "resume" => Ok(Command::Resume),
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

fn parse_id(raw: &str) -> anyhow::Result<CharacterId> {
    raw.parse()
        .with_context(|| format!("'{}' is not a character id", raw))
}

/// Demo backend with a fresh draft at `id`.
async fn offline_backend(id: CharacterId) -> Backend {
    let demo = Arc::new(InMemoryBackend::demo());
    demo.insert_character(CharacterSnapshot::new(id, "Thorin")).await;
    tracing::info!(character_id = %id, "Using offline demo backend");
    Backend {
        characters: demo.clone(),
        compendium: demo,
        retry: RetryConfig::none(),
    }
}

async fn print_pending(backend: &Backend, id: CharacterId) -> anyhow::Result<()> {
    let fetch = FetchPendingChoices::new(backend.characters.clone());
    let mut list = PendingChoiceList::new();
    list.replace(fetch.execute(id).await?);

    if list.choices().is_empty() {
        println!("No pending choices");
        return Ok(());
    }
    for group in list.grouped() {
        println!("{}", group.source.label());
        for kind in &group.kinds {
            println!("  {}", kind.kind.label());
            for choice in &kind.choices {
                let marker = if choice.is_outstanding() { "*" } else { " " };
                println!(
                    "   {} {} ({}/{} chosen)",
                    marker,
                    choice.display_name(),
                    choice.persisted_count(),
                    choice.quantity
                );
            }
        }
    }
    Ok(())
}

async fn print_steps(backend: &Backend, id: CharacterId) -> anyhow::Result<()> {
    let wizard = CreationWizard::new(
        backend.characters.clone(),
        backend.compendium.clone(),
        backend.retry.clone(),
    );
    let current = wizard.load(id).await?;
    let (position, total) = wizard.progress().await;

    for step in wizard.steps().await {
        let marker = if step == current { ">" } else { " " };
        println!("{} {}", marker, step);
    }
    println!("step {} of {}", position, total);
    Ok(())
}

async fn print_level_up(backend: &Backend, id: CharacterId) -> anyhow::Result<()> {
    let wizard = LevelUpWizard::new(backend.characters.clone(), backend.retry.clone());
    let current = match wizard.resume(id).await {
        Ok(step) => step,
        Err(LevelUpError::NotStarted) => {
            println!("No level-up in progress");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for step in wizard.steps().await {
        let marker = if step == current { ">" } else { " " };
        println!("{} {}", marker, step);
    }
    Ok(())
}
