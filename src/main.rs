use anyhow::{Context, Result};
use clap::Parser;
use mindchat_history::cli::{Cli, Commands};
use mindchat_history::{utils, HistoryError, HistoryStore, ModeRegistry, Settings, Turn};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    init_tracing(&settings.logging.level);

    if let Some(dir) = cli.data_dir {
        settings.history.data_dir = dir;
    }

    let registry = if cli.ephemeral {
        ModeRegistry::in_memory(&settings)?
    } else {
        ModeRegistry::from_settings(&settings)?
    };

    let result = match cli.command {
        Commands::Modes => handle_modes(&registry),
        Commands::List { mode } => handle_list(&registry, mode).await,
        Commands::Show { mode, id } => handle_show(&registry, &mode, &id).await,
        Commands::New { mode, message } => handle_new(&registry, &mode, message).await,
        Commands::Append {
            mode,
            id,
            text,
            assistant,
        } => handle_append(&registry, &mode, &id, text, assistant).await,
        Commands::Favorite { mode, id } => handle_favorite(&registry, &mode, &id).await,
        Commands::Delete { mode, id } => handle_delete(&registry, &mode, &id).await,
        Commands::UndoUser { mode, id } => handle_undo_user(&registry, &mode, &id).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<HistoryError>() {
            Some(history_error) if history_error.is_user_facing() => {
                utils::print_warning(&history_error.to_string())
            }
            _ => utils::print_error(&format!("{e:#}")),
        }
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open(registry: &ModeRegistry, mode: &str) -> Result<Arc<HistoryStore>> {
    registry
        .store_for_key(mode)
        .await
        .with_context(|| format!("Failed to open '{mode}' history"))
}

fn handle_modes(registry: &ModeRegistry) -> Result<()> {
    utils::print_header("Conversation modes");
    for definition in registry.modes() {
        let marker = if definition.mode == registry.default_mode() {
            " (default)"
        } else {
            ""
        };
        let location = registry
            .history_path(definition.mode)?
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".to_string());
        println!(
            "  {}{}: {} -> {}",
            definition.mode, marker, definition.display_name, location
        );
    }
    Ok(())
}

async fn handle_list(registry: &ModeRegistry, mode: Option<String>) -> Result<()> {
    let mode = mode.unwrap_or_else(|| registry.default_mode().to_string());
    let store = open(registry, &mode).await?;
    let records = store.list_all().await;
    let limits = store.limits();

    utils::print_header(&format!("{mode} history"));
    utils::print_info(&format!(
        "{}/{} conversations, {}/{} favorites",
        records.len(),
        limits.max_conversations,
        store.favorite_count().await,
        limits.max_favorites
    ));
    for record in &records {
        utils::print_conversation(record);
    }
    Ok(())
}

async fn handle_show(registry: &ModeRegistry, mode: &str, id: &str) -> Result<()> {
    let store = open(registry, mode).await?;
    let record = store.get(id).await?;
    utils::print_transcript(&record);
    Ok(())
}

async fn handle_new(registry: &ModeRegistry, mode: &str, message: String) -> Result<()> {
    let store = open(registry, mode).await?;
    let id = store.start_new(message).await?;
    utils::print_success(&format!("Started conversation {id}"));
    Ok(())
}

async fn handle_append(
    registry: &ModeRegistry,
    mode: &str,
    id: &str,
    text: String,
    assistant: bool,
) -> Result<()> {
    let store = open(registry, mode).await?;
    let turn = if assistant {
        Turn::assistant(text)
    } else {
        Turn::user(text)
    };
    let record = store.append(id, turn).await?;
    utils::print_success(&format!(
        "Conversation {} now has {} turns",
        record.id(),
        record.messages().len()
    ));
    Ok(())
}

async fn handle_favorite(registry: &ModeRegistry, mode: &str, id: &str) -> Result<()> {
    let store = open(registry, mode).await?;
    let favorite = store.toggle_favorite(id).await?;
    if favorite {
        utils::print_success(&format!("★ {id} marked as favorite"));
    } else {
        utils::print_success(&format!("☆ {id} removed from favorites"));
    }
    Ok(())
}

async fn handle_delete(registry: &ModeRegistry, mode: &str, id: &str) -> Result<()> {
    let store = open(registry, mode).await?;
    store.delete(id).await?;
    utils::print_success(&format!("Deleted conversation {id}"));
    Ok(())
}

async fn handle_undo_user(registry: &ModeRegistry, mode: &str, id: &str) -> Result<()> {
    let store = open(registry, mode).await?;
    let before = store.get(id).await?.messages().len();
    let record = store.remove_trailing_user_turn(id).await?;
    if record.messages().len() < before {
        utils::print_success("Removed trailing user turn");
    } else {
        utils::print_info("Nothing to remove");
    }
    Ok(())
}
