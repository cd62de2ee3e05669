// Entry point of the moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database)
// - `telegram/` = Telegram-specific adapters (handlers, membership queries)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Start the long-polling dispatcher

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "telegram/telegram_layer.rs"]
mod telegram;

mod config;

use crate::core::moderation::{ModerationEngine, SubscriptionGate};
use crate::infra::moderation::SqliteRecordStore;
use crate::telegram::membership::TelegramMembership;
use crate::telegram::AppState;
use std::path::Path;
use std::sync::Arc;
use teloxide::dptree;
use teloxide::prelude::*;

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Anything wrong with the configuration must prevent startup.
    let config = config::Config::from_env().expect("Invalid configuration");

    // Keep the runtime database in a dedicated folder so the repo root stays tidy.
    if let Some(dir) = Path::new(&config.database_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).expect("Failed to create data directory for SQLite file");
        }
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", config.database_path))
        .await
        .expect("Failed to connect to moderation DB");
    let record_store = SqliteRecordStore::new(pool);
    record_store
        .migrate()
        .await
        .expect("Failed to migrate moderation DB");

    let bot = Bot::new(config.bot_token.clone());

    let gate = SubscriptionGate::new(
        TelegramMembership::new(bot.clone()),
        config.required_channels.clone(),
        config.membership_timeout,
    );
    let engine = ModerationEngine::new(record_store, gate, config.patterns.clone());

    let state = Arc::new(AppState {
        engine,
        channels: config.required_channels.clone(),
        templates: config.templates.clone(),
    });

    tracing::info!(
        channels = ?config.required_channels,
        pattern_version = config.patterns.version,
        "moderation bot starting"
    );

    Dispatcher::builder(bot, telegram::schema())
        .dependencies(dptree::deps![state])
        .default_handler(|_upd| async {})
        .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
