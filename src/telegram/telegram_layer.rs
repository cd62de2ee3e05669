// Telegram layer - update dispatch and handlers around the core engine.

#[path = "moderation/callback_handler.rs"]
pub mod callbacks;
#[path = "moderation/message_handler.rs"]
pub mod messages;
#[path = "moderation/notices.rs"]
pub mod notices;

pub mod membership;

use crate::config::NoticeTemplates;
use crate::core::moderation::ModerationEngine;
use crate::infra::moderation::SqliteRecordStore;
use membership::TelegramMembership;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

/// Shared state injected into every handler.
pub struct AppState {
    pub engine: ModerationEngine<SqliteRecordStore, TelegramMembership>,
    pub channels: Vec<String>,
    pub templates: NoticeTemplates,
}

/// The dptree update schema: one branch for messages, one for the re-check
/// button. Handlers absorb their own failures, so endpoints never error.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(
            |bot: Bot, state: Arc<AppState>, msg: Message| async move {
                messages::handle_message(&bot, &state, &msg).await;
                Ok(())
            },
        ))
        .branch(Update::filter_callback_query().endpoint(
            |bot: Bot, state: Arc<AppState>, q: CallbackQuery| async move {
                callbacks::handle_callback(&bot, &state, q).await;
                Ok(())
            },
        ))
}
