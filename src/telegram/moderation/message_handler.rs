// Telegram-specific message handling - translates raw updates into the
// engine's message view and engine outcomes into bot API calls.
//
// Every platform-action failure here is absorbed: one undeletable message
// must never stop the update stream.

use crate::core::moderation::{
    AttachmentKind, ChatKind, InboundMessage, ModerationOutcome,
};
use crate::telegram::notices;
use crate::telegram::AppState;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message};

/// Run one message through the moderation engine and apply the outcome.
pub async fn handle_message(bot: &Bot, state: &AppState, msg: &Message) {
    // Service updates without a sender carry nothing to moderate.
    let Some(inbound) = to_inbound(msg) else {
        return;
    };

    let outcome = match state.engine.handle_message(&inbound).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(user_id = inbound.user_id, %err, "moderation decision failed, leaving message alone");
            return;
        }
    };

    match outcome {
        ModerationOutcome::NoAction(reason) => {
            tracing::trace!(user_id = inbound.user_id, ?reason, "no action");
        }
        ModerationOutcome::Deleted { warn } => {
            // Best-effort: the message may already be gone or the bot may
            // lack delete rights. The user just sees their message remain.
            if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
                tracing::warn!(chat_id = msg.chat.id.0, message_id = msg.id.0, %err, "failed to delete message");
            }

            if warn {
                send_warning(bot, state, &inbound).await;
            }
        }
    }
}

async fn send_warning(bot: &Bot, state: &AppState, inbound: &InboundMessage) {
    let text = notices::warning_text(&state.templates, &notices::mention(inbound));
    let keyboard = notices::recheck_keyboard(&state.templates, &state.channels);

    if let Err(err) = bot
        .send_message(ChatId(inbound.chat_id), text)
        .reply_markup(keyboard)
        .await
    {
        tracing::warn!(chat_id = inbound.chat_id, user_id = inbound.user_id, %err, "failed to send warning");
    }
}

/// Build the engine's platform-agnostic message view. `None` when the update
/// has no sender.
fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let from = msg.from.as_ref()?;

    Some(InboundMessage {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind(msg),
        user_id: from.id.0,
        username: from.username.clone(),
        first_name: from.first_name.clone(),
        text: msg.text().map(str::to_owned),
        caption: msg.caption().map(str::to_owned),
        forwarded: msg.forward_origin().is_some(),
        attachments: attachment_kinds(msg),
    })
}

fn chat_kind(msg: &Message) -> ChatKind {
    if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Channel
    }
}

fn attachment_kinds(msg: &Message) -> Vec<AttachmentKind> {
    let mut kinds = Vec::new();

    if msg.photo().is_some() {
        kinds.push(AttachmentKind::Photo);
    }
    if msg.video().is_some() {
        kinds.push(AttachmentKind::Video);
    }
    if msg.animation().is_some() {
        kinds.push(AttachmentKind::Animation);
    }
    if msg.sticker().is_some() {
        kinds.push(AttachmentKind::Sticker);
    }
    if msg.document().is_some() {
        kinds.push(AttachmentKind::Document);
    }
    if msg.audio().is_some() {
        kinds.push(AttachmentKind::Audio);
    }
    if msg.voice().is_some() {
        kinds.push(AttachmentKind::Voice);
    }
    if msg.video_note().is_some() {
        kinds.push(AttachmentKind::VideoNote);
    }
    if msg.poll().is_some() {
        kinds.push(AttachmentKind::Poll);
    }
    if msg.location().is_some() {
        kinds.push(AttachmentKind::Location);
    }
    if msg.contact().is_some() {
        kinds.push(AttachmentKind::Contact);
    }
    if msg.new_chat_members().is_some_and(|m| !m.is_empty()) {
        kinds.push(AttachmentKind::NewChatMembers);
    }

    kinds
}
