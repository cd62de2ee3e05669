// Handler for the "I've subscribed" re-check button.
//
// The callback may be pressed arbitrarily many times; a still-unsubscribed
// user just sees the same notice again. Edit failures (e.g. Telegram
// rejecting an identical edit) are absorbed.

use crate::core::moderation::RecheckOutcome;
use crate::telegram::notices;
use crate::telegram::AppState;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

pub async fn handle_callback(bot: &Bot, state: &AppState, q: CallbackQuery) {
    // Always acknowledge the press so the client stops its spinner.
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        tracing::warn!(%err, "failed to answer callback query");
    }

    if q.data.as_deref() != Some(notices::RECHECK_CALLBACK) {
        return;
    }

    let user_id = q.from.id.0;
    let outcome = match state.engine.recheck(user_id).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(user_id, %err, "re-check failed");
            return;
        }
    };

    let Some(message) = q.message else {
        // The originating warning is too old for Telegram to reference;
        // the state transition (if any) still happened.
        return;
    };

    match outcome {
        RecheckOutcome::NowExempt => {
            let text = notices::success_text(&state.templates);
            if let Err(err) = bot.edit_message_text(message.chat().id, message.id(), text).await {
                tracing::warn!(user_id, %err, "failed to render success confirmation");
            }
        }
        RecheckOutcome::StillUnsubscribed => {
            let text = notices::still_unsubscribed_text(&state.templates);
            let keyboard = notices::recheck_keyboard(&state.templates, &state.channels);
            if let Err(err) = bot
                .edit_message_text(message.chat().id, message.id(), text)
                .reply_markup(keyboard)
                .await
            {
                // Repeated presses produce an identical edit, which the API
                // rejects; that is the idempotent case, not a problem.
                tracing::debug!(user_id, %err, "warning re-render skipped");
            }
        }
    }
}
