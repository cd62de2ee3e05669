// Rendering of the warning/success notices and the inline keyboard
// affordance. Pure text/keyboard building, no API calls.

use crate::config::NoticeTemplates;
use crate::core::moderation::InboundMessage;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

/// Callback payload of the "I've subscribed" button.
pub const RECHECK_CALLBACK: &str = "recheck";

/// How a user is addressed in the warning: @username when available,
/// otherwise their first name.
pub fn mention(msg: &InboundMessage) -> String {
    match &msg.username {
        Some(username) => format!("@{username}"),
        None => msg.first_name.clone(),
    }
}

pub fn warning_text(templates: &NoticeTemplates, mention: &str) -> String {
    templates.warning.replace("{mention}", mention)
}

pub fn still_unsubscribed_text(templates: &NoticeTemplates) -> String {
    templates.still_unsubscribed.clone()
}

pub fn success_text(templates: &NoticeTemplates) -> String {
    match &templates.footer {
        Some(footer) => format!("{}\n\n{}", templates.success, footer),
        None => templates.success.clone(),
    }
}

/// One subscribe-link row per required channel, then the re-check button.
pub fn recheck_keyboard(templates: &NoticeTemplates, channels: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::with_capacity(channels.len() + 1);

    for channel in channels {
        let label = templates.subscribe_button.replace("{channel}", channel);
        match join_url(channel) {
            Some(url) => rows.push(vec![InlineKeyboardButton::url(label, url)]),
            None => {
                tracing::warn!(%channel, "cannot build join link, omitting button");
            }
        }
    }

    rows.push(vec![InlineKeyboardButton::callback(
        templates.recheck_button.clone(),
        RECHECK_CALLBACK,
    )]);

    InlineKeyboardMarkup::new(rows)
}

fn join_url(channel: &str) -> Option<Url> {
    let handle = channel.trim_start_matches('@');
    Url::parse(&format!("https://t.me/{handle}")).ok()
}
