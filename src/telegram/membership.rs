// Telegram implementation of the membership provider port.

use crate::core::moderation::{MembershipError, MembershipProvider, MembershipStatus};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, Recipient, UserId};
use teloxide::{ApiError, RequestError};

/// Queries channel membership through the bot API. The bot must be an
/// administrator of every required channel for `get_chat_member` to work.
#[derive(Clone)]
pub struct TelegramMembership {
    bot: Bot,
}

impl TelegramMembership {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipProvider for TelegramMembership {
    async fn get_membership(
        &self,
        channel: &str,
        user_id: u64,
    ) -> Result<MembershipStatus, MembershipError> {
        let member = self
            .bot
            .get_chat_member(
                Recipient::ChannelUsername(channel.to_owned()),
                UserId(user_id),
            )
            .await
            .map_err(|err| classify_error(channel, err))?;

        Ok(match member.status() {
            ChatMemberStatus::Owner => MembershipStatus::Owner,
            ChatMemberStatus::Administrator => MembershipStatus::Administrator,
            ChatMemberStatus::Member => MembershipStatus::Member,
            ChatMemberStatus::Restricted => MembershipStatus::Restricted,
            ChatMemberStatus::Left => MembershipStatus::Left,
            ChatMemberStatus::Banned => MembershipStatus::Banned,
        })
    }
}

fn classify_error(channel: &str, err: RequestError) -> MembershipError {
    match err {
        RequestError::Api(ApiError::ChatNotFound) => {
            MembershipError::ChannelNotFound(channel.to_owned())
        }
        RequestError::Api(api) => MembershipError::Forbidden(api.to_string()),
        other => MembershipError::Transport(other.to_string()),
    }
}
