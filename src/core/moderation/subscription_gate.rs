// Subscription gate - reduces per-channel membership queries to a single
// fail-closed boolean.
//
// A user is subscribed only when every required channel reports an active
// membership. Query errors, unknown channels and timeouts all count as
// "not subscribed" - the gate never fails open.

use super::moderation_models::MembershipStatus;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Port for the external membership provider.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Query the membership status of `user_id` on one channel.
    async fn get_membership(
        &self,
        channel: &str,
        user_id: u64,
    ) -> Result<MembershipStatus, MembershipError>;
}

/// Checks a fixed, ordered list of required channels. Order only affects
/// latency (first failing channel short-circuits), never the outcome.
pub struct SubscriptionGate<M: MembershipProvider> {
    provider: M,
    channels: Vec<String>,
    per_channel_timeout: Duration,
}

impl<M: MembershipProvider> SubscriptionGate<M> {
    pub fn new(provider: M, channels: Vec<String>, per_channel_timeout: Duration) -> Self {
        Self {
            provider,
            channels,
            per_channel_timeout,
        }
    }

    /// True only if the user holds an active membership on every required
    /// channel. Errors and timeouts map to `false`.
    pub async fn is_subscribed(&self, user_id: u64) -> bool {
        for channel in &self.channels {
            let query = self.provider.get_membership(channel, user_id);
            match tokio::time::timeout(self.per_channel_timeout, query).await {
                Ok(Ok(status)) if status.is_active() => {}
                Ok(Ok(status)) => {
                    tracing::debug!(user_id, %channel, ?status, "user not subscribed");
                    return false;
                }
                Ok(Err(err)) => {
                    tracing::debug!(user_id, %channel, %err, "membership query failed, treating as unsubscribed");
                    return false;
                }
                Err(_) => {
                    tracing::warn!(user_id, %channel, "membership query timed out, treating as unsubscribed");
                    return false;
                }
            }
        }
        true
    }
}
