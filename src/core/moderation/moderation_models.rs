// Moderation domain models - data structures for the subscription-gated
// moderation system.
//
// These are pure domain types with no Telegram dependencies.
// The Telegram layer converts platform updates into these and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user moderation state.
///
/// Transitions only move forward: `Unknown -> Warned` and
/// `Unknown|Warned -> Exempt`. `Exempt` is absorbing - nothing in the
/// engine ever moves a user out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserState {
    /// Never warned, never exempted. Absent records count as Unknown.
    Unknown,
    /// The single warning notification has been sent. Write-once.
    Warned,
    /// Unconditional moderation bypass.
    Exempt,
}

impl UserState {
    /// Stable string form used by the persistence layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Unknown => "unknown",
            UserState::Warned => "warned",
            UserState::Exempt => "exempt",
        }
    }

    pub fn parse(s: &str) -> Option<UserState> {
        match s {
            "unknown" => Some(UserState::Unknown),
            "warned" => Some(UserState::Warned),
            "exempt" => Some(UserState::Exempt),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One moderation record per platform user id.
///
/// The timestamps are informational only and never feed decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    pub state: UserState,
    pub warned_at: Option<DateTime<Utc>>,
    pub exempted_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Create a fresh record in the given state, stamping the matching
    /// timestamp.
    pub fn new(user_id: u64, state: UserState) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            state,
            warned_at: (state == UserState::Warned).then_some(now),
            exempted_at: (state == UserState::Exempt).then_some(now),
        }
    }

    /// Move the record into a new state, stamping the matching timestamp
    /// the first time it is reached. Existing timestamps are preserved.
    pub fn advance(&mut self, state: UserState) {
        let now = Utc::now();
        self.state = state;
        match state {
            UserState::Warned => {
                self.warned_at.get_or_insert(now);
            }
            UserState::Exempt => {
                self.exempted_at.get_or_insert(now);
            }
            UserState::Unknown => {}
        }
    }
}

/// Kind of chat a message arrived in. Only group-type chats are moderated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_moderated(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// Non-text payload kinds that count as restricted media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Video,
    Animation,
    Sticker,
    Document,
    Audio,
    Voice,
    VideoNote,
    Poll,
    Location,
    Contact,
    /// New-member service event; moderated like media.
    NewChatMembers,
}

/// Platform-agnostic view of one inbound message. The Telegram layer builds
/// this from a raw update before handing it to the engine.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: i32,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub user_id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub forwarded: bool,
    pub attachments: Vec<AttachmentKind>,
}

/// Membership status of a user on one required channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Owner,
    Administrator,
    Member,
    /// Restricted but still present in the channel.
    Restricted,
    Left,
    Kicked,
    Banned,
}

impl MembershipStatus {
    /// Whether this status counts towards "subscribed". Anything that means
    /// the user is gone from the channel does not.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            MembershipStatus::Left | MembershipStatus::Kicked | MembershipStatus::Banned
        )
    }
}

/// Why the engine left a message alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// Private or channel chat - moderation never runs there.
    UnmoderatedChat,
    /// The sender is exempt; their messages bypass classification entirely.
    AlreadyExempt,
    /// The sender proved subscription just now; the message stands.
    NewlyExempt,
    /// The message is not restricted content.
    Clean,
}

/// What the Telegram layer should do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    NoAction(AllowReason),
    /// Delete the message. `warn` is true only for the single warning this
    /// user will ever receive; every later offense deletes silently.
    Deleted { warn: bool },
}

/// Result of the "I've subscribed" re-check affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckOutcome {
    NowExempt,
    StillUnsubscribed,
}
