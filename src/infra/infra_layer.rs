// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "moderation/record_store.rs"]
pub mod moderation;
