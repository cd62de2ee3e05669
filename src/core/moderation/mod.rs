// Core moderation module - classification, subscription gating and the
// per-user state machine.

pub mod content_classifier;
pub mod moderation_models;
pub mod moderation_service;
pub mod subscription_gate;

pub use content_classifier::*;
pub use moderation_models::*;
pub use moderation_service::*;
pub use subscription_gate::*;
