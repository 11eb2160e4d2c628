//! Shared vocabulary for the bot: inbound events, reply payloads, and the
//! outbound reply seam every other crate talks through.

pub mod reply;
pub mod types;

pub use {
    reply::ReplySink,
    types::{InboundEvent, ReplyPayload},
};
