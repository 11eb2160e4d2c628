//! Event dispatch: parse inbound message bodies, resolve handlers, and run
//! them with per-channel ordering, deadlines, and failure isolation.

pub mod dispatcher;
pub mod parse;

pub use {
    dispatcher::{DispatchOutcome, Dispatcher, DispatcherOpts, HandlerError},
    parse::{ParsedCommand, parse_command},
};
