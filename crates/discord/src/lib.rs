//! Discord surface of the hunt bot.
//!
//! `commands` parses prefixed chat messages and routes them to the puzzle
//! directory, `events` dispatches gateway events to handlers, `gateway` runs
//! the reconnecting event loop, and `rest` is the REST-backed channel service
//! that also posts command replies.

pub mod commands;
pub mod events;
pub mod gateway;
pub mod messages;
pub mod rest;

pub use commands::{CommandRouter, PuzzleCommand};
pub use events::{directory_dispatcher, EventDispatcher};
pub use gateway::{GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy};
pub use rest::{DiscordRest, RestReplyTransport};
