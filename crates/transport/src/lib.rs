//! Attach bridge transport
//!
//! This crate contains the connection to an attached interpreter process: the
//! message model, the wire framing, and the [`Bridge`] that runs the receive
//! loop and serialises outgoing commands.
pub mod bindings;
mod bridge;
pub mod error;
pub mod io;
mod message;
pub mod reader;

pub use bridge::{Bridge, MessageHandler};
pub use error::{BridgeError, DecodeError};
pub use io::{InMemoryTransport, TcpTransport, Transport};
pub use message::{Command, Line, ProtocolMessage, ScriptIndex};

/// The default port the attached process listens on
pub const DEFAULT_ATTACH_PORT: u16 = 8172;
