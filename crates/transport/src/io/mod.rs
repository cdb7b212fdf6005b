//! IO abstraction layer for the attach bridge
//!
//! The core trait [`Transport`] allows plugging in different IO implementations
//! such as TCP sockets or in-memory channels.
//!
//! # Examples
//!
//! ## Using TCP Transport
//!
//! ```no_run
//! use transport::{Bridge, io::TcpTransport};
//!
//! let transport = TcpTransport::connect("127.0.0.1:8172")?;
//! let bridge = Bridge::new(transport)?;
//! # Ok::<(), eyre::Error>(())
//! ```
//!
//! ## Using In-Memory Transport for Testing
//!
//! ```
//! use transport::{Bridge, io::InMemoryTransport};
//!
//! let (client_transport, _target_transport) = InMemoryTransport::pair();
//! let bridge = Bridge::new(client_transport)?;
//! # Ok::<(), eyre::Error>(())
//! ```

use std::io::{self, BufRead, Write};

mod memory;
mod tcp;


pub use memory::{InMemoryCloser, InMemoryReader, InMemoryTransport, InMemoryWriter};
pub use tcp::{TcpCloser, TcpTransport};

/// Trait for a bidirectional connection to the attached process
///
/// Implementations are split into a reader, moved into the receive loop thread,
/// a writer, shared between senders, and a [`Closer`] used to tear the
/// connection down from any thread.
pub trait Transport: Send + 'static {
    /// The reader type that implements BufRead
    type Reader: BufRead + Send + 'static;

    /// The writer type that implements Write
    type Writer: Write + Send + 'static;

    /// Handle used to close the connection
    type Closer: Closer;

    /// Split the transport into separate halves
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be split (e.g., socket cloning fails)
    fn split(self) -> io::Result<(Self::Reader, Self::Writer, Self::Closer)>;
}

/// Closes a connection from outside the receive loop
pub trait Closer: Send + Sync + 'static {
    /// Close the connection.
    ///
    /// A reader blocked in `read` must return (EOF or error) once this has been
    /// called. Calling it more than once must be harmless.
    fn close(&self) -> io::Result<()>;
}
