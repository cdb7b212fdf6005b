//! In-memory transport implementation for testing

use std::io::{self, BufRead, Cursor, Read, Write};

use crossbeam_channel::{Receiver, Sender};

use super::{Closer, Transport};

/// In-memory transport for testing
///
/// This transport uses channels for bidirectional communication without
/// requiring actual network connections. One end is handed to the bridge,
/// the other is driven by a test acting as the attached process.
///
/// # Examples
///
/// ```
/// use transport::io::InMemoryTransport;
/// use transport::Bridge;
///
/// // Create a connected pair of transports
/// let (client_transport, target_transport) = InMemoryTransport::pair();
///
/// let bridge = Bridge::new(client_transport)?;
///
/// // Use target_transport to simulate the attached process
/// # Ok::<(), eyre::Error>(())
/// ```
pub struct InMemoryTransport {
    reader: InMemoryReader,
    writer: InMemoryWriter,
    closer: InMemoryCloser,
}

/// Reader half of in-memory transport
///
/// Blocks until data arrives, the peer disconnects or the transport is closed.
pub struct InMemoryReader {
    buffer: Cursor<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    close_rx: Receiver<()>,
    // keeps the close channel connected when the closer is dropped unused
    _close_tx: Sender<()>,
    closed: bool,
}

/// Writer half of in-memory transport
pub struct InMemoryWriter {
    tx: Sender<Vec<u8>>,
}

/// Wakes the reader of an in-memory transport
pub struct InMemoryCloser {
    tx: Sender<()>,
}

impl InMemoryTransport {
    /// Create a connected pair of in-memory transports
    ///
    /// Data written to one can be read from the other.
    pub fn pair() -> (Self, Self) {
        let (client_tx, target_rx) = crossbeam_channel::unbounded();
        let (target_tx, client_rx) = crossbeam_channel::unbounded();

        (Self::new(client_rx, client_tx), Self::new(target_rx, target_tx))
    }

    fn new(rx: Receiver<Vec<u8>>, tx: Sender<Vec<u8>>) -> Self {
        let (close_tx, close_rx) = crossbeam_channel::bounded(1);
        Self {
            reader: InMemoryReader {
                buffer: Cursor::new(Vec::new()),
                rx,
                close_rx,
                _close_tx: close_tx.clone(),
                closed: false,
            },
            writer: InMemoryWriter { tx },
            closer: InMemoryCloser { tx: close_tx },
        }
    }
}

impl Transport for InMemoryTransport {
    type Reader = InMemoryReader;
    type Writer = InMemoryWriter;
    type Closer = InMemoryCloser;

    fn split(self) -> io::Result<(Self::Reader, Self::Writer, Self::Closer)> {
        Ok((self.reader, self.writer, self.closer))
    }
}

impl Closer for InMemoryCloser {
    fn close(&self) -> io::Result<()> {
        // a full channel means a close is already pending
        let _ = self.tx.try_send(());
        Ok(())
    }
}

impl BufRead for InMemoryReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.closed {
            return Ok(&[]);
        }

        if self.buffer.position() >= self.buffer.get_ref().len() as u64 {
            crossbeam_channel::select! {
                recv(self.rx) -> data => match data {
                    Ok(data) => self.buffer = Cursor::new(data),
                    // peer dropped, EOF
                    Err(_) => return Ok(&[]),
                },
                recv(self.close_rx) -> _ => {
                    self.closed = true;
                    return Ok(&[]);
                }
            }
        }

        self.buffer.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.consume(amt)
    }
}

impl Read for InMemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let len = std::cmp::min(available.len(), buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.consume(len);
        Ok(len)
    }
}

impl Write for InMemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
