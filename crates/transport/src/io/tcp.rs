//! TCP-based transport implementation

use std::io::{self, BufReader};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use retry::retry;

use super::{Closer, Transport};

/// TCP-based transport
///
/// Reads block without a timeout; [`TcpCloser`] shuts the socket down which
/// wakes a blocked reader with EOF.
///
/// # Examples
///
/// ```no_run
/// use std::net::TcpStream;
/// use transport::io::TcpTransport;
///
/// // Create from existing stream
/// let stream = TcpStream::connect("127.0.0.1:8172")?;
/// let transport = TcpTransport::new(stream);
/// # Ok::<(), eyre::Error>(())
/// ```
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Create a new TCP transport from an existing stream
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Connect to the attached process at the given address
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream))
    }

    /// Connect with exponential backoff
    ///
    /// The attached process may take a moment to open its debug port after
    /// injection, so up to `attempts` connections are tried, waiting
    /// `base_delay` before the first retry and twice as long each time after.
    pub fn connect_with_retry<A>(addr: A, attempts: usize, base_delay: Duration) -> io::Result<Self>
    where
        A: ToSocketAddrs + Clone,
    {
        // doubling delays between attempts
        let delays = std::iter::successors(Some(base_delay), |delay| delay.checked_mul(2))
            .take(attempts.saturating_sub(1));
        let stream = retry(delays, || {
            tracing::debug!("trying to make connection");
            match TcpStream::connect(addr.clone()) {
                Ok(stream) => {
                    tracing::debug!("connection made");
                    Ok(stream)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "error making connection");
                    Err(e)
                }
            }
        })
        .map_err(|e| e.error)?;

        Ok(Self::new(stream))
    }
}

impl Transport for TcpTransport {
    type Reader = BufReader<TcpStream>;
    type Writer = TcpStream;
    type Closer = TcpCloser;

    fn split(self) -> io::Result<(Self::Reader, Self::Writer, Self::Closer)> {
        let input = self.stream.try_clone()?;
        let closer = TcpCloser(self.stream.try_clone()?);
        let output = self.stream;

        Ok((BufReader::new(input), output, closer))
    }
}

/// Shuts down both directions of a TCP connection
pub struct TcpCloser(TcpStream);

impl Closer for TcpCloser {
    fn close(&self) -> io::Result<()> {
        match self.0.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // already closed by the other side
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}
