use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::error::{BridgeError, ReadError};
use crate::io::{Closer, Transport};
use crate::message::{Command, ProtocolMessage};
use crate::reader::FrameReader;

/// Receives every decoded message, in wire order, on the receive loop thread
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: ProtocolMessage);
}

impl<F> MessageHandler for F
where
    F: FnMut(ProtocolMessage) + Send + 'static,
{
    fn handle(&mut self, message: ProtocolMessage) {
        self(message)
    }
}

struct BridgeInternals {
    // taken by `start`
    input: Mutex<Option<Box<dyn BufRead + Send>>>,
    // taken by `stop`
    output: Mutex<Option<Box<dyn Write + Send>>>,
    closer: Box<dyn Closer>,

    started: AtomicBool,
    stopped: Arc<AtomicBool>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

/// Connection to the attached process
///
/// Owns the connection lifecycle: a dedicated thread reads and decodes
/// incoming messages and hands each to the [`MessageHandler`] given to
/// [`Bridge::start`], while any thread may write commands through
/// [`Bridge::send`].
#[derive(Clone)]
pub struct Bridge {
    internals: Arc<BridgeInternals>,
}

impl Bridge {
    /// Create a bridge over the given transport
    ///
    /// Nothing is read until [`Bridge::start`] is called.
    ///
    /// # Examples
    ///
    /// ```
    /// use transport::{Bridge, ProtocolMessage, io::InMemoryTransport};
    ///
    /// let (client_transport, _target) = InMemoryTransport::pair();
    /// let bridge = Bridge::new(client_transport)?;
    /// bridge.start(|message: ProtocolMessage| println!("{message:?}"))?;
    /// bridge.send("stepover")?;
    /// bridge.stop()?;
    /// # Ok::<(), eyre::Error>(())
    /// ```
    pub fn new<T>(transport: T) -> Result<Self, BridgeError>
    where
        T: Transport,
    {
        let (input, output, closer) = transport.split()?;

        let internals = BridgeInternals {
            input: Mutex::new(Some(Box::new(input))),
            output: Mutex::new(Some(Box::new(output))),
            closer: Box::new(closer),
            started: AtomicBool::new(false),
            stopped: Arc::new(AtomicBool::new(false)),
            receiver: Mutex::new(None),
        };

        Ok(Self {
            internals: Arc::new(internals),
        })
    }

    /// Spawn the receive loop, dispatching messages to `handler`
    ///
    /// May only be called once per bridge.
    #[tracing::instrument(skip_all)]
    pub fn start<H>(&self, handler: H) -> Result<(), BridgeError>
    where
        H: MessageHandler,
    {
        if self.internals.started.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyStarted);
        }
        if self.is_stopped() {
            return Err(BridgeError::Stopped);
        }

        // held until the handle is stored; `stop` takes the input before it
        // looks for the handle, so it either joins this thread or we see no input
        with_lock("Bridge.receiver", &self.internals.receiver, |mut receiver| {
            let input = with_lock("Bridge.input", &self.internals.input, |mut input| input.take())
                .ok_or(BridgeError::Stopped)?;
            let stopped = Arc::clone(&self.internals.stopped);

            let handle = thread::Builder::new()
                .name("bridge-receiver".to_string())
                .spawn(move || receive_loop(input, handler, stopped))?;
            *receiver = Some(handle);
            Ok::<_, BridgeError>(())
        })?;
        tracing::debug!("receive loop started");

        Ok(())
    }

    /// Write a single command line to the attached process
    ///
    /// Each command is written and flushed while holding the writer lock, so
    /// commands from concurrent callers never interleave on the wire.
    /// Nothing is returned from the target; its reaction arrives later as
    /// an independent message.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn send(&self, command: &str) -> Result<(), BridgeError> {
        if command.contains('\n') {
            return Err(BridgeError::InvalidCommand(command.to_string()));
        }
        if !self.internals.started.load(Ordering::SeqCst) {
            return Err(BridgeError::NotStarted);
        }

        let line = format!("{command}\n");
        with_lock("Bridge.output", &self.internals.output, |mut output| {
            let output = output.as_mut().ok_or(BridgeError::Stopped)?;
            output.write_all(line.as_bytes())?;
            output.flush()?;
            Ok(())
        })
    }

    /// Send a typed [`Command`]
    pub fn execute(&self, command: Command) -> Result<(), BridgeError> {
        self.send(&command.to_string())
    }

    /// Close the connection and end the receive loop
    ///
    /// Safe to call repeatedly, from any thread, including from the
    /// [`MessageHandler`] running on the receive loop itself.
    #[tracing::instrument(skip(self))]
    pub fn stop(&self) -> Result<(), BridgeError> {
        if self.internals.stopped.swap(true, Ordering::SeqCst) {
            tracing::trace!("bridge already stopped");
            return Ok(());
        }

        // interrupts a blocked read (and write) before we wait on either
        if let Err(e) = self.internals.closer.close() {
            tracing::warn!(error = %e, "closing connection");
        }
        with_lock("Bridge.output", &self.internals.output, |mut output| {
            output.take();
        });
        with_lock("Bridge.input", &self.internals.input, |mut input| {
            input.take();
        });

        let receiver = with_lock("Bridge.receiver", &self.internals.receiver, |mut receiver| {
            receiver.take()
        });
        if let Some(handle) = receiver {
            if handle.thread().id() == thread::current().id() {
                tracing::debug!("stop requested from the receive loop");
            } else if handle.join().is_err() {
                tracing::warn!("receive loop panicked");
            }
        }

        tracing::debug!("bridge stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.internals.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.internals.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for BridgeInternals {
    fn drop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutting down bridge");
            let _ = self.closer.close();
        }
    }
}

fn receive_loop<H>(input: Box<dyn BufRead + Send>, mut handler: H, stopped: Arc<AtomicBool>)
where
    H: MessageHandler,
{
    let mut reader = FrameReader::new(input);

    loop {
        let result = reader.poll_message();
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        match result {
            Ok(Some(message)) => {
                tracing::debug!(?message, "dispatching message");
                handler.handle(message);
            }
            Ok(None) => {
                tracing::debug!("connection closed by target");
                handler.handle(ProtocolMessage::SessionEnded);
                break;
            }
            Err(ReadError::Decode(e)) => {
                tracing::warn!(error = %e, "skipping undecodable message");
            }
            Err(ReadError::Io(e)) => {
                tracing::warn!(error = %e, "connection failed");
                handler.handle(ProtocolMessage::SessionEnded);
                break;
            }
        }
    }

    tracing::debug!("receive loop terminated");
}

fn with_lock<T, F, R>(name: &str, lock: &Mutex<T>, f: F) -> R
where
    F: FnOnce(MutexGuard<'_, T>) -> R,
{
    tracing::trace!(%name, "taking lock");
    // the guarded values stay consistent even if a holder panicked
    let inner = lock.lock().unwrap_or_else(|e| e.into_inner());
    let res = f(inner);
    tracing::trace!(%name, "releasing lock");
    res
}
