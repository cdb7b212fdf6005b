use std::sync::Arc;
use std::time::{Duration, Instant};

use config::{AttachConfig, UnmatchedBreakPolicy};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use eyre::WrapErr;
use transport::{Bridge, Command, ScriptIndex, TcpTransport, Transport};

use crate::internals::{SessionController, end_session};
use crate::registry::BreakpointRegistry;
use crate::resolver::FileResolver;
use crate::state::{Event, RunState, SessionState};
use crate::types::{BreakpointHandle, FileIdentity, ProcessInfo, SourcePosition};

/// Options for [`AttachSession::attach`]
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub process: ProcessInfo,
    pub unmatched_break: UnmatchedBreakPolicy,
}

/// A debugging session attached to a running interpreter
///
/// Front end requests go through this type. Notifications about the
/// target come back on the channel returned by [`AttachSession::events`].
pub struct AttachSession {
    bridge: Bridge,
    registry: BreakpointRegistry,
    state: SessionState,
    publisher: Sender<Event>,
    rx: Receiver<Event>,
    process: ProcessInfo,
}

impl AttachSession {
    /// Start a session over an already connected transport
    #[tracing::instrument(skip(transport, resolver), fields(process = %options.process.name))]
    pub fn attach<T>(
        transport: T,
        resolver: impl FileResolver,
        options: SessionOptions,
    ) -> eyre::Result<Self>
    where
        T: Transport,
    {
        let bridge = Bridge::new(transport).wrap_err("setting up bridge")?;
        let (publisher, rx) = crossbeam_channel::unbounded();
        let registry = BreakpointRegistry::new();
        let state = SessionState::new();

        let controller = SessionController::new(
            bridge.clone(),
            registry.clone(),
            Arc::new(resolver),
            state.clone(),
            publisher.clone(),
            options.unmatched_break,
        );
        bridge.start(controller).wrap_err("starting receive loop")?;
        tracing::info!("attached");

        Ok(Self {
            bridge,
            registry,
            state,
            publisher,
            rx,
            process: options.process,
        })
    }

    /// Connect to the attach port described by `config` and start a session
    #[tracing::instrument(skip(config, resolver))]
    pub fn connect(
        config: &AttachConfig,
        resolver: impl FileResolver,
        process: ProcessInfo,
    ) -> eyre::Result<Self> {
        let address = config.connection.address();
        let transport = TcpTransport::connect_with_retry(
            address.as_str(),
            config.connection.connect_attempts,
            config.connection.retry_base_delay(),
        )
        .wrap_err_with(|| format!("connecting to {address}"))?;

        Self::attach(
            transport,
            resolver,
            SessionOptions {
                process,
                unmatched_break: config.session.unmatched_break,
            },
        )
    }

    pub fn events(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    /// Wait for an event matching `pred`, discarding others
    pub fn wait_for_event<F>(&self, timeout: Duration, pred: F) -> eyre::Result<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(evt) if pred(&evt) => {
                    tracing::debug!(event = ?evt, "received expected event");
                    return Ok(evt);
                }
                Ok(evt) => tracing::trace!(event = ?evt, "non-matching event"),
                Err(RecvTimeoutError::Timeout) => {
                    eyre::bail!("no matching event within {timeout:?}")
                }
                Err(RecvTimeoutError::Disconnected) => eyre::bail!("event channel closed"),
            }
        }
    }

    /// Register a breakpoint, returning the handle it replaced
    ///
    /// A breakpoint in a script the target already loaded is armed
    /// immediately; otherwise it is armed when the script loads.
    #[tracing::instrument(skip(self))]
    pub fn register_breakpoint(
        &self,
        position: SourcePosition,
        handle: BreakpointHandle,
    ) -> Option<BreakpointHandle> {
        let line = position.line;
        let file = position.file.clone();
        let replaced = self.registry.register(position, handle);

        // the receive loop records a load before reading the registry, so a
        // concurrent load arms this breakpoint at least once
        if let Some(script) = self.state.script_index(&file) {
            if self.state.run_state() != RunState::Ended {
                if let Err(e) = self.bridge.execute(Command::SetBreakpoint { script, line }) {
                    tracing::warn!(error = %e, "arming breakpoint in loaded script");
                }
            }
        }
        replaced
    }

    /// Forget every position registered for `handle`
    ///
    /// Breakpoints already armed in the target stay armed; hitting one is
    /// reported as [`Event::UnmatchedBreak`].
    #[tracing::instrument(skip(self))]
    pub fn unregister_breakpoint(&self, handle: BreakpointHandle) -> bool {
        self.registry.unregister(handle)
    }

    #[tracing::instrument(skip(self))]
    pub fn unregister_at(&self, position: &SourcePosition) -> Option<BreakpointHandle> {
        self.registry.unregister_at(position)
    }

    pub fn breakpoints(&self) -> Vec<(SourcePosition, BreakpointHandle)> {
        self.registry.snapshot()
    }

    /// Scripts the target loaded that resolved to local files
    pub fn loaded_scripts(&self) -> Vec<(FileIdentity, ScriptIndex)> {
        self.state.loaded_scripts()
    }

    #[tracing::instrument(skip(self))]
    pub fn step_over(&self) -> eyre::Result<()> {
        self.bridge
            .execute(Command::StepOver)
            .wrap_err("sending step over")
    }

    #[tracing::instrument(skip(self))]
    pub fn step_into(&self) -> eyre::Result<()> {
        self.bridge
            .execute(Command::StepInto)
            .wrap_err("sending step into")
    }

    /// End the session and close the connection
    ///
    /// Repeated calls, and calls after the target ended the session, do
    /// nothing.
    #[tracing::instrument(skip(self))]
    pub fn stop(&self) {
        end_session(&self.state, &self.bridge, &self.publisher);
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state()
    }

    pub fn process(&self) -> &ProcessInfo {
        &self.process
    }
}

impl Drop for AttachSession {
    fn drop(&mut self) {
        tracing::debug!("dropping session");
        if let Err(e) = self.bridge.stop() {
            tracing::warn!(error = %e, "stopping bridge during drop");
        }
    }
}
