use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use transport::{Line, ScriptIndex};

use crate::types::{BreakpointHandle, FileIdentity, SourcePosition};

/// Run state of the attached process as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Suspended,
    Ended,
}

/// Where and why the target is suspended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendContext {
    pub breakpoint: BreakpointHandle,
    /// The execution point to show
    pub position: SourcePosition,
    /// Script name as reported by the target
    pub script: String,
}

/// Notifications for the front end
///
/// Delivered through an unbounded channel; the thread draining
/// [`crate::AttachSession::events`] is the front end's UI context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Text of an informational message from the target
    Output(String),
    /// A registered breakpoint was reached
    Suspended(SuspendContext),
    /// The target stopped at a location without a registered breakpoint
    UnmatchedBreak {
        name: String,
        line: Line,
        file: Option<FileIdentity>,
    },
    /// The session is over
    Ended,
}

#[derive(Debug)]
struct SessionStateInner {
    run_state: RunState,
    loaded_scripts: HashMap<FileIdentity, ScriptIndex>,
}

/// State shared between the session and the receive loop
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    inner: Arc<Mutex<SessionStateInner>>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionStateInner {
                run_state: RunState::Running,
                loaded_scripts: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionStateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    /// Move to `to`, unless the session already ended
    ///
    /// Returns whether the state changed.
    pub(crate) fn transition(&self, to: RunState) -> bool {
        let mut inner = self.lock();
        match inner.run_state {
            RunState::Ended => false,
            from if from == to => false,
            from => {
                tracing::debug!(?from, ?to, "run state transition");
                inner.run_state = to;
                true
            }
        }
    }

    /// Enter `Suspended` for a break, unless the session already ended
    ///
    /// Succeeds when already suspended: every break is a new stop.
    pub(crate) fn suspend(&self) -> bool {
        let mut inner = self.lock();
        match inner.run_state {
            RunState::Ended => false,
            from => {
                if from != RunState::Suspended {
                    tracing::debug!(?from, to = ?RunState::Suspended, "run state transition");
                }
                inner.run_state = RunState::Suspended;
                true
            }
        }
    }

    pub(crate) fn script_loaded(&self, file: FileIdentity, index: ScriptIndex) {
        let previous = self.lock().loaded_scripts.insert(file, index);
        if let Some(previous) = previous {
            tracing::debug!(previous, index, "script reloaded");
        }
    }

    pub(crate) fn script_index(&self, file: &FileIdentity) -> Option<ScriptIndex> {
        self.lock().loaded_scripts.get(file).copied()
    }

    pub(crate) fn loaded_scripts(&self) -> Vec<(FileIdentity, ScriptIndex)> {
        let mut scripts: Vec<_> = self
            .lock()
            .loaded_scripts
            .iter()
            .map(|(file, index)| (file.clone(), *index))
            .collect();
        scripts.sort();
        scripts
    }
}
