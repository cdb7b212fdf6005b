//! Attach-mode debugging session
//!
//! Connects the breakpoints a front end registers with the scripts an
//! attached interpreter loads, and turns the interpreter's stops into
//! [`Event`]s for the front end.
mod internals;
mod registry;
mod resolver;
mod session;
mod state;
mod types;
pub mod utils;

pub use registry::BreakpointRegistry;
pub use resolver::{FileResolver, SearchPathResolver};
pub use session::{AttachSession, SessionOptions};
pub use state::{Event, RunState, SuspendContext};
pub use types::{BreakpointHandle, FileIdentity, ProcessInfo, SourcePosition};

pub use config::UnmatchedBreakPolicy;
