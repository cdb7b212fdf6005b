//! Breakpoints registered by the front end
//!
//! The registry is written from the front end's thread and read from the
//! bridge's receive loop. [`DashMap`] gives crash-free iteration concurrent
//! with insertion and removal; readers take sorted snapshots so that what
//! they send to the target does not depend on shard layout.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use transport::Line;

use crate::types::{BreakpointHandle, SourcePosition};

/// Map of source positions to front end breakpoints, unique per position
#[derive(Debug, Clone, Default)]
pub struct BreakpointRegistry {
    entries: Arc<DashMap<SourcePosition, BreakpointHandle>>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` at `position`, returning the handle it replaced
    pub fn register(
        &self,
        position: SourcePosition,
        handle: BreakpointHandle,
    ) -> Option<BreakpointHandle> {
        let previous = self.entries.insert(position, handle);
        if let Some(previous) = previous {
            tracing::debug!(%previous, %handle, "replacing breakpoint");
        }
        previous
    }

    /// Remove every position registered for `handle`
    ///
    /// Returns `false` if the handle was not registered.
    pub fn unregister(&self, handle: BreakpointHandle) -> bool {
        let positions: Vec<SourcePosition> = self
            .entries
            .iter()
            .filter(|entry| *entry.value() == handle)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = false;
        for position in positions {
            // the position may have been re-registered to another handle meanwhile
            removed |= self
                .entries
                .remove_if(&position, |_, current| *current == handle)
                .is_some();
        }
        removed
    }

    /// Remove whatever breakpoint is registered at `position`
    pub fn unregister_at(&self, position: &SourcePosition) -> Option<BreakpointHandle> {
        self.entries.remove(position).map(|(_, handle)| handle)
    }

    /// The breakpoint registered at exactly `file`:`line`
    pub fn find(&self, file: &Path, line: Line) -> Option<BreakpointHandle> {
        let position = SourcePosition::new(file, line);
        self.entries.get(&position).map(|entry| *entry.value())
    }

    /// Lines with a breakpoint in `file`, ascending
    pub fn lines_in(&self, file: &Path) -> Vec<Line> {
        let mut lines: Vec<Line> = self
            .entries
            .iter()
            .filter(|entry| entry.key().is_in(file))
            .map(|entry| entry.key().line)
            .collect();
        lines.sort_unstable();
        lines
    }

    /// All registered breakpoints ordered by position
    pub fn snapshot(&self) -> Vec<(SourcePosition, BreakpointHandle)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort();
        entries
    }

    pub fn contains(&self, position: &SourcePosition) -> bool {
        self.entries.contains_key(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
