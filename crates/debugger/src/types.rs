use std::path::{Path, PathBuf};

use transport::Line;

/// Identity of a source file, its canonical path
pub type FileIdentity = PathBuf;

/// A line in a source file, used to key breakpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePosition {
    pub file: FileIdentity,
    pub line: Line,
}

impl SourcePosition {
    pub fn new(file: impl Into<FileIdentity>, line: Line) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn is_in(&self, file: &Path) -> bool {
        self.file == file
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Opaque reference to a breakpoint owned by the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointHandle(pub u64);

impl std::fmt::Display for BreakpointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The process a session is attached to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessInfo {
    pub pid: Option<u32>,
    pub name: String,
}
