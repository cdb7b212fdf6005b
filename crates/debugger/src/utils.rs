use std::{borrow::Cow, path::Path};

/// Expand a leading `~` to the user's home directory
pub fn normalise_path(path: &Path) -> Cow<'_, Path> {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped));
        }
        tracing::warn!("cannot determine home directory, using path as-is");
    }
    Cow::Borrowed(path)
}

/// Turn a chunk name reported by the interpreter into a relative or absolute path string
///
/// Chunk names for files are prefixed with `@`, and targets built on Windows
/// report `\` separators.
pub fn script_name_to_path(name: &str) -> String {
    let name = name.strip_prefix('@').unwrap_or(name);
    name.replace('\\', "/")
}
