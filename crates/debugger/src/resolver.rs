//! Mapping script names reported by the target to files on disk

use std::path::{Path, PathBuf};

use crate::types::FileIdentity;
use crate::utils::{normalise_path, script_name_to_path};

/// Resolves a script name reported by the target to a source file
pub trait FileResolver: Send + Sync + 'static {
    fn resolve(&self, name: &str) -> Option<FileIdentity>;
}

impl<F> FileResolver for F
where
    F: Fn(&str) -> Option<FileIdentity> + Send + Sync + 'static,
{
    fn resolve(&self, name: &str) -> Option<FileIdentity> {
        self(name)
    }
}

/// Looks script names up on disk relative to a list of source roots
///
/// The first existing candidate wins and is canonicalised, so breakpoints
/// should be registered with canonical paths too.
#[derive(Debug, Clone)]
pub struct SearchPathResolver {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl SearchPathResolver {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            extensions: vec!["lua".to_string()],
        }
    }

    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = String>) -> Self {
        self.extensions = extensions.into_iter().collect();
        self
    }

    pub fn from_config(config: &config::SourcesConfig) -> Self {
        Self::new(config.roots.iter().cloned()).with_extensions(config.extensions.iter().cloned())
    }

    fn candidates(&self, name: &Path) -> Vec<PathBuf> {
        let mut bases = vec![name.to_path_buf()];
        if name.is_relative() {
            bases.extend(self.roots.iter().map(|root| normalise_path(root).join(name)));
        }

        let mut candidates = Vec::with_capacity(bases.len() * (self.extensions.len() + 1));
        for base in bases {
            let has_extension = base.extension().is_some();
            candidates.push(base.clone());
            if !has_extension {
                candidates.extend(self.extensions.iter().map(|ext| base.with_extension(ext)));
            }
        }
        candidates
    }
}

impl FileResolver for SearchPathResolver {
    fn resolve(&self, name: &str) -> Option<FileIdentity> {
        let name = script_name_to_path(name);
        let name = normalise_path(Path::new(&name)).into_owned();

        let resolved = self
            .candidates(&name)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .and_then(|found| match found.canonicalize() {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!(error = %e, path = %found.display(), "canonicalising source file");
                    None
                }
            });

        match &resolved {
            Some(path) => tracing::trace!(name = %name.display(), path = %path.display(), "resolved script"),
            None => tracing::debug!(name = %name.display(), "could not resolve script"),
        }
        resolved
    }
}
