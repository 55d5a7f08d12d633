//! Read-only asset map.
//!
//! Built once at startup from the public root and every mounted directory;
//! never mutated while serving.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use axum::http::HeaderValue;
use bytes::Bytes;

/// One servable file.
#[derive(Debug, Clone)]
pub struct Asset {
    pub body: Bytes,
    pub content_type: HeaderValue,
}

/// URL path → asset.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    assets: HashMap<String, Asset>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset under an absolute URL path. The content type is
    /// guessed from the extension.
    pub fn insert(&mut self, path: impl Into<String>, body: impl Into<Bytes>) {
        let path = path.into();
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        let content_type = HeaderValue::from_str(mime.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        self.assets.insert(
            path,
            Asset {
                body: body.into(),
                content_type,
            },
        );
    }

    /// Recursively load `dir` so that `dir/a/b.js` is served at `<prefix>a/b.js`.
    ///
    /// `prefix` must start and end with `/`. A missing directory loads
    /// nothing. Symlinks are followed; a directory already visited on the
    /// current path is not entered again. Returns the number of files loaded.
    pub fn load_dir(&mut self, prefix: &str, dir: &Path) -> std::io::Result<usize> {
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), prefix, "Static directory not found, skipping");
            return Ok(0);
        }
        let loaded = self.load_tree(prefix, dir, &mut HashSet::new())?;
        tracing::info!(dir = %dir.display(), prefix, files = loaded, "Static directory loaded");
        Ok(loaded)
    }

    fn load_tree(
        &mut self,
        prefix: &str,
        dir: &Path,
        ancestors: &mut HashSet<PathBuf>,
    ) -> std::io::Result<usize> {
        let real = fs::canonicalize(dir)?;
        if !ancestors.insert(real.clone()) {
            tracing::warn!(dir = %dir.display(), "Skipping symlink cycle");
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!(path = %path.display(), "Skipping non UTF-8 file name");
                continue;
            };
            // Follows symlinks, which vendored package trees use heavily.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if metadata.is_dir() {
                loaded += self.load_tree(&format!("{prefix}{name}/"), &path, ancestors)?;
            } else if metadata.is_file() {
                self.insert(format!("{prefix}{name}"), fs::read(&path)?);
                loaded += 1;
            } else {
                tracing::debug!(path = %path.display(), "Skipping special file");
            }
        }

        ancestors.remove(&real);
        Ok(loaded)
    }

    /// Resolve a request path. Directory paths resolve to their `index.html`.
    pub fn resolve(&self, path: &str) -> Option<&Asset> {
        if path.ends_with('/') {
            self.assets.get(&format!("{path}index.html"))
        } else {
            self.assets.get(path)
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
