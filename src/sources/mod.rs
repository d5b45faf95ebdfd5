//! Where fragment files come from.
//!
//! A [`FragmentSource`] lists the fragment files of one folder (for example
//! `dicts/block`) and hands out their bytes. Every discovered file is named
//! by a resource identifier `namespace:<folder>/<relative path>.<ext>`.

mod pack;
mod static_data;

pub use pack::PackDirSource;
pub use static_data::StaticDataSource;

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::identifier::{Identifier, IdentifierError};

/// One discovered fragment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// `namespace:<folder>/<relative path>.<ext>`
    pub identifier: Identifier,
    /// Where the bytes live on disk.
    pub location: PathBuf,
}

/// A directory or entry discovery could not inspect.
#[derive(Debug)]
pub struct DiscoveryFailure {
    /// Resource identifier of the entry, when its name is usable.
    pub identifier: Option<Identifier>,
    pub location: PathBuf,
    pub error: io::Error,
}

/// Files found in one folder, plus whatever could not be inspected.
///
/// A failure never hides its siblings.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<SourceFile>,
    pub failures: Vec<DiscoveryFailure>,
}

impl Discovery {
    pub fn extend(&mut self, other: Discovery) {
        self.files.extend(other.files);
        self.failures.extend(other.failures);
    }

    pub(crate) fn fail(&mut self, identifier: Option<Identifier>, location: PathBuf, error: io::Error) {
        warn!(file = %location.display(), "Cannot inspect fragment location: {}", error);
        self.failures.push(DiscoveryFailure {
            identifier,
            location,
            error,
        });
    }

    pub(crate) fn sort(&mut self) {
        self.files.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    }
}

#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// List every file under `folder` ending in `.<extension>`, sorted by
    /// resource identifier. A missing folder yields nothing. `Err` means the
    /// source as a whole could not be listed.
    async fn discover(&self, folder: &str, extension: &str) -> io::Result<Discovery>;

    async fn read(&self, file: &SourceFile) -> io::Result<Vec<u8>> {
        tokio::fs::read(&file.location).await
    }
}

/// Directory of `folder` (written with `/`) below `base`.
pub(crate) fn folder_dir(base: &Path, folder: &str) -> PathBuf {
    folder
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |dir, part| dir.join(part))
}

/// Result of [`walk_files`].
#[derive(Debug, Default)]
pub(crate) struct Walk {
    pub files: Vec<PathBuf>,
    /// Directories that could not be listed.
    pub failures: Vec<(PathBuf, io::Error)>,
}

/// Recursively list files below `dir`, sorted. A missing directory is
/// treated as empty. Each real directory is visited once, so symlink cycles
/// end.
///
/// Entries that cannot be stat'ed (dangling links, link loops) are listed as
/// files. Reading them then fails for that file alone.
pub(crate) async fn walk_files(dir: &Path) -> Walk {
    let mut walk = Walk::default();
    let mut visited = HashSet::new();
    if let Ok(real) = tokio::fs::canonicalize(dir).await {
        visited.insert(real);
    }
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                walk.failures.push((current, err));
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    walk.failures.push((current.clone(), err));
                    break;
                }
            };
            let path = entry.path();
            // Follows symlinks.
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(file = %path.display(), "Cannot stat entry: {}", err);
                    walk.files.push(path);
                    continue;
                }
            };
            if metadata.is_dir() {
                match tokio::fs::canonicalize(&path).await {
                    Ok(real) if visited.insert(real.clone()) => stack.push(path),
                    Ok(_) => debug!(dir = %path.display(), "Skipping directory already walked"),
                    Err(err) => walk.failures.push((path, err)),
                }
            } else if metadata.is_file() {
                walk.files.push(path);
            }
        }
    }

    walk.files.sort();
    walk
}

/// Subdirectory names of `dir`, sorted. A missing directory is empty.
///
/// Entries that cannot be inspected are recorded in `discovery`. Only a
/// failure to list `dir` itself is an `Err`.
pub(crate) async fn list_dirs(dir: &Path, discovery: &mut Discovery) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(names),
        Err(err) => return Err(err),
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                discovery.fail(None, dir.to_path_buf(), err);
                break;
            }
        };
        match tokio::fs::metadata(entry.path()).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => continue,
            Err(err) => {
                discovery.fail(None, entry.path(), err);
                continue;
            }
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Resource identifier of `location` below `root`.
fn resource_for(
    namespace: &str,
    root: &Path,
    folder: &str,
    location: &Path,
    normalize: bool,
) -> Option<Result<Identifier, IdentifierError>> {
    let relative = location.strip_prefix(root).ok()?;
    let mut relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if normalize {
        relative = normalize_path(&relative);
    }
    let folder = folder.trim_matches('/');
    let resource = if relative.is_empty() {
        folder.to_string()
    } else {
        format!("{}/{}", folder, relative)
    };
    Some(Identifier::new(namespace, resource))
}

/// Discover the fragment files of one namespace.
///
/// `base` is the directory that contains `folder`. With `normalize` the
/// relative path is lower-cased and spaces become underscores.
pub(crate) async fn scan_namespace(
    namespace: &str,
    base: &Path,
    folder: &str,
    extension: &str,
    normalize: bool,
) -> Discovery {
    let root = folder_dir(base, folder);
    let walk = walk_files(&root).await;
    let mut found = Discovery::default();

    for (location, err) in walk.failures {
        let identifier = resource_for(namespace, &root, folder, &location, normalize).and_then(Result::ok);
        found.fail(identifier, location, err);
    }

    for location in walk.files {
        if location.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match resource_for(namespace, &root, folder, &location, normalize) {
            Some(Ok(identifier)) => {
                debug!(file = %location.display(), resource = %identifier, "Discovered fragment");
                found.files.push(SourceFile {
                    identifier,
                    location,
                });
            }
            Some(Err(err)) => warn!(
                file = %location.display(),
                namespace = %namespace,
                "Skipping fragment with unusable name: {}",
                err
            ),
            None => continue,
        }
    }

    found.sort();
    found
}

/// Lower-case a relative path and turn spaces into underscores.
pub(crate) fn normalize_path(path: &str) -> String {
    path.to_lowercase().replace(' ', "_")
}
