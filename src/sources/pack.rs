use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

use super::{Discovery, FragmentSource, list_dirs, scan_namespace};

/// A reloadable pack laid out as `<root>/<namespace>/<folder>/...`.
#[derive(Debug, Clone)]
pub struct PackDirSource {
    name: String,
    root: PathBuf,
}

impl PackDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: format!("pack:{}", root.display()),
            root,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FragmentSource for PackDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self, folder: &str, extension: &str) -> io::Result<Discovery> {
        let mut found = Discovery::default();
        for namespace in list_dirs(&self.root, &mut found).await? {
            let base = self.root.join(&namespace);
            found.extend(scan_namespace(&namespace, &base, folder, extension, false).await);
        }
        found.sort();
        Ok(found)
    }
}
