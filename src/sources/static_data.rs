use async_trait::async_trait;
use std::io;
use std::path::PathBuf;

use super::{Discovery, FragmentSource, list_dirs, scan_namespace};

const STATIC_DIR: &str = "static_data";
const SHARED_DIR: &str = "content";

/// One-shot static data.
///
/// Each contributor owns `<contributor root>/static_data/<folder>/...` under
/// its own namespace. The shared area `<shared root>/static_data/content/
/// <namespace>/<folder>/...` can add data for any namespace. Relative paths
/// are lower-cased with spaces turned into underscores.
#[derive(Debug, Clone, Default)]
pub struct StaticDataSource {
    contributors: Vec<(String, PathBuf)>,
    shared_root: Option<PathBuf>,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contributor(mut self, namespace: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.contributors.push((namespace.into(), root.into()));
        self
    }

    pub fn with_shared_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.shared_root = Some(root.into());
        self
    }
}

#[async_trait]
impl FragmentSource for StaticDataSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn discover(&self, folder: &str, extension: &str) -> io::Result<Discovery> {
        let mut found = Discovery::default();

        for (namespace, root) in &self.contributors {
            let base = root.join(STATIC_DIR);
            found.extend(scan_namespace(namespace, &base, folder, extension, true).await);
        }

        if let Some(shared) = &self.shared_root {
            let content = shared.join(STATIC_DIR).join(SHARED_DIR);
            // Contributors already found stay usable if the shared area is unreadable.
            let namespaces = match list_dirs(&content, &mut found).await {
                Ok(namespaces) => namespaces,
                Err(err) => {
                    found.fail(None, content.clone(), err);
                    Vec::new()
                }
            };
            for namespace in namespaces {
                let base = content.join(&namespace);
                found.extend(scan_namespace(&namespace, &base, folder, extension, true).await);
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"{}").unwrap();
    }

    #[tokio::test]
    async fn test_contributors_then_shared_area() {
        let dir = TempDir::new().unwrap();
        let modroot = dir.path().join("mods/mymod");
        let game = dir.path().join("game");
        touch(&modroot.join("static_data/dicts/block/Hard Rocks.json"));
        touch(&game.join("static_data/content/other/dicts/block/extra.json"));
        touch(&game.join("static_data/content/mymod/dicts/block/more.json"));

        let source = StaticDataSource::new()
            .with_contributor("mymod", &modroot)
            .with_shared_root(&game);
        let ids: Vec<String> = source
            .discover("dicts/block", "json")
            .await
            .unwrap()
            .files
            .iter()
            .map(|f| f.identifier.to_string())
            .collect();

        assert_eq!(
            ids,
            vec![
                "mymod:dicts/block/hard_rocks.json",
                "mymod:dicts/block/more.json",
                "other:dicts/block/extra.json",
            ]
        );
    }
}
