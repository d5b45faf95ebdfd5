//! Integration tests for building a registry and pipelines from configuration.

use datadict::codec::ValueType;
use datadict::config::{CatalogFile, ConfigInitializer, ConfigLoader, ConfigPaths};
use datadict::identifier::Identifier;
use datadict::registry::DictRegistry;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn id(s: &str) -> Identifier {
    s.parse().unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Project config pointing at packs, static data and a catalog inside `root`.
fn project_fixture(root: &Path) {
    write(
        root,
        "catalog.yaml",
        r#"
kinds:
  block:
    entries: [geo:stone, geo:granite, geo:dirt]
    tags:
      geo:rocks: [geo:stone, geo:granite]
"#,
    );
    write(
        root,
        "project/config.yaml",
        &format!(
            r#"
catalog: {root}/catalog.yaml
sources:
  packs: [{root}/pack]
  static_root: {root}/game
dicts:
  - kind: block
    id: geo:hardness
    type: int
  - kind: block
    id: geo:hardness
    type: int
    scope: static
"#,
            root = root.display()
        ),
    );
    write(
        root,
        "pack/geo/dicts/block/hardness.json",
        r##"{"values": {"#geo:rocks": 3}}"##,
    );
    write(
        root,
        "game/static_data/content/geo/dicts/block/hardness.json",
        r#"{"values": {"geo:dirt": 1}}"#,
    );
}

mod config_pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn config_drives_registry_and_both_pipelines() {
        let temp = TempDir::new().unwrap();
        project_fixture(temp.path());

        let loader = ConfigLoader::load_tiers(ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        ))
        .unwrap();
        let config = loader.into_config();

        let catalogs = CatalogFile::load(config.catalog.as_ref().unwrap())
            .unwrap()
            .into_catalogs();
        let init = ConfigInitializer::new(catalogs, config.dicts.clone());
        let registry = DictRegistry::bootstrap(&[&init]);
        assert_eq!(registry.dict_count(), 2);

        let statics = config.static_pipeline().unwrap();
        assert!(statics.load_static(&registry).await.is_clean());
        let report = config.pack_pipeline().reload(&registry).await;
        assert!(report.is_clean(), "{:?}", report.errors);

        let packed = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        let fixed = registry
            .get_static_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        assert_eq!(packed.get_int(&id("geo:granite")), Some(3));
        assert!(!packed.contains(&id("geo:dirt")));
        assert_eq!(fixed.get_int(&id("geo:dirt")), Some(1));
        assert_eq!(fixed.len(), 1);
    }

    #[test]
    fn user_tier_replaces_dict_declarations() {
        let temp = TempDir::new().unwrap();
        project_fixture(temp.path());
        write(
            temp.path(),
            "user/config.yaml",
            r#"
dicts:
  - kind: block
    id: geo:names
    type: string
"#,
        );

        let config = ConfigLoader::load_tiers(ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        ))
        .unwrap()
        .into_config();

        // Arrays are replaced whole; the catalog from the project tier stays.
        assert_eq!(config.dicts.len(), 1);
        assert_eq!(config.dicts[0].id, id("geo:names"));
        assert!(config.catalog.is_some());
        assert_eq!(config.sources.packs.len(), 1);
    }

    #[test]
    fn catalog_file_with_bad_identifier_fails() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "catalog.yaml",
            "kinds:\n  block:\n    entries: [stone]\n",
        );
        assert!(CatalogFile::load(&temp.path().join("catalog.yaml")).is_err());
    }
}
