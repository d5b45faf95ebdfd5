//! Integration tests for loading fragments from disk and applying them.

use datadict::catalog::MemoryCatalog;
use datadict::codec::ValueType;
use datadict::error::ErrorCode;
use datadict::fragment::FragmentFormat;
use datadict::identifier::Identifier;
use datadict::registry::DictRegistry;
use datadict::reload::{ApplyMode, ReloadPipeline};
use datadict::sources::{PackDirSource, StaticDataSource};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn id(s: &str) -> Identifier {
    s.parse().unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn catalog() -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.extend_entries([id("geo:stone"), id("geo:granite"), id("geo:dirt")]);
    catalog.set_tag(id("geo:rocks"), vec![id("geo:stone"), id("geo:granite")]);
    catalog
}

fn registry_with(catalog: Arc<MemoryCatalog>) -> DictRegistry<Identifier> {
    let mut registry = DictRegistry::new();
    registry
        .register_kind("block", catalog.clone(), catalog)
        .unwrap();
    registry
        .register_dict(id("geo:hardness"), "block", ValueType::INT)
        .unwrap();
    registry
        .register_dict(id("geo:names"), "block", ValueType::STRING)
        .unwrap();
    registry
        .register_static_dict(id("geo:hardness"), "block", ValueType::INT)
        .unwrap();
    registry
}

fn pack_pipeline(roots: &[&Path]) -> ReloadPipeline {
    roots.iter().fold(ReloadPipeline::new(FragmentFormat::Json), |p, root| {
        p.with_source(Arc::new(PackDirSource::new(*root)))
    })
}

mod reload_tests {
    use super::*;

    #[tokio::test]
    async fn later_packs_apply_after_earlier_ones() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let extra = temp.path().join("extra");
        write(
            &base,
            "geo/dicts/block/hardness.json",
            r##"{"values": {"#geo:rocks": 3}}"##,
        );
        write(
            &extra,
            "geo/dicts/block/hardness.json",
            r#"{"override": true, "values": {"geo:stone": 8, "geo:dirt": 1}}"#,
        );

        let registry = registry_with(catalog());
        let report = pack_pipeline(&[&base, &extra]).reload(&registry).await;
        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.fragments_applied, 2);

        let dict = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        assert_eq!(dict.get_int(&id("geo:stone")), Some(8));
        assert_eq!(dict.get_int(&id("geo:granite")), Some(3));
        assert_eq!(dict.get_int(&id("geo:dirt")), Some(1));
    }

    #[tokio::test]
    async fn unregistered_dicts_are_reported_in_file_order() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(&pack, "aaa/dicts/block/names.json", r#"{"values": {"geo:stone": "first"}}"#);
        write(&pack, "zzz/dicts/block/names.json", r#"{"values": {"geo:stone": "second"}}"#);
        // Different namespaces target different dicts; only `geo` is registered.
        write(&pack, "geo/dicts/block/names.json", r#"{"values": {"geo:stone": "a"}}"#);
        write(&pack, "geo/dicts/block/names/extra.json", r#"{"values": {}}"#);

        let registry = registry_with(catalog());
        let report = pack_pipeline(&[&pack]).reload(&registry).await;

        let unregistered: Vec<String> = report
            .errors
            .iter()
            .filter(|e| e.code() == ErrorCode::UnregisteredDict)
            .map(|e| e.error.dict.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(
            unregistered,
            vec!["aaa:names", "geo:names/extra", "zzz:names"]
        );

        let names = registry
            .get_dict("block", &ValueType::STRING, &id("geo:names"))
            .unwrap();
        assert_eq!(names.get_as::<String>(&id("geo:stone")).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn reload_rebuilds_and_empties_dicts_without_fragments() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(&pack, "geo/dicts/block/hardness.json", r#"{"values": {"geo:stone": 2}}"#);
        write(&pack, "geo/dicts/block/names.json", r#"{"values": {"geo:stone": "rock"}}"#);

        let registry = registry_with(catalog());
        let pipeline = pack_pipeline(&[&pack]);
        pipeline.reload(&registry).await;

        let hardness = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        let names = registry
            .get_dict("block", &ValueType::STRING, &id("geo:names"))
            .unwrap();
        assert_eq!(hardness.get_int(&id("geo:stone")), Some(2));
        assert_eq!(names.len(), 1);

        fs::remove_file(pack.join("geo/dicts/block/names.json")).unwrap();
        write(&pack, "geo/dicts/block/hardness.json", r#"{"values": {"geo:dirt": 5}}"#);
        let report = pipeline.reload(&registry).await;

        assert!(report.is_clean());
        assert_eq!(report.dicts_rebuilt, 2);
        assert!(names.is_empty());
        assert!(!hardness.contains(&id("geo:stone")));
        assert_eq!(hardness.get_int(&id("geo:dirt")), Some(5));
    }

    #[tokio::test]
    async fn broken_files_are_isolated() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(&pack, "geo/dicts/block/hardness.json", "{ not json");
        write(&pack, "geo/dicts/block/names.json", r#"{"values": {"geo:nope": "x", "geo:stone": "y"}}"#);
        write(&pack, "more/dicts/block/ignored.txt", "whatever");

        let catalog = catalog();
        let mut registry = registry_with(catalog);
        registry
            .register_dict(id("more:ignored"), "block", ValueType::INT)
            .unwrap();

        let report = pack_pipeline(&[&pack]).reload(&registry).await;
        let codes: Vec<ErrorCode> = report.errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec![ErrorCode::SyntaxError, ErrorCode::UnknownEntry]);
        assert_eq!(
            report.errors[0].file,
            Some(id("geo:dicts/block/hardness.json"))
        );
        assert_eq!(report.fragments_applied, 0);

        let names = registry
            .get_dict("block", &ValueType::STRING, &id("geo:names"))
            .unwrap();
        assert!(names.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_file_fails_alone() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(&pack, "geo/dicts/block/hardness.json", r#"{"values": {"geo:stone": 3}}"#);
        std::os::unix::fs::symlink(
            temp.path().join("deleted.json"),
            pack.join("geo/dicts/block/stale.json"),
        )
        .unwrap();

        let registry = registry_with(catalog());
        let report = pack_pipeline(&[&pack]).reload(&registry).await;

        assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
        assert_eq!(report.errors[0].code(), ErrorCode::IoFailure);
        assert_eq!(
            report.errors[0].file,
            Some(id("geo:dicts/block/stale.json"))
        );
        assert_eq!(report.fragments_applied, 1);

        let dict = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        assert_eq!(dict.get_int(&id("geo:stone")), Some(3));
    }

    #[tokio::test]
    async fn load_snapshot_lists_every_kind() {
        let temp = TempDir::new().unwrap();
        let pipeline = pack_pipeline(&[&temp.path().join("missing")]);
        let loaded = pipeline
            .load(&["block".to_string(), "item".to_string()])
            .await;
        assert_eq!(loaded.kinds.len(), 2);
        assert_eq!(loaded.file_count(), 0);
        assert!(loaded.errors.is_empty());
    }

    #[tokio::test]
    async fn yaml_pipeline_reads_yaml_fragments() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(&pack, "geo/dicts/block/hardness.yaml", "values:\n  \"#geo:rocks\": 6\n");
        write(&pack, "geo/dicts/block/hardness.json", r#"{"values": {"geo:dirt": 1}}"#);

        let registry = registry_with(catalog());
        let pipeline = ReloadPipeline::new(FragmentFormat::Yaml)
            .with_source(Arc::new(PackDirSource::new(&pack)));
        let report = pipeline.reload(&registry).await;
        assert!(report.is_clean());

        let dict = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        assert_eq!(dict.get_int(&id("geo:granite")), Some(6));
        assert!(!dict.contains(&id("geo:dirt")));
    }
}

mod static_data_tests {
    use super::*;

    #[tokio::test]
    async fn static_data_is_additive_and_survives_reloads() {
        let temp = TempDir::new().unwrap();
        let modroot = temp.path().join("mods/geo");
        let game = temp.path().join("game");
        let pack = temp.path().join("pack");
        write(&modroot, "static_data/dicts/block/Hardness.json", r#"{"values": {"geo:stone": 1}}"#);
        write(
            &game,
            "static_data/content/geo/dicts/block/hardness.json",
            r#"{"values": {"geo:stone": 99, "geo:dirt": 2}}"#,
        );
        write(&pack, "geo/dicts/block/hardness.json", r#"{"values": {"geo:granite": 7}}"#);

        let registry = registry_with(catalog());
        let statics = ReloadPipeline::new(FragmentFormat::Json).with_source(Arc::new(
            StaticDataSource::new()
                .with_contributor("geo", &modroot)
                .with_shared_root(&game),
        ));
        let report = statics.load_static(&registry).await;
        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.fragments_applied, 2);

        let fixed = registry
            .get_static_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        // Contributor data applies first; the shared area does not override it.
        assert_eq!(fixed.get_int(&id("geo:stone")), Some(1));
        assert_eq!(fixed.get_int(&id("geo:dirt")), Some(2));

        pack_pipeline(&[&pack]).reload(&registry).await;
        assert_eq!(fixed.len(), 2);
        assert!(!fixed.contains(&id("geo:granite")));

        let reloadable = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        assert_eq!(reloadable.get_int(&id("geo:granite")), Some(7));
        assert!(!reloadable.contains(&id("geo:stone")));

        // A second static pass adds without clearing.
        let report = ReloadPipeline::new(FragmentFormat::Json)
            .with_source(Arc::new(StaticDataSource::new().with_contributor("geo", &modroot)))
            .load_static(&registry)
            .await;
        assert!(report.is_clean());
        assert_eq!(fixed.get_int(&id("geo:dirt")), Some(2));
    }
}

mod lazy_tag_tests {
    use super::*;

    #[tokio::test]
    async fn tags_resolve_once_source_is_ready() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(
            &pack,
            "geo/dicts/block/hardness.json",
            r##"{"values": {"geo:stone": 1, "#geo:rocks": 4, "#geo:gems": 9}}"##,
        );

        let catalog = Arc::new(MemoryCatalog::with_deferred_tags());
        catalog.extend_entries([id("geo:stone"), id("geo:granite")]);
        catalog.set_tag(id("geo:rocks"), vec![id("geo:stone"), id("geo:granite")]);
        let registry = registry_with(catalog.clone());

        let report = pack_pipeline(&[&pack]).reload(&registry).await;
        assert!(report.is_clean());

        let dict = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        assert_eq!(dict.pending_tags().len(), 2);
        assert_eq!(dict.len(), 1);

        catalog.mark_tags_ready();
        assert_eq!(dict.get_int(&id("geo:granite")), Some(4));
        assert_eq!(dict.get_int(&id("geo:stone")), Some(1));
        // The unknown tag was reported and dropped.
        assert!(dict.pending_tags().is_empty());
        assert_eq!(dict.len(), 2);
    }

    #[tokio::test]
    async fn apply_accepts_preloaded_snapshot() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("pack");
        write(&pack, "geo/dicts/block/hardness.json", r#"{"values": {"geo:dirt": 3}}"#);

        let registry = registry_with(catalog());
        let pipeline = pack_pipeline(&[&pack]);
        let loaded = pipeline.load(&registry.kind_names()).await;

        let dict = registry
            .get_dict("block", &ValueType::INT, &id("geo:hardness"))
            .unwrap();
        // Loading alone never touches a dict.
        assert!(dict.is_empty());

        let report = pipeline.apply(&registry, loaded, ApplyMode::Rebuild);
        assert_eq!(report.kinds, vec!["block"]);
        assert_eq!(dict.get_int(&id("geo:dirt")), Some(3));
    }
}
