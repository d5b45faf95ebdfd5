//! Two-phase reload: load every fragment, then apply them to the registry.
//!
//! `load` reads and parses files on one tokio task per source and never
//! touches a dict. `apply` is synchronous. It stages every affected dict,
//! applies fragments in source order then path order, and publishes each
//! dict in one swap at the end of its kind.

pub mod watcher;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::catalog::Entry;
use crate::dict::{Dict, DictStage};
use crate::error::{DictError, ErrorCode};
use crate::fragment::{Fragment, FragmentFormat};
use crate::identifier::Identifier;
use crate::registry::{DictRegistry, DictScope};
use crate::sources::{FragmentSource, SourceFile};

/// Top-level folder holding dict fragments.
pub const DICT_FOLDER: &str = "dicts";

/// Folder holding the fragments of one kind, e.g. `dicts/block`.
pub fn dict_folder(kind: &str) -> String {
    format!("{}/{}", DICT_FOLDER, kind)
}

/// Target dict of a fragment resource: `ns:dicts/<kind>/<rel>.<ext>`
/// targets `ns:<rel>`.
pub fn dict_id_for(resource: &Identifier, kind: &str, extension: &str) -> Option<Identifier> {
    let prefix = format!("{}/", dict_folder(kind));
    let suffix = format!(".{}", extension);
    let relative = resource
        .path()
        .strip_prefix(&prefix)?
        .strip_suffix(&suffix)?;
    if relative.is_empty() {
        return None;
    }
    resource.with_path(relative).ok()
}

/// How staged dicts start out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Reloadable dicts start empty; dicts without fragments end up empty.
    Rebuild,
    /// Static dicts keep their current values.
    Additive,
}

impl ApplyMode {
    pub fn scope(&self) -> DictScope {
        match self {
            ApplyMode::Rebuild => DictScope::Reloadable,
            ApplyMode::Additive => DictScope::Static,
        }
    }
}

/// One parsed fragment file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub source: String,
    pub resource: Identifier,
    pub dict: Identifier,
    pub fragment: Fragment,
}

/// Problem recorded during a cycle, with the file it came from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReloadError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Identifier>,
    #[serde(flatten)]
    pub error: DictError,
}

impl ReloadError {
    fn new(error: DictError) -> Self {
        Self {
            source: None,
            file: None,
            error,
        }
    }

    fn in_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    fn in_file(mut self, file: &Identifier) -> Self {
        self.file = Some(file.clone());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }
}

impl fmt::Display for ReloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.file) {
            (Some(source), Some(file)) => write!(f, "{} ({}): {}", file, source, self.error),
            (None, Some(file)) => write!(f, "{}: {}", file, self.error),
            (Some(source), None) => write!(f, "({}): {}", source, self.error),
            (None, None) => write!(f, "{}", self.error),
        }
    }
}

/// Snapshot produced by [`ReloadPipeline::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadedFragments {
    /// Every requested kind, with its files in application order.
    pub kinds: BTreeMap<String, Vec<LoadedFile>>,
    pub errors: Vec<ReloadError>,
}

impl LoadedFragments {
    pub fn file_count(&self) -> usize {
        self.kinds.values().map(Vec::len).sum()
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReloadReport {
    pub kinds: Vec<String>,
    pub dicts_rebuilt: usize,
    pub fragments_applied: usize,
    pub errors: Vec<ReloadError>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors that only cost a fragment its remaining keys.
    pub fn merge_error_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|err| err.code().is_merge_error())
            .count()
    }
}

/// Output of one source task.
struct SourceScan {
    index: usize,
    files: Vec<(String, LoadedFile)>,
    errors: Vec<ReloadError>,
}

pub struct ReloadPipeline {
    sources: Vec<Arc<dyn FragmentSource>>,
    format: FragmentFormat,
}

impl ReloadPipeline {
    pub fn new(format: FragmentFormat) -> Self {
        Self {
            sources: Vec::new(),
            format,
        }
    }

    /// Add a source. Sources added later apply later.
    pub fn with_source(mut self, source: Arc<dyn FragmentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn format(&self) -> FragmentFormat {
        self.format
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Read and parse every fragment of `kinds` from every source.
    pub async fn load(&self, kinds: &[String]) -> LoadedFragments {
        let mut tasks = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let kinds = kinds.to_vec();
            let format = self.format;
            tasks.spawn(async move { scan_source(index, source, kinds, format).await });
        }

        let mut scans = Vec::with_capacity(self.sources.len());
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(scan) => scans.push(scan),
                Err(err) => {
                    error!("Fragment source task failed: {}", err);
                    errors.push(ReloadError::new(DictError::io("fragment source", err)));
                }
            }
        }
        scans.sort_by_key(|scan| scan.index);

        let mut loaded = LoadedFragments {
            kinds: kinds.iter().map(|k| (k.clone(), Vec::new())).collect(),
            errors,
        };
        for scan in scans {
            for (kind, file) in scan.files {
                loaded.kinds.entry(kind).or_default().push(file);
            }
            loaded.errors.extend(scan.errors);
        }
        debug!(
            files = loaded.file_count(),
            errors = loaded.errors.len(),
            "Loaded dict fragments"
        );
        loaded
    }

    /// Apply a loaded snapshot to the dicts of `mode`'s scope.
    pub fn apply<E: Entry>(
        &self,
        registry: &DictRegistry<E>,
        loaded: LoadedFragments,
        mode: ApplyMode,
    ) -> ReloadReport {
        let scope = mode.scope();
        let mut report = ReloadReport {
            kinds: loaded.kinds.keys().cloned().collect(),
            errors: loaded.errors,
            ..ReloadReport::default()
        };

        for (kind, files) in loaded.kinds {
            if registry.kind(&kind).is_none() {
                let err = DictError::unknown_kind(&kind);
                warn!(kind = %kind, "Skipping fragments: {}", err);
                report.errors.push(ReloadError::new(err));
                continue;
            }

            let mut stages: BTreeMap<Identifier, (Arc<Dict<E>>, DictStage<E>)> = BTreeMap::new();
            if mode == ApplyMode::Rebuild {
                for dict in registry.dicts(scope, &kind) {
                    let stage = dict.begin_rebuild();
                    stages.insert(dict.id().clone(), (dict, stage));
                }
            }

            for file in files {
                let Some(dict) = registry.find_dict(scope, &kind, &file.dict) else {
                    let err = DictError::unregistered_dict(&kind, &file.dict);
                    error!(kind = %kind, dict = %file.dict, source = %file.source, "{}", err);
                    report.errors.push(
                        ReloadError::new(err)
                            .in_source(&file.source)
                            .in_file(&file.resource),
                    );
                    continue;
                };

                let (dict, stage) = stages
                    .entry(file.dict.clone())
                    .or_insert_with(|| {
                        let stage = dict.begin_update();
                        (dict, stage)
                    });
                match dict.apply_to_stage(stage, &file.fragment) {
                    Ok(written) => {
                        report.fragments_applied += 1;
                        debug!(
                            kind = %kind,
                            dict = %file.dict,
                            file = %file.resource,
                            written,
                            "Applied fragment"
                        );
                    }
                    Err(err) => {
                        error!(
                            kind = %kind,
                            dict = %file.dict,
                            file = %file.resource,
                            source = %file.source,
                            "Failed to apply fragment: {}",
                            err
                        );
                        report.errors.push(
                            ReloadError::new(err)
                                .in_source(&file.source)
                                .in_file(&file.resource),
                        );
                    }
                }
            }

            for (_, (dict, stage)) in stages {
                debug!(kind = %kind, dict = %dict.id(), entries = stage.len(), "Publishing dict");
                dict.commit(stage);
                report.dicts_rebuilt += 1;
            }
        }

        report
    }

    /// Rebuild every reloadable dict from the sources.
    pub async fn reload<E: Entry>(&self, registry: &DictRegistry<E>) -> ReloadReport {
        let loaded = self.load(&registry.kind_names()).await;
        let report = self.apply(registry, loaded, ApplyMode::Rebuild);
        log_report("Reloaded dicts", &report);
        report
    }

    /// Add the sources' fragments to the static dicts.
    pub async fn load_static<E: Entry>(&self, registry: &DictRegistry<E>) -> ReloadReport {
        let loaded = self.load(&registry.kind_names()).await;
        let report = self.apply(registry, loaded, ApplyMode::Additive);
        log_report("Loaded static dicts", &report);
        report
    }
}

impl fmt::Debug for ReloadPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadPipeline")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("format", &self.format)
            .finish()
    }
}

fn log_report(what: &str, report: &ReloadReport) {
    if report.is_clean() {
        info!(
            kinds = report.kinds.len(),
            dicts = report.dicts_rebuilt,
            fragments = report.fragments_applied,
            "{}",
            what
        );
    } else {
        warn!(
            kinds = report.kinds.len(),
            dicts = report.dicts_rebuilt,
            fragments = report.fragments_applied,
            errors = report.errors.len(),
            merge_errors = report.merge_error_count(),
            "{} with errors",
            what
        );
    }
}

/// Discover, read and parse one source's fragments for every kind.
async fn scan_source(
    index: usize,
    source: Arc<dyn FragmentSource>,
    kinds: Vec<String>,
    format: FragmentFormat,
) -> SourceScan {
    let name = source.name().to_string();
    let extension = format.extension();
    let mut scan = SourceScan {
        index,
        files: Vec::new(),
        errors: Vec::new(),
    };

    for kind in kinds {
        let folder = dict_folder(&kind);
        let discovered = match source.discover(&folder, extension).await {
            Ok(discovery) => discovery,
            Err(err) => {
                let err = DictError::io(format!("{} in {}", folder, name), err).with_kind(&kind);
                error!(kind = %kind, source = %name, "{}", err);
                scan.errors.push(ReloadError::new(err).in_source(&name));
                continue;
            }
        };

        for failure in discovered.failures {
            let err = DictError::io(failure.location.display(), failure.error).with_kind(&kind);
            error!(kind = %kind, source = %name, "{}", err);
            let mut reported = ReloadError::new(err).in_source(&name);
            if let Some(file) = &failure.identifier {
                reported = reported.in_file(file);
            }
            scan.errors.push(reported);
        }

        for file in discovered.files {
            match read_file(source.as_ref(), &file, &kind, format).await {
                Ok(loaded) => scan.files.push((kind.clone(), loaded.with_source(&name))),
                Err(err) => {
                    let err = err.with_kind(&kind);
                    error!(kind = %kind, source = %name, file = %file.identifier, "{}", err);
                    scan.errors.push(
                        ReloadError::new(err)
                            .in_source(&name)
                            .in_file(&file.identifier),
                    );
                }
            }
        }
    }

    scan
}

async fn read_file(
    source: &dyn FragmentSource,
    file: &SourceFile,
    kind: &str,
    format: FragmentFormat,
) -> Result<LoadedFile, DictError> {
    let dict = dict_id_for(&file.identifier, kind, format.extension()).ok_or_else(|| {
        DictError::syntax(format!("Cannot derive a dict id from {}", file.identifier))
    })?;
    let bytes = source
        .read(file)
        .await
        .map_err(|err| DictError::io(file.location.display(), err))?;
    let fragment = format.parse(&bytes).map_err(|err| err.with_dict(&dict))?;
    Ok(LoadedFile {
        source: String::new(),
        resource: file.identifier.clone(),
        dict,
        fragment,
    })
}

impl LoadedFile {
    fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}
