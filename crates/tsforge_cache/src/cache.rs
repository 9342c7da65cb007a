//! High-level compile cache orchestrator.
//!
//! `CompileCache` ties together the snapshot store, the dependency graph, the
//! two in-memory keyspaces, and the on-disk namespace into the single
//! interface the build driver talks to. Lookups consult memory first, then
//! the persisted artifact named by the manifest, and finally the caller's
//! [`Computable`]. All storage problems degrade to cache misses.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use tsforge_common::{ContentHash, FileId};
use tsforge_config::ConfigFingerprint;
use tsforge_diagnostics::DiagnosticRecord;
use tsforge_source::{SnapshotStore, SourceSnapshot};

use crate::artifact::ArtifactStore;
use crate::computable::Computable;
use crate::entry::{
    CacheKey, CacheRecord, CompiledEntry, DiagnosticKind, DiagnosticsEntry, Keyspace, Stamped,
};
use crate::error::CacheError;
use crate::graph::DependencyGraph;
use crate::manifest::CacheManifest;
use crate::store::{KeyedStore, MemoryStore};

/// What [`CompileCache::done`] did with the current round's results.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing changed since the last flush.
    Clean,
    /// The round was persisted.
    Flushed {
        /// Number of artifacts written.
        artifacts: usize,
    },
    /// Persisting failed. In-memory results are unaffected and the next
    /// flush retries the same entries.
    Failed(CacheError),
}

impl FlushOutcome {
    /// Returns `true` if the flush failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, FlushOutcome::Failed(_))
    }
}

/// Incremental compile cache for one build session.
///
/// Every operation takes `&mut self`: the cache is driven synchronously by a
/// single caller, once per file per round.
pub struct CompileCache {
    /// Root under which every configuration gets its own namespace.
    cache_root: PathBuf,

    /// Directory of the active namespace.
    namespace_dir: PathBuf,

    /// Fingerprint of the active configuration.
    config: ConfigFingerprint,

    /// Compiler service version, recorded in the manifest and artifacts.
    tool_version: String,

    /// Files whose reachable set is walked by [`walk_tree`](Self::walk_tree).
    entry_files: Vec<FileId>,

    snapshots: SnapshotStore,
    graph: DependencyGraph,

    code: MemoryStore<FileId, Stamped<CompiledEntry>>,
    diagnostics: MemoryStore<FileId, Stamped<DiagnosticsEntry>>,

    manifest: CacheManifest,
    store: ArtifactStore,

    /// Slots computed since the last successful flush.
    pending: BTreeSet<(Keyspace, FileId)>,

    /// Fingerprints, generations, or edges changed since the last flush.
    manifest_dirty: bool,

    /// Files with a recorded fingerprint whose text this process has not
    /// seen yet.
    unobserved: BTreeSet<FileId>,
}

impl CompileCache {
    /// Opens the namespace for `config` under `cache_root`.
    ///
    /// A readable manifest for the same configuration is reused, including
    /// its dependency edges. A manifest written for another configuration or
    /// tool version causes the namespace to be wiped. A missing or
    /// unreadable manifest simply starts an empty cache.
    pub fn open(
        cache_root: &Path,
        config: ConfigFingerprint,
        tool_version: &str,
        entry_files: Vec<FileId>,
    ) -> Self {
        let namespace_dir = cache_root.join(config.namespace());
        let mut cache = Self {
            cache_root: cache_root.to_path_buf(),
            store: ArtifactStore::new(&namespace_dir, tool_version),
            namespace_dir,
            config,
            tool_version: tool_version.to_string(),
            entry_files,
            snapshots: SnapshotStore::new(),
            graph: DependencyGraph::new(),
            code: MemoryStore::new(),
            diagnostics: MemoryStore::new(),
            manifest: CacheManifest::new(tool_version, config),
            pending: BTreeSet::new(),
            manifest_dirty: false,
            unobserved: BTreeSet::new(),
        };
        cache.load_namespace();
        cache
    }

    fn load_namespace(&mut self) {
        match CacheManifest::load(&self.namespace_dir) {
            Ok(Some(manifest)) if manifest.is_compatible(&self.tool_version, self.config) => {
                info!(
                    "loaded compile cache {} ({} files, {} edges)",
                    self.config,
                    manifest.files.len(),
                    manifest.edges.len()
                );
                self.graph.extend(manifest.edges.iter().cloned());
                self.unobserved = manifest
                    .files
                    .iter()
                    .filter(|(id, state)| {
                        state.content_fingerprint.is_some()
                            && self.snapshots.get_snapshot(id).is_none()
                    })
                    .map(|(id, _)| id.clone())
                    .collect();
                self.manifest = manifest;
            }
            Ok(Some(manifest)) => {
                info!(
                    "compile cache at {} was written by {} for {}; discarding it",
                    self.namespace_dir.display(),
                    manifest.tool_version,
                    manifest.config
                );
                self.discard_namespace();
            }
            Ok(None) => debug!("no compile cache at {}", self.namespace_dir.display()),
            Err(err) => warn!("ignoring unreadable compile cache: {err}"),
        }
    }

    // ------------------------------------------------------------------
    // Snapshots and dependencies
    // ------------------------------------------------------------------

    /// Records `text` as the current content of `id` and returns its
    /// snapshot.
    ///
    /// When the file's fingerprint differs from the last one recorded for it
    /// (in this process or a previous one), every file connected to it in the
    /// dependency graph has its generation bumped, invalidating their cached
    /// results.
    pub fn set_snapshot(&mut self, id: FileId, text: &str) -> SourceSnapshot {
        let update = self.snapshots.set_snapshot(id, text);
        debug!(
            "snapshot {} v{} ({:?})",
            update.snapshot.id(),
            update.snapshot.version(),
            update.change
        );
        self.unobserved.remove(update.snapshot.id());
        self.record_fingerprint(update.snapshot.id(), update.snapshot.fingerprint());
        update.snapshot
    }

    /// Reads from disk every file connected to `id` that has a recorded
    /// fingerprint but has not been observed by this process.
    ///
    /// A dependency edited while no process was running is thus detected
    /// before any of its dependents is served, whatever order the host
    /// submits files in. Files that cannot be read keep their cached
    /// results.
    fn observe_connected(&mut self, id: &FileId) {
        if self.unobserved.is_empty() {
            return;
        }
        let unseen: Vec<FileId> = self
            .graph
            .reachable_from([id])
            .into_iter()
            .filter(|other| other != id && self.unobserved.contains(other))
            .collect();
        for other in unseen {
            self.unobserved.remove(&other);
            match self.snapshots.read_file(Path::new(other.as_str())) {
                Ok(update) => {
                    debug!("read {other} from disk ({:?})", update.change);
                    self.record_fingerprint(update.snapshot.id(), update.snapshot.fingerprint());
                }
                Err(err) => debug!("cannot read {other}: {err}"),
            }
        }
    }

    fn record_fingerprint(&mut self, id: &FileId, fingerprint: ContentHash) {
        let recorded = self.manifest.content_fingerprint(id);
        if recorded == Some(fingerprint) {
            return;
        }
        self.manifest.file_mut(id).content_fingerprint = Some(fingerprint);
        self.manifest_dirty = true;
        if recorded.is_some() {
            self.bump_generations(id);
        }
    }

    fn bump_generations(&mut self, changed: &FileId) {
        let affected = self.graph.reachable_from([changed]);
        debug!(
            "{} changed; invalidating {} connected file(s)",
            changed,
            affected.len()
        );
        for id in &affected {
            self.manifest.file_mut(id).generation += 1;
        }
    }

    /// Returns the current snapshot of `id`.
    pub fn get_snapshot(&self, id: &FileId) -> Option<&SourceSnapshot> {
        self.snapshots.get_snapshot(id)
    }

    /// The snapshot store.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Records that `dependent`'s semantic correctness depends on
    /// `dependency`.
    pub fn set_dependency(&mut self, dependency: FileId, dependent: FileId) {
        if self.graph.add_edge(dependency, dependent) {
            self.manifest_dirty = true;
        }
    }

    /// The dependency graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Calls `visit` once for every file reachable from the entry files.
    pub fn walk_tree(&self, mut visit: impl FnMut(&FileId)) {
        for id in self.graph.reachable_from(&self.entry_files) {
            visit(&id);
        }
    }

    /// Replaces the entry files used by [`walk_tree`](Self::walk_tree).
    pub fn set_entry_files(&mut self, entry_files: Vec<FileId>) {
        self.entry_files = entry_files;
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn key_for(&self, snapshot: &SourceSnapshot) -> CacheKey {
        CacheKey::new(snapshot.id().clone(), snapshot.fingerprint(), self.config)
    }

    /// Current generation of `id`.
    pub fn generation(&self, id: &FileId) -> u64 {
        self.manifest.generation(id)
    }

    /// Returns the compiled output for `snapshot`, invoking `compute` only if
    /// no live entry exists for its content, configuration, and generation.
    ///
    /// A result signalling failed emission is cached like any other.
    pub fn get_compiled(
        &mut self,
        snapshot: &SourceSnapshot,
        compute: impl Computable<CompiledEntry>,
    ) -> CompiledEntry {
        self.observe_connected(snapshot.id());
        let key = self.key_for(snapshot);
        let generation = self.generation(&key.file);

        let live = ensure_live(
            &mut self.code,
            &self.store,
            &self.manifest,
            Keyspace::Code,
            &key,
            generation,
            |record| record.compiled,
        );
        if live {
            if let Some(stamped) = self.code.get(&key.file) {
                debug!("compiled cache hit for {}", key.file);
                return stamped.value.clone();
            }
        }

        debug!("compiled cache miss for {}", key.file);
        let value = compute.compute();
        self.code.upsert(
            key.file.clone(),
            Stamped::new(key.content, generation, value.clone()),
        );
        self.pending.insert((Keyspace::Code, key.file));
        value
    }

    /// Returns the syntactic diagnostics for `snapshot`, invoking `compute`
    /// only on a miss.
    pub fn get_syntactic_diagnostics(
        &mut self,
        snapshot: &SourceSnapshot,
        compute: impl Computable<Vec<DiagnosticRecord>>,
    ) -> Vec<DiagnosticRecord> {
        self.get_diagnostics(snapshot, DiagnosticKind::Syntactic, compute)
    }

    /// Returns the semantic diagnostics for `snapshot`, invoking `compute`
    /// only on a miss.
    ///
    /// Misses also occur when a connected file changed since the cached
    /// diagnostics were computed, even if `snapshot`'s own text did not.
    pub fn get_semantic_diagnostics(
        &mut self,
        snapshot: &SourceSnapshot,
        compute: impl Computable<Vec<DiagnosticRecord>>,
    ) -> Vec<DiagnosticRecord> {
        self.get_diagnostics(snapshot, DiagnosticKind::Semantic, compute)
    }

    fn get_diagnostics(
        &mut self,
        snapshot: &SourceSnapshot,
        kind: DiagnosticKind,
        compute: impl Computable<Vec<DiagnosticRecord>>,
    ) -> Vec<DiagnosticRecord> {
        self.observe_connected(snapshot.id());
        let key = self.key_for(snapshot);
        let generation = self.generation(&key.file);

        let live = ensure_live(
            &mut self.diagnostics,
            &self.store,
            &self.manifest,
            Keyspace::Diagnostics,
            &key,
            generation,
            |record| record.diagnostics,
        );
        if live {
            if let Some(found) = self
                .diagnostics
                .get(&key.file)
                .and_then(|stamped| stamped.value.get(kind))
            {
                debug!("{kind} diagnostics cache hit for {}", key.file);
                return found.clone();
            }
        }

        debug!("{kind} diagnostics cache miss for {}", key.file);
        let value = compute.compute();
        // A miss on a live entry only fills the missing half. Otherwise
        // `ensure_live` already evicted whatever was there.
        match self.diagnostics.get_mut(&key.file) {
            Some(stamped) => stamped.value.set(kind, value.clone()),
            None => {
                let mut entry = DiagnosticsEntry::default();
                entry.set(kind, value.clone());
                self.diagnostics
                    .upsert(key.file.clone(), Stamped::new(key.content, generation, entry));
            }
        }
        self.pending.insert((Keyspace::Diagnostics, key.file));
        value
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persists everything computed since the last flush.
    ///
    /// Artifacts are written first and the manifest last, each through an
    /// atomic rename. Failures are logged and returned as
    /// [`FlushOutcome::Failed`]; they never affect the values already handed
    /// out for this round.
    pub fn done(&mut self) -> FlushOutcome {
        if self.pending.is_empty() && !self.manifest_dirty {
            return FlushOutcome::Clean;
        }
        match self.flush() {
            Ok(artifacts) => {
                debug!(
                    "flushed {artifacts} artifact(s) to {}",
                    self.namespace_dir.display()
                );
                FlushOutcome::Flushed { artifacts }
            }
            Err(err) => {
                warn!("failed to persist compile cache: {err}");
                FlushOutcome::Failed(err)
            }
        }
    }

    fn flush(&mut self) -> Result<usize, CacheError> {
        let mut written = Vec::with_capacity(self.pending.len());
        for (keyspace, file) in &self.pending {
            let Some(record) = self.record_for(*keyspace, file) else {
                continue;
            };
            let key = CacheKey::new(file.clone(), record.content_fingerprint, self.config)
                .artifact_key(record.generation);
            self.store
                .write_artifact(keyspace.subdir(), &key, &record.to_bytes()?)?;
            written.push((*keyspace, file.clone(), key));
        }

        let count = written.len();
        for (keyspace, file, key) in written {
            self.manifest.file_mut(&file).set_key(keyspace, key);
        }
        self.manifest.edges = self.graph.edges().collect();
        self.manifest.save(&self.namespace_dir)?;

        self.pending.clear();
        self.manifest_dirty = false;
        Ok(count)
    }

    fn record_for(&self, keyspace: Keyspace, file: &FileId) -> Option<CacheRecord> {
        let (content, generation, compiled, diagnostics) = match keyspace {
            Keyspace::Code => {
                let s = self.code.get(file)?;
                (s.content, s.generation, Some(s.value.clone()), None)
            }
            Keyspace::Diagnostics => {
                let s = self.diagnostics.get(file)?;
                (s.content, s.generation, None, Some(s.value.clone()))
            }
        };
        Some(CacheRecord {
            file_id: file.clone(),
            content_fingerprint: content,
            generation,
            compiled,
            diagnostics,
        })
    }

    /// Discards every cached entry, in memory and on disk, and every
    /// dependency edge. Snapshots are kept.
    pub fn clean(&mut self) {
        info!("cleaning compile cache at {}", self.namespace_dir.display());
        self.discard_namespace();
        self.code.clear();
        self.diagnostics.clear();
        self.graph.clear();
        self.pending.clear();
    }

    fn discard_namespace(&mut self) {
        match std::fs::remove_dir_all(&self.namespace_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove {}: {e}", self.namespace_dir.display()),
        }
        self.manifest = CacheManifest::new(&self.tool_version, self.config);
        self.manifest_dirty = false;
        self.unobserved.clear();
    }

    /// Switches to the namespace of another configuration.
    ///
    /// The current round is flushed to the old namespace first. Snapshots and
    /// dependency edges carry over; files whose text differs from what the
    /// new namespace last recorded are treated as changed.
    pub fn reconfigure(&mut self, config: ConfigFingerprint) -> FlushOutcome {
        let outcome = self.done();
        if config == self.config {
            return outcome;
        }

        info!("switching compile cache from {} to {}", self.config, config);
        self.config = config;
        self.namespace_dir = self.cache_root.join(config.namespace());
        self.store = ArtifactStore::new(&self.namespace_dir, &self.tool_version);
        self.manifest = CacheManifest::new(&self.tool_version, config);
        self.manifest_dirty = false;
        self.code.clear();
        self.diagnostics.clear();
        self.pending.clear();
        self.unobserved.clear();
        self.load_namespace();

        let current: Vec<(FileId, ContentHash)> = self
            .snapshots
            .known_file_ids()
            .filter_map(|id| self.snapshots.get_snapshot(id))
            .map(|s| (s.id().clone(), s.fingerprint()))
            .collect();
        for (id, fingerprint) in current {
            self.record_fingerprint(&id, fingerprint);
        }
        outcome
    }

    /// Removes artifacts of the active namespace that the manifest no longer
    /// references. Returns the number of files removed.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for keyspace in [Keyspace::Code, Keyspace::Diagnostics] {
            let live: BTreeSet<&str> = self
                .manifest
                .files
                .values()
                .filter_map(|f| f.key(keyspace))
                .collect();
            removed += self.store.gc(keyspace.subdir(), &live)?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Fingerprint of the active configuration.
    pub fn config(&self) -> ConfigFingerprint {
        self.config
    }

    /// Directory of the active namespace.
    pub fn namespace_dir(&self) -> &Path {
        &self.namespace_dir
    }

    /// The in-memory manifest, including unflushed changes.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Number of live entries held in memory, per keyspace.
    pub fn memory_entries(&self) -> HashMap<Keyspace, usize> {
        HashMap::from([
            (Keyspace::Code, self.code.len()),
            (Keyspace::Diagnostics, self.diagnostics.len()),
        ])
    }
}

/// Makes sure `memory` holds a live entry for `key`, loading it from disk if
/// the manifest names a matching artifact.
///
/// Stale in-memory entries are evicted. Returns `true` if a live entry is
/// present afterwards.
fn ensure_live<V>(
    memory: &mut MemoryStore<FileId, Stamped<V>>,
    store: &ArtifactStore,
    manifest: &CacheManifest,
    keyspace: Keyspace,
    key: &CacheKey,
    generation: u64,
    extract: impl FnOnce(CacheRecord) -> Option<V>,
) -> bool {
    match memory.get(&key.file).map(|s| s.is_live(key, generation)) {
        Some(true) => return true,
        Some(false) => {
            debug!("evicting stale {keyspace} entry for {}", key.file);
            memory.evict(&key.file);
        }
        None => {}
    }

    let artifact_key = key.artifact_key(generation);
    let Some(state) = manifest.files.get(&key.file) else {
        return false;
    };
    if state.key(keyspace) != Some(artifact_key.as_str()) {
        return false;
    }

    let loaded = store
        .read_artifact(keyspace.subdir(), &artifact_key)
        .and_then(|bytes| CacheRecord::from_bytes(&bytes))
        .and_then(|record| record.validate(key, generation));
    match loaded.map(extract) {
        Ok(Some(value)) => {
            debug!("loaded persisted {keyspace} entry for {}", key.file);
            memory.upsert(key.file.clone(), Stamped::new(key.content, generation, value));
            true
        }
        Ok(None) => false,
        Err(err) => {
            debug!("persisted {keyspace} entry for {} unusable: {err}", key.file);
            false
        }
    }
}
