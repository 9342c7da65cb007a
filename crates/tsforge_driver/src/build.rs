//! The build session: per-file transforms and per-target generation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use tsforge_cache::{CompileCache, CompiledEntry, Declaration, FlushOutcome, SourceMap};
use tsforge_common::FileId;
use tsforge_config::{ConfigFingerprint, PluginOptions, Verbosity};
use tsforge_diagnostics::{DiagnosticRecord, DiagnosticSink, Severity};
use tsforge_source::SourceSnapshot;

use crate::error::DriverError;
use crate::filter::SourceFilter;
use crate::service::{CompilerService, EmitOutput, OutputFile};
use crate::session::{BuildMode, SessionContext};

const BYTE_ORDER_MARK: &str = "\u{FEFF}";

/// Code handed back to the host bundler for one module.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TransformOutput {
    /// The emitted JavaScript, absent if emission failed.
    pub code: Option<String>,
    /// Source map of [`code`](Self::code).
    pub map: SourceMap,
}

/// Summary of one `generate` call.
#[derive(Debug)]
pub struct GenerateReport {
    /// Zero-based index of the generated target within its pass.
    pub round: usize,
    /// Number of targets per pass.
    pub target_count: usize,
    /// Mode the session was in.
    pub mode: BuildMode,
    /// Files re-diagnosed through the compiler service.
    pub rediagnosed: usize,
    /// What happened to the cache.
    pub flush: FlushOutcome,
}

/// One build (or watch) process.
pub struct BuildSession<S> {
    options: PluginOptions,
    service: S,
    cache: CompileCache,
    filter: SourceFilter,
    context: SessionContext,
    sink: DiagnosticSink,
    declarations: BTreeMap<String, Declaration>,
    no_errors: bool,
}

impl<S: CompilerService> BuildSession<S> {
    /// Starts a session.
    ///
    /// Opens the cache namespace for the fingerprint of `options`, the
    /// service version, and `entry_files`. Compiler option diagnostics are
    /// reported when checking is enabled, and the namespace is wiped when
    /// `options.clean` is set.
    pub fn new(
        options: PluginOptions,
        service: S,
        entry_files: Vec<FileId>,
    ) -> Result<Self, DriverError> {
        let filter = SourceFilter::from_options(&options)?;
        let version = service.version().to_string();
        info!("compiler service version {version}");

        let fingerprint = ConfigFingerprint::compute(&options, &version, &entry_files)?;
        let mut cache = CompileCache::open(&options.cache_root, fingerprint, &version, entry_files);
        if options.clean {
            cache.clean();
        }

        let sink = DiagnosticSink::new();
        let mut session = Self {
            options,
            service,
            cache,
            filter,
            context: SessionContext::new(),
            sink,
            declarations: BTreeMap::new(),
            no_errors: true,
        };
        if session.options.check {
            let diagnostics = session.service.options_diagnostics();
            session.report(diagnostics);
        }
        Ok(session)
    }

    /// Records that `importer` imports `dependency`.
    ///
    /// Only dependencies the session would itself transform are tracked.
    pub fn resolved_import(&mut self, dependency: FileId, importer: FileId) {
        if self.filter.matches(&dependency) {
            debug!("{importer} imports {dependency}");
            self.cache.set_dependency(dependency, importer);
        }
    }

    /// Compiles one module.
    ///
    /// Returns `Ok(None)` for ids outside the include/exclude filter. A file
    /// that cannot be emitted has its diagnostics reported regardless of
    /// `options.check`, and fails the build when `options.abort_on_error` is
    /// set.
    pub fn transform(
        &mut self,
        id: impl Into<FileId>,
        code: &str,
    ) -> Result<Option<TransformOutput>, DriverError> {
        let id = id.into();
        if !self.filter.matches(&id) {
            return Ok(None);
        }

        let snapshot = self.cache.set_snapshot(id.clone(), code);
        let service = &mut self.service;
        let compiled = self
            .cache
            .get_compiled(&snapshot, || compiled_entry(service.emit(&snapshot)));

        if compiled.emit_failed() {
            self.no_errors = false;
            let diagnostics = self.cached_diagnostics(&snapshot);
            self.report(diagnostics);
            self.cache.done();
            if self.options.abort_on_error {
                return Err(DriverError::EmitFailed { id });
            }
        } else if self.options.check {
            let diagnostics = self.cached_diagnostics(&snapshot);
            if !diagnostics.is_empty() {
                self.no_errors = false;
            }
            self.report(diagnostics);
        }

        let CompiledEntry {
            emitted_code,
            source_map,
            declaration,
        } = compiled;
        if let Some(declaration) = declaration {
            self.declarations.insert(declaration.path.clone(), declaration);
        }
        Ok(Some(TransformOutput {
            code: emitted_code,
            map: source_map.unwrap_or_default(),
        }))
    }

    /// Finishes one output target.
    ///
    /// At the start of every watch pass the whole import tree is re-checked
    /// directly through the service, so dependents of changed files report
    /// fresh diagnostics even if the host did not transform them again.
    /// The cache is flushed in every case.
    pub fn generate(&mut self, target_count: usize) -> GenerateReport {
        let phase = self.context.begin_generate(target_count);
        debug!(
            "generating target {} of {}",
            phase.round + 1,
            phase.target_count
        );

        let mut rediagnosed = 0;
        if phase.rediagnose {
            debug!("running in watch mode");
            let cache = &self.cache;
            let service = &mut self.service;
            let mut found = Vec::new();
            cache.walk_tree(|id| {
                let Some(snapshot) = cache.get_snapshot(id) else {
                    debug!("no snapshot for {id}; skipping");
                    return;
                };
                found.extend(service.syntactic_diagnostics(snapshot));
                found.extend(service.semantic_diagnostics(snapshot));
                rediagnosed += 1;
            });
            self.report(found);
        }

        if phase.mode == BuildMode::Build && !self.no_errors {
            info!("there were errors or warnings above");
        }
        let flush = self.cache.done();
        self.context.finish_generate();

        GenerateReport {
            round: phase.round,
            target_count: phase.target_count,
            mode: phase.mode,
            rediagnosed,
            flush,
        }
    }

    /// Declarations collected so far, by output path.
    pub fn declarations(&self) -> &BTreeMap<String, Declaration> {
        &self.declarations
    }

    /// Writes every collected declaration to disk.
    ///
    /// With `dest`, each declaration is placed under the directory of the
    /// bundle output file `dest`, at its path relative to `out_dir`.
    /// Without it, or when `options.use_tsconfig_declaration_dir` is set,
    /// the path suggested by the compiler service is used as-is. Returns the
    /// number of files written.
    pub fn write_declarations(
        &self,
        dest: Option<&Path>,
        out_dir: &Path,
    ) -> Result<usize, DriverError> {
        let dest = dest.filter(|_| !self.options.use_tsconfig_declaration_dir);
        for declaration in self.declarations.values() {
            let path = declaration_path(&declaration.path, dest, out_dir);
            let write_err = |source| DriverError::DeclarationWrite {
                path: path.clone(),
                source,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
            let text = if declaration.write_bom {
                format!("{BYTE_ORDER_MARK}{}", declaration.text)
            } else {
                declaration.text.clone()
            };
            std::fs::write(&path, text).map_err(write_err)?;
            debug!("wrote declaration {}", path.display());
        }
        Ok(self.declarations.len())
    }

    /// Whether any errors or warnings were reported so far.
    pub fn had_errors(&self) -> bool {
        !self.no_errors
    }

    /// Diagnostics reported so far, filtered by verbosity.
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// The compile cache.
    pub fn cache(&self) -> &CompileCache {
        &self.cache
    }

    /// Mutable access to the compile cache.
    pub fn cache_mut(&mut self) -> &mut CompileCache {
        &mut self.cache
    }

    /// The compiler service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Round and mode counters.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The session's options.
    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    fn cached_diagnostics(&mut self, snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord> {
        let service = &mut self.service;
        let mut diagnostics = self
            .cache
            .get_syntactic_diagnostics(snapshot, || service.syntactic_diagnostics(snapshot));
        diagnostics.extend(
            self.cache
                .get_semantic_diagnostics(snapshot, || service.semantic_diagnostics(snapshot)),
        );
        diagnostics
    }

    fn report(&self, diagnostics: Vec<DiagnosticRecord>) {
        let threshold = severity_threshold(self.options.verbosity);
        self.sink
            .emit_all(diagnostics.into_iter().filter(|d| d.severity >= threshold));
    }
}

fn severity_threshold(verbosity: Verbosity) -> Severity {
    match verbosity {
        Verbosity::Error => Severity::Error,
        Verbosity::Warning => Severity::Warning,
        Verbosity::Info | Verbosity::Debug => Severity::Message,
    }
}

fn find_output<'a>(files: &'a [OutputFile], suffixes: &[&str]) -> Option<&'a OutputFile> {
    files
        .iter()
        .find(|f| suffixes.iter().any(|s| f.name.ends_with(s)))
}

/// Picks the cacheable parts out of an emit.
fn compiled_entry(output: EmitOutput) -> CompiledEntry {
    let files = &output.output_files;
    let emitted_code = if output.emit_skipped {
        None
    } else {
        find_output(files, &[".js", ".jsx"]).map(|f| f.text.clone())
    };
    let source_map = match find_output(files, &[".map"]) {
        Some(map) => SourceMap::from_json(&map.text).unwrap_or_else(|err| {
            warn!("ignoring unreadable source map {}: {err}", map.name);
            SourceMap::empty()
        }),
        None => SourceMap::empty(),
    };
    let declaration = find_output(files, &[".d.ts"]).map(|f| Declaration {
        path: f.name.clone(),
        text: f.text.clone(),
        write_bom: f.write_bom,
    });
    CompiledEntry {
        emitted_code,
        source_map: Some(source_map),
        declaration,
    }
}

fn declaration_path(name: &str, dest: Option<&Path>, out_dir: &Path) -> PathBuf {
    let name = Path::new(name);
    let Some(dest) = dest else {
        return name.to_path_buf();
    };
    let dest_dir = dest.parent().unwrap_or_else(|| Path::new(""));
    let relative = name
        .strip_prefix(out_dir)
        .ok()
        .or_else(|| name.file_name().map(Path::new))
        .unwrap_or(name);
    dest_dir.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsforge_diagnostics::DiagnosticCategory;

    /// Emits `var` for `const`, fails on text containing `@@`, and reports
    /// a semantic error for text containing `bad`.
    #[derive(Default)]
    struct FakeCompiler {
        emits: usize,
        semantic: usize,
        options_errors: Vec<DiagnosticRecord>,
    }

    impl CompilerService for FakeCompiler {
        fn version(&self) -> &str {
            "fake-1.0"
        }

        fn emit(&mut self, snapshot: &SourceSnapshot) -> EmitOutput {
            self.emits += 1;
            if snapshot.text().contains("@@") {
                return EmitOutput {
                    emit_skipped: true,
                    output_files: Vec::new(),
                };
            }
            let stem = snapshot.id().as_str().trim_end_matches(".ts");
            EmitOutput {
                emit_skipped: false,
                output_files: vec![
                    OutputFile {
                        name: format!("{stem}.js"),
                        text: snapshot.text().replace("const", "var"),
                        write_bom: false,
                    },
                    OutputFile {
                        name: format!("{stem}.js.map"),
                        text: r#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"AAAA"}"#
                            .to_string(),
                        write_bom: false,
                    },
                    OutputFile {
                        name: format!("dist/{stem}.d.ts"),
                        text: "export {};".to_string(),
                        write_bom: true,
                    },
                ],
            }
        }

        fn syntactic_diagnostics(&mut self, snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord> {
            if snapshot.text().contains("@@") {
                vec![DiagnosticRecord::error(
                    DiagnosticCategory::Syntax,
                    1127,
                    "Invalid character.",
                )]
            } else {
                Vec::new()
            }
        }

        fn semantic_diagnostics(&mut self, snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord> {
            self.semantic += 1;
            let mut out = Vec::new();
            if snapshot.text().contains("bad") {
                out.push(
                    DiagnosticRecord::error(DiagnosticCategory::Semantic, 2304, "Cannot find name.")
                        .with_file(snapshot.id().clone()),
                );
            }
            if snapshot.text().contains("unused") {
                out.push(DiagnosticRecord::new(
                    DiagnosticCategory::Semantic,
                    Severity::Suggestion,
                    6133,
                    "declared but never read",
                ));
            }
            out
        }

        fn options_diagnostics(&mut self) -> Vec<DiagnosticRecord> {
            self.options_errors.clone()
        }
    }

    fn options(dir: &Path) -> PluginOptions {
        PluginOptions {
            cache_root: dir.join("cache"),
            ..PluginOptions::default()
        }
    }

    fn session(options: PluginOptions) -> BuildSession<FakeCompiler> {
        BuildSession::new(options, FakeCompiler::default(), vec![FileId::from("main.ts")]).unwrap()
    }

    #[test]
    fn transform_emits_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(options(dir.path()));

        let out = s.transform("main.ts", "const a = 1;").unwrap().unwrap();
        assert_eq!(out.code.as_deref(), Some("var a = 1;"));
        assert_eq!(out.map.mappings, "AAAA");

        s.transform("main.ts", "const a = 1;").unwrap();
        assert_eq!(s.service().emits, 1);
        assert_eq!(s.service().semantic, 1);
    }

    #[test]
    fn filtered_ids_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(options(dir.path()));
        assert!(s.transform("style.css", "body {}").unwrap().is_none());
        assert!(s.transform("types.d.ts", "declare const x: 1;").unwrap().is_none());
        assert_eq!(s.service().emits, 0);
    }

    #[test]
    fn emit_failure_aborts_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(options(dir.path()));
        let err = s.transform("main.ts", "const @@").unwrap_err();
        assert!(matches!(err, DriverError::EmitFailed { ref id } if id.as_str() == "main.ts"));
        assert_eq!(s.sink().error_count(), 1);
        assert!(s.had_errors());
    }

    #[test]
    fn emit_failure_reports_even_without_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(PluginOptions {
            check: false,
            abort_on_error: false,
            ..options(dir.path())
        });
        let out = s.transform("main.ts", "const @@").unwrap().unwrap();
        assert!(out.code.is_none());
        assert_eq!(s.sink().error_count(), 1);
    }

    #[test]
    fn cached_emit_failure_still_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(options(dir.path()));
        assert!(s.transform("main.ts", "const @@").is_err());
        assert!(s.transform("main.ts", "const @@").is_err());
        assert_eq!(s.service().emits, 1);
    }

    #[test]
    fn check_off_skips_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(PluginOptions {
            check: false,
            ..options(dir.path())
        });
        s.transform("main.ts", "const bad = 1;").unwrap();
        assert_eq!(s.service().semantic, 0);
        assert!(s.sink().diagnostics().is_empty());
    }

    #[test]
    fn verbosity_filters_reported_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let mut quiet = session(options(dir.path()));
        quiet.transform("main.ts", "const bad, unused;").unwrap();
        assert_eq!(quiet.sink().diagnostics().len(), 1);

        let mut chatty = session(PluginOptions {
            verbosity: Verbosity::Debug,
            ..options(dir.path())
        });
        chatty.transform("main.ts", "const bad, unused;").unwrap();
        assert_eq!(chatty.sink().diagnostics().len(), 2);
    }

    #[test]
    fn options_diagnostics_reported_when_checking() {
        let dir = tempfile::tempdir().unwrap();
        let service = FakeCompiler {
            options_errors: vec![DiagnosticRecord::error(
                DiagnosticCategory::Options,
                5023,
                "Unknown compiler option 'strictt'.",
            )],
            ..FakeCompiler::default()
        };
        let s = BuildSession::new(options(dir.path()), service, Vec::new()).unwrap();
        assert_eq!(s.sink().error_count(), 1);
    }

    #[test]
    fn declarations_are_collected_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(options(dir.path()));
        s.transform("main.ts", "const a = 1;").unwrap();
        s.transform("util.ts", "const b = 2;").unwrap();
        assert_eq!(
            s.declarations().keys().collect::<Vec<_>>(),
            vec!["dist/main.d.ts", "dist/util.d.ts"]
        );

        let out = dir.path().join("bundle");
        let written = s
            .write_declarations(Some(&out.join("index.js")), Path::new("dist"))
            .unwrap();
        assert_eq!(written, 2);
        let text = std::fs::read_to_string(out.join("main.d.ts")).unwrap();
        assert_eq!(text, "\u{FEFF}export {};");
    }

    #[test]
    fn tsconfig_declaration_dir_ignores_bundle_location() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(PluginOptions {
            use_tsconfig_declaration_dir: true,
            ..options(dir.path())
        });
        s.transform("main.ts", "const a = 1;").unwrap();
        let suggested = dir.path().join("types").join("main.d.ts");
        s.declarations.insert(
            "dist/main.d.ts".to_string(),
            Declaration {
                path: suggested.to_string_lossy().into_owned(),
                text: "export {};".to_string(),
                write_bom: false,
            },
        );

        let out = dir.path().join("bundle");
        s.write_declarations(Some(&out.join("index.js")), Path::new("dist"))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&suggested).unwrap(), "export {};");
        assert!(!out.join("main.d.ts").exists());
    }

    #[test]
    fn resolved_imports_respect_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(options(dir.path()));
        s.resolved_import(FileId::from("dep.ts"), FileId::from("main.ts"));
        s.resolved_import(FileId::from("lib.d.ts"), FileId::from("main.ts"));
        assert!(s
            .cache()
            .graph()
            .contains_edge(&FileId::from("dep.ts"), &FileId::from("main.ts")));
        assert_eq!(s.cache().graph().len(), 1);
    }

    #[test]
    fn unreadable_source_map_degrades_to_empty() {
        let entry = compiled_entry(EmitOutput {
            emit_skipped: false,
            output_files: vec![
                OutputFile {
                    name: "a.js".to_string(),
                    text: "x;".to_string(),
                    write_bom: false,
                },
                OutputFile {
                    name: "a.js.map".to_string(),
                    text: "not json".to_string(),
                    write_bom: false,
                },
            ],
        });
        assert_eq!(entry.emitted_code.as_deref(), Some("x;"));
        assert_eq!(entry.source_map, Some(SourceMap::empty()));
        assert!(entry.declaration.is_none());
    }

    #[test]
    fn declaration_path_relative_to_out_dir() {
        let out_dir = Path::new("dist");
        assert_eq!(
            declaration_path("dist/sub/a.d.ts", Some(Path::new("build/index.js")), out_dir),
            PathBuf::from("build/sub/a.d.ts")
        );
        assert_eq!(
            declaration_path("elsewhere/a.d.ts", Some(Path::new("build/index.js")), out_dir),
            PathBuf::from("build/a.d.ts")
        );
        assert_eq!(
            declaration_path("dist/a.d.ts", None, out_dir),
            PathBuf::from("dist/a.d.ts")
        );
    }
}
