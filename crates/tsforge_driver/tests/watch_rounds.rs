//! Multi-round builds against a stub compiler service.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tsforge_cache::FlushOutcome;
use tsforge_common::FileId;
use tsforge_config::{load_options_from_str, PluginOptions};
use tsforge_diagnostics::{DiagnosticCategory, DiagnosticRecord};
use tsforge_driver::{BuildMode, BuildSession, CompilerService, EmitOutput, OutputFile};
use tsforge_source::SourceSnapshot;

/// Resolves `import x from './name'` lines against the files on disk next
/// to the importer and reports an error for every import of a name the
/// imported file does not export.
#[derive(Default)]
struct StubCompiler {
    emits: usize,
    semantic: BTreeMap<String, usize>,
}

impl StubCompiler {
    fn semantic_calls(&self, path: &Path) -> usize {
        let id = FileId::new(path.to_string_lossy());
        self.semantic.get(id.as_str()).copied().unwrap_or(0)
    }
}

impl CompilerService for StubCompiler {
    fn version(&self) -> &str {
        "stub-2.1"
    }

    fn emit(&mut self, snapshot: &SourceSnapshot) -> EmitOutput {
        self.emits += 1;
        EmitOutput {
            emit_skipped: false,
            output_files: vec![OutputFile {
                name: snapshot.id().as_str().replace(".ts", ".js"),
                text: format!("/* compiled */ {}", snapshot.text()),
                write_bom: false,
            }],
        }
    }

    fn syntactic_diagnostics(&mut self, _snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord> {
        Vec::new()
    }

    fn semantic_diagnostics(&mut self, snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord> {
        *self.semantic.entry(snapshot.id().to_string()).or_default() += 1;
        let dir = Path::new(snapshot.id().as_str())
            .parent()
            .unwrap_or_else(|| Path::new("."));

        let mut out = Vec::new();
        for line in snapshot.text().lines() {
            let Some(rest) = line.strip_prefix("import ") else {
                continue;
            };
            let Some((name, from)) = rest.split_once(" from './") else {
                continue;
            };
            let target = format!("{}.ts", from.trim_end_matches(['\'', ';']));
            let exported = std::fs::read_to_string(dir.join(&target))
                .is_ok_and(|text| text.contains(&format!("export const {name}")));
            if !exported {
                out.push(
                    DiagnosticRecord::error(
                        DiagnosticCategory::Semantic,
                        2305,
                        format!("Module './{target}' has no exported member '{name}'."),
                    )
                    .with_file(snapshot.id().clone()),
                );
            }
        }
        out
    }
}

const A_V1: &str = "export const value = 1;";
const A_V2: &str = "export const renamed = 1;";
const B: &str = "import value from './a';\nexport const twice = value * 2;";
const MAIN: &str = "import twice from './b';\nconsole.log(twice);";

/// A project directory holding `main.ts`, `b.ts` and `a.ts`, with the
/// cache root next to the sources.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let project = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        project.write("main.ts", MAIN);
        project.write("b.ts", B);
        project.write("a.ts", A_V1);
        project
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn id(&self, name: &str) -> FileId {
        FileId::new(self.path(name).to_string_lossy())
    }

    fn write(&self, name: &str, text: &str) {
        std::fs::write(self.path(name), text).unwrap();
    }

    fn options(&self) -> PluginOptions {
        let mut options = load_options_from_str("verbosity = \"debug\"\n").unwrap();
        options.cache_root = self.path("cache");
        options
    }

    fn start(&self) -> BuildSession<StubCompiler> {
        self.start_with(self.options())
    }

    fn start_with(&self, options: PluginOptions) -> BuildSession<StubCompiler> {
        BuildSession::new(options, StubCompiler::default(), vec![self.id("main.ts")]).unwrap()
    }

    /// Mirrors the host: each module is transformed before its imports are
    /// resolved, so importers come before the files they import.
    fn initial_build(&self, session: &mut BuildSession<StubCompiler>) {
        let read = |name: &str| std::fs::read_to_string(self.path(name)).unwrap();
        session.transform(self.id("main.ts"), &read("main.ts")).unwrap();
        session.resolved_import(self.id("b.ts"), self.id("main.ts"));
        session.transform(self.id("b.ts"), &read("b.ts")).unwrap();
        session.resolved_import(self.id("a.ts"), self.id("b.ts"));
        session.transform(self.id("a.ts"), &read("a.ts")).unwrap();
    }
}

#[test]
fn first_build_then_watch_rebuild() {
    let project = Project::new();
    let mut session = project.start();

    project.initial_build(&mut session);
    let report = session.generate(1);
    assert_eq!(report.mode, BuildMode::Build);
    assert_eq!(report.rediagnosed, 0);
    assert!(matches!(report.flush, FlushOutcome::Flushed { .. }));
    assert!(!session.had_errors());

    // The watcher reports a change to a.ts only.
    project.write("a.ts", A_V2);
    let out = session.transform(project.id("a.ts"), A_V2).unwrap().unwrap();
    assert_eq!(out.code.as_deref(), Some("/* compiled */ export const renamed = 1;"));

    let report = session.generate(1);
    assert_eq!(report.mode, BuildMode::Watch);
    assert_eq!(report.rediagnosed, 3);
    let errors: Vec<_> = session
        .sink()
        .diagnostics()
        .into_iter()
        .filter(|d| d.is_error())
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file, Some(project.id("b.ts")));
}

#[test]
fn dependent_diagnostics_recomputed_after_dependency_change() {
    let project = Project::new();
    let mut session = project.start();
    project.initial_build(&mut session);
    session.generate(1);
    assert_eq!(session.service().semantic_calls(&project.path("b.ts")), 1);

    // Unchanged b.ts is served from cache.
    session.transform(project.id("b.ts"), B).unwrap();
    assert_eq!(session.service().semantic_calls(&project.path("b.ts")), 1);

    project.write("a.ts", A_V2);
    session.transform(project.id("a.ts"), A_V2).unwrap();
    session.transform(project.id("b.ts"), B).unwrap();
    assert_eq!(session.service().semantic_calls(&project.path("b.ts")), 2);
    assert_eq!(session.sink().error_count(), 1);
}

#[test]
fn restart_reuses_persisted_results() {
    let project = Project::new();
    {
        let mut session = project.start();
        project.initial_build(&mut session);
        session.generate(1);
        assert_eq!(session.service().emits, 3);
    }

    let mut session = project.start();
    project.initial_build(&mut session);
    assert_eq!(session.service().emits, 0);
    assert_eq!(session.service().semantic_calls(&project.path("b.ts")), 0);
    assert!(matches!(session.generate(1).flush, FlushOutcome::Clean));
}

#[test]
fn change_between_processes_invalidates_dependents() {
    let project = Project::new();
    {
        let mut session = project.start();
        project.initial_build(&mut session);
        session.generate(1);
    }

    // a.ts is edited while no process is running. The next build reaches
    // b.ts before it is handed the new a.ts.
    project.write("a.ts", A_V2);
    let mut session = project.start();
    project.initial_build(&mut session);
    assert_eq!(session.service().emits, 3);
    assert_eq!(session.service().semantic_calls(&project.path("a.ts")), 1);
    assert_eq!(session.service().semantic_calls(&project.path("b.ts")), 1);
    assert_eq!(session.sink().error_count(), 1);

    let report = session.generate(1);
    assert_eq!(report.mode, BuildMode::Build);
    assert!(session.had_errors());
}

#[test]
fn clean_option_discards_previous_results() {
    let project = Project::new();
    {
        let mut session = project.start();
        project.initial_build(&mut session);
        session.generate(1);
    }

    let mut session = project.start_with(PluginOptions {
        clean: true,
        ..project.options()
    });
    project.initial_build(&mut session);
    assert_eq!(session.service().emits, 3);
}

#[test]
fn multiple_targets_flush_each_time_and_rediagnose_once() {
    let project = Project::new();
    let mut session = project.start();
    project.initial_build(&mut session);

    let first = session.generate(2);
    let second = session.generate(2);
    assert!(matches!(first.flush, FlushOutcome::Flushed { .. }));
    assert!(matches!(second.flush, FlushOutcome::Clean));
    assert_eq!(second.round, 1);

    let watch = [session.generate(2), session.generate(2)];
    assert_eq!(watch[0].rediagnosed, 3);
    assert_eq!(watch[1].rediagnosed, 0);
    assert_eq!(session.context().mode(), BuildMode::Watch);
}
