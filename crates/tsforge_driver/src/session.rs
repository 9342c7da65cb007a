//! Round bookkeeping across `generate` calls.

/// Whether the session is in its initial build or re-running under a
/// watcher.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BuildMode {
    /// The first pass over all output targets.
    #[default]
    Build,
    /// Any later pass.
    Watch,
}

/// What a `generate` call should do, as decided by
/// [`SessionContext::begin_generate`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GeneratePhase {
    /// Zero-based index of the target being generated.
    pub round: usize,
    /// Number of output targets per pass.
    pub target_count: usize,
    /// Mode after this call.
    pub mode: BuildMode,
    /// The whole import tree should be re-diagnosed, since files that were
    /// not transformed this pass may have been affected by ones that were.
    pub rediagnose: bool,
}

/// Round and mode counters of a build session.
///
/// The host calls `generate` once per output target. Once every target of
/// a pass has been generated, the next call starts a new pass, which means a
/// watcher triggered a rebuild.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    round: usize,
    target_count: usize,
    mode: BuildMode,
}

impl SessionContext {
    /// A fresh context in build mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a `generate` call for a pass of `target_count` targets.
    pub fn begin_generate(&mut self, target_count: usize) -> GeneratePhase {
        self.target_count = target_count.max(1);
        if self.round >= self.target_count {
            self.mode = BuildMode::Watch;
            self.round = 0;
        }
        GeneratePhase {
            round: self.round,
            target_count: self.target_count,
            mode: self.mode,
            rediagnose: self.mode == BuildMode::Watch && self.round == 0,
        }
    }

    /// Completes the current `generate` call.
    pub fn finish_generate(&mut self) {
        self.round += 1;
    }

    /// Index of the next target to generate.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Target count of the most recent pass.
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Current mode.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Returns `true` once the first pass is complete.
    pub fn is_watch(&self) -> bool {
        self.mode == BuildMode::Watch
    }
}
