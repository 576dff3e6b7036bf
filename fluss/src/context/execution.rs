//! Explicitly injected collaborators for one pipeline run.

use crate::archive::EntryRef;
use crate::cancellation::CancellationToken;
use crate::codecs::{CodecProvider, ExternalCodecs};
use crate::config::{FlussConfig, ToolPaths};
use crate::core::StageId;
use crate::tags::{LoftyTagEditor, TagEditor};
use crate::utils;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Everything an operation may reach outside its own inputs and outputs.
///
/// A run-level context is created from [`FlussConfig`]; the executor derives
/// a per-stage copy with [`ExecutionContext::for_stage`] that points at the
/// stage's scratch directory.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    tools: ToolPaths,
    codecs: Arc<dyn CodecProvider>,
    tags: Arc<dyn TagEditor>,
    sources: Vec<EntryRef>,
    work_dir: PathBuf,
    output_dir: PathBuf,
    keep_temporaries: bool,
    scratch_dir: PathBuf,
    stage: Option<StageId>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Creates a context using the external tool codecs and the `lofty` tag editor.
    #[must_use]
    pub fn new(config: &FlussConfig) -> Self {
        let run_id = Uuid::new_v4();
        let scratch_dir = config.work_dir.join(run_id.to_string()).join(".scratch");
        Self {
            run_id,
            tools: config.tools.clone(),
            codecs: Arc::new(ExternalCodecs::new(config.tools.clone())),
            tags: Arc::new(LoftyTagEditor),
            sources: Vec::new(),
            work_dir: config.work_dir.clone(),
            output_dir: config.output_dir.clone(),
            keep_temporaries: config.keep_temporaries,
            scratch_dir,
            stage: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the codec provider.
    #[must_use]
    pub fn with_codecs(mut self, codecs: Arc<dyn CodecProvider>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Replaces the tag editor.
    #[must_use]
    pub fn with_tag_editor(mut self, tags: Arc<dyn TagEditor>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the source entries of the run, searched for companion files.
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<EntryRef>) -> Self {
        self.sources = sources;
        self
    }

    /// Sets the cancellation token observed by the executor.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Pins the run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self.scratch_dir = self.run_dir().join(".scratch");
        self
    }

    /// Returns a copy scoped to one stage, with its own scratch directory.
    #[must_use]
    pub fn for_stage(&self, stage: StageId) -> Self {
        let mut ctx = self.clone();
        ctx.scratch_dir = self
            .run_dir()
            .join(".scratch")
            .join(format!("stage-{}", stage.index()));
        ctx.stage = Some(stage);
        ctx
    }

    /// Returns the run id.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the configured tool paths.
    #[must_use]
    pub const fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Returns the codec provider.
    #[must_use]
    pub fn codecs(&self) -> &dyn CodecProvider {
        self.codecs.as_ref()
    }

    /// Returns the tag editor.
    #[must_use]
    pub fn tags(&self) -> &dyn TagEditor {
        self.tags.as_ref()
    }

    /// Returns the source entries of the run.
    #[must_use]
    pub fn sources(&self) -> &[EntryRef] {
        &self.sources
    }

    /// Returns the directory holding temporary targets of this run.
    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.work_dir.join(self.run_id.to_string())
    }

    /// Returns the directory final outputs are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns whether temporaries survive the run.
    #[must_use]
    pub const fn keep_temporaries(&self) -> bool {
        self.keep_temporaries
    }

    /// Returns the stage this context is scoped to.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        self.stage
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the scratch directory without creating it.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Creates the scratch directory and returns it.
    pub fn create_scratch_dir(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        Ok(&self.scratch_dir)
    }

    /// Finds a source entry by key, ignoring ASCII case.
    #[must_use]
    pub fn find_source(&self, key: &str) -> Option<&EntryRef> {
        self.sources
            .iter()
            .find(|entry| entry.key().eq_ignore_ascii_case(key))
    }

    /// Finds the companion of `primary` with extension `ext` among the sources.
    #[must_use]
    pub fn find_companion(&self, primary: &str, ext: &str) -> Option<&EntryRef> {
        let name = format!("{}.{ext}", utils::file_stem(primary));
        self.find_source(&utils::sibling_key(primary, &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryEntry;

    fn config(work_dir: &Path) -> FlussConfig {
        FlussConfig {
            work_dir: work_dir.to_path_buf(),
            ..FlussConfig::default()
        }
    }

    #[test]
    fn test_stage_scratch_dirs_are_distinct() {
        let ctx = ExecutionContext::new(&config(Path::new("/tmp/work")));
        let a = ctx.for_stage(StageId::new(0));
        let b = ctx.for_stage(StageId::new(1));

        assert_ne!(a.scratch_dir(), b.scratch_dir());
        assert!(a.scratch_dir().starts_with(ctx.run_dir()));
        assert!(a.scratch_dir().ends_with("stage-0"));
        assert_eq!(a.stage(), Some(StageId::new(0)));
    }

    #[test]
    fn test_run_id_moves_run_dir() {
        let id = Uuid::new_v4();
        let ctx = ExecutionContext::new(&config(Path::new("/tmp/work"))).with_run_id(id);
        assert_eq!(ctx.run_dir(), Path::new("/tmp/work").join(id.to_string()));
        assert!(ctx.scratch_dir().starts_with(ctx.run_dir()));
    }

    #[test]
    fn test_find_companion_ignores_case() {
        let wv: EntryRef = Arc::new(MemoryEntry::file("CD1/Album.wv", b"wvpk".to_vec()));
        let wvc: EntryRef = Arc::new(MemoryEntry::file("CD1/Album.WVC", b"wvpk".to_vec()));
        let ctx = ExecutionContext::new(&FlussConfig::default()).with_sources(vec![wv, wvc]);

        let found = ctx.find_companion("CD1/Album.wv", "wvc").map(|e| e.key().to_string());
        assert_eq!(found.as_deref(), Some("CD1/Album.WVC"));
        assert!(ctx.find_companion("CD2/Album.wv", "wvc").is_none());
    }
}
