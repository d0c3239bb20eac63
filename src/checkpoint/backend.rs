use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, ResultExt};

/// Processed items of one job: a flat list, or a list per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobEntry {
    Items(Vec<String>),
    Scoped(BTreeMap<String, Vec<String>>),
}

/// The whole log: job name → entry.
pub type CheckpointDoc = BTreeMap<String, JobEntry>;

/// Where a [`CheckpointDoc`] is kept between runs.
pub trait CheckpointBackend: Send + Sync {
    /// Read the saved document; a log that was never written is empty.
    fn load(&self) -> Result<CheckpointDoc>;

    /// Replace the saved document.
    fn save(&self, doc: &CheckpointDoc) -> Result<()>;
}

/// JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    #[inline] pub fn path(&self) -> &Path { &self.path }
}

impl CheckpointBackend for JsonFileBackend {
    fn load(&self) -> Result<CheckpointDoc> {
        if !self.path.exists() { return Ok(CheckpointDoc::new()) }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("[checkpoint] failed to read {}", self.path.display()))?;
        if text.trim().is_empty() { return Ok(CheckpointDoc::new()) }
        serde_json::from_str(&text)
            .with_context(|| format!("[checkpoint] failed to parse {}", self.path.display()))
    }

    fn save(&self, doc: &CheckpointDoc) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("[checkpoint] failed to stage {}", self.path.display()))?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("[checkpoint] failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process backend; counts saves.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    doc: Mutex<CheckpointDoc>,
    saves: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn saves(&self) -> usize { self.saves.load(Ordering::Relaxed) }

    pub fn snapshot(&self) -> CheckpointDoc {
        self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CheckpointBackend for MemoryBackend {
    fn load(&self) -> Result<CheckpointDoc> { Ok(self.snapshot()) }

    fn save(&self, doc: &CheckpointDoc) -> Result<()> {
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = doc.clone();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl<B: CheckpointBackend + ?Sized> CheckpointBackend for std::sync::Arc<B> {
    fn load(&self) -> Result<CheckpointDoc> { (**self).load() }
    fn save(&self, doc: &CheckpointDoc) -> Result<()> { (**self).save(doc) }
}
