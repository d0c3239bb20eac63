use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use crate::checkpoint::{CheckpointBackend, CheckpointDoc, JobEntry, JsonFileBackend, MemoryBackend};
use crate::error::{Error, Result};

/// File name of the log kept at the root of a batch.
pub const LOG_FILE_NAME: &str = "log.json";

/// Durable, append-only record of which items each job has finished.
///
/// Read once when opened; every [`record`](CheckpointLog::record) persists the
/// whole document before returning. Items are never removed.
pub struct CheckpointLog {
    backend: Box<dyn CheckpointBackend>,
    doc: Mutex<CheckpointDoc>,
}

impl CheckpointLog {
    pub fn open(backend: Box<dyn CheckpointBackend>) -> Result<Self> {
        let doc = backend.load()?;
        Ok(Self { backend, doc: Mutex::new(doc) })
    }

    /// Open (or lazily create) the JSON log at `path`.
    pub fn open_file(path: &Path) -> Result<Self> {
        Self::open(Box::new(JsonFileBackend::new(path)))
    }

    /// Open the log under a batch root.
    pub fn open_in(root: &Path) -> Result<Self> {
        Self::open_file(&root.join(LOG_FILE_NAME))
    }

    pub fn in_memory() -> Self {
        Self { backend: Box::new(MemoryBackend::new()), doc: Mutex::new(CheckpointDoc::new()) }
    }

    /// Items recorded for `job` (within `scope`, if given).
    pub fn processed(&self, job: &str, scope: Option<&str>) -> BTreeSet<String> {
        let doc = self.lock();
        match (doc.get(job), scope) {
            (Some(JobEntry::Items(items)), None) => items.iter().cloned().collect(),
            (Some(JobEntry::Scoped(scopes)), Some(scope)) => {
                scopes.get(scope).map(|items| items.iter().cloned().collect()).unwrap_or_default()
            }
            _ => BTreeSet::new(),
        }
    }

    pub fn is_done(&self, job: &str, scope: Option<&str>, item: &str) -> bool {
        self.processed(job, scope).contains(item)
    }

    /// Items not yet recorded, in their given order.
    pub fn pending<T: AsRef<str> + Clone>(&self, job: &str, scope: Option<&str>, items: &[T]) -> Vec<T> {
        let done = self.processed(job, scope);
        items.iter()
            .filter(|i| {
                let item: &str = (*i).as_ref();
                !done.contains(item)
            })
            .cloned()
            .collect()
    }

    /// Append `item` and persist. Recording an item twice is a no-op.
    ///
    /// The in-memory log only changes once the backend has saved it.
    pub fn record(&self, job: &str, scope: Option<&str>, item: &str) -> Result<()> {
        let mut doc = self.lock();
        if Self::recorded(&doc, job, scope, item) { return Ok(()) }

        let mut next = doc.clone();
        let entry = next.entry(job.to_string()).or_insert_with(|| match scope {
            None => JobEntry::Items(Vec::new()),
            Some(_) => JobEntry::Scoped(Default::default()),
        });
        let items = match (entry, scope) {
            (JobEntry::Items(items), None) => items,
            (JobEntry::Scoped(scopes), Some(scope)) => scopes.entry(scope.to_string()).or_default(),
            _ => return Err(Error::data(format!(
                "checkpoint job {job} is recorded {} a scope", if scope.is_some() { "without" } else { "with" }
            ))),
        };
        items.push(item.to_string());
        self.backend.save(&next)?;
        *doc = next;
        Ok(())
    }

    fn recorded(doc: &CheckpointDoc, job: &str, scope: Option<&str>, item: &str) -> bool {
        let items = match (doc.get(job), scope) {
            (Some(JobEntry::Items(items)), None) => items,
            (Some(JobEntry::Scoped(scopes)), Some(scope)) => match scopes.get(scope) {
                Some(items) => items,
                None => return false,
            },
            _ => return false,
        };
        items.iter().any(|i| i == item)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CheckpointDoc> {
        self.doc.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn flat_and_scoped_jobs() {
        let log = CheckpointLog::in_memory();
        log.record("Flooding_Road", None, "CHN.gpkg").unwrap();
        log.record("Flooding_Road_By_Max_Influence", Some("CHN.gpkg"), "event_1").unwrap();
        assert!(log.is_done("Flooding_Road", None, "CHN.gpkg"));
        assert!(log.is_done("Flooding_Road_By_Max_Influence", Some("CHN.gpkg"), "event_1"));
        assert!(!log.is_done("Flooding_Road_By_Max_Influence", Some("USA.gpkg"), "event_1"));
        assert!(log.record("Flooding_Road", Some("x"), "y").is_err());
    }

    #[test]
    fn pending_is_the_set_difference() {
        let log = CheckpointLog::in_memory();
        log.record("job", None, "b").unwrap();
        assert_eq!(log.pending("job", None, &["a", "b", "c"]), vec!["a", "c"]);
    }

    #[test]
    fn every_new_record_is_saved_once() {
        let backend = Arc::new(MemoryBackend::new());
        let log = CheckpointLog::open(Box::new(backend.clone())).unwrap();
        log.record("job", None, "a").unwrap();
        log.record("job", None, "a").unwrap();
        log.record("job", None, "b").unwrap();
        assert_eq!(backend.saves(), 2);
        assert_eq!(backend.snapshot()["job"], JobEntry::Items(vec!["a".into(), "b".into()]));
    }

    struct FailingBackend;

    impl CheckpointBackend for FailingBackend {
        fn load(&self) -> Result<CheckpointDoc> { Ok(CheckpointDoc::new()) }
        fn save(&self, _doc: &CheckpointDoc) -> Result<()> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    #[test]
    fn failed_save_leaves_item_unrecorded() {
        let log = CheckpointLog::open(Box::new(FailingBackend)).unwrap();
        let err = log.record("Flooding_Road", None, "CHN.gpkg").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
        assert!(!log.is_done("Flooding_Road", None, "CHN.gpkg"));
        assert!(log.record("Flooding_Road_By_Max_Influence", Some("CHN.gpkg"), "event_1").is_err());
        assert!(log.processed("Flooding_Road_By_Max_Influence", Some("CHN.gpkg")).is_empty());
        assert_eq!(log.pending("Flooding_Road", None, &["CHN.gpkg"]), vec!["CHN.gpkg"]);
    }

    #[test]
    fn file_log_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let log = CheckpointLog::open_in(dir.path()).unwrap();
            assert!(log.processed("Flooding_Road", None).is_empty());
            log.record("Flooding_Road", None, "A.gpkg").unwrap();
        }
        let log = CheckpointLog::open_in(dir.path()).unwrap();
        assert!(log.is_done("Flooding_Road", None, "A.gpkg"));

        let text = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["Flooding_Road"][0], "A.gpkg");
    }

    #[test]
    fn reads_logs_written_elsewhere() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, r#"{"Flooding_Road": ["A.gpkg"], "Node_Raster_Sum": {"A.gpkg": ["pop.tif"]}}"#).unwrap();
        let log = CheckpointLog::open_file(&path).unwrap();
        assert!(log.is_done("Node_Raster_Sum", Some("A.gpkg"), "pop.tif"));
        assert!(log.is_done("Flooding_Road", None, "A.gpkg"));
    }

    #[test]
    fn corrupt_log_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        let err = CheckpointLog::open_file(&path).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
    }
}
