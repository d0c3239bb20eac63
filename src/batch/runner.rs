use rayon::prelude::*;

use crate::batch::{BatchConfig, BatchReport, ItemOutcome, Pools};
use crate::checkpoint::CheckpointLog;
use crate::error::Result;

/// Drives a job's items through the I/O pool, checkpointing every success.
///
/// Items already in the log are reported as skipped without being attempted.
/// A failing item is logged and left pending; siblings carry on. Only a
/// configuration error makes the whole run fail, after the other items finish.
pub struct BatchRunner<'a> {
    log: &'a CheckpointLog,
    pools: &'a Pools,
    chunk_size: usize,
}

impl<'a> BatchRunner<'a> {
    pub fn new(log: &'a CheckpointLog, pools: &'a Pools) -> Self {
        Self { log, pools, chunk_size: BatchConfig::default().chunk_size }
    }

    /// Features per persisted chunk for jobs that flush incrementally.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[inline] pub fn log(&self) -> &'a CheckpointLog { self.log }
    #[inline] pub fn pools(&self) -> &'a Pools { self.pools }
    #[inline] pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn run<T, F>(&self, job: &str, scope: Option<&str>, items: &[T], work: F) -> Result<BatchReport>
    where
        T: AsRef<str> + Clone + Send + Sync,
        F: Fn(&T) -> Result<ItemOutcome> + Send + Sync,
    {
        let label = |item: &str| match scope {
            Some(scope) => format!("{scope}/{item}"),
            None => item.to_string(),
        };

        let mut report = BatchReport::default();
        let pending = self.log.pending(job, scope, items);
        for item in items {
            if self.log.is_done(job, scope, item.as_ref()) {
                log::info!("[{job}] {} already processed, skipped", label(item.as_ref()));
                report.skipped.push(label(item.as_ref()));
            }
        }
        log::info!("[{job}] {} of {} items pending", pending.len(), items.len());

        let results = self.pools.io.install(|| {
            pending.par_iter().map(|item| {
                let result = work(item).and_then(|outcome| {
                    if !matches!(outcome, ItemOutcome::Incomplete { .. }) {
                        self.log.record(job, scope, item.as_ref())?;
                    }
                    Ok(outcome)
                });
                match &result {
                    Ok(ItemOutcome::Incomplete { failed }) => {
                        log::warn!("[{job}] {}: {failed} features failed, left pending", label(item.as_ref()))
                    }
                    Ok(_) => log::debug!("[{job}] {} done", label(item.as_ref())),
                    Err(e) => log::error!("[{job}] {} failed: {e}", label(item.as_ref())),
                }
                (label(item.as_ref()), result)
            }).collect::<Vec<_>>()
        });

        let mut fatal = None;
        for (item, result) in results {
            match result {
                Ok(outcome) => report.record(item, &outcome),
                Err(e) if !e.is_recoverable() && fatal.is_none() => fatal = Some(e),
                Err(e) => report.fail(item, e),
            }
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Error;

    fn pools() -> Pools { Pools::with_threads(2, 2).unwrap() }

    #[test]
    fn successes_are_checkpointed_and_failures_stay_pending() {
        let (log, pools) = (CheckpointLog::in_memory(), pools());
        let runner = BatchRunner::new(&log, &pools);
        let items = ["a", "b", "c", "d"];

        let report = runner.run("job", None, &items, |item| match *item {
            "b" => Err(Error::data("no fids")),
            "c" => Ok(ItemOutcome::Incomplete { failed: 1 }),
            "d" => Ok(ItemOutcome::Skipped),
            _ => Ok(ItemOutcome::Completed),
        }).unwrap();

        assert_eq!(report.completed, ["a"]);
        assert_eq!(report.skipped, ["d"]);
        assert_eq!(report.incomplete, ["c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert_eq!(log.pending("job", None, &items), ["b", "c"]);
    }

    #[test]
    fn rerun_only_attempts_pending_items() {
        let (log, pools) = (CheckpointLog::in_memory(), pools());
        let runner = BatchRunner::new(&log, &pools);
        log.record("job", Some("CHN.gpkg"), "event_1").unwrap();

        let attempts = AtomicUsize::new(0);
        let report = runner.run("job", Some("CHN.gpkg"), &["event_1", "event_2"], |_| {
            attempts.fetch_add(1, Ordering::Relaxed);
            Ok(ItemOutcome::Completed)
        }).unwrap();

        assert_eq!(attempts.load(Ordering::Relaxed), 1);
        assert_eq!(report.skipped, ["CHN.gpkg/event_1"]);
        assert_eq!(report.completed, ["CHN.gpkg/event_2"]);
    }

    #[test]
    fn configuration_errors_fail_the_run() {
        let (log, pools) = (CheckpointLog::in_memory(), pools());
        let runner = BatchRunner::new(&log, &pools);
        let err = runner.run("job", None, &["a", "b"], |item| match *item {
            "a" => Err(Error::configuration("unknown decay")),
            _ => Ok(ItemOutcome::Completed),
        }).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(log.is_done("job", None, "b"));
    }
}
