use std::fmt;

/// How a single work item ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Every part of the item succeeded; it is checkpointed.
    Completed,
    /// Nothing needed doing (e.g. the column is already populated); it is checkpointed.
    Skipped,
    /// Some features failed; what succeeded was persisted, the item stays pending.
    Incomplete { failed: usize },
}

/// Per-item results of one batch job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: Vec<String>,
    /// Items skipped because they were already done or already populated.
    pub skipped: Vec<String>,
    pub incomplete: Vec<String>,
    /// Items that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn record(&mut self, item: impl Into<String>, outcome: &ItemOutcome) {
        let item = item.into();
        match outcome {
            ItemOutcome::Completed => self.completed.push(item),
            ItemOutcome::Skipped => self.skipped.push(item),
            ItemOutcome::Incomplete { .. } => self.incomplete.push(item),
        }
    }

    pub fn fail(&mut self, item: impl Into<String>, error: impl fmt::Display) {
        self.failed.push((item.into(), error.to_string()));
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.completed.extend(other.completed);
        self.skipped.extend(other.skipped);
        self.incomplete.extend(other.incomplete);
        self.failed.extend(other.failed);
    }

    /// True when no item failed or was left incomplete.
    #[inline] pub fn is_clean(&self) -> bool { self.failed.is_empty() && self.incomplete.is_empty() }

    #[inline]
    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.incomplete.len() + self.failed.len()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f, "{} completed, {} skipped, {} incomplete, {} failed",
            self.completed.len(), self.skipped.len(), self.incomplete.len(), self.failed.len()
        )?;
        for (item, error) in &self.failed {
            write!(f, "\n  {item}: {error}")?;
        }
        Ok(())
    }
}
