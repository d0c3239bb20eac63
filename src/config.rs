use std::path::Path;

use crate::access::AccessibilityConfig;
use crate::aggregate::AggregatorConfig;
use crate::batch::BatchConfig;
use crate::error::{Result, ResultExt};
use crate::zonal::ZonalOptions;

/// Every tunable of a batch run, as read from a JSON file.
///
/// Sections and fields left out keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub batch: BatchConfig,
    pub zonal: ZonalOptions,
    pub aggregator: AggregatorConfig,
    pub accessibility: AccessibilityConfig,
}

impl JobConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Config from `path`, or the defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }
}
