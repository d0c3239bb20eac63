//! One module per subcommand; each builds its job, runs it, and prints the report.

use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::batch::{BatchReport, BatchRunner, Pools};
use crate::checkpoint::CheckpointLog;
use crate::cli::{Cli, FacilityArgs};
use crate::common::fs::require_dir_exists;
use crate::config::JobConfig;
use crate::crs::SpatialRef;
use crate::facility::FacilitySource;

pub mod accessibility;
pub mod flood;
pub mod link_facilities;
pub mod node_raster;
pub mod road_length;
pub mod sample_facilities;

/// What every command needs: config, worker pools and the checkpoint log.
pub(crate) struct Session {
    pub config: JobConfig,
    pub pools: Pools,
    pub log: CheckpointLog,
}

impl Session {
    pub fn open(cli: &Cli, stores: &Path) -> Result<Self> {
        require_dir_exists(stores)?;
        let config = JobConfig::load(cli.config.as_deref())?;
        let pools = Pools::new(&config.batch)?;
        let log = match &cli.checkpoint {
            Some(path) => CheckpointLog::open_file(path),
            None => CheckpointLog::open_in(stores),
        }.context("opening checkpoint log")?;
        log::debug!("{pools:?}, chunk size {}", config.batch.chunk_size);
        Ok(Self { config, pools, log })
    }

    pub fn runner(&self) -> BatchRunner<'_> {
        BatchRunner::new(&self.log, &self.pools).with_chunk_size(self.config.batch.chunk_size)
    }
}

/// Print the summary; a report with failures still exits successfully so reruns can pick them up.
pub(crate) fn finish(job: &str, report: &BatchReport) -> Result<()> {
    println!("[{job}] {report}");
    if !report.is_clean() {
        log::warn!("[{job}] {} items left pending; rerun to retry them", report.failed.len() + report.incomplete.len());
    }
    Ok(())
}

/// Facility source from the shared flags: shapefiles take `--srs`, GeoPackages need `--layer`.
pub(crate) fn facility_source(args: &FacilityArgs) -> Result<FacilitySource> {
    let is_shapefile = args.facilities.extension().is_some_and(|e| e.eq_ignore_ascii_case("shp"));
    if is_shapefile {
        let srs = args.srs.as_deref().map(SpatialRef::parse).transpose()?;
        return Ok(FacilitySource::Shapefile { path: args.facilities.clone(), srs })
    }
    let Some(layer) = &args.layer else {
        bail!("--layer is required for GeoPackage facilities ({})", args.facilities.display());
    };
    Ok(FacilitySource::Gpkg { path: args.facilities.clone(), layer: layer.clone() })
}
