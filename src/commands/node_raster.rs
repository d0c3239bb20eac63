use anyhow::Result;
use std::sync::Arc;

use crate::aggregate::SystemMemory;
use crate::batch::jobs::{NODE_RASTER_SUM_JOB, NodeRasterSumJob, RasterTarget};
use crate::cli::{Cli, NodeRasterArgs};
use crate::commands::{Session, finish};
use crate::raster::default_accessor;

pub fn run(cli: &Cli, args: &NodeRasterArgs) -> Result<()> {
    let session = Session::open(cli, &args.store.stores)?;
    let accessor = default_accessor()?;

    let targets = args.targets.iter()
        .map(|(field, raster)| RasterTarget { raster: raster.clone(), field: field.clone() })
        .collect();
    let mut job = NodeRasterSumJob::new(&args.store.stores, targets);
    job.aggregator = session.config.aggregator.clone();
    if args.max_distance.is_some() { job.aggregator.max_distance = args.max_distance }
    if let Some(block_size) = args.block_size { job.aggregator.block_size = block_size }

    let report = job.run(&session.runner(), accessor.as_ref(), Arc::new(SystemMemory::new()))?;
    finish(NODE_RASTER_SUM_JOB, &report)
}
