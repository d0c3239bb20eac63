use anyhow::Result;

use crate::batch::jobs::{FLOOD_DAYS_JOB, FLOOD_EVENTS_JOB, FloodDaysJob, FloodEventsJob};
use crate::cli::{Cli, FloodDaysArgs, FloodEventsArgs};
use crate::commands::{Session, finish};
use crate::common::fs::ensure_dir_exists;
use crate::raster::default_accessor;

pub fn days(cli: &Cli, args: &FloodDaysArgs) -> Result<()> {
    let session = Session::open(cli, &args.store.stores)?;
    let accessor = default_accessor()?;

    let mut job = FloodDaysJob::new(&args.store.stores, &args.raster);
    job.column = args.column.clone();
    job.zonal = session.config.zonal;
    job.zonal.all_touched |= args.all_touched;

    let report = job.run(&session.runner(), accessor.as_ref())?;
    finish(FLOOD_DAYS_JOB, &report)
}

pub fn events(cli: &Cli, args: &FloodEventsArgs) -> Result<()> {
    let session = Session::open(cli, &args.store.stores)?;
    let accessor = default_accessor()?;
    ensure_dir_exists(&args.decompressed)?;

    let mut job = FloodEventsJob::new(&args.store.stores, &args.rasters, &args.decompressed);
    job.zonal = session.config.zonal;

    let report = job.run(&session.runner(), accessor.as_ref())?;
    finish(FLOOD_EVENTS_JOB, &report)
}
