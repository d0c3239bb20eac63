use anyhow::Result;

use crate::batch::jobs::{ROAD_LENGTH_JOB, RoadLengthJob};
use crate::cli::{Cli, StoreArgs};
use crate::commands::{Session, finish};

pub fn run(cli: &Cli, args: &StoreArgs) -> Result<()> {
    let session = Session::open(cli, &args.stores)?;
    let job = RoadLengthJob { store_root: args.stores.clone() };
    let report = job.run(&session.runner())?;
    finish(ROAD_LENGTH_JOB, &report)
}
