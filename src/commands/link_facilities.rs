use anyhow::Result;

use crate::batch::jobs::{FacilityLinkJob, LINK_FACILITIES_JOB};
use crate::cli::{Cli, LinkFacilitiesArgs};
use crate::commands::{Session, facility_source, finish};

pub fn run(cli: &Cli, args: &LinkFacilitiesArgs) -> Result<()> {
    let session = Session::open(cli, &args.store.stores)?;
    let source = facility_source(&args.facility)?;

    let job = FacilityLinkJob { store_root: args.store.stores.clone(), source };
    let report = job.run(&session.runner())?;
    finish(LINK_FACILITIES_JOB, &report)
}
