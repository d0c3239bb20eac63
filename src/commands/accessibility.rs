use anyhow::Result;

use crate::batch::jobs::{ACCESSIBILITY_JOB, AccessibilityJob};
use crate::cli::{AccessibilityArgs, Cli};
use crate::commands::{Session, finish};

pub fn run(cli: &Cli, args: &AccessibilityArgs) -> Result<()> {
    let session = Session::open(cli, &args.store.stores)?;

    let mut config = session.config.accessibility.clone();
    if let Some(d0) = args.d0 { config.d0 = d0 }
    if let Some(decay) = &args.decay { config.decay = decay.clone() }
    if let Some(field) = &args.demand_field { config.demand_field = field.clone() }

    let job = AccessibilityJob { store_root: args.store.stores.clone(), config, affected: args.affected.clone() };
    let report = job.run(&session.runner())?;
    finish(ACCESSIBILITY_JOB, &report)
}
