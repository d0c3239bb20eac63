use anyhow::{Context, Result};

use crate::access::write_affected_facilities;
use crate::cli::{Cli, SampleFacilitiesArgs};
use crate::commands::facility_source;
use crate::facility::sample_facilities;
use crate::raster::default_accessor;

/// One raster, one output file: nothing to checkpoint.
pub fn run(_cli: &Cli, args: &SampleFacilitiesArgs) -> Result<()> {
    let source = facility_source(&args.facility)?;
    let (facilities, srs) = source.read()
        .with_context(|| format!("reading facilities from {}", source.label()))?;

    let accessor = default_accessor()?;
    let raster = accessor.open(&args.raster)
        .with_context(|| format!("opening {}", args.raster.display()))?;
    let samples = sample_facilities(raster.as_ref(), &facilities, &srs)?;
    write_affected_facilities(&args.output, &samples)?;

    let hit = samples.iter().filter(|(_, v)| v.is_some_and(|v| v != 0.0)).count();
    println!("[sample-facilities] {hit} of {} facilities affected -> {}", samples.len(), args.output.display());
    Ok(())
}
