use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use polars::io::SerWriter;
use polars::prelude::*;

use crate::error::{Error, Result, ResultExt};

/// Facility ids put out of service by an event.
///
/// Reads a CSV with a `fid` column and a `values` column; a facility is
/// affected when its value is non-zero. Ids come back in the textual form
/// used by the `EVCSFids` lists.
pub fn read_affected_facilities(path: &Path) -> Result<BTreeSet<String>> {
    let polars_err = |e: PolarsError| Error::data(format!("failed to read {}: {e}", path.display()));

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let df = CsvReader::new(file).finish().map_err(polars_err)?;

    let fid = df.column("fid").and_then(|c| c.cast(&DataType::Int64)).map_err(polars_err)?;
    let values = df.column("values").and_then(|c| c.cast(&DataType::Float64)).map_err(polars_err)?;
    let fid = fid.as_materialized_series().i64().map_err(polars_err)?;
    let values = values.as_materialized_series().f64().map_err(polars_err)?;

    Ok(fid.into_iter().zip(values.into_iter())
        .filter_map(|(fid, value)| match (fid, value) {
            (Some(fid), Some(v)) if v != 0.0 => Some(fid.to_string()),
            _ => None,
        })
        .collect())
}

/// Write sampled facility values as a `fid,values` CSV.
///
/// Facilities outside the raster or on nodata are written as 0, which reads back
/// as unaffected.
pub fn write_affected_facilities(path: &Path, samples: &[(i64, Option<f64>)]) -> Result<()> {
    let polars_err = |e: PolarsError| Error::data(format!("failed to write {}: {e}", path.display()));

    let (fids, values) = samples.iter()
        .map(|&(fid, value)| (fid, value.unwrap_or(0.0)))
        .unzip::<_, _, Vec<_>, Vec<_>>();
    let mut df = DataFrame::new(vec![
        Series::new("fid".into(), fids).into(),
        Series::new("values".into(), values).into(),
    ]).map_err(polars_err)?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(file).finish(&mut df).map_err(polars_err)
}
