//! Per-feature zonal statistics.

mod extractor;
mod rasterize;

pub use extractor::{ZonalExtractor, ZonalOptions, ZonalStatistic};
pub use rasterize::rasterize;
