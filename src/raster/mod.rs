//! Raster access: grid geometry, the accessor seam, and backends.

mod geotransform;
mod grid;
mod sample;
mod source;
mod window;

#[cfg(feature = "gdal")]
mod gdal_raster;

pub use geotransform::GeoTransform;
pub use grid::{GridRaster, MemoryAccessor};
pub use sample::sample_points;
pub use source::{GridSignature, RasterAccessor, RasterInfo, RasterSource, default_accessor};
pub use window::{Window, blocks};

#[cfg(feature = "gdal")]
pub use gdal_raster::{GdalAccessor, GdalRaster};
