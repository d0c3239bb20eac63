use std::path::Path;

use geo::Rect;
use ndarray::Array2;

use crate::crs::SpatialRef;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Window};

/// Static description of a single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub geotransform: GeoTransform,
    pub spatial_ref: Option<SpatialRef>,
    pub nodata: Option<f64>,
}

impl RasterInfo {
    /// World extent of the whole grid.
    pub fn extent(&self) -> Rect<f64> { self.geotransform.extent(self.width, self.height) }

    /// Reference system of the grid, or a data error when the file carries none.
    pub fn require_spatial_ref(&self) -> Result<&SpatialRef> {
        self.spatial_ref.as_ref()
            .ok_or_else(|| Error::data("raster has no spatial reference"))
    }

    /// True when `value` is the nodata marker (or NaN).
    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Identity of the cell grid, independent of cell values.
    pub fn signature(&self) -> GridSignature {
        GridSignature {
            width: self.width,
            height: self.height,
            geotransform: self.geotransform.0.map(f64::to_bits),
            spatial_ref: self.spatial_ref.as_ref().map(|s| s.to_string()).unwrap_or_default(),
        }
    }
}

/// Hashable grid identity: two rasters with equal signatures share cell centers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridSignature {
    width: usize,
    height: usize,
    geotransform: [u64; 6],
    spatial_ref: String,
}

/// An open, read-only, single-band raster.
pub trait RasterSource: Send + Sync {
    fn info(&self) -> &RasterInfo;

    /// Read the cells of `window` as a `height` × `width` array, row-major.
    fn read_window(&self, window: &Window) -> Result<Array2<f64>>;

    /// Read the whole band.
    fn read_band(&self) -> Result<Array2<f64>> {
        let info = self.info();
        self.read_window(&Window::full(info.width, info.height))
    }
}

/// Opens raster files.
pub trait RasterAccessor: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterSource>>;
}

/// The raster accessor compiled into this build.
pub fn default_accessor() -> Result<Box<dyn RasterAccessor>> {
    #[cfg(feature = "gdal")]
    { Ok(Box::new(crate::raster::GdalAccessor)) }

    #[cfg(not(feature = "gdal"))]
    { Err(Error::configuration("no raster backend available; rebuild with `--features gdal`")) }
}
