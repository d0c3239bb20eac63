use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ndarray::{Array2, s};

use crate::error::{Error, Result};
use crate::raster::{RasterAccessor, RasterInfo, RasterSource, Window};

/// A raster held entirely in memory.
///
/// Clones share the cell buffer and the read counter.
#[derive(Debug, Clone)]
pub struct GridRaster {
    info: RasterInfo,
    cells: Arc<Array2<f64>>,
    reads: Arc<AtomicUsize>,
}

impl GridRaster {
    /// `cells` is indexed `[row, col]`; its shape sets the raster size.
    pub fn new(info: RasterInfo, cells: Array2<f64>) -> Result<Self> {
        let (height, width) = cells.dim();
        if (width, height) != (info.width, info.height) {
            return Err(Error::data(format!(
                "cell buffer is {width}x{height} but raster info says {}x{}", info.width, info.height
            )))
        }
        Ok(Self { info, cells: Arc::new(cells), reads: Arc::new(AtomicUsize::new(0)) })
    }

    /// Number of window reads served so far.
    #[inline] pub fn reads(&self) -> usize { self.reads.load(Ordering::Relaxed) }
}

impl RasterSource for GridRaster {
    fn info(&self) -> &RasterInfo { &self.info }

    fn read_window(&self, window: &Window) -> Result<Array2<f64>> {
        if !window.fits(self.info.width, self.info.height) {
            return Err(Error::data(format!(
                "window {window:?} exceeds {}x{} raster", self.info.width, self.info.height
            )))
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        let (r, c) = (window.row_off, window.col_off);
        Ok(self.cells.slice(s![r..r + window.height, c..c + window.width]).to_owned())
    }
}

/// Serves registered in-memory rasters by path.
#[derive(Debug, Default)]
pub struct MemoryAccessor {
    rasters: Mutex<HashMap<PathBuf, GridRaster>>,
    opens: AtomicUsize,
}

impl MemoryAccessor {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, path: impl Into<PathBuf>, raster: GridRaster) {
        self.rasters.lock().unwrap_or_else(|e| e.into_inner()).insert(path.into(), raster);
    }

    /// Number of successful `open` calls.
    #[inline] pub fn opens(&self) -> usize { self.opens.load(Ordering::Relaxed) }
}

impl RasterAccessor for MemoryAccessor {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterSource>> {
        let rasters = self.rasters.lock().unwrap_or_else(|e| e.into_inner());
        let raster = rasters.get(path)
            .ok_or_else(|| Error::data(format!("no raster registered at {}", path.display())))?;
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(raster.clone()))
    }
}

#[cfg(test)]
mod tests {
    use geo::Coord;
    use ndarray::array;

    use super::*;
    use crate::crs::SpatialRef;
    use crate::raster::GeoTransform;

    fn raster() -> GridRaster {
        let info = RasterInfo {
            width: 3,
            height: 2,
            geotransform: GeoTransform::north_up(Coord { x: 0.0, y: 2.0 }, 1.0, 1.0),
            spatial_ref: Some(SpatialRef::Epsg(3857)),
            nodata: Some(-9999.0),
        };
        GridRaster::new(info, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap()
    }

    #[test]
    fn windows_slice_rows_then_columns() {
        let r = raster();
        assert_eq!(r.read_window(&Window::new(1, 0, 2, 2)).unwrap(), array![[2.0, 3.0], [5.0, 6.0]]);
        assert_eq!(r.read_band().unwrap().dim(), (2, 3));
        assert_eq!(r.reads(), 2);
    }

    #[test]
    fn out_of_range_window_is_rejected() {
        assert!(raster().read_window(&Window::new(2, 1, 2, 1)).is_err());
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let info = raster().info().clone();
        assert!(GridRaster::new(info, Array2::zeros((3, 3))).is_err());
    }

    #[test]
    fn accessor_shares_read_counter() {
        let accessor = MemoryAccessor::new();
        let r = raster();
        accessor.insert("a.tif", r.clone());
        let opened = accessor.open(Path::new("a.tif")).unwrap();
        opened.read_band().unwrap();
        assert_eq!(r.reads(), 1);
        assert_eq!(accessor.opens(), 1);
        assert!(accessor.open(Path::new("b.tif")).is_err());
    }
}
