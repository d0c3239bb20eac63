//! GDAL-backed raster accessor.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gdal::Dataset;
use ndarray::Array2;

use crate::crs::SpatialRef;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterAccessor, RasterInfo, RasterSource, Window};

/// Opens rasters through GDAL, first band only.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalAccessor;

impl RasterAccessor for GdalAccessor {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterSource>> {
        Ok(Box::new(GdalRaster::open(path)?))
    }
}

/// A GDAL dataset. Reads are serialized through the dataset lock.
pub struct GdalRaster {
    path: PathBuf,
    info: RasterInfo,
    dataset: Mutex<Dataset>,
}

impl GdalRaster {
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)
            .map_err(|e| Error::configuration(format!("failed to open raster {}: {e}", path.display())))?;

        let (width, height) = dataset.raster_size();
        let geotransform = dataset.geo_transform()
            .map_err(|e| Error::data(format!("raster {} has no geotransform: {e}", path.display())))?;
        let spatial_ref = dataset.spatial_ref().ok().and_then(|srs| {
            match (srs.auth_name(), srs.auth_code()) {
                (Ok(name), Ok(code)) if name.eq_ignore_ascii_case("EPSG") => Some(SpatialRef::Epsg(code as u32)),
                _ => srs.to_proj4().ok().map(|p| SpatialRef::Proj4(p.trim().to_string())),
            }
        });
        let nodata = dataset.rasterband(1)
            .map_err(|e| Error::data(format!("raster {} has no band 1: {e}", path.display())))?
            .no_data_value();

        let info = RasterInfo { width, height, geotransform: GeoTransform(geotransform), spatial_ref, nodata };
        Ok(Self { path: path.to_path_buf(), info, dataset: Mutex::new(dataset) })
    }
}

impl RasterSource for GdalRaster {
    fn info(&self) -> &RasterInfo { &self.info }

    fn read_window(&self, window: &Window) -> Result<Array2<f64>> {
        if !window.fits(self.info.width, self.info.height) {
            return Err(Error::data(format!("window {window:?} exceeds raster {}", self.path.display())))
        }
        let dataset = self.dataset.lock().unwrap_or_else(|e| e.into_inner());
        let band = dataset.rasterband(1)
            .map_err(|e| Error::computation(format!("{}: {e}", self.path.display())))?;
        let size = (window.width, window.height);
        let buffer = band
            .read_as::<f64>((window.col_off as isize, window.row_off as isize), size, size, None)
            .map_err(|e| Error::computation(format!("failed to read {window:?} of {}: {e}", self.path.display())))?;
        let (_, data) = buffer.into_shape_and_vec();
        Array2::from_shape_vec((window.height, window.width), data)
            .map_err(|e| Error::computation(format!("unexpected buffer shape from {}: {e}", self.path.display())))
    }
}
