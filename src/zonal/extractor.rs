use geo::{BoundingRect, Coord, Geometry, Rect};

use crate::crs::{CoordinateFrame, SpatialRef};
use crate::error::{Error, Result, ResultExt};
use crate::raster::RasterSource;
use crate::store::FeatureStore;
use crate::zonal::rasterize::rasterize;

/// Knobs of the zonal extraction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ZonalOptions {
    /// Burn every cell a polygon boundary touches, not only center-inside cells.
    pub all_touched: bool,
    /// Half-width added to a degenerate extent axis.
    pub epsilon: f64,
}

impl Default for ZonalOptions {
    fn default() -> Self { Self { all_touched: false, epsilon: 1e-7 } }
}

/// Reduction applied to the extracted cell values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonalStatistic {
    Max,
    Sum,
}

impl ZonalStatistic {
    /// Reduce `values`; an empty set reduces to 0.
    pub fn reduce(self, values: &[f64]) -> f64 {
        match self {
            ZonalStatistic::Max => values.iter().copied().fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            }).unwrap_or(0.0),
            ZonalStatistic::Sum => values.iter().sum(),
        }
    }
}

/// Extracts the raster cells under single feature geometries.
///
/// One extractor serves one (raster, vector layer) pair; it is `Sync` and may be
/// shared across worker threads.
pub struct ZonalExtractor<'r> {
    raster: &'r dyn RasterSource,
    frame: CoordinateFrame,
    options: ZonalOptions,
}

impl<'r> ZonalExtractor<'r> {
    /// `vector_srs` is the reference system the feature geometries come in.
    pub fn new(raster: &'r dyn RasterSource, vector_srs: &SpatialRef, options: ZonalOptions) -> Result<Self> {
        let raster_srs = raster.info().spatial_ref.as_ref()
            .ok_or_else(|| Error::configuration("raster is not initialized with a spatial reference"))?;
        let frame = CoordinateFrame::new(vector_srs, raster_srs)?;
        if !frame.is_identity() {
            log::debug!("zonal extraction reprojects {} -> {}", frame.source(), frame.target());
        }
        Ok(Self { raster, frame, options })
    }

    #[inline] pub fn options(&self) -> &ZonalOptions { &self.options }

    /// Non-zero, non-nodata values of the cells under `geometry`.
    pub fn values(&self, geometry: &Geometry<f64>) -> Result<Vec<f64>> {
        let geometry = self.frame.transform_geometry(geometry).context("reprojecting feature")?;
        let Some(bounds) = geometry.bounding_rect() else { return Ok(Vec::new()) };
        let bounds = inflate_degenerate(bounds, self.options.epsilon);

        let info = self.raster.info();
        let Some(window) = info.geotransform.window_for_bounds(&bounds, info.width, info.height)? else {
            return Ok(Vec::new())
        };
        let cells = self.raster.read_window(&window).context("cropping raster")?;
        let transform = info.geotransform.for_window(&window);
        let mask = rasterize(&geometry, &transform, window.width, window.height, self.options.all_touched)
            .context("rasterizing feature")?;

        Ok(cells.iter().zip(mask.iter())
            .filter(|&(&v, &m)| m == 1 && v != 0.0 && !info.is_nodata(v))
            .map(|(&v, _)| v)
            .collect())
    }

    /// Largest value under `geometry`, `None` when nothing intersects.
    pub fn max(&self, geometry: &Geometry<f64>) -> Result<Option<f64>> {
        let values = self.values(geometry)?;
        Ok((!values.is_empty()).then(|| ZonalStatistic::Max.reduce(&values)))
    }

    pub fn sum(&self, geometry: &Geometry<f64>) -> Result<f64> {
        Ok(ZonalStatistic::Sum.reduce(&self.values(geometry)?))
    }

    /// Reduce the cells under `geometry`, 0 when nothing intersects.
    pub fn reduce(&self, geometry: &Geometry<f64>, statistic: ZonalStatistic) -> Result<f64> {
        Ok(statistic.reduce(&self.values(geometry)?))
    }

    /// Values under the feature `fid` of `layer`.
    pub fn values_for_fid(&self, store: &dyn FeatureStore, layer: &str, fid: i64) -> Result<Vec<f64>> {
        let feature = store.feature(layer, fid)?;
        let geometry = feature.geometry
            .ok_or_else(|| Error::data(format!("fid {fid} of layer {layer} has no geometry")))?;
        self.values(&geometry).with_context(|| format!("fid {fid}"))
    }
}

/// Grow a zero-width or zero-height extent by `epsilon` on each side of that axis.
pub(crate) fn inflate_degenerate(bounds: Rect<f64>, epsilon: f64) -> Rect<f64> {
    let (mut min, mut max) = (bounds.min(), bounds.max());
    if min.x == max.x {
        min.x -= epsilon;
        max.x += epsilon;
    }
    if min.y == max.y {
        min.y -= epsilon;
        max.y += epsilon;
    }
    Rect::new(Coord { x: min.x, y: min.y }, Coord { x: max.x, y: max.y })
}

#[cfg(test)]
mod tests {
    use geo::{line_string, point, polygon};
    use ndarray::{Array2, array};

    use super::*;
    use crate::raster::{GeoTransform, GridRaster, RasterInfo};

    /// 4x4 raster of 10 m cells over [0, 40] x [0, 40] in web mercator.
    fn raster(nodata: Option<f64>) -> GridRaster {
        let info = RasterInfo {
            width: 4,
            height: 4,
            geotransform: GeoTransform::north_up(Coord { x: 0.0, y: 40.0 }, 10.0, 10.0),
            spatial_ref: Some(SpatialRef::Epsg(3857)),
            nodata,
        };
        let cells = array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 0.0, 7.0, 8.0],
            [9.0, 10.0, -9999.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ];
        GridRaster::new(info, cells).unwrap()
    }

    #[test]
    fn degenerate_point_extent_is_inflated() {
        let r = Rect::new(Coord { x: 5.0, y: 5.0 }, Coord { x: 5.0, y: 5.0 });
        let inflated = inflate_degenerate(r, 1e-7);
        assert!(inflated.width() > 0.0 && inflated.height() > 0.0);
        assert_eq!(inflated.center(), Coord { x: 5.0, y: 5.0 });
    }

    #[test]
    fn point_geometry_still_yields_its_cell() {
        let r = raster(Some(-9999.0));
        let ex = ZonalExtractor::new(&r, &SpatialRef::Epsg(3857), ZonalOptions::default()).unwrap();
        assert_eq!(ex.values(&point! { x: 25.0, y: 35.0 }.into()).unwrap(), vec![3.0]);
    }

    #[test]
    fn zeros_and_nodata_are_dropped() {
        let r = raster(Some(-9999.0));
        let ex = ZonalExtractor::new(&r, &SpatialRef::Epsg(3857), ZonalOptions::default()).unwrap();
        // covers centers of the middle 2x2 block: 0, 7, 10, nodata
        let square: Geometry<f64> = polygon![
            (x: 11.0, y: 29.0), (x: 29.0, y: 29.0), (x: 29.0, y: 11.0), (x: 11.0, y: 11.0),
        ].into();
        let mut values = ex.values(&square).unwrap();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![7.0, 10.0]);
        assert_eq!(ex.max(&square).unwrap(), Some(10.0));
        assert_eq!(ex.sum(&square).unwrap(), 17.0);
    }

    #[test]
    fn lines_collect_crossed_cells() {
        let r = raster(None);
        let ex = ZonalExtractor::new(&r, &SpatialRef::Epsg(3857), ZonalOptions::default()).unwrap();
        let road: Geometry<f64> = line_string![(x: 5.0, y: 5.0), (x: 35.0, y: 5.0)].into();
        assert_eq!(ex.values(&road).unwrap(), vec![13.0, 14.0, 15.0, 16.0]);
        assert_eq!(ex.reduce(&road, ZonalStatistic::Max).unwrap(), 16.0);
    }

    #[test]
    fn features_outside_the_raster_are_empty() {
        let r = raster(None);
        let ex = ZonalExtractor::new(&r, &SpatialRef::Epsg(3857), ZonalOptions::default()).unwrap();
        let far: Geometry<f64> = line_string![(x: 100.0, y: 100.0), (x: 200.0, y: 100.0)].into();
        assert!(ex.values(&far).unwrap().is_empty());
        assert_eq!(ex.max(&far).unwrap(), None);
        assert_eq!(ex.reduce(&far, ZonalStatistic::Max).unwrap(), 0.0);
    }

    #[test]
    fn geographic_features_are_reprojected() {
        let info = RasterInfo {
            width: 2,
            height: 2,
            geotransform: GeoTransform::north_up(Coord { x: -200_000.0, y: 200_000.0 }, 200_000.0, 200_000.0),
            spatial_ref: Some(SpatialRef::Epsg(3857)),
            nodata: None,
        };
        let r = GridRaster::new(info, array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let ex = ZonalExtractor::new(&r, &SpatialRef::WGS84, ZonalOptions::default()).unwrap();
        // roughly (111 km, 111 km) in mercator: top-right cell
        assert_eq!(ex.values(&point! { x: 1.0, y: 1.0 }.into()).unwrap(), vec![2.0]);
    }

    #[test]
    fn equal_references_extract_like_no_transform() {
        let r = raster(Some(-9999.0));
        let direct = ZonalExtractor::new(&r, &SpatialRef::Epsg(3857), ZonalOptions::default()).unwrap();
        let respelled = SpatialRef::Proj4(
            "+units=m +proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1".into()
        );
        let aligned = ZonalExtractor::new(&r, &respelled, ZonalOptions::default()).unwrap();
        assert!(direct.frame.is_identity() && aligned.frame.is_identity());

        let geometries: [Geometry<f64>; 3] = [
            polygon![(x: 1.0, y: 39.0), (x: 29.0, y: 39.0), (x: 29.0, y: 11.0), (x: 1.0, y: 11.0)].into(),
            line_string![(x: 5.0, y: 25.0), (x: 35.0, y: 25.0)].into(),
            point! { x: 35.0, y: 5.0 }.into(),
        ];
        for geometry in &geometries {
            let expected = direct.values(geometry).unwrap();
            assert!(!expected.is_empty());
            assert_eq!(aligned.values(geometry).unwrap(), expected);
        }
    }

    #[test]
    fn raster_without_reference_is_a_configuration_error() {
        let info = RasterInfo {
            width: 1,
            height: 1,
            geotransform: GeoTransform::north_up(Coord { x: 0.0, y: 1.0 }, 1.0, 1.0),
            spatial_ref: None,
            nodata: None,
        };
        let r = GridRaster::new(info, Array2::ones((1, 1))).unwrap();
        let err = ZonalExtractor::new(&r, &SpatialRef::WGS84, ZonalOptions::default()).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn features_are_fetched_by_fid() {
        let dir = tempfile::TempDir::new().unwrap();
        let gpkg = crate::store::GeoPackage::create(&dir.path().join("roads.gpkg")).unwrap();
        gpkg.create_layer("edges", "LINESTRING", Some(&SpatialRef::Epsg(3857)), &[]).unwrap();
        let road: Geometry<f64> = line_string![(x: 5.0, y: 15.0), (x: 35.0, y: 15.0)].into();
        let fids = gpkg.insert_features("edges", &[(Some(road), vec![])]).unwrap();

        let r = raster(Some(-9999.0));
        let ex = ZonalExtractor::new(&r, &SpatialRef::Epsg(3857), ZonalOptions::default()).unwrap();
        assert_eq!(ex.values_for_fid(&gpkg, "edges", fids[0]).unwrap(), vec![9.0, 10.0, 12.0]);
        let err = ex.values_for_fid(&gpkg, "edges", fids[0] + 100).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Data);
    }

    #[test]
    fn statistic_reductions() {
        assert_eq!(ZonalStatistic::Max.reduce(&[3.0, -1.0, 9.0]), 9.0);
        assert_eq!(ZonalStatistic::Max.reduce(&[-4.0, -2.0]), -2.0);
        assert_eq!(ZonalStatistic::Sum.reduce(&[]), 0.0);
    }
}
