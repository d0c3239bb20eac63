use geo::{Coord, Rect};

use crate::error::{Error, Result};
use crate::raster::Window;

/// Affine cell → world mapping, in GDAL's six-coefficient order:
/// `x = c[0] + col * c[1] + row * c[2]`, `y = c[3] + col * c[4] + row * c[5]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up grid with its top-left corner at `origin` and square-or-not cells.
    pub fn north_up(origin: Coord<f64>, cell_width: f64, cell_height: f64) -> Self {
        Self([origin.x, cell_width, 0.0, origin.y, 0.0, -cell_height.abs()])
    }

    #[inline] pub fn origin(&self) -> Coord<f64> { Coord { x: self.0[0], y: self.0[3] } }
    #[inline] pub fn cell_width(&self) -> f64 { self.0[1] }
    #[inline] pub fn cell_height(&self) -> f64 { self.0[5] }

    /// True when the grid has no rotation/shear terms.
    #[inline] pub fn is_north_up(&self) -> bool { self.0[2] == 0.0 && self.0[4] == 0.0 }

    /// World coordinate of a fractional cell position.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        let c = &self.0;
        Coord { x: c[0] + col * c[1] + row * c[2], y: c[3] + col * c[4] + row * c[5] }
    }

    /// World coordinate of the center of cell `(row, col)`.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional `(col, row)` position of a world coordinate.
    pub fn invert(&self, coord: Coord<f64>) -> Result<(f64, f64)> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det == 0.0 || !det.is_finite() {
            return Err(Error::data(format!("geotransform {:?} is not invertible", c)))
        }
        let dx = coord.x - c[0];
        let dy = coord.y - c[3];
        let col = (dx * c[5] - dy * c[2]) / det;
        let row = (dy * c[1] - dx * c[4]) / det;
        Ok((col, row))
    }

    /// Cell containing a world coordinate, if inside a `width` × `height` grid.
    pub fn cell_of(&self, coord: Coord<f64>, width: usize, height: usize) -> Option<(usize, usize)> {
        let (col, row) = self.invert(coord).ok()?;
        if col < 0.0 || row < 0.0 { return None }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        (col < width && row < height).then_some((row, col))
    }

    /// Transform of the sub-grid starting at `window`'s top-left cell.
    pub fn for_window(&self, window: &Window) -> Self {
        let origin = self.apply(window.col_off as f64, window.row_off as f64);
        let mut c = self.0;
        c[0] = origin.x;
        c[3] = origin.y;
        Self(c)
    }

    /// Smallest window of a `width` × `height` grid whose cells cover `bounds`.
    ///
    /// Returns `None` when `bounds` lies entirely outside the grid. Only north-up
    /// grids can be windowed.
    pub fn window_for_bounds(&self, bounds: &Rect<f64>, width: usize, height: usize) -> Result<Option<Window>> {
        if !self.is_north_up() {
            return Err(Error::data("cropping a rotated raster is not supported"))
        }
        let (c0, r0) = self.invert(bounds.min())?;
        let (c1, r1) = self.invert(bounds.max())?;

        let (col_min, col_max) = (c0.min(c1), c0.max(c1));
        let (row_min, row_max) = (r0.min(r1), r0.max(r1));
        if col_max < 0.0 || row_max < 0.0 || col_min >= width as f64 || row_min >= height as f64 {
            return Ok(None)
        }

        let col_start = col_min.floor().max(0.0) as usize;
        let row_start = row_min.floor().max(0.0) as usize;
        // A bound landing exactly on a cell edge does not pull in the next cell.
        let col_end = (col_max.ceil() as usize).max(col_start + 1).min(width);
        let row_end = (row_max.ceil() as usize).max(row_start + 1).min(height);

        Ok(Some(Window::new(col_start, row_start, col_end - col_start, row_end - row_start)))
    }

    /// World extent of a `width` × `height` grid.
    pub fn extent(&self, width: usize, height: usize) -> Rect<f64> {
        Rect::new(self.apply(0.0, 0.0), self.apply(width as f64, height as f64))
    }
}
