//! Burn vector geometries into a binary cell mask.

use geo::{Coord, Geometry, LineString, Polygon};
use ndarray::Array2;

use crate::error::Result;
use crate::raster::GeoTransform;

/// Binary mask of the cells of a `width` × `height` grid covered by `geometry`.
///
/// Polygons cover the cells whose center is inside (even-odd over all rings);
/// with `all_touched` their boundary cells are burned as well. Lines cover every
/// cell they pass through, points the cell containing them.
pub fn rasterize(geometry: &Geometry<f64>, transform: &GeoTransform, width: usize, height: usize, all_touched: bool) -> Result<Array2<u8>> {
    let mut mask = Mask { cells: Array2::zeros((height, width)), width, height };
    burn(&mut mask, geometry, transform, all_touched)?;
    Ok(mask.cells)
}

struct Mask {
    cells: Array2<u8>,
    width: usize,
    height: usize,
}

impl Mask {
    #[inline]
    fn set(&mut self, col: i64, row: i64) {
        if col >= 0 && row >= 0 && (col as usize) < self.width && (row as usize) < self.height {
            self.cells[[row as usize, col as usize]] = 1;
        }
    }
}

fn to_pixels(transform: &GeoTransform, ring: &LineString<f64>) -> Result<Vec<Coord<f64>>> {
    ring.0.iter()
        .map(|&c| transform.invert(c).map(|(x, y)| Coord { x, y }))
        .collect()
}

fn burn(mask: &mut Mask, geometry: &Geometry<f64>, transform: &GeoTransform, all_touched: bool) -> Result<()> {
    match geometry {
        Geometry::Point(p) => {
            let (col, row) = transform.invert(p.0)?;
            mask.set(col.floor() as i64, row.floor() as i64);
        }
        Geometry::MultiPoint(mp) => {
            for p in &mp.0 { burn(mask, &Geometry::Point(*p), transform, all_touched)? }
        }
        Geometry::Line(l) => {
            let ls = LineString::from(vec![l.start, l.end]);
            burn_line(mask, &to_pixels(transform, &ls)?);
        }
        Geometry::LineString(ls) => burn_line(mask, &to_pixels(transform, ls)?),
        Geometry::MultiLineString(mls) => {
            for ls in &mls.0 { burn_line(mask, &to_pixels(transform, ls)?) }
        }
        Geometry::Polygon(p) => burn_polygon(mask, p, transform, all_touched)?,
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 { burn_polygon(mask, p, transform, all_touched)? }
        }
        Geometry::Rect(r) => burn_polygon(mask, &r.to_polygon(), transform, all_touched)?,
        Geometry::Triangle(t) => burn_polygon(mask, &t.to_polygon(), transform, all_touched)?,
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 { burn(mask, g, transform, all_touched)? }
        }
    }
    Ok(())
}

fn burn_polygon(mask: &mut Mask, polygon: &Polygon<f64>, transform: &GeoTransform, all_touched: bool) -> Result<()> {
    let rings = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| to_pixels(transform, ring))
        .collect::<Result<Vec<_>>>()?;

    let mut crossings = Vec::new();
    for row in 0..mask.height {
        let y = row as f64 + 0.5;
        crossings.clear();
        for ring in &rings {
            let n = ring.len();
            if n < 2 { continue }
            // rings may or may not repeat their first vertex
            for i in 0..n {
                let (a, b) = (ring[i], ring[(i + 1) % n]);
                if (a.y <= y) != (b.y <= y) {
                    crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0) as i64;
            let end = ((span[1] - 0.5).ceil() as i64).min(mask.width as i64);
            for col in start..end { mask.set(col, row as i64) }
        }
    }

    if all_touched {
        for ring in &rings { burn_line(mask, ring) }
    }
    Ok(())
}

fn burn_line(mask: &mut Mask, coords: &[Coord<f64>]) {
    if let [only] = coords {
        mask.set(only.x.floor() as i64, only.y.floor() as i64);
    }
    for pair in coords.windows(2) {
        burn_segment(mask, pair[0], pair[1]);
    }
}

/// Grid traversal of one segment: every cell the segment enters is burned.
fn burn_segment(mask: &mut Mask, a: Coord<f64>, b: Coord<f64>) {
    let (mut col, mut row) = (a.x.floor() as i64, a.y.floor() as i64);
    let (end_col, end_row) = (b.x.floor() as i64, b.y.floor() as i64);
    let (dx, dy) = (b.x - a.x, b.y - a.y);

    let step_col = dx.signum() as i64;
    let step_row = dy.signum() as i64;
    let delta_x = if dx != 0.0 { 1.0 / dx.abs() } else { f64::INFINITY };
    let delta_y = if dy != 0.0 { 1.0 / dy.abs() } else { f64::INFINITY };
    let mut next_x = if dx > 0.0 {
        (col as f64 + 1.0 - a.x) / dx
    } else if dx < 0.0 {
        (a.x - col as f64) / -dx
    } else {
        f64::INFINITY
    };
    let mut next_y = if dy > 0.0 {
        (row as f64 + 1.0 - a.y) / dy
    } else if dy < 0.0 {
        (a.y - row as f64) / -dy
    } else {
        f64::INFINITY
    };

    let steps = (end_col - col).abs() + (end_row - row).abs();
    mask.set(col, row);
    for _ in 0..steps {
        if next_x < next_y {
            col += step_col;
            next_x += delta_x;
        } else {
            row += step_row;
            next_y += delta_y;
        }
        mask.set(col, row);
    }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, point, polygon};

    use super::*;

    /// 1-unit cells, top-left at (0, 10): cell (row, col) spans x in [col, col+1), y in (10-row-1, 10-row].
    fn unit_grid() -> GeoTransform {
        GeoTransform::north_up(Coord { x: 0.0, y: 10.0 }, 1.0, 1.0)
    }

    fn burned(mask: &Array2<u8>) -> Vec<(usize, usize)> {
        mask.indexed_iter().filter(|(_, v)| **v == 1).map(|(ix, _)| ix).collect()
    }

    #[test]
    fn polygon_uses_cell_centers() {
        // covers centers of cols 1..=2, rows 1..=2, touches but misses col 3 centers
        let square: Geometry<f64> = polygon![
            (x: 1.2, y: 8.8), (x: 3.3, y: 8.8), (x: 3.3, y: 6.7), (x: 1.2, y: 6.7),
        ].into();
        let mask = rasterize(&square, &unit_grid(), 5, 5, false).unwrap();
        assert_eq!(burned(&mask), vec![(1, 1), (1, 2), (2, 1), (2, 2)]);

        let touched = rasterize(&square, &unit_grid(), 5, 5, true).unwrap();
        assert_eq!(burned(&touched).len(), 9);
    }

    #[test]
    fn polygon_holes_are_excluded() {
        let donut: Geometry<f64> = polygon!(
            exterior: [(x: 0.0, y: 10.0), (x: 3.0, y: 10.0), (x: 3.0, y: 7.0), (x: 0.0, y: 7.0)],
            interiors: [[(x: 1.1, y: 8.9), (x: 1.9, y: 8.9), (x: 1.9, y: 8.1), (x: 1.1, y: 8.1)]],
        ).into();
        let mask = rasterize(&donut, &unit_grid(), 5, 5, false).unwrap();
        assert_eq!(burned(&mask).len(), 8);
        assert_eq!(mask[[1, 1]], 0);
    }

    #[test]
    fn lines_burn_every_crossed_cell() {
        let line: Geometry<f64> = line_string![(x: 0.5, y: 9.5), (x: 3.5, y: 9.5)].into();
        let mask = rasterize(&line, &unit_grid(), 5, 5, false).unwrap();
        assert_eq!(burned(&mask), vec![(0, 0), (0, 1), (0, 2), (0, 3)]);

        let diagonal: Geometry<f64> = line_string![(x: 0.5, y: 9.5), (x: 2.5, y: 8.7)].into();
        let mask = rasterize(&diagonal, &unit_grid(), 5, 5, false).unwrap();
        assert_eq!(burned(&mask), vec![(0, 0), (0, 1), (1, 1), (1, 2)]);
    }

    #[test]
    fn lines_are_clipped_to_the_grid() {
        let line: Geometry<f64> = line_string![(x: -3.5, y: 9.5), (x: 1.5, y: 9.5)].into();
        let mask = rasterize(&line, &unit_grid(), 2, 2, false).unwrap();
        assert_eq!(burned(&mask), vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn points_burn_their_cell() {
        let p: Geometry<f64> = point! { x: 2.5, y: 7.5 }.into();
        let mask = rasterize(&p, &unit_grid(), 5, 5, false).unwrap();
        assert_eq!(burned(&mask), vec![(2, 2)]);
    }
}
