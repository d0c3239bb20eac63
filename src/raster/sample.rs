use std::collections::BTreeMap;

use geo::Coord;

use crate::crs::{CoordinateFrame, SpatialRef};
use crate::error::Result;
use crate::raster::{RasterSource, Window};

/// Tile edge used to batch point reads.
const SAMPLE_BLOCK: usize = 512;

/// Value of the cell under each point, `None` outside the grid or on nodata.
///
/// Points are given in `srs` and moved into the raster's reference system first.
/// Reads are grouped by tile so each tile is fetched at most once.
pub fn sample_points(raster: &dyn RasterSource, points: &[Coord<f64>], srs: &SpatialRef) -> Result<Vec<Option<f64>>> {
    let info = raster.info();
    let frame = CoordinateFrame::new(srs, info.require_spatial_ref()?)?;
    let points = frame.transform_coords(points)?;

    let mut tiles: BTreeMap<(usize, usize), Vec<(usize, usize, usize)>> = BTreeMap::new();
    for (i, &p) in points.iter().enumerate() {
        if let Some((row, col)) = info.geotransform.cell_of(p, info.width, info.height) {
            tiles.entry((row / SAMPLE_BLOCK, col / SAMPLE_BLOCK)).or_default().push((i, row, col));
        }
    }

    let mut out = vec![None; points.len()];
    for ((tile_row, tile_col), hits) in tiles {
        let (row_off, col_off) = (tile_row * SAMPLE_BLOCK, tile_col * SAMPLE_BLOCK);
        let window = Window::new(
            col_off,
            row_off,
            SAMPLE_BLOCK.min(info.width - col_off),
            SAMPLE_BLOCK.min(info.height - row_off),
        );
        let cells = raster.read_window(&window)?;
        for (i, row, col) in hits {
            let value = cells[[row - row_off, col - col_off]];
            out[i] = (!info.is_nodata(value)).then_some(value);
        }
    }
    Ok(out)
}
