/// Rectangular range of cells, in pixel offsets from the raster's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self { col_off, row_off, width, height }
    }

    /// Window spanning a whole `width` × `height` grid.
    pub fn full(width: usize, height: usize) -> Self { Self::new(0, 0, width, height) }

    #[inline] pub fn len(&self) -> usize { self.width * self.height }
    #[inline] pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// True if this window lies entirely inside a `width` × `height` grid.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.col_off + self.width <= width && self.row_off + self.height <= height
    }
}

/// Tile a `width` × `height` grid into windows of at most `block` × `block` cells,
/// row-major. Edge windows are truncated.
pub fn blocks(width: usize, height: usize, block: usize) -> Vec<Window> {
    let block = block.max(1);
    let mut windows = Vec::with_capacity(width.div_ceil(block) * height.div_ceil(block));
    for row_off in (0..height).step_by(block) {
        for col_off in (0..width).step_by(block) {
            windows.push(Window::new(
                col_off,
                row_off,
                block.min(width - col_off),
                block.min(height - row_off),
            ));
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_tile_the_grid_exactly() {
        let windows = blocks(5, 3, 2);
        assert_eq!(windows.len(), 6);
        assert_eq!(windows[0], Window::new(0, 0, 2, 2));
        assert_eq!(windows[2], Window::new(4, 0, 1, 2));
        assert_eq!(windows[5], Window::new(4, 2, 1, 1));
        assert_eq!(windows.iter().map(Window::len).sum::<usize>(), 15);
    }

    #[test]
    fn oversized_block_is_one_window() {
        assert_eq!(blocks(4, 4, 1024), vec![Window::full(4, 4)]);
        assert!(blocks(0, 4, 16).is_empty());
    }

    #[test]
    fn fits_checks_both_axes() {
        assert!(Window::new(1, 1, 2, 2).fits(3, 3));
        assert!(!Window::new(2, 0, 2, 1).fits(3, 3));
    }
}
