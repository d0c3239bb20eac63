use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ahash::AHashMap;
use geo::Coord;
use rayon::ThreadPool;

use crate::aggregate::{AdmissionController, AssignmentCache, AssignmentKey, MemoryProbe, NodeIndex, UNASSIGNED};
use crate::crs::{CoordinateFrame, SpatialRef};
use crate::error::{Error, Result, ResultExt};
use crate::raster::{GeoTransform, RasterSource, Window, blocks};

/// Tuning of block-streamed aggregation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Edge length of a square block, in cells.
    pub block_size: usize,
    /// Cells farther than this from every node (raster units) are left out.
    pub max_distance: Option<f64>,
    /// Memory required before a block starts, as a multiple of its raw footprint.
    pub safety_multiple: f64,
    /// Bytes one cell occupies while a block is processed.
    pub bytes_per_cell: usize,
    pub poll_min_ms: u64,
    pub poll_max_ms: u64,
    /// Blocks admitted concurrently; defaults to twice the pool size.
    pub max_in_flight: Option<usize>,
    /// Reuse cell assignments across rasters on the same grid.
    pub cache_assignments: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            block_size: 1024,
            max_distance: None,
            safety_multiple: 4.0,
            // value + cell center + assignment
            bytes_per_cell: 8 + 16 + 4,
            poll_min_ms: 50,
            poll_max_ms: 2_000,
            max_in_flight: None,
            cache_assignments: true,
        }
    }
}

impl AggregatorConfig {
    /// Bytes that must be free before one block is admitted.
    pub fn required_bytes(&self) -> u64 {
        let cells = (self.block_size * self.block_size) as f64;
        (self.safety_multiple * cells * self.bytes_per_cell as f64).ceil() as u64
    }
}

/// Sums raster cells onto their nearest node, one block at a time.
pub struct BlockAggregator {
    config: AggregatorConfig,
    pool: Arc<ThreadPool>,
    probe: Arc<dyn MemoryProbe>,
    cache: AssignmentCache,
}

impl BlockAggregator {
    pub fn new(config: AggregatorConfig, pool: Arc<ThreadPool>, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { config, pool, probe, cache: AssignmentCache::new() }
    }

    #[inline] pub fn config(&self) -> &AggregatorConfig { &self.config }
    #[inline] pub fn cache(&self) -> &AssignmentCache { &self.cache }

    /// Per-node sum of the cells whose center is nearest to that node.
    ///
    /// `nodes` are in `nodes_srs`; they are moved into the raster's reference
    /// system before indexing. Nodata cells and cells beyond the distance cap are
    /// ignored. Any block failure fails the whole raster.
    pub fn aggregate(&self, raster: &dyn RasterSource, nodes: &[Coord<f64>], nodes_srs: &SpatialRef) -> Result<Vec<f64>> {
        let info = raster.info();
        let raster_srs = info.require_spatial_ref()?;
        let frame = CoordinateFrame::new(nodes_srs, raster_srs)?;
        let points = frame.transform_coords(nodes).context("moving nodes into the raster frame")?;
        let index = NodeIndex::new(&points)?;
        if index.is_empty() { return Ok(Vec::new()) }

        let windows = blocks(info.width, info.height, self.config.block_size);
        let controller = AdmissionController::new(
            self.probe.clone(),
            self.config.required_bytes(),
            self.config.max_in_flight.unwrap_or(2 * self.pool.current_num_threads()),
            Duration::from_millis(self.config.poll_min_ms),
            Duration::from_millis(self.config.poll_max_ms),
        );
        log::debug!(
            "aggregating {}x{} raster onto {} nodes in {} blocks",
            info.width, info.height, index.len(), windows.len()
        );

        let totals = Mutex::new(vec![0.0; index.len()]);
        let failure: Mutex<Option<Error>> = Mutex::new(None);
        let failed = AtomicBool::new(false);
        let grid = info.signature();

        self.pool.in_place_scope(|scope| {
            for window in windows {
                if failed.load(Ordering::Relaxed) { break }
                let permit = controller.admit();
                let (index, grid, totals, failure, failed) = (&index, &grid, &totals, &failure, &failed);
                scope.spawn(move |_| {
                    let _permit = permit;
                    if failed.load(Ordering::Relaxed) { return }
                    let key = AssignmentKey {
                        grid: grid.clone(),
                        fingerprint: index.fingerprint().to_string(),
                        max_distance: self.config.max_distance.map(f64::to_bits),
                        block: window,
                    };
                    match self.reduce_block(raster, index, key) {
                        Ok(partial) => {
                            let mut totals = totals.lock().unwrap_or_else(|e| e.into_inner());
                            for (node, sum) in partial { totals[node] += sum }
                        }
                        Err(e) => {
                            failed.store(true, Ordering::Relaxed);
                            failure.lock().unwrap_or_else(|e| e.into_inner()).get_or_insert(e);
                        }
                    }
                });
            }
        });

        if let Some(e) = failure.into_inner().unwrap_or_else(|e| e.into_inner()) {
            return Err(e)
        }
        Ok(totals.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    /// Sums of one block, keyed by node.
    fn reduce_block(&self, raster: &dyn RasterSource, index: &NodeIndex, key: AssignmentKey) -> Result<AHashMap<usize, f64>> {
        let info = raster.info();
        let window = key.block;
        let values = raster.read_window(&window)
            .with_context(|| format!("reading block {window:?}"))?;

        let compute = || -> Result<Vec<i32>> {
            Ok(assign_block(&info.geotransform, &window, index, self.config.max_distance))
        };
        let assignments = if self.config.cache_assignments {
            self.cache.get_or_compute(key, compute)?
        } else {
            Arc::new(compute()?)
        };

        let mut partial = AHashMap::new();
        for (&value, &node) in values.iter().zip(assignments.iter()) {
            if node == UNASSIGNED || info.is_nodata(value) { continue }
            *partial.entry(node as usize).or_insert(0.0) += value;
        }
        Ok(partial)
    }
}

/// Nearest node of every cell center in `window`, row-major.
fn assign_block(transform: &GeoTransform, window: &Window, index: &NodeIndex, max_distance: Option<f64>) -> Vec<i32> {
    let mut out = Vec::with_capacity(window.len());
    for row in window.row_off..window.row_off + window.height {
        for col in window.col_off..window.col_off + window.width {
            out.push(index.assign(transform.cell_center(row, col), max_distance));
        }
    }
    out
}
