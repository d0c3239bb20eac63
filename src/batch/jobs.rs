//! The batch jobs: which stores and rasters each visits, what it writes, and
//! the checkpoint entries it keeps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::access::network::{AFFECT_DAYS, EDGES_LAYER, NODES_LAYER};
use crate::access::{AccessibilityConfig, AccessibilityModel, NodePoints, RoadNetwork, Scenario, read_affected_facilities};
use crate::aggregate::{AggregatorConfig, BlockAggregator, MemoryProbe};
use crate::batch::{BatchReport, BatchRunner, ItemOutcome};
use crate::common::fs::{extract_zip_entry, file_name, file_stem, list_files_with_suffix, list_zip_entries};
use crate::error::{Error, Result, ResultExt};
use crate::facility::{FacilitySource, link_store};
use crate::raster::{RasterAccessor, RasterSource};
use crate::roads;
use crate::store::{AttributeStore, ColumnType, FeatureStore, GeoPackage, UpsertPolicy, Value, ident};
use crate::zonal::{ZonalExtractor, ZonalOptions};

pub const FLOOD_DAYS_JOB: &str = "Flooding_Road";
pub const FLOOD_EVENTS_JOB: &str = "Flooding_Road_By_Max_Influence";
pub const NODE_RASTER_SUM_JOB: &str = "Node_Raster_Sum";
pub const LINK_FACILITIES_JOB: &str = "Link_Facilities";
pub const ROAD_LENGTH_JOB: &str = "Road_Length";
pub const ACCESSIBILITY_JOB: &str = "Accessibility";

const STORE_SUFFIX: &str = ".gpkg";
const RASTER_SUFFIX: &str = ".tif";

/// File names of the stores directly under `root`.
fn store_items(root: &Path) -> Result<Vec<String>> {
    list_files_with_suffix(root, STORE_SUFFIX)?
        .iter()
        .map(|p| file_name(p))
        .collect()
}

/// Open a raster that the whole job depends on.
fn open_required(accessor: &dyn RasterAccessor, path: &Path) -> Result<Box<dyn RasterSource>> {
    let raster = accessor.open(path)
        .map_err(|e| Error::configuration(format!("raster {} could not be opened: {e}", path.display())))?;
    if raster.info().spatial_ref.is_none() {
        return Err(Error::configuration(format!("raster {} has no spatial reference", path.display())))
    }
    Ok(raster)
}

#[derive(Debug, Default, Clone, Copy)]
struct ZonalTally {
    features: usize,
    failed: usize,
    nonzero: usize,
}

impl ZonalTally {
    fn outcome(&self) -> ItemOutcome {
        if self.failed == 0 { ItemOutcome::Completed } else { ItemOutcome::Incomplete { failed: self.failed } }
    }
}

/// Whole days from a zonal maximum; features touching no flooded cell get 0.
#[inline]
fn max_days(max: Option<f64>) -> i64 { max.map_or(0, |v| v.round() as i64) }

/// Zonal maximum of every feature in `fids`, handed to `flush` one chunk at a time.
///
/// Per-feature failures are logged and counted; they never stop the chunk.
fn zonal_max_chunks(
    store: &GeoPackage,
    extractor: &ZonalExtractor<'_>,
    runner: &BatchRunner<'_>,
    layer: &str,
    fids: &[i64],
    mut flush: impl FnMut(Vec<(i64, Value)>) -> Result<()>,
) -> Result<ZonalTally> {
    let label = store.path().display().to_string();
    let mut tally = ZonalTally::default();

    for (n, chunk) in fids.chunks(runner.chunk_size()).enumerate() {
        let features = store.features_by_fid(layer, chunk, &[])?;
        if features.len() < chunk.len() {
            let missing = chunk.len() - features.len();
            log::error!("{label}: {missing} fids of chunk {n} not found in {layer}");
            tally.failed += missing;
        }

        let results = runner.pools().compute.install(|| {
            features.par_iter().map(|f| {
                let result = match &f.geometry {
                    Some(geometry) => extractor.max(geometry),
                    None => Err(Error::data(format!("fid {} of {layer} has no geometry", f.fid))),
                };
                (f.fid, result)
            }).collect::<Vec<_>>()
        });

        let mut rows = Vec::with_capacity(results.len());
        for (fid, result) in results {
            match result {
                Ok(max) => {
                    let days = max_days(max);
                    if days != 0 { tally.nonzero += 1 }
                    rows.push((fid, Value::Integer(days)));
                }
                Err(e) => {
                    log::error!("{label}: fid {fid} failed: {e}");
                    tally.failed += 1;
                }
            }
        }
        tally.features += rows.len();
        flush(rows)?;
        log::debug!("{label}: chunk {n} done, {} features so far", tally.features);
    }
    Ok(tally)
}

/// Maximum flood days of one raster under every edge of every store.
///
/// Only rows whose column is still NULL are computed and written, so an
/// interrupted store resumes where it stopped.
#[derive(Debug, Clone)]
pub struct FloodDaysJob {
    pub store_root: PathBuf,
    pub raster: PathBuf,
    pub layer: String,
    pub column: String,
    pub zonal: ZonalOptions,
}

impl FloodDaysJob {
    pub fn new(store_root: impl Into<PathBuf>, raster: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            raster: raster.into(),
            layer: EDGES_LAYER.to_string(),
            column: AFFECT_DAYS.to_string(),
            zonal: ZonalOptions::default(),
        }
    }

    pub fn run(&self, runner: &BatchRunner<'_>, accessor: &dyn RasterAccessor) -> Result<BatchReport> {
        ident(&self.layer)?;
        ident(&self.column)?;
        let raster = open_required(accessor, &self.raster)?;
        let stores = store_items(&self.store_root)?;
        runner.run(FLOOD_DAYS_JOB, None, &stores, |name| {
            self.process_store(runner, raster.as_ref(), &self.store_root.join(name))
        })
    }

    fn process_store(&self, runner: &BatchRunner<'_>, raster: &dyn RasterSource, path: &Path) -> Result<ItemOutcome> {
        let store = GeoPackage::open(path)?;
        let extractor = ZonalExtractor::new(raster, &store.spatial_ref(&self.layer)?, self.zonal)?;
        store.ensure_column(&self.layer, &self.column, ColumnType::Integer, None, true)?;

        let fids = store.fids_where_null(&self.layer, &self.column)?;
        if fids.is_empty() {
            log::info!("{}: {}.{} already filled", path.display(), self.layer, self.column);
            return Ok(ItemOutcome::Skipped)
        }

        let tally = zonal_max_chunks(&store, &extractor, runner, &self.layer, &fids, |rows| {
            store.bulk_upsert(&self.layer, &self.column, &rows, UpsertPolicy::FillNull).map(drop)
        })?;
        log::info!(
            "{}: {} features written ({} flooded), {} failed",
            path.display(), tally.features, tally.nonzero, tally.failed
        );
        Ok(tally.outcome())
    }
}

/// A flood event raster packed inside a country's zip archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodEvent {
    /// Base name of the raster, without extension; the checkpoint item.
    pub name: String,
    pub archive: PathBuf,
    pub entry: String,
}

impl FloodEvent {
    /// Column the event's maxima are written to: every character outside
    /// `[A-Za-z0-9_]` becomes `_`, and a leading digit gets a `_` prefix.
    pub fn column(&self) -> String {
        let mut column = self.name.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect::<String>();
        if !column.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            column.insert(0, '_');
        }
        column
    }
}

impl AsRef<str> for FloodEvent {
    fn as_ref(&self) -> &str { &self.name }
}

/// Maximum flood days per event raster, one column per event, for every store
/// `<ISO3>.gpkg` with archives under `<raster_root>/<ISO3>/`.
#[derive(Debug, Clone)]
pub struct FloodEventsJob {
    pub store_root: PathBuf,
    pub raster_root: PathBuf,
    /// Where event rasters are (or get) decompressed.
    pub decompressed_root: PathBuf,
    pub layer: String,
    pub zonal: ZonalOptions,
}

impl FloodEventsJob {
    pub fn new(store_root: impl Into<PathBuf>, raster_root: impl Into<PathBuf>, decompressed_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            raster_root: raster_root.into(),
            decompressed_root: decompressed_root.into(),
            layer: EDGES_LAYER.to_string(),
            zonal: ZonalOptions::default(),
        }
    }

    /// Every `.tif` entry of the zip archives in `dir`.
    pub fn list_events(dir: &Path) -> Result<Vec<FloodEvent>> {
        let mut events = Vec::new();
        for archive in list_files_with_suffix(dir, ".zip")? {
            for entry in list_zip_entries(&archive, RASTER_SUFFIX)? {
                let name = file_stem(Path::new(&entry))?;
                events.push(FloodEvent { name, archive: archive.clone(), entry });
            }
        }
        Ok(events)
    }

    pub fn run(&self, runner: &BatchRunner<'_>, accessor: &dyn RasterAccessor) -> Result<BatchReport> {
        ident(&self.layer)?;
        let mut report = BatchReport::default();
        for name in store_items(&self.store_root)? {
            let country = file_stem(Path::new(&name))?;
            let dir = self.raster_root.join(&country);
            if !dir.is_dir() {
                log::warn!("no rasters found for {country}");
                continue
            }
            let events = match Self::list_events(&dir) {
                Ok(events) => events,
                Err(e) if e.is_recoverable() => {
                    log::error!("[{FLOOD_EVENTS_JOB}] {name}: listing events failed: {e}");
                    report.fail(name, e);
                    continue
                }
                Err(e) => return Err(e),
            };
            let path = self.store_root.join(&name);
            report.merge(runner.run(FLOOD_EVENTS_JOB, Some(&name), &events, |event| {
                self.process_event(runner, accessor, &path, event)
            })?);
        }
        Ok(report)
    }

    /// Path of the decompressed raster, extracting it on first use.
    fn materialize(&self, event: &FloodEvent) -> Result<PathBuf> {
        let path = self.decompressed_root.join(format!("{}{RASTER_SUFFIX}", event.name));
        if !path.is_file() {
            log::debug!("extracting {} from {}", event.entry, event.archive.display());
            extract_zip_entry(&event.archive, &event.entry, &path)?;
        }
        Ok(path)
    }

    fn process_event(&self, runner: &BatchRunner<'_>, accessor: &dyn RasterAccessor, path: &Path, event: &FloodEvent) -> Result<ItemOutcome> {
        let raster = accessor.open(&self.materialize(event)?).with_context(|| format!("event {}", event.name))?;
        let store = GeoPackage::open(path)?;
        let extractor = ZonalExtractor::new(raster.as_ref(), &store.spatial_ref(&self.layer)?, self.zonal)?;

        let fids = store.fids(&self.layer)?;
        let mut rows = Vec::with_capacity(fids.len());
        let tally = zonal_max_chunks(&store, &extractor, runner, &self.layer, &fids, |chunk| {
            rows.extend(chunk);
            Ok(())
        })?;

        if tally.nonzero == 0 && tally.failed == 0 {
            log::info!("{}: no non-zero values for {}", path.display(), event.name);
            return Ok(ItemOutcome::Completed)
        }

        let column = event.column();
        store.ensure_column(&self.layer, &column, ColumnType::Integer, None, false)?;
        for chunk in rows.chunks(runner.chunk_size()) {
            store.bulk_upsert(&self.layer, &column, chunk, UpsertPolicy::Overwrite)?;
        }
        log::info!("{}: {column} written, {} flooded edges", path.display(), tally.nonzero);
        Ok(tally.outcome())
    }
}

/// A raster summed onto the nodes into `field`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RasterTarget {
    pub raster: PathBuf,
    pub field: String,
}

/// Sum raster cells onto their nearest node, one column per raster.
#[derive(Debug, Clone)]
pub struct NodeRasterSumJob {
    pub store_root: PathBuf,
    pub targets: Vec<RasterTarget>,
    pub aggregator: AggregatorConfig,
}

impl NodeRasterSumJob {
    pub fn new(store_root: impl Into<PathBuf>, targets: Vec<RasterTarget>) -> Self {
        Self { store_root: store_root.into(), targets, aggregator: AggregatorConfig::default() }
    }

    pub fn run(&self, runner: &BatchRunner<'_>, accessor: &dyn RasterAccessor, probe: Arc<dyn MemoryProbe>) -> Result<BatchReport> {
        for target in &self.targets { ident(&target.field)?; }
        let aggregator = BlockAggregator::new(self.aggregator.clone(), runner.pools().compute.clone(), probe);
        let fields = self.targets.iter().map(|t| t.field.clone()).collect::<Vec<_>>();

        let mut report = BatchReport::default();
        for name in store_items(&self.store_root)? {
            let path = self.store_root.join(&name);
            if runner.log().pending(NODE_RASTER_SUM_JOB, Some(&name), &fields).is_empty() {
                report.merge(runner.run(NODE_RASTER_SUM_JOB, Some(&name), &fields, |_| Ok(ItemOutcome::Skipped))?);
                continue
            }
            let nodes = match GeoPackage::open(&path).and_then(|store| NodePoints::load(&store)) {
                Ok(nodes) => nodes,
                Err(e) if e.is_recoverable() => {
                    log::error!("[{NODE_RASTER_SUM_JOB}] {name}: reading nodes failed: {e}");
                    report.fail(name, e);
                    continue
                }
                Err(e) => return Err(e),
            };
            report.merge(runner.run(NODE_RASTER_SUM_JOB, Some(&name), &fields, |field| {
                let target = self.targets.iter().find(|t| &t.field == field)
                    .ok_or_else(|| Error::configuration(format!("no raster for field {field}")))?;
                self.process_target(&aggregator, accessor, &path, &nodes, target)
            })?);
            // assignments are keyed by the node set, so they never carry over to another store
            aggregator.cache().clear();
        }
        Ok(report)
    }

    fn process_target(&self, aggregator: &BlockAggregator, accessor: &dyn RasterAccessor, path: &Path, nodes: &NodePoints, target: &RasterTarget) -> Result<ItemOutcome> {
        let store = GeoPackage::open(path)?;
        if store.has_column(NODES_LAYER, &target.field)? && store.column_sum(NODES_LAYER, &target.field)? != 0.0 {
            log::info!("{}: {} already populated, raster not read", path.display(), target.field);
            return Ok(ItemOutcome::Skipped)
        }

        let raster = accessor.open(&target.raster).with_context(|| format!("raster {}", target.raster.display()))?;
        let sums = aggregator.aggregate(raster.as_ref(), &nodes.coords, &nodes.srs)
            .with_context(|| format!("aggregating {}", target.raster.display()))?;

        store.ensure_column(NODES_LAYER, &target.field, ColumnType::Real, None, false)?;
        let rows = nodes.fids.iter().zip(sums).map(|(&fid, sum)| (fid, Value::Real(sum))).collect::<Vec<_>>();
        store.bulk_upsert(NODES_LAYER, &target.field, &rows, UpsertPolicy::Overwrite)?;
        log::info!("{}: {} summed onto {} nodes", path.display(), target.field, rows.len());
        Ok(ItemOutcome::Completed)
    }
}

/// Link facility points to the nearest node of every store.
#[derive(Debug, Clone)]
pub struct FacilityLinkJob {
    pub store_root: PathBuf,
    pub source: FacilitySource,
}

impl FacilityLinkJob {
    pub fn run(&self, runner: &BatchRunner<'_>) -> Result<BatchReport> {
        let (facilities, srs) = self.source.read()
            .map_err(|e| Error::configuration(format!("facilities {}: {e}", self.source.label())))?;
        let stores = store_items(&self.store_root)?;
        runner.run(LINK_FACILITIES_JOB, None, &stores, |name| {
            link_store(&GeoPackage::open(&self.store_root.join(name))?, &facilities, &srs)?;
            Ok(ItemOutcome::Completed)
        })
    }
}

/// Geodesic edge lengths for every store.
#[derive(Debug, Clone)]
pub struct RoadLengthJob {
    pub store_root: PathBuf,
}

impl RoadLengthJob {
    pub fn run(&self, runner: &BatchRunner<'_>) -> Result<BatchReport> {
        let stores = store_items(&self.store_root)?;
        runner.run(ROAD_LENGTH_JOB, None, &stores, |name| {
            let written = roads::update_lengths(&GeoPackage::open(&self.store_root.join(name))?)?;
            log::info!("{name}: {written} edge lengths written");
            Ok(ItemOutcome::Completed)
        })
    }
}

/// 2SFCA scores for every store, before or after an event.
#[derive(Debug, Clone)]
pub struct AccessibilityJob {
    pub store_root: PathBuf,
    pub config: AccessibilityConfig,
    /// CSV of facilities hit by the event; `None` evaluates the baseline.
    pub affected: Option<PathBuf>,
}

impl AccessibilityJob {
    pub fn scenario(&self) -> Result<Scenario> {
        match &self.affected {
            None => Ok(Scenario::Baseline),
            Some(path) => Ok(Scenario::PostEvent { affected: read_affected_facilities(path)? }),
        }
    }

    pub fn run(&self, runner: &BatchRunner<'_>) -> Result<BatchReport> {
        ident(&self.config.demand_field)?;
        let pool = match self.config.threads {
            None => runner.pools().compute.clone(),
            Some(threads) => Arc::new(ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("2sfca-{i}"))
                .build()
                .map_err(|e| Error::configuration(format!("failed to build accessibility pool: {e}")))?),
        };
        let model = AccessibilityModel::new(&self.config, pool)?;
        let scenario = self.scenario()
            .map_err(|e| Error::configuration(format!("affected facilities: {e}")))?;
        let stores = store_items(&self.store_root)?;

        runner.run(ACCESSIBILITY_JOB, Some(scenario.suffix()), &stores, |name| {
            let store = GeoPackage::open(&self.store_root.join(name))?;
            let network = RoadNetwork::load(&store, &self.config.demand_field, &scenario)?;
            let scores = model.run(&network)?;
            model.persist(&store, &network, &scores, &scenario)?;
            log::info!(
                "{name}: {} supply ratios, {} accessibility scores ({})",
                scores.supply_ratios.len(), scores.accessibility.len(), scenario.suffix()
            );
            Ok(ItemOutcome::Completed)
        })
    }
}

#[cfg(test)]
mod tests {
    use geo::{Coord, Geometry, line_string, point};
    use ndarray::Array2;
    use tempfile::TempDir;

    use super::*;
    use crate::aggregate::FixedMemory;
    use crate::batch::Pools;
    use crate::checkpoint::CheckpointLog;
    use crate::crs::SpatialRef;
    use crate::raster::{GeoTransform, GridRaster, MemoryAccessor, RasterInfo};

    fn flood_raster() -> GridRaster {
        // 10x10 grid of 4 m cells from (0, 40); the left half floods for 3 days, one cell for 9
        let mut cells = Array2::zeros((10, 10));
        cells.slice_mut(ndarray::s![.., ..5]).fill(3.0);
        cells[[2, 2]] = 9.0;
        let info = RasterInfo {
            width: 10,
            height: 10,
            geotransform: GeoTransform::north_up(Coord { x: 0.0, y: 40.0 }, 4.0, 4.0),
            spatial_ref: Some(SpatialRef::Epsg(3857)),
            nodata: Some(-1.0),
        };
        GridRaster::new(info, cells).unwrap()
    }

    fn road_store(dir: &Path, name: &str) -> GeoPackage {
        let gpkg = GeoPackage::create(&dir.join(name)).unwrap();
        gpkg.create_layer(EDGES_LAYER, "LINESTRING", Some(&SpatialRef::Epsg(3857)), &[]).unwrap();
        let edges: [Geometry<f64>; 3] = [
            line_string![(x: 1.0, y: 30.0), (x: 15.0, y: 30.0)].into(),
            line_string![(x: 25.0, y: 10.0), (x: 38.0, y: 10.0)].into(),
            line_string![(x: 1.0, y: 38.0), (x: 6.0, y: 34.0)].into(),
        ];
        let rows = edges.map(|g| (Some(g), vec![]));
        gpkg.insert_features(EDGES_LAYER, &rows).unwrap();

        gpkg.create_layer(NODES_LAYER, "POINT", Some(&SpatialRef::Epsg(3857)), &[]).unwrap();
        let nodes = [(10.0, 20.0), (30.0, 20.0)].map(|(x, y)| (Some(Geometry::Point(point! { x: x, y: y })), vec![]));
        gpkg.insert_features(NODES_LAYER, &nodes).unwrap();
        gpkg
    }

    fn days(gpkg: &GeoPackage, column: &str) -> Vec<Option<i64>> {
        gpkg.features(EDGES_LAYER, &[column]).unwrap().iter().map(|f| f.get_i64(column)).collect()
    }

    #[test]
    fn flood_days_fills_edges_and_checkpoints_stores() {
        let dir = TempDir::new().unwrap();
        let gpkg = road_store(dir.path(), "CHN.gpkg");
        let accessor = MemoryAccessor::new();
        accessor.insert("days.tif", flood_raster());

        let (log, pools) = (CheckpointLog::in_memory(), Pools::with_threads(2, 1).unwrap());
        let runner = BatchRunner::new(&log, &pools).with_chunk_size(2);
        let job = FloodDaysJob::new(dir.path(), "days.tif");

        let report = job.run(&runner, &accessor).unwrap();
        assert_eq!(report.completed, ["CHN.gpkg"]);
        assert_eq!(days(&gpkg, AFFECT_DAYS), [Some(9), Some(0), Some(3)]);
        assert!(log.is_done(FLOOD_DAYS_JOB, None, "CHN.gpkg"));

        let again = job.run(&runner, &accessor).unwrap();
        assert_eq!(again.skipped, ["CHN.gpkg"]);
        assert!(again.completed.is_empty());
    }

    #[test]
    fn flood_days_without_raster_is_fatal() {
        let dir = TempDir::new().unwrap();
        road_store(dir.path(), "CHN.gpkg");
        let (log, pools) = (CheckpointLog::in_memory(), Pools::with_threads(1, 1).unwrap());
        let runner = BatchRunner::new(&log, &pools);
        let err = FloodDaysJob::new(dir.path(), "missing.tif").run(&runner, &MemoryAccessor::new()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn node_raster_sum_skips_populated_columns() {
        let dir = TempDir::new().unwrap();
        let gpkg = road_store(dir.path(), "CHN.gpkg");
        let accessor = MemoryAccessor::new();
        accessor.insert("pop.tif", flood_raster());

        let (log, pools) = (CheckpointLog::in_memory(), Pools::with_threads(2, 1).unwrap());
        let runner = BatchRunner::new(&log, &pools);
        let target = RasterTarget { raster: "pop.tif".into(), field: "pop".into() };
        let mut job = NodeRasterSumJob::new(dir.path(), vec![target]);
        job.aggregator.block_size = 3;

        let report = job.run(&runner, &accessor, Arc::new(FixedMemory::unlimited())).unwrap();
        assert_eq!(report.completed, ["CHN.gpkg/pop"]);
        let sums = gpkg.features(NODES_LAYER, &["pop"]).unwrap()
            .iter().map(|f| f.get_f64("pop").unwrap()).collect::<Vec<_>>();
        // every flooded cell is in the left half, nearest to the first node
        assert_eq!(sums, [3.0 * 49.0 + 9.0, 0.0]);
        assert_eq!(accessor.opens(), 1);

        // a fresh log still finds the column populated and never opens the raster
        let fresh = CheckpointLog::in_memory();
        let report = job.run(&BatchRunner::new(&fresh, &pools), &accessor, Arc::new(FixedMemory::unlimited())).unwrap();
        assert_eq!(report.skipped, ["CHN.gpkg/pop"]);
        assert_eq!(accessor.opens(), 1);
    }

    #[test]
    fn events_are_named_from_their_archive_entries() {
        let event = FloodEvent { name: "DFO-4321".into(), archive: "CHN/a.zip".into(), entry: "DFO-4321.tif".into() };
        assert_eq!(event.column(), "DFO_4321");
        assert_eq!(event.as_ref(), "DFO-4321");
    }

    #[test]
    fn event_columns_are_valid_identifiers() {
        let column = |name: &str| FloodEvent { name: name.into(), archive: "a.zip".into(), entry: format!("{name}.tif") }.column();
        assert_eq!(column("2019.07 flood"), "_2019_07_flood");
        assert_eq!(column("DFO(4321)+v2"), "DFO_4321__v2");
        assert_eq!(column("_ok_1"), "_ok_1");
        for name in ["2019.07 flood", "DFO(4321)+v2", "événement-3", ""] {
            assert!(ident(&column(name)).is_ok(), "{name}");
        }
    }
}
