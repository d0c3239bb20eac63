// Per-event flood columns from zipped event rasters.

use std::io::Write;
use std::path::Path;

use geo::{Coord, Geometry, line_string, polygon};
use ndarray::Array2;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use floodreach::access::network::EDGES_LAYER;
use floodreach::batch::jobs::{FLOOD_EVENTS_JOB, FloodEventsJob};
use floodreach::batch::{BatchRunner, Pools};
use floodreach::checkpoint::CheckpointLog;
use floodreach::crs::SpatialRef;
use floodreach::raster::{GeoTransform, GridRaster, MemoryAccessor, RasterInfo};
use floodreach::store::{AttributeStore, FeatureStore, GeoPackage};

fn event_raster(value_at: Option<(usize, usize, f64)>) -> GridRaster {
    let mut cells = Array2::zeros((5, 5));
    if let Some((row, col, v)) = value_at { cells[[row, col]] = v }
    let info = RasterInfo {
        width: 5,
        height: 5,
        geotransform: GeoTransform::north_up(Coord { x: 0.0, y: 5.0 }, 1.0, 1.0),
        spatial_ref: Some(SpatialRef::Epsg(3857)),
        nodata: None,
    };
    GridRaster::new(info, cells).unwrap()
}

fn write_archive(path: &Path, entries: &[&str]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for name in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(b"raster bytes").unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn one_column_per_event_and_empty_events_are_still_logged() {
    let dir = TempDir::new().unwrap();
    let (stores, rasters, decompressed) = (dir.path().join("roads"), dir.path().join("flooding"), dir.path().join("days"));
    std::fs::create_dir_all(&stores).unwrap();

    let gpkg = GeoPackage::create(&stores.join("BRA.gpkg")).unwrap();
    gpkg.create_layer(EDGES_LAYER, "GEOMETRY", Some(&SpatialRef::Epsg(3857)), &[]).unwrap();
    let edges: [Geometry<f64>; 2] = [
        line_string![(x: 0.5, y: 4.5), (x: 4.5, y: 4.5)].into(),
        polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)].into(),
    ];
    gpkg.insert_features(EDGES_LAYER, &edges.map(|g| (Some(g), vec![]))).unwrap();

    write_archive(&rasters.join("BRA").join("events.zip"), &["DFO-1.tif", "DFO-2.tif", "notes.txt"]);
    // no archives for this country: it is passed over
    GeoPackage::create(&stores.join("IND.gpkg")).unwrap();

    let accessor = MemoryAccessor::new();
    accessor.insert(decompressed.join("DFO-1.tif"), event_raster(Some((4, 1, 6.0))));
    accessor.insert(decompressed.join("DFO-2.tif"), event_raster(None));

    let log = CheckpointLog::in_memory();
    let pools = Pools::with_threads(2, 2).unwrap();
    let runner = BatchRunner::new(&log, &pools);
    let job = FloodEventsJob::new(&stores, &rasters, &decompressed);

    let report = job.run(&runner, &accessor).unwrap();
    let mut completed = report.completed.clone();
    completed.sort();
    assert_eq!(completed, ["BRA.gpkg/DFO-1", "BRA.gpkg/DFO-2"]);
    assert!(report.failed.is_empty());

    let values = gpkg.features(EDGES_LAYER, &["DFO_1"]).unwrap()
        .iter().map(|f| f.get_i64("DFO_1")).collect::<Vec<_>>();
    // the polygon covers the bottom-left 2x2 cells, one of which floods
    assert_eq!(values, [Some(0), Some(6)]);
    assert!(!gpkg.has_column(EDGES_LAYER, "DFO_2").unwrap());
    assert!(decompressed.join("DFO-1.tif").is_file());

    assert!(log.is_done(FLOOD_EVENTS_JOB, Some("BRA.gpkg"), "DFO-2"));
    let again = job.run(&runner, &accessor).unwrap();
    assert_eq!(again.skipped.len(), 2);
    assert_eq!(accessor.opens(), 2);
}
