//! Vector feature stores and attribute persistence.

mod geopackage;
mod value;
pub mod wkb;

pub use geopackage::GeoPackage;
pub(crate) use geopackage::ident;
pub use value::{ColumnType, Feature, Value};

use crate::crs::SpatialRef;
use crate::error::Result;

/// Read access to layers of point/line/polygon features keyed by a stable integer fid.
pub trait FeatureStore {
    /// Reference system of a layer's geometries.
    fn spatial_ref(&self, layer: &str) -> Result<SpatialRef>;

    /// Every fid of a layer, ascending.
    fn fids(&self, layer: &str) -> Result<Vec<i64>>;

    /// Fids whose `column` is NULL, or all fids if the column does not exist yet.
    fn fids_where_null(&self, layer: &str, column: &str) -> Result<Vec<i64>>;

    /// All features with geometry and the requested attribute columns, in fid order.
    /// Columns the layer lacks read as NULL.
    fn features(&self, layer: &str, columns: &[&str]) -> Result<Vec<Feature>>;

    /// One feature's geometry. A fid with no row is a data error.
    fn feature(&self, layer: &str, fid: i64) -> Result<Feature>;

    /// The subset of `fids` that exist, in fid order.
    fn features_by_fid(&self, layer: &str, fids: &[i64], columns: &[&str]) -> Result<Vec<Feature>>;
}

/// How `bulk_upsert` treats rows that already hold a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertPolicy {
    /// Replace whatever is there.
    #[default]
    Overwrite,
    /// Write only rows whose column is still NULL.
    FillNull,
}

/// Column-oriented writes keyed by fid.
pub trait AttributeStore {
    fn has_column(&self, table: &str, column: &str) -> Result<bool>;

    /// Add `column` if missing, optionally with a default and an index. Idempotent.
    fn ensure_column(&self, table: &str, column: &str, ty: ColumnType, default: Option<&Value>, indexed: bool) -> Result<()>;

    /// Write `(fid, value)` pairs in one transaction; returns the number of rows changed.
    fn bulk_upsert(&self, table: &str, column: &str, rows: &[(i64, Value)], policy: UpsertPolicy) -> Result<usize>;

    /// Sum of a numeric column, NULLs ignored.
    fn column_sum(&self, table: &str, column: &str) -> Result<f64>;
}
