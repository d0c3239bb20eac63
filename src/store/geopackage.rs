use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use geo::Geometry;
use regex::Regex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};

use crate::crs::SpatialRef;
use crate::error::{Error, Result, ResultExt};
use crate::store::wkb::{decode_gpkg, encode_gpkg};
use crate::store::{AttributeStore, ColumnType, Feature, FeatureStore, UpsertPolicy, Value};

/// Upper bound on bound parameters per `IN (...)` query.
const MAX_IN_PARAMS: usize = 500;

/// Wait this long on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(120);

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| unreachable!("identifier pattern: {e}"))
});

/// Reject table/column names that would need escaping, then quote them.
pub(crate) fn ident(name: &str) -> Result<String> {
    if !IDENTIFIER.is_match(name) {
        return Err(Error::configuration(format!("invalid table or column name: {name:?}")))
    }
    Ok(format!("\"{name}\""))
}

/// A GeoPackage (SQLite) file holding feature layers.
///
/// Not shareable across threads; open one handle per worker.
pub struct GeoPackage {
    path: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for GeoPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoPackage").field("path", &self.path).finish()
    }
}

impl GeoPackage {
    /// Open an existing GeoPackage for reading and writing.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::configuration(format!("GeoPackage not found: {}", path.display())))
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_context(|| format!("[store::gpkg] failed to open {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { path: path.to_path_buf(), conn })
    }

    /// Create a new GeoPackage with the core metadata tables.
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("[store::gpkg] failed to create {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA application_id = 1196444487;
             PRAGMA user_version = 10400;
             CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
                 srs_name TEXT NOT NULL,
                 srs_id INTEGER PRIMARY KEY,
                 organization TEXT NOT NULL,
                 organization_coordsys_id INTEGER NOT NULL,
                 definition TEXT NOT NULL,
                 description TEXT
             );
             CREATE TABLE IF NOT EXISTS gpkg_contents (
                 table_name TEXT NOT NULL PRIMARY KEY,
                 data_type TEXT NOT NULL,
                 identifier TEXT UNIQUE,
                 description TEXT DEFAULT '',
                 last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                 min_x DOUBLE, min_y DOUBLE, max_x DOUBLE, max_y DOUBLE,
                 srs_id INTEGER
             );
             CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
                 table_name TEXT NOT NULL,
                 column_name TEXT NOT NULL,
                 geometry_type_name TEXT NOT NULL,
                 srs_id INTEGER NOT NULL,
                 z TINYINT NOT NULL,
                 m TINYINT NOT NULL,
                 CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
             );
             INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES
                 ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
                 ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', NULL),
                 ('WGS 84 geodetic', 4326, 'EPSG', 4326, '+proj=longlat +datum=WGS84 +no_defs', NULL);",
        ).context("[store::gpkg] failed to initialize metadata tables")?;
        Ok(Self { path: path.to_path_buf(), conn })
    }

    #[inline] pub fn path(&self) -> &Path { &self.path }

    /// Names of the feature layers in this package.
    pub fn layers(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT table_name FROM gpkg_geometry_columns ORDER BY table_name")?;
        let names = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Create a feature layer with an integer `fid` key, a `geom` column, and `columns`.
    ///
    /// `srs` of `None` registers the layer as undefined.
    pub fn create_layer(&self, layer: &str, geometry_type: &str, srs: Option<&SpatialRef>, columns: &[(&str, ColumnType)]) -> Result<()> {
        let table = ident(layer)?;
        let srs_id = match srs {
            None => -1,
            Some(srs) => self.register_srs(srs)?,
        };

        let mut ddl = format!("CREATE TABLE {table} (\"fid\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \"geom\" BLOB");
        for (name, ty) in columns {
            ddl.push_str(&format!(", {} {ty}", ident(name)?));
        }
        ddl.push(')');

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&ddl, [])?;
        tx.execute(
            "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id) VALUES (?1, 'features', ?1, ?2)",
            params![layer, srs_id],
        )?;
        tx.execute(
            "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
            params![layer, geometry_type.to_ascii_uppercase(), srs_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn register_srs(&self, srs: &SpatialRef) -> Result<i32> {
        let definition = srs.proj4()?.into_owned();
        let (srs_id, organization, code) = match srs {
            SpatialRef::Epsg(code) => (*code as i32, "EPSG", *code as i32),
            SpatialRef::Proj4(_) => {
                let existing: Option<i32> = self.conn.query_row(
                    "SELECT srs_id FROM gpkg_spatial_ref_sys WHERE definition = ?1",
                    [&definition], |row| row.get(0),
                ).optional()?;
                if let Some(id) = existing { return Ok(id) }
                let next: i32 = self.conn.query_row(
                    "SELECT MAX(100000, COALESCE(MAX(srs_id) + 1, 100000)) FROM gpkg_spatial_ref_sys",
                    [], |row| row.get(0),
                )?;
                (next, "NONE", next)
            }
        };
        self.conn.execute(
            "INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            params![srs.to_string(), srs_id, organization, code, definition],
        )?;
        Ok(srs_id)
    }

    /// Append features to a layer in one transaction; returns their fids.
    pub fn insert_features(&self, layer: &str, features: &[(Option<Geometry<f64>>, Vec<(&str, Value)>)]) -> Result<Vec<i64>> {
        let table = ident(layer)?;
        let (geom_col, srs_id) = self.geometry_column(layer)?;
        let geom_col = ident(&geom_col)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut fids = Vec::with_capacity(features.len());
        for (geometry, attributes) in features {
            let mut names = vec![geom_col.clone()];
            for (name, _) in attributes { names.push(ident(name)?); }
            let placeholders = (1..=names.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
            let sql = format!("INSERT INTO {table} ({}) VALUES ({placeholders})", names.join(", "));

            let blob = geometry.as_ref().map(|g| encode_gpkg(g, srs_id));
            let mut params: Vec<&dyn rusqlite::ToSql> = vec![&blob];
            params.extend(attributes.iter().map(|(_, v)| v as &dyn rusqlite::ToSql));
            tx.execute(&sql, params.as_slice())?;
            fids.push(tx.last_insert_rowid());
        }
        tx.commit()?;
        Ok(fids)
    }

    /// Geometry column name and srs id of a layer.
    fn geometry_column(&self, layer: &str) -> Result<(String, i32)> {
        self.conn.query_row(
            "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
            [layer], |row| Ok((row.get(0)?, row.get(1)?)),
        ).optional()?.ok_or_else(|| Error::configuration(format!(
            "layer {layer} is not a feature layer of {}", self.path.display()
        )))
    }

    /// Integer primary key column of a table.
    fn fid_column(&self, table: &str) -> Result<String> {
        let sql = format!("PRAGMA table_info({})", ident(table)?);
        let mut stmt = self.conn.prepare(&sql)?;
        let pk = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .find(|(_, pk)| *pk == 1)
            .map(|(name, _)| name);
        Ok(pk.unwrap_or_else(|| "fid".to_string()))
    }

    fn columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", ident(table)?);
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?.collect::<rusqlite::Result<Vec<_>>>()?;
        if names.is_empty() {
            return Err(Error::configuration(format!("table {table} does not exist in {}", self.path.display())))
        }
        Ok(names)
    }

    /// Shared row reader for the feature queries; `where_sql` may reference `?` params.
    fn query_features(&self, layer: &str, columns: &[&str], where_sql: &str, params: &[i64]) -> Result<Vec<Feature>> {
        let table = ident(layer)?;
        let (geom_col, _) = self.geometry_column(layer)?;
        let fid_col = ident(&self.fid_column(layer)?)?;
        let present = self.columns(layer)?;
        let mut select = vec![fid_col.clone(), ident(&geom_col)?];
        for c in columns {
            // absent columns read as NULL, like never-written attributes
            let quoted = ident(c)?;
            select.push(if present.iter().any(|p| p.eq_ignore_ascii_case(c)) { quoted } else { format!("NULL AS {quoted}") });
        }

        let sql = format!("SELECT {} FROM {table} {where_sql} ORDER BY {fid_col}", select.join(", "));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let fid: i64 = row.get(0)?;
            let blob: Option<Vec<u8>> = row.get(1)?;
            let geometry = match blob {
                Some(bytes) => decode_gpkg(&bytes).with_context(|| format!("layer {layer} fid {fid}"))?,
                None => None,
            };
            let mut attributes = std::collections::BTreeMap::new();
            for (i, name) in columns.iter().enumerate() {
                attributes.insert(name.to_string(), Value::from(row.get_ref(i + 2)?));
            }
            out.push(Feature { fid, geometry, attributes });
        }
        Ok(out)
    }
}

impl FeatureStore for GeoPackage {
    fn spatial_ref(&self, layer: &str) -> Result<SpatialRef> {
        let (_, srs_id) = self.geometry_column(layer)?;
        let row: Option<(String, i64, String)> = self.conn.query_row(
            "SELECT organization, organization_coordsys_id, definition FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            [srs_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        ).optional()?;
        match row {
            Some((org, code, _)) if org.eq_ignore_ascii_case("EPSG") && code > 0 => Ok(SpatialRef::Epsg(code as u32)),
            Some((_, _, def)) if def.trim_start().starts_with("+proj") => Ok(SpatialRef::Proj4(def.trim().to_string())),
            _ => Err(Error::data(format!(
                "layer {layer} of {} has no usable spatial reference (srs_id {srs_id})", self.path.display()
            ))),
        }
    }

    fn fids(&self, layer: &str) -> Result<Vec<i64>> {
        let fid_col = ident(&self.fid_column(layer)?)?;
        let sql = format!("SELECT {fid_col} FROM {} ORDER BY {fid_col}", ident(layer)?);
        let mut stmt = self.conn.prepare(&sql)?;
        let fids = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(fids)
    }

    fn fids_where_null(&self, layer: &str, column: &str) -> Result<Vec<i64>> {
        if !self.has_column(layer, column)? { return self.fids(layer) }
        let fid_col = ident(&self.fid_column(layer)?)?;
        let sql = format!(
            "SELECT {fid_col} FROM {} WHERE {} IS NULL ORDER BY {fid_col}", ident(layer)?, ident(column)?
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let fids = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(fids)
    }

    fn features(&self, layer: &str, columns: &[&str]) -> Result<Vec<Feature>> {
        self.query_features(layer, columns, "", &[])
    }

    fn feature(&self, layer: &str, fid: i64) -> Result<Feature> {
        let fid_col = ident(&self.fid_column(layer)?)?;
        self.query_features(layer, &[], &format!("WHERE {fid_col} = ?1"), &[fid])?
            .pop()
            .ok_or_else(|| Error::data(format!("fid {fid} not found in layer {layer}")))
    }

    fn features_by_fid(&self, layer: &str, fids: &[i64], columns: &[&str]) -> Result<Vec<Feature>> {
        let fid_col = ident(&self.fid_column(layer)?)?;
        let mut out = Vec::with_capacity(fids.len());
        for chunk in fids.chunks(MAX_IN_PARAMS) {
            let marks = vec!["?"; chunk.len()].join(", ");
            out.extend(self.query_features(layer, columns, &format!("WHERE {fid_col} IN ({marks})"), chunk)?);
        }
        out.sort_by_key(|f| f.fid);
        Ok(out)
    }
}

impl AttributeStore for GeoPackage {
    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.columns(table)?.iter().any(|c| c.eq_ignore_ascii_case(column)))
    }

    fn ensure_column(&self, table: &str, column: &str, ty: ColumnType, default: Option<&Value>, indexed: bool) -> Result<()> {
        let (t, c) = (ident(table)?, ident(column)?);
        if !self.has_column(table, column)? {
            let default = default.map(|v| format!(" DEFAULT {}", v.sql_literal())).unwrap_or_default();
            self.conn.execute(&format!("ALTER TABLE {t} ADD COLUMN {c} {ty}{default}"), [])
                .with_context(|| format!("[store::gpkg] failed to add column {table}.{column}"))?;
            log::debug!("added column {table}.{column} {ty} to {}", self.path.display());
        }
        if indexed {
            let index = ident(&format!("idx_{table}_{column}"))?;
            self.conn.execute(&format!("CREATE INDEX IF NOT EXISTS {index} ON {t} ({c})"), [])?;
        }
        Ok(())
    }

    fn bulk_upsert(&self, table: &str, column: &str, rows: &[(i64, Value)], policy: UpsertPolicy) -> Result<usize> {
        if rows.is_empty() { return Ok(0) }
        let (t, c) = (ident(table)?, ident(column)?);
        let fid_col = ident(&self.fid_column(table)?)?;
        let staging = ident(&format!("staging_{table}_{column}"))?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS temp.{staging}"), [])?;
        tx.execute(&format!("CREATE TEMP TABLE {staging} (id INTEGER PRIMARY KEY, value)"), [])?;
        {
            let mut insert = tx.prepare(&format!("INSERT OR REPLACE INTO temp.{staging} (id, value) VALUES (?1, ?2)"))?;
            for (fid, value) in rows {
                insert.execute(params![fid, value])?;
            }
        }
        let only_null = match policy {
            UpsertPolicy::Overwrite => String::new(),
            UpsertPolicy::FillNull => format!(" AND {t}.{c} IS NULL"),
        };
        let changed = tx.execute(
            &format!("UPDATE {t} SET {c} = s.value FROM temp.{staging} AS s WHERE s.id = {t}.{fid_col}{only_null}"),
            [],
        ).with_context(|| format!("[store::gpkg] failed to update {table}.{column}"))?;
        tx.execute(&format!("DROP TABLE temp.{staging}"), [])?;
        tx.commit()?;
        Ok(changed)
    }

    fn column_sum(&self, table: &str, column: &str) -> Result<f64> {
        let sql = format!("SELECT TOTAL({}) FROM {}", ident(column)?, ident(table)?);
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use geo::point;
    use tempfile::TempDir;

    use super::*;

    fn package(dir: &TempDir) -> GeoPackage {
        let gpkg = GeoPackage::create(&dir.path().join("test.gpkg")).unwrap();
        gpkg.create_layer("nodes", "POINT", Some(&SpatialRef::Epsg(3857)), &[("osmid", ColumnType::Integer)]).unwrap();
        let rows = (0..5)
            .map(|i| (Some(Geometry::Point(point! { x: i as f64, y: 0.0 })), vec![("osmid", Value::Integer(100 + i))]))
            .collect::<Vec<_>>();
        gpkg.insert_features("nodes", &rows).unwrap();
        gpkg
    }

    #[test]
    fn identifiers_are_validated() {
        assert_eq!(ident("affectDays").unwrap(), "\"affectDays\"");
        assert!(ident("x; DROP TABLE nodes").is_err());
        assert!(ident("1abc").is_err());
    }

    #[test]
    fn reads_back_features_in_fid_order() {
        let dir = TempDir::new().unwrap();
        let gpkg = package(&dir);
        assert_eq!(gpkg.layers().unwrap(), vec!["nodes".to_string()]);
        assert_eq!(gpkg.spatial_ref("nodes").unwrap(), SpatialRef::Epsg(3857));

        let features = gpkg.features("nodes", &["osmid"]).unwrap();
        assert_eq!(features.len(), 5);
        assert_eq!(features[2].fid, 3);
        assert_eq!(features[2].get_i64("osmid"), Some(102));
        assert_eq!(features[2].geometry, Some(point! { x: 2.0, y: 0.0 }.into()));

        let unwritten = gpkg.features("nodes", &["affectDays"]).unwrap();
        assert!(unwritten.iter().all(|f| f.get("affectDays") == Some(&Value::Null)));
    }

    #[test]
    fn column_names_match_regardless_of_case() {
        let dir = TempDir::new().unwrap();
        let gpkg = package(&dir);
        let features = gpkg.features("nodes", &["OSMID"]).unwrap();
        assert_eq!(features[0].get_i64("OSMID"), Some(100));
        assert!(gpkg.has_column("nodes", "OsmId").unwrap());
    }

    #[test]
    fn missing_fid_is_a_data_error() {
        let dir = TempDir::new().unwrap();
        let gpkg = package(&dir);
        assert_eq!(gpkg.feature("nodes", 4).unwrap().fid, 4);
        let err = gpkg.feature("nodes", 99).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Data);
    }

    #[test]
    fn unknown_layer_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        let gpkg = package(&dir);
        assert_eq!(gpkg.features("edges", &[]).unwrap_err().kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn upsert_policies() {
        let dir = TempDir::new().unwrap();
        let gpkg = package(&dir);
        gpkg.ensure_column("nodes", "days", ColumnType::Integer, None, true).unwrap();
        gpkg.ensure_column("nodes", "days", ColumnType::Integer, None, true).unwrap();
        assert!(gpkg.has_column("nodes", "days").unwrap());
        assert_eq!(gpkg.fids_where_null("nodes", "days").unwrap(), vec![1, 2, 3, 4, 5]);

        let first = vec![(1, Value::Integer(3)), (2, Value::Integer(0))];
        assert_eq!(gpkg.bulk_upsert("nodes", "days", &first, UpsertPolicy::FillNull).unwrap(), 2);
        assert_eq!(gpkg.fids_where_null("nodes", "days").unwrap(), vec![3, 4, 5]);

        let second = vec![(1, Value::Integer(9)), (3, Value::Integer(4))];
        assert_eq!(gpkg.bulk_upsert("nodes", "days", &second, UpsertPolicy::FillNull).unwrap(), 1);
        assert_eq!(gpkg.column_sum("nodes", "days").unwrap(), 7.0);

        assert_eq!(gpkg.bulk_upsert("nodes", "days", &second, UpsertPolicy::Overwrite).unwrap(), 2);
        assert_eq!(gpkg.column_sum("nodes", "days").unwrap(), 13.0);
    }

    #[test]
    fn column_defaults_apply_to_existing_rows() {
        let dir = TempDir::new().unwrap();
        let gpkg = package(&dir);
        gpkg.ensure_column("nodes", "EVCSNum", ColumnType::Integer, Some(&Value::Integer(0)), false).unwrap();
        let features = gpkg.features("nodes", &["EVCSNum"]).unwrap();
        assert!(features.iter().all(|f| f.get_i64("EVCSNum") == Some(0)));
    }

    #[test]
    fn undefined_spatial_reference_is_a_data_error() {
        let dir = TempDir::new().unwrap();
        let gpkg = GeoPackage::create(&dir.path().join("bare.gpkg")).unwrap();
        gpkg.create_layer("points", "POINT", None, &[]).unwrap();
        assert_eq!(gpkg.spatial_ref("points").unwrap_err().kind(), crate::ErrorKind::Data);
    }
}
