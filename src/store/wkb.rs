//! WKB and GeoPackage geometry blob encoding.

use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::error::{Error, Result};

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_GEOMETRYCOLLECTION: u32 = 7;

/// WKB byte order: little endian
const WKB_LE: u8 = 1;

/// EWKB dimension and SRID flags.
const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// GeoPackage blob magic, "GP".
const GPKG_MAGIC: &[u8; 2] = b"GP";

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    le: bool,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self { Self { bytes, pos: 0, le: true } }

    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end)
            .ok_or_else(|| Error::data(format!("[store::wkb] truncated input reading {what} at byte {}", self.pos)))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> { Ok(self.take::<1>(what)?[0]) }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take::<4>(what)?;
        Ok(if self.le { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        let b = self.take::<8>(what)?;
        Ok(if self.le { f64::from_le_bytes(b) } else { f64::from_be_bytes(b) })
    }

    fn coord(&mut self, extra: usize) -> Result<Coord<f64>> {
        let x = self.f64("x coordinate")?;
        let y = self.f64("y coordinate")?;
        for _ in 0..extra { self.f64("z/m ordinate")?; }
        Ok(Coord { x, y })
    }

    fn line_string(&mut self, extra: usize) -> Result<LineString<f64>> {
        let n = self.u32("point count")? as usize;
        let mut coords = Vec::with_capacity(n.min(self.remaining() / 16));
        for _ in 0..n { coords.push(self.coord(extra)?); }
        Ok(LineString::from(coords))
    }

    fn polygon(&mut self, extra: usize) -> Result<Polygon<f64>> {
        let rings = self.u32("ring count")? as usize;
        if rings == 0 { return Ok(Polygon::new(LineString::new(vec![]), vec![])) }
        let exterior = self.line_string(extra)?;
        let interiors = (1..rings).map(|_| self.line_string(extra)).collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    #[inline] fn remaining(&self) -> usize { self.bytes.len().saturating_sub(self.pos) }

    fn geometry(&mut self) -> Result<Geometry<f64>> {
        self.le = self.u8("byte order")? == WKB_LE;
        let raw = self.u32("geometry type")?;

        // ISO codes carry dimensions in the thousands; EWKB in the high bits.
        let mut extra = 0;
        if raw & EWKB_Z != 0 { extra += 1 }
        if raw & EWKB_M != 0 { extra += 1 }
        if raw & EWKB_SRID != 0 { self.u32("srid")?; }
        let code = raw & 0x0FFF_FFFF;
        let (base, extra) = match code / 1000 {
            0 => (code, extra),
            1 | 2 => (code % 1000, extra + 1),
            3 => (code % 1000, extra + 2),
            _ => return Err(Error::data(format!("[store::wkb] unsupported geometry type {raw}"))),
        };

        Ok(match base {
            WKB_POINT => {
                let c = self.coord(extra)?;
                Point::from(c).into()
            }
            WKB_LINESTRING => self.line_string(extra)?.into(),
            WKB_POLYGON => self.polygon(extra)?.into(),
            WKB_MULTIPOINT => {
                let parts = self.parts()?;
                MultiPoint::new(parts.into_iter().map(|g| match g {
                    Geometry::Point(p) => Ok(p),
                    other => Err(mismatch("MultiPoint", &other)),
                }).collect::<Result<_>>()?).into()
            }
            WKB_MULTILINESTRING => {
                let parts = self.parts()?;
                MultiLineString::new(parts.into_iter().map(|g| match g {
                    Geometry::LineString(l) => Ok(l),
                    other => Err(mismatch("MultiLineString", &other)),
                }).collect::<Result<_>>()?).into()
            }
            WKB_MULTIPOLYGON => {
                let parts = self.parts()?;
                MultiPolygon::new(parts.into_iter().map(|g| match g {
                    Geometry::Polygon(p) => Ok(p),
                    other => Err(mismatch("MultiPolygon", &other)),
                }).collect::<Result<_>>()?).into()
            }
            WKB_GEOMETRYCOLLECTION => Geometry::GeometryCollection(GeometryCollection(self.parts()?)),
            _ => return Err(Error::data(format!("[store::wkb] unsupported geometry type {raw}"))),
        })
    }

    /// Members of a multi-geometry; each carries its own byte order.
    fn parts(&mut self) -> Result<Vec<Geometry<f64>>> {
        let n = self.u32("part count")? as usize;
        let outer_le = self.le;
        let parts = (0..n).map(|_| self.geometry()).collect::<Result<Vec<_>>>()?;
        self.le = outer_le;
        Ok(parts)
    }
}

fn mismatch(container: &str, part: &Geometry<f64>) -> Error {
    Error::data(format!("[store::wkb] {container} contains a {}", kind_name(part)))
}

fn kind_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Decode a WKB (ISO or EWKB) geometry. Z and M ordinates are dropped.
pub fn decode_wkb(bytes: &[u8]) -> Result<Geometry<f64>> {
    Reader::new(bytes).geometry()
}

/// Encode a geometry as little-endian 2D WKB.
pub fn encode_wkb(geometry: &Geometry<f64>) -> Vec<u8> {
    let mut out = Vec::new();
    write_geometry(&mut out, geometry);
    out
}

fn write_header(out: &mut Vec<u8>, code: u32) {
    out.push(WKB_LE);
    out.extend_from_slice(&code.to_le_bytes());
}

fn write_coords<'a>(out: &mut Vec<u8>, coords: impl ExactSizeIterator<Item = &'a Coord<f64>>) {
    out.extend_from_slice(&(coords.len() as u32).to_le_bytes());
    for c in coords {
        out.extend_from_slice(&c.x.to_le_bytes());
        out.extend_from_slice(&c.y.to_le_bytes());
    }
}

fn write_polygon_body(out: &mut Vec<u8>, polygon: &Polygon<f64>) {
    if polygon.exterior().0.is_empty() {
        out.extend_from_slice(&0u32.to_le_bytes());
        return
    }
    out.extend_from_slice(&((1 + polygon.interiors().len()) as u32).to_le_bytes());
    write_coords(out, polygon.exterior().0.iter());
    for ring in polygon.interiors() {
        write_coords(out, ring.0.iter());
    }
}

fn write_geometry(out: &mut Vec<u8>, geometry: &Geometry<f64>) {
    match geometry {
        Geometry::Point(p) => {
            write_header(out, WKB_POINT);
            out.extend_from_slice(&p.x().to_le_bytes());
            out.extend_from_slice(&p.y().to_le_bytes());
        }
        Geometry::Line(l) => {
            write_header(out, WKB_LINESTRING);
            write_coords(out, [l.start, l.end].iter());
        }
        Geometry::LineString(ls) => {
            write_header(out, WKB_LINESTRING);
            write_coords(out, ls.0.iter());
        }
        Geometry::Polygon(p) => {
            write_header(out, WKB_POLYGON);
            write_polygon_body(out, p);
        }
        Geometry::Rect(r) => write_geometry(out, &r.to_polygon().into()),
        Geometry::Triangle(t) => write_geometry(out, &t.to_polygon().into()),
        Geometry::MultiPoint(mp) => {
            write_header(out, WKB_MULTIPOINT);
            out.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());
            for p in &mp.0 { write_geometry(out, &Geometry::Point(*p)) }
        }
        Geometry::MultiLineString(mls) => {
            write_header(out, WKB_MULTILINESTRING);
            out.extend_from_slice(&(mls.0.len() as u32).to_le_bytes());
            for ls in &mls.0 {
                write_header(out, WKB_LINESTRING);
                write_coords(out, ls.0.iter());
            }
        }
        Geometry::MultiPolygon(mp) => {
            write_header(out, WKB_MULTIPOLYGON);
            out.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());
            for p in &mp.0 {
                write_header(out, WKB_POLYGON);
                write_polygon_body(out, p);
            }
        }
        Geometry::GeometryCollection(gc) => {
            write_header(out, WKB_GEOMETRYCOLLECTION);
            out.extend_from_slice(&(gc.0.len() as u32).to_le_bytes());
            for g in &gc.0 { write_geometry(out, g) }
        }
    }
}

/// Decode a GeoPackage geometry blob. Returns `None` for the empty geometry.
pub fn decode_gpkg(blob: &[u8]) -> Result<Option<Geometry<f64>>> {
    let mut r = Reader::new(blob);
    let magic = r.take::<2>("magic bytes")?;
    if &magic != GPKG_MAGIC {
        return Err(Error::data("[store::wkb] geometry blob does not start with GP"))
    }
    let _version = r.u8("version")?;
    let flags = r.u8("flags")?;
    if flags & 0b0010_0000 != 0 {
        return Err(Error::data("[store::wkb] extended GeoPackage geometries are not supported"))
    }
    r.le = flags & 1 == 1;
    let _srs_id = r.u32("srs id")?;

    let envelope = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        code => return Err(Error::data(format!("[store::wkb] invalid envelope indicator {code}"))),
    };
    if r.remaining() < envelope {
        return Err(Error::data("[store::wkb] truncated envelope"))
    }
    r.pos += envelope;

    if flags & 0b0001_0000 != 0 { return Ok(None) }
    decode_wkb(&blob[r.pos..]).map(Some)
}

/// Encode a GeoPackage geometry blob (little endian, no envelope).
pub fn encode_gpkg(geometry: &Geometry<f64>, srs_id: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(GPKG_MAGIC);
    out.push(0); // version 1
    out.push(0b0000_0001); // little endian, no envelope
    out.extend_from_slice(&srs_id.to_le_bytes());
    write_geometry(&mut out, geometry);
    out
}
