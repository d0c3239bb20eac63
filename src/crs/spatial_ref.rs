use std::{borrow::Cow, fmt};

use crate::error::{Error, Result};

/// A coordinate reference system, identified either by EPSG code or by a PROJ.4 definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum SpatialRef {
    Epsg(u32),
    Proj4(String),
}

impl SpatialRef {
    /// WGS84 longitude/latitude.
    pub const WGS84: SpatialRef = SpatialRef::Epsg(4326);

    /// Parse `EPSG:xxxx`, a bare code, or a `+proj=...` string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.starts_with('+') { return Ok(SpatialRef::Proj4(text.to_string())) }
        let code = text.strip_prefix("EPSG:")
            .or_else(|| text.strip_prefix("epsg:"))
            .unwrap_or(text);
        code.parse::<u32>()
            .map(SpatialRef::Epsg)
            .map_err(|_| Error::data(format!("unrecognized spatial reference: {text}")))
    }

    /// PROJ.4 definition for this reference system.
    ///
    /// Only the EPSG codes the road and raster inputs actually use are known:
    /// geographic WGS84/NAD83, web mercator, and the UTM families.
    pub fn proj4(&self) -> Result<Cow<'_, str>> {
        let code = match self {
            SpatialRef::Proj4(s) => return Ok(Cow::Borrowed(s.as_str())),
            SpatialRef::Epsg(code) => *code,
        };
        let proj = match code {
            4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            4269 | 4937 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
            3857 | 900913 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs".to_string(),
            32601..=32660 => utm(code - 32600, false, "WGS84"),
            32701..=32760 => utm(code - 32700, true, "WGS84"),
            26901..=26923 => utm(code - 26900, false, "NAD83"),
            _ => return Err(Error::data(format!("no PROJ.4 definition known for EPSG:{code}"))),
        };
        Ok(Cow::Owned(proj))
    }

    /// True for longitude/latitude systems, whose coordinates are in degrees.
    pub fn is_geographic(&self) -> bool {
        self.proj4().map(|p| has_token(&p, "+proj=longlat") || has_token(&p, "+proj=latlong"))
            .unwrap_or(false)
    }

    /// True when both references describe the same system, even if spelled differently.
    pub fn is_same(&self, other: &SpatialRef) -> bool {
        if self == other { return true }
        match (self.proj4(), other.proj4()) {
            (Ok(a), Ok(b)) => normalized(&a) == normalized(&b),
            _ => false,
        }
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialRef::Epsg(code) => write!(f, "EPSG:{code}"),
            SpatialRef::Proj4(s) => f.write_str(s),
        }
    }
}

fn utm(zone: u32, south: bool, datum: &str) -> String {
    let south = if south { " +south" } else { "" };
    format!("+proj=utm +zone={zone}{south} +datum={datum} +units=m +no_defs +type=crs")
}

fn has_token(proj: &str, token: &str) -> bool {
    proj.split_whitespace().any(|t| t == token)
}

/// Token set of a PROJ.4 string, ignoring order and the decorative flags.
fn normalized(proj: &str) -> Vec<&str> {
    let mut tokens = proj.split_whitespace()
        .filter(|t| !matches!(*t, "+no_defs" | "+type=crs" | "+wktext"))
        .collect::<Vec<_>>();
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}
