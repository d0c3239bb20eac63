#![doc = "Flood impact on road networks: zonal raster statistics, nearest-node aggregation and 2SFCA accessibility"]

pub mod access;
pub mod aggregate;
pub mod batch;
pub mod checkpoint;
pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod crs;
pub mod facility;
pub mod raster;
pub mod roads;
pub mod store;
pub mod zonal;

mod error;

#[doc(inline)]
pub use error::{Error, ErrorKind, Result, ResultExt};

#[doc(inline)]
pub use config::JobConfig;
