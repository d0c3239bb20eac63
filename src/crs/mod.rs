mod frame;
mod spatial_ref;

pub use frame::CoordinateFrame;
pub use spatial_ref::SpatialRef;
