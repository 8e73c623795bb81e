//! Geometry primitives shared by the warp engine.

mod core;
mod mesh;
mod metrics;

pub use self::core::{Point3, Tolerance, Vec3};
pub use mesh::GeomMesh;
pub use metrics::{TimingBucket, WarpMetrics, WarpTimingReport};
