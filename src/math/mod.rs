//! Small fixed-dimension linear algebra and polynomial root finding.

pub mod poly;
pub mod vec3;

pub use vec3::{Mat3, Vec3};
