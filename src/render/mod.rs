mod common;
mod native;
mod shared;

pub use common::{CameraParams, LightParams};
pub use native::{DrawItem, Renderer};
