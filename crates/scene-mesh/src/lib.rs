pub mod buffer;
pub mod grid;
pub mod marching_cubes;
pub mod sweep;
mod tables;

pub use buffer::{MaterialHints, MeshBuffer};
pub use grid::{FnHeightField, HeightField, heightfield};
pub use marching_cubes::{FnField, ScalarField, polygonize};
pub use sweep::{extrude_path, lathe};
