pub mod domain;
pub mod noise;
pub mod operations;
pub mod primitives;

pub use domain::{bend, mirror, repeat, rotate_y, twist};
pub use noise::{Mulberry32, ValueNoise};
pub use operations::{
    chamfer, displace, intersect, round_edge, shell, smooth_intersect, smooth_subtract,
    smooth_union, stairs, subtract, union, xor,
};
pub use primitives::{
    Box3, Capsule, Cone, Cylinder, Ellipsoid, HexPrism, Octahedron, Plane, Point3, Sdf3, Sphere,
    TaperedCylinder, Torus, box3, capsule, cone, cylinder, ellipsoid, hex_prism, octahedron,
    plane, sphere, tapered_cylinder, torus,
};
