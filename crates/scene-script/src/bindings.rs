//! The builtin table injected into every sandbox: noise, signed distance
//! functions, distance operators, emitters, mesh builders, scene constants,
//! and math. Nothing else is reachable from user code.

use std::f64::consts::{E, PI, TAU};

use scene_core::{Point3, Sdf3, domain, noise, operations as ops, primitives as prim};
use scene_mesh::{FnField, HeightField, MeshBuffer, ScalarField};
use scene_mesh::{MaterialHints, heightfield, polygonize};
use scene_mesh::{extrude_path, lathe};

use crate::SceneBounds;
use crate::interp::{ExecError, Interp, Scope, ScopeRef, Value, runtime};

/// Iso-surface resolution guard: a dense field is (R+1)^3 samples.
const MAX_ISO_RESOLUTION: u32 = 256;
/// Heightfield resolution guard per axis.
const MAX_GRID_RESOLUTION: u32 = 2048;
/// Revolution segment guard.
const MAX_LATHE_SEGMENTS: u32 = 8192;
/// Default resolution for the convenience mesh wrappers.
const DEFAULT_WRAPPER_RESOLUTION: u32 = 48;
/// Padding factor past a primitive's extent for wrapper bounds.
const WRAPPER_PADDING: f32 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    // Noise and RNG.
    Random,
    Noise2,
    Noise3,
    Fbm2,
    Fbm3,
    // Signed distance primitives.
    SdSphere,
    SdBox,
    SdCapsule,
    SdTorus,
    SdCone,
    SdPlane,
    SdCylinder,
    SdEllipsoid,
    SdOctahedron,
    SdHexPrism,
    SdTaperedCylinder,
    // Distance operators.
    Union,
    Subtract,
    Intersect,
    SmoothUnion,
    SmoothSubtract,
    SmoothIntersect,
    RoundEdge,
    Displace,
    Shell,
    Xor,
    Chamfer,
    Stairs,
    // Domain operators.
    Mirror,
    Repeat,
    Twist,
    Bend,
    RotateY,
    // Emission.
    EmitTriangle,
    EmitQuad,
    EmitSmoothTriangle,
    SetMaterial,
    // Mesh builders.
    SdfMesh,
    Lathe,
    ExtrudePath,
    Grid,
    SphereMesh,
    BoxMesh,
    CylinderMesh,
    TorusMesh,
    // Math.
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan2,
    Sqrt,
    Pow,
    Exp,
    Log,
    Abs,
    Floor,
    Ceil,
    Min,
    Max,
    Clamp,
    Mix,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("random", Builtin::Random),
    ("noise2", Builtin::Noise2),
    ("noise3", Builtin::Noise3),
    ("fbm2", Builtin::Fbm2),
    ("fbm3", Builtin::Fbm3),
    ("sd_sphere", Builtin::SdSphere),
    ("sd_box", Builtin::SdBox),
    ("sd_capsule", Builtin::SdCapsule),
    ("sd_torus", Builtin::SdTorus),
    ("sd_cone", Builtin::SdCone),
    ("sd_plane", Builtin::SdPlane),
    ("sd_cylinder", Builtin::SdCylinder),
    ("sd_ellipsoid", Builtin::SdEllipsoid),
    ("sd_octahedron", Builtin::SdOctahedron),
    ("sd_hex_prism", Builtin::SdHexPrism),
    ("sd_tapered_cylinder", Builtin::SdTaperedCylinder),
    ("union", Builtin::Union),
    ("subtract", Builtin::Subtract),
    ("intersect", Builtin::Intersect),
    ("smooth_union", Builtin::SmoothUnion),
    ("smooth_subtract", Builtin::SmoothSubtract),
    ("smooth_intersect", Builtin::SmoothIntersect),
    ("round_edge", Builtin::RoundEdge),
    ("displace", Builtin::Displace),
    ("shell", Builtin::Shell),
    ("xor", Builtin::Xor),
    ("chamfer", Builtin::Chamfer),
    ("stairs", Builtin::Stairs),
    ("mirror", Builtin::Mirror),
    ("repeat", Builtin::Repeat),
    ("twist", Builtin::Twist),
    ("bend", Builtin::Bend),
    ("rotate_y", Builtin::RotateY),
    ("emit_triangle", Builtin::EmitTriangle),
    ("emit_quad", Builtin::EmitQuad),
    ("emit_smooth_triangle", Builtin::EmitSmoothTriangle),
    ("set_material", Builtin::SetMaterial),
    ("sdf_mesh", Builtin::SdfMesh),
    ("lathe", Builtin::Lathe),
    ("extrude_path", Builtin::ExtrudePath),
    ("grid", Builtin::Grid),
    ("sphere_mesh", Builtin::SphereMesh),
    ("box_mesh", Builtin::BoxMesh),
    ("cylinder_mesh", Builtin::CylinderMesh),
    ("torus_mesh", Builtin::TorusMesh),
    ("sin", Builtin::Sin),
    ("cos", Builtin::Cos),
    ("tan", Builtin::Tan),
    ("asin", Builtin::Asin),
    ("acos", Builtin::Acos),
    ("atan2", Builtin::Atan2),
    ("sqrt", Builtin::Sqrt),
    ("pow", Builtin::Pow),
    ("exp", Builtin::Exp),
    ("log", Builtin::Log),
    ("abs", Builtin::Abs),
    ("floor", Builtin::Floor),
    ("ceil", Builtin::Ceil),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("clamp", Builtin::Clamp),
    ("mix", Builtin::Mix),
];

/// Builds the root scope for one sandbox run: every builtin plus the math
/// and scene constants derived from the handed-in bounds.
pub(crate) fn global_scope(bounds: SceneBounds) -> ScopeRef {
    let scope = Scope::root();
    for (name, builtin) in BUILTINS {
        Scope::declare(&scope, name, Value::Builtin(*builtin));
    }

    Scope::declare(&scope, "PI", Value::Number(PI));
    Scope::declare(&scope, "TAU", Value::Number(TAU));
    Scope::declare(&scope, "E", Value::Number(E));

    let constants = [
        ("SCENE_MIN_X", bounds.min[0]),
        ("SCENE_MIN_Y", bounds.min[1]),
        ("SCENE_MIN_Z", bounds.min[2]),
        ("SCENE_MAX_X", bounds.max[0]),
        ("SCENE_MAX_Y", bounds.max[1]),
        ("SCENE_MAX_Z", bounds.max[2]),
        ("SCENE_CENTER_X", bounds.center[0]),
        ("SCENE_CENTER_Y", bounds.center[1]),
        ("SCENE_CENTER_Z", bounds.center[2]),
    ];
    for (name, value) in constants {
        Scope::declare(&scope, name, Value::Number(value as f64));
    }

    scope
}

struct Args<'a> {
    name: &'static str,
    values: &'a [Value],
    line: u32,
}

impl<'a> Args<'a> {
    fn arity(&self, expected: usize) -> Result<(), ExecError> {
        self.arity_range(expected, expected)
    }

    fn arity_range(&self, min: usize, max: usize) -> Result<(), ExecError> {
        if self.values.len() < min || self.values.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(runtime(
                format!(
                    "{} expects {expected} argument(s), got {}",
                    self.name,
                    self.values.len()
                ),
                self.line,
            ));
        }
        Ok(())
    }

    fn num(&self, index: usize) -> Result<f64, ExecError> {
        match &self.values[index] {
            Value::Number(n) => Ok(*n),
            other => Err(runtime(
                format!(
                    "{} argument {} must be a number, got {}",
                    self.name,
                    index + 1,
                    other.type_name()
                ),
                self.line,
            )),
        }
    }

    fn f32(&self, index: usize) -> Result<f32, ExecError> {
        Ok(self.num(index)? as f32)
    }

    fn uint(&self, index: usize, max: u32) -> Result<u32, ExecError> {
        let raw = self.num(index)?;
        if !raw.is_finite() || raw < 0.0 || raw > max as f64 {
            return Err(runtime(
                format!(
                    "{} argument {} must be an integer in 0..={max}",
                    self.name,
                    index + 1
                ),
                self.line,
            ));
        }
        Ok(raw as u32)
    }

    fn boolean(&self, index: usize) -> Result<bool, ExecError> {
        match &self.values[index] {
            Value::Bool(flag) => Ok(*flag),
            other => Err(runtime(
                format!(
                    "{} argument {} must be a bool, got {}",
                    self.name,
                    index + 1,
                    other.type_name()
                ),
                self.line,
            )),
        }
    }

    fn callable(&self, index: usize) -> Result<Value, ExecError> {
        let value = self.values[index].clone();
        if value.is_callable() {
            Ok(value)
        } else {
            Err(runtime(
                format!(
                    "{} argument {} must be a function, got {}",
                    self.name,
                    index + 1,
                    value.type_name()
                ),
                self.line,
            ))
        }
    }

    fn vec3(&self, index: usize) -> Result<Point3, ExecError> {
        value_as_vec3(&self.values[index]).ok_or_else(|| {
            runtime(
                format!(
                    "{} argument {} must be an array of 3 numbers",
                    self.name,
                    index + 1
                ),
                self.line,
            )
        })
    }

    fn pairs(&self, index: usize) -> Result<Vec<[f32; 2]>, ExecError> {
        let error = || {
            runtime(
                format!(
                    "{} argument {} must be an array of [a, b] pairs",
                    self.name,
                    index + 1
                ),
                self.line,
            )
        };
        let Value::Array(items) = &self.values[index] else {
            return Err(error());
        };
        let items = items.borrow();
        let mut out = Vec::with_capacity(items.len());
        for item in items.iter() {
            out.push(value_as_vec2(item).ok_or_else(error)?);
        }
        Ok(out)
    }

    fn triples(&self, index: usize) -> Result<Vec<Point3>, ExecError> {
        let error = || {
            runtime(
                format!(
                    "{} argument {} must be an array of [x, y, z] points",
                    self.name,
                    index + 1
                ),
                self.line,
            )
        };
        let Value::Array(items) = &self.values[index] else {
            return Err(error());
        };
        let items = items.borrow();
        let mut out = Vec::with_capacity(items.len());
        for item in items.iter() {
            out.push(value_as_vec3(item).ok_or_else(error)?);
        }
        Ok(out)
    }
}

fn value_as_vec2(value: &Value) -> Option<[f32; 2]> {
    let Value::Array(items) = value else {
        return None;
    };
    let items = items.borrow();
    if items.len() != 2 {
        return None;
    }
    match (&items[0], &items[1]) {
        (Value::Number(a), Value::Number(b)) => Some([*a as f32, *b as f32]),
        _ => None,
    }
}

fn value_as_vec3(value: &Value) -> Option<Point3> {
    let Value::Array(items) = value else {
        return None;
    };
    let items = items.borrow();
    if items.len() != 3 {
        return None;
    }
    match (&items[0], &items[1], &items[2]) {
        (Value::Number(a), Value::Number(b), Value::Number(c)) => {
            Some([*a as f32, *b as f32, *c as f32])
        }
        _ => None,
    }
}

fn array3(values: [f32; 3]) -> Value {
    Value::Array(std::rc::Rc::new(std::cell::RefCell::new(vec![
        Value::Number(values[0] as f64),
        Value::Number(values[1] as f64),
        Value::Number(values[2] as f64),
    ])))
}

fn array2(values: [f32; 2]) -> Value {
    Value::Array(std::rc::Rc::new(std::cell::RefCell::new(vec![
        Value::Number(values[0] as f64),
        Value::Number(values[1] as f64),
    ])))
}

/// Script-closure-backed scalar field for `sdf_mesh`.
struct ScriptField<'a> {
    interp: &'a mut Interp,
    sdf: Value,
    color: Value,
    line: u32,
}

impl ScalarField for ScriptField<'_> {
    type Error = ExecError;

    fn sample(&mut self, x: f32, y: f32, z: f32) -> Result<f32, ExecError> {
        let args = vec![
            Value::Number(x as f64),
            Value::Number(y as f64),
            Value::Number(z as f64),
        ];
        match self.interp.call_value(self.sdf.clone(), args, self.line)? {
            Value::Number(n) => Ok(n as f32),
            other => Err(runtime(
                format!("sdf callback must return a number, got {}", other.type_name()),
                self.line,
            )),
        }
    }

    fn color(&mut self, x: f32, y: f32, z: f32) -> Result<Point3, ExecError> {
        let args = vec![
            Value::Number(x as f64),
            Value::Number(y as f64),
            Value::Number(z as f64),
        ];
        let value = self.interp.call_value(self.color.clone(), args, self.line)?;
        value_as_vec3(&value).ok_or_else(|| {
            runtime(
                format!(
                    "color callback must return [r, g, b], got {}",
                    value.type_name()
                ),
                self.line,
            )
        })
    }
}

/// Script-closure-backed heightfield for `grid`.
struct ScriptHeightField<'a> {
    interp: &'a mut Interp,
    height: Value,
    color: Value,
    line: u32,
}

impl HeightField for ScriptHeightField<'_> {
    type Error = ExecError;

    fn height(&mut self, x: f32, z: f32) -> Result<f32, ExecError> {
        let args = vec![Value::Number(x as f64), Value::Number(z as f64)];
        match self.interp.call_value(self.height.clone(), args, self.line)? {
            Value::Number(n) => Ok(n as f32),
            other => Err(runtime(
                format!(
                    "height callback must return a number, got {}",
                    other.type_name()
                ),
                self.line,
            )),
        }
    }

    fn color(&mut self, x: f32, z: f32) -> Result<Point3, ExecError> {
        let args = vec![Value::Number(x as f64), Value::Number(z as f64)];
        let value = self.interp.call_value(self.color.clone(), args, self.line)?;
        value_as_vec3(&value).ok_or_else(|| {
            runtime(
                format!(
                    "color callback must return [r, g, b], got {}",
                    value.type_name()
                ),
                self.line,
            )
        })
    }
}

/// Runs an infallible extraction into a scratch buffer and appends it.
fn append_infallible<F, C>(interp: &mut Interp, field: FnField<F, C>, min: Point3, max: Point3, resolution: u32)
where
    F: FnMut(f32, f32, f32) -> f32,
    C: FnMut(f32, f32, f32) -> Point3,
{
    let mut field = field;
    let mut out = MeshBuffer::new();
    match polygonize(&mut field, &mut out, min, max, resolution) {
        Ok(()) => interp.geom.buffer.append(out),
        Err(never) => match never {},
    }
}

pub(crate) fn call_builtin(
    interp: &mut Interp,
    builtin: Builtin,
    values: Vec<Value>,
    line: u32,
) -> Result<Value, ExecError> {
    let name = BUILTINS
        .iter()
        .find(|(_, b)| *b == builtin)
        .map(|(n, _)| *n)
        .unwrap_or("builtin");
    let args = Args {
        name,
        values: &values,
        line,
    };

    match builtin {
        Builtin::Random => {
            args.arity(0)?;
            Ok(Value::Number(interp.geom.rng.next_f32() as f64))
        }
        Builtin::Noise2 => {
            args.arity(2)?;
            let value = interp.geom.noise.noise2(args.f32(0)?, args.f32(1)?);
            Ok(Value::Number(value as f64))
        }
        Builtin::Noise3 => {
            args.arity(3)?;
            let value = interp
                .geom
                .noise
                .noise3(args.f32(0)?, args.f32(1)?, args.f32(2)?);
            Ok(Value::Number(value as f64))
        }
        Builtin::Fbm2 => {
            args.arity_range(2, 5)?;
            let octaves = if values.len() > 2 {
                args.uint(2, 16)?
            } else {
                noise::FBM_DEFAULT_OCTAVES
            };
            let gain = if values.len() > 3 {
                args.f32(3)?
            } else {
                noise::FBM_DEFAULT_GAIN
            };
            let lacunarity = if values.len() > 4 {
                args.f32(4)?
            } else {
                noise::FBM_DEFAULT_LACUNARITY
            };
            let value = interp
                .geom
                .noise
                .fbm2(args.f32(0)?, args.f32(1)?, octaves, gain, lacunarity);
            Ok(Value::Number(value as f64))
        }
        Builtin::Fbm3 => {
            args.arity_range(3, 6)?;
            let octaves = if values.len() > 3 {
                args.uint(3, 16)?
            } else {
                noise::FBM_DEFAULT_OCTAVES
            };
            let gain = if values.len() > 4 {
                args.f32(4)?
            } else {
                noise::FBM_DEFAULT_GAIN
            };
            let lacunarity = if values.len() > 5 {
                args.f32(5)?
            } else {
                noise::FBM_DEFAULT_LACUNARITY
            };
            let value = interp.geom.noise.fbm3(
                args.f32(0)?,
                args.f32(1)?,
                args.f32(2)?,
                octaves,
                gain,
                lacunarity,
            );
            Ok(Value::Number(value as f64))
        }

        Builtin::SdSphere => {
            args.arity(4)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            Ok(Value::Number(prim::sphere(args.f32(3)?.max(0.0)).evaluate(p) as f64))
        }
        Builtin::SdBox => {
            args.arity(6)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let he = [
                args.f32(3)?.max(0.0),
                args.f32(4)?.max(0.0),
                args.f32(5)?.max(0.0),
            ];
            Ok(Value::Number(prim::box3(he).evaluate(p) as f64))
        }
        Builtin::SdCapsule => {
            args.arity(10)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let a = [args.f32(3)?, args.f32(4)?, args.f32(5)?];
            let b = [args.f32(6)?, args.f32(7)?, args.f32(8)?];
            Ok(Value::Number(
                prim::capsule(a, b, args.f32(9)?.max(0.0)).evaluate(p) as f64,
            ))
        }
        Builtin::SdTorus => {
            args.arity(5)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            Ok(Value::Number(
                prim::torus(args.f32(3)?.max(0.0), args.f32(4)?.max(0.0)).evaluate(p) as f64,
            ))
        }
        Builtin::SdCone => {
            args.arity(5)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let radius = args.f32(3)?.max(0.0);
            let height = args.f32(4)?;
            if height <= 0.0 {
                return Err(runtime("sd_cone height must be positive", line));
            }
            Ok(Value::Number(prim::cone(radius, height).evaluate(p) as f64))
        }
        Builtin::SdPlane => {
            args.arity(7)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let normal = [args.f32(3)?, args.f32(4)?, args.f32(5)?];
            Ok(Value::Number(prim::plane(normal, args.f32(6)?).evaluate(p) as f64))
        }
        Builtin::SdCylinder => {
            args.arity(5)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            Ok(Value::Number(
                prim::cylinder(args.f32(3)?.max(0.0), args.f32(4)?.max(0.0)).evaluate(p) as f64,
            ))
        }
        Builtin::SdEllipsoid => {
            args.arity(6)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let radii = [
                args.f32(3)?.max(1e-6),
                args.f32(4)?.max(1e-6),
                args.f32(5)?.max(1e-6),
            ];
            Ok(Value::Number(prim::ellipsoid(radii).evaluate(p) as f64))
        }
        Builtin::SdOctahedron => {
            args.arity(4)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            Ok(Value::Number(
                prim::octahedron(args.f32(3)?.max(0.0)).evaluate(p) as f64,
            ))
        }
        Builtin::SdHexPrism => {
            args.arity(5)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            Ok(Value::Number(
                prim::hex_prism(args.f32(3)?.max(0.0), args.f32(4)?.max(0.0)).evaluate(p) as f64,
            ))
        }
        Builtin::SdTaperedCylinder => {
            args.arity(6)?;
            let p = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let r1 = args.f32(3)?.max(0.0);
            let r2 = args.f32(4)?.max(0.0);
            let half = args.f32(5)?;
            if half <= 0.0 {
                return Err(runtime("sd_tapered_cylinder half-height must be positive", line));
            }
            Ok(Value::Number(
                prim::tapered_cylinder(r1, r2, half).evaluate(p) as f64,
            ))
        }

        Builtin::Union => {
            args.arity(2)?;
            Ok(Value::Number(ops::union(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::Subtract => {
            args.arity(2)?;
            Ok(Value::Number(ops::subtract(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::Intersect => {
            args.arity(2)?;
            Ok(Value::Number(ops::intersect(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::SmoothUnion => {
            args.arity(3)?;
            Ok(Value::Number(
                ops::smooth_union(args.f32(0)?, args.f32(1)?, args.f32(2)?) as f64,
            ))
        }
        Builtin::SmoothSubtract => {
            args.arity(3)?;
            Ok(Value::Number(
                ops::smooth_subtract(args.f32(0)?, args.f32(1)?, args.f32(2)?) as f64,
            ))
        }
        Builtin::SmoothIntersect => {
            args.arity(3)?;
            Ok(Value::Number(
                ops::smooth_intersect(args.f32(0)?, args.f32(1)?, args.f32(2)?) as f64,
            ))
        }
        Builtin::RoundEdge => {
            args.arity(2)?;
            Ok(Value::Number(ops::round_edge(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::Displace => {
            args.arity(2)?;
            Ok(Value::Number(ops::displace(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::Shell => {
            args.arity(2)?;
            Ok(Value::Number(ops::shell(args.f32(0)?, args.f32(1)?.max(0.0)) as f64))
        }
        Builtin::Xor => {
            args.arity(2)?;
            Ok(Value::Number(ops::xor(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::Chamfer => {
            args.arity(3)?;
            Ok(Value::Number(
                ops::chamfer(args.f32(0)?, args.f32(1)?, args.f32(2)?) as f64,
            ))
        }
        Builtin::Stairs => {
            args.arity(4)?;
            Ok(Value::Number(
                ops::stairs(args.f32(0)?, args.f32(1)?, args.f32(2)?, args.f32(3)?) as f64,
            ))
        }

        Builtin::Mirror => {
            args.arity(1)?;
            Ok(Value::Number(domain::mirror(args.f32(0)?) as f64))
        }
        Builtin::Repeat => {
            args.arity(2)?;
            Ok(Value::Number(domain::repeat(args.f32(0)?, args.f32(1)?) as f64))
        }
        Builtin::Twist => {
            args.arity(4)?;
            Ok(array3(domain::twist(
                args.f32(0)?,
                args.f32(1)?,
                args.f32(2)?,
                args.f32(3)?,
            )))
        }
        Builtin::Bend => {
            args.arity(3)?;
            Ok(array2(domain::bend(args.f32(0)?, args.f32(1)?, args.f32(2)?)))
        }
        Builtin::RotateY => {
            args.arity(3)?;
            Ok(array2(domain::rotate_y(args.f32(0)?, args.f32(1)?, args.f32(2)?)))
        }

        Builtin::EmitTriangle => {
            args.arity(4)?;
            let (p1, p2, p3) = (args.vec3(0)?, args.vec3(1)?, args.vec3(2)?);
            let color = args.vec3(3)?;
            interp.geom.buffer.emit_triangle(p1, p2, p3, color);
            Ok(Value::Nil)
        }
        Builtin::EmitQuad => {
            args.arity(5)?;
            let (p1, p2, p3, p4) = (args.vec3(0)?, args.vec3(1)?, args.vec3(2)?, args.vec3(3)?);
            let color = args.vec3(4)?;
            interp.geom.buffer.emit_quad(p1, p2, p3, p4, color);
            Ok(Value::Nil)
        }
        Builtin::EmitSmoothTriangle => {
            args.arity(7)?;
            let (p1, n1) = (args.vec3(0)?, args.vec3(1)?);
            let (p2, n2) = (args.vec3(2)?, args.vec3(3)?);
            let (p3, n3) = (args.vec3(4)?, args.vec3(5)?);
            let color = args.vec3(6)?;
            interp
                .geom
                .buffer
                .emit_smooth_triangle(p1, n1, p2, n2, p3, n3, color);
            Ok(Value::Nil)
        }
        Builtin::SetMaterial => {
            args.arity(1)?;
            let Value::Map(entries) = &values[0] else {
                return Err(runtime(
                    "set_material expects a map like {roughness: 0.5}",
                    line,
                ));
            };
            let mut hints = MaterialHints::default();
            for (key, value) in entries.borrow().iter() {
                let Value::Number(number) = value else {
                    return Err(runtime(
                        format!("material hint '{key}' must be a number"),
                        line,
                    ));
                };
                let number = *number as f32;
                match key.as_str() {
                    "roughness" => hints.roughness = Some(number),
                    "metalness" => hints.metalness = Some(number),
                    "opacity" => hints.opacity = Some(number),
                    other => {
                        return Err(runtime(format!("unknown material hint '{other}'"), line));
                    }
                }
            }
            interp.geom.material.merge(hints);
            Ok(Value::Nil)
        }

        Builtin::SdfMesh => {
            args.arity(5)?;
            let sdf = args.callable(0)?;
            let color = args.callable(1)?;
            let min = args.vec3(2)?;
            let max = args.vec3(3)?;
            let resolution = args.uint(4, MAX_ISO_RESOLUTION)?;
            if resolution == 0 {
                return Err(runtime("sdf_mesh resolution must be at least 1", line));
            }
            require_finite(&min, "sdf_mesh", line)?;
            require_finite(&max, "sdf_mesh", line)?;
            for axis in 0..3 {
                if min[axis] >= max[axis] {
                    return Err(runtime("sdf_mesh bounds must satisfy min < max on every axis", line));
                }
            }

            let mut out = MeshBuffer::new();
            let mut field = ScriptField {
                interp: &mut *interp,
                sdf,
                color,
                line,
            };
            polygonize(&mut field, &mut out, min, max, resolution)?;
            interp.geom.buffer.append(out);
            Ok(Value::Nil)
        }
        Builtin::Lathe => {
            args.arity_range(6, 7)?;
            let center = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let profile = args.pairs(3)?;
            let segments = args.uint(4, MAX_LATHE_SEGMENTS)?;
            let color = args.vec3(5)?;
            let angle_offset = if values.len() > 6 { args.f32(6)? } else { 0.0 };
            lathe(
                &mut interp.geom.buffer,
                center,
                &profile,
                segments,
                angle_offset,
                color,
            );
            Ok(Value::Nil)
        }
        Builtin::ExtrudePath => {
            args.arity(4)?;
            let profile = args.pairs(0)?;
            let path = args.triples(1)?;
            let closed = args.boolean(2)?;
            let color = args.vec3(3)?;
            extrude_path(&mut interp.geom.buffer, &profile, &path, closed, color);
            Ok(Value::Nil)
        }
        Builtin::Grid => {
            args.arity(8)?;
            let (x0, z0) = (args.f32(0)?, args.f32(1)?);
            let (x1, z1) = (args.f32(2)?, args.f32(3)?);
            let res_x = args.uint(4, MAX_GRID_RESOLUTION)?;
            let res_z = args.uint(5, MAX_GRID_RESOLUTION)?;
            let height = args.callable(6)?;
            let color = args.callable(7)?;

            let mut out = MeshBuffer::new();
            let mut field = ScriptHeightField {
                interp: &mut *interp,
                height,
                color,
                line,
            };
            heightfield(&mut field, &mut out, x0, z0, x1, z1, res_x, res_z)?;
            interp.geom.buffer.append(out);
            Ok(Value::Nil)
        }

        Builtin::SphereMesh => {
            args.arity_range(7, 8)?;
            let center = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let radius = args.f32(3)?.max(0.0);
            let color = [args.f32(4)?, args.f32(5)?, args.f32(6)?];
            let resolution = wrapper_resolution(&args, 7)?;
            require_finite(&[center[0], center[1], center[2], radius], "sphere_mesh", line)?;
            let (min, max) = padded_bounds(center, [radius, radius, radius]);
            append_infallible(
                interp,
                FnField {
                    sdf: move |x, y, z| {
                        prim::sphere(radius).evaluate([x - center[0], y - center[1], z - center[2]])
                    },
                    color: move |_, _, _| color,
                },
                min,
                max,
                resolution,
            );
            Ok(Value::Nil)
        }
        Builtin::BoxMesh => {
            args.arity_range(9, 10)?;
            let center = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let half = [
                args.f32(3)?.max(0.0),
                args.f32(4)?.max(0.0),
                args.f32(5)?.max(0.0),
            ];
            let color = [args.f32(6)?, args.f32(7)?, args.f32(8)?];
            let resolution = wrapper_resolution(&args, 9)?;
            require_finite(&[center[0], center[1], center[2], half[0], half[1], half[2]], "box_mesh", line)?;
            let (min, max) = padded_bounds(center, half);
            append_infallible(
                interp,
                FnField {
                    sdf: move |x, y, z| {
                        prim::box3(half).evaluate([x - center[0], y - center[1], z - center[2]])
                    },
                    color: move |_, _, _| color,
                },
                min,
                max,
                resolution,
            );
            Ok(Value::Nil)
        }
        Builtin::CylinderMesh => {
            args.arity_range(8, 9)?;
            let center = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let radius = args.f32(3)?.max(0.0);
            let half_height = args.f32(4)?.max(0.0);
            let color = [args.f32(5)?, args.f32(6)?, args.f32(7)?];
            let resolution = wrapper_resolution(&args, 8)?;
            require_finite(&[center[0], center[1], center[2], radius, half_height], "cylinder_mesh", line)?;
            let (min, max) = padded_bounds(center, [radius, half_height, radius]);
            append_infallible(
                interp,
                FnField {
                    sdf: move |x, y, z| {
                        prim::cylinder(radius, half_height).evaluate([
                            x - center[0],
                            y - center[1],
                            z - center[2],
                        ])
                    },
                    color: move |_, _, _| color,
                },
                min,
                max,
                resolution,
            );
            Ok(Value::Nil)
        }
        Builtin::TorusMesh => {
            args.arity_range(8, 9)?;
            let center = [args.f32(0)?, args.f32(1)?, args.f32(2)?];
            let major = args.f32(3)?.max(0.0);
            let minor = args.f32(4)?.max(0.0);
            let color = [args.f32(5)?, args.f32(6)?, args.f32(7)?];
            let resolution = wrapper_resolution(&args, 8)?;
            let ring = major + minor;
            require_finite(&[center[0], center[1], center[2], major, minor], "torus_mesh", line)?;
            let (min, max) = padded_bounds(center, [ring, minor, ring]);
            append_infallible(
                interp,
                FnField {
                    sdf: move |x, y, z| {
                        prim::torus(major, minor).evaluate([
                            x - center[0],
                            y - center[1],
                            z - center[2],
                        ])
                    },
                    color: move |_, _, _| color,
                },
                min,
                max,
                resolution,
            );
            Ok(Value::Nil)
        }

        Builtin::Sin => math1(&args, f64::sin),
        Builtin::Cos => math1(&args, f64::cos),
        Builtin::Tan => math1(&args, f64::tan),
        Builtin::Asin => math1(&args, f64::asin),
        Builtin::Acos => math1(&args, f64::acos),
        Builtin::Atan2 => {
            args.arity(2)?;
            Ok(Value::Number(args.num(0)?.atan2(args.num(1)?)))
        }
        Builtin::Sqrt => math1(&args, f64::sqrt),
        Builtin::Pow => {
            args.arity(2)?;
            Ok(Value::Number(args.num(0)?.powf(args.num(1)?)))
        }
        Builtin::Exp => math1(&args, f64::exp),
        Builtin::Log => math1(&args, f64::ln),
        Builtin::Abs => math1(&args, f64::abs),
        Builtin::Floor => math1(&args, f64::floor),
        Builtin::Ceil => math1(&args, f64::ceil),
        Builtin::Min => {
            args.arity(2)?;
            Ok(Value::Number(args.num(0)?.min(args.num(1)?)))
        }
        Builtin::Max => {
            args.arity(2)?;
            Ok(Value::Number(args.num(0)?.max(args.num(1)?)))
        }
        Builtin::Clamp => {
            args.arity(3)?;
            Ok(Value::Number(args.num(0)?.clamp(args.num(1)?, args.num(2)?)))
        }
        Builtin::Mix => {
            args.arity(3)?;
            let (a, b, t) = (args.num(0)?, args.num(1)?, args.num(2)?);
            Ok(Value::Number(a * (1.0 - t) + b * t))
        }
    }
}

fn math1(args: &Args<'_>, f: fn(f64) -> f64) -> Result<Value, ExecError> {
    args.arity(1)?;
    Ok(Value::Number(f(args.num(0)?)))
}

/// Mesh-builder placement arguments must be finite: a NaN center would
/// otherwise sample an all-NaN field and silently mesh nothing.
fn require_finite(values: &[f32], name: &str, line: u32) -> Result<(), ExecError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(runtime(
            format!("{name} received a non-finite placement argument"),
            line,
        ));
    }
    Ok(())
}

fn wrapper_resolution(args: &Args<'_>, index: usize) -> Result<u32, ExecError> {
    if args.values.len() > index {
        let resolution = args.uint(index, MAX_ISO_RESOLUTION)?;
        if resolution == 0 {
            return Err(runtime(
                format!("{} resolution must be at least 1", args.name),
                args.line,
            ));
        }
        Ok(resolution)
    } else {
        Ok(DEFAULT_WRAPPER_RESOLUTION)
    }
}

fn padded_bounds(center: Point3, half_extents: Point3) -> (Point3, Point3) {
    let padded = [
        (half_extents[0] * WRAPPER_PADDING).max(1e-3),
        (half_extents[1] * WRAPPER_PADDING).max(1e-3),
        (half_extents[2] * WRAPPER_PADDING).max(1e-3),
    ];
    (
        [
            center[0] - padded[0],
            center[1] - padded[1],
            center[2] - padded[2],
        ],
        [
            center[0] + padded[0],
            center[1] + padded[1],
            center[2] + padded[2],
        ],
    )
}
