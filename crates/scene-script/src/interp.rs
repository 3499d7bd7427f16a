//! Tree-walking evaluator for validated programs. The interpreter is the
//! sandbox: the only world it can touch is the geometry state it owns, and
//! it checks its deadline and cancellation token as it runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use scene_core::{Mulberry32, ValueNoise};
use scene_mesh::{MaterialHints, MeshBuffer};

use crate::SceneBounds;
use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp};
use crate::bindings::{self, Builtin};

/// Interval between deadline/cancellation checks, in evaluation steps.
const TICK_MASK: u64 = 0xfff;
/// Call-stack ceiling for script closures.
const MAX_CALL_DEPTH: u32 = 256;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<Vec<(String, Value)>>>),
    Closure(Rc<ClosureValue>),
    Builtin(Builtin),
}

#[derive(Debug)]
pub struct ClosureValue {
    pub(crate) params: Vec<String>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) env: ScopeRef,
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Closure(_) => "function",
            Value::Builtin(_) => "builtin",
        }
    }

    pub(crate) fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Builtin(_))
    }
}

pub(crate) type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug)]
pub(crate) struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub(crate) fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        }))
    }

    pub(crate) fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub(crate) fn declare(scope: &ScopeRef, name: &str, value: Value) {
        scope.borrow_mut().vars.insert(name.to_string(), value);
    }

    fn get(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Rc::clone(scope);
        loop {
            if let Some(value) = current.borrow().vars.get(name) {
                return Some(value.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    fn assign(scope: &ScopeRef, name: &str, value: Value) -> bool {
        let mut current = Rc::clone(scope);
        loop {
            if let Some(slot) = current.borrow_mut().vars.get_mut(name) {
                *slot = value;
                return true;
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

/// Why an execution stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    Runtime { message: String, line: u32 },
    Timeout,
    Cancelled,
}

/// An execution failure plus how much geometry existed at that point.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecFailure {
    pub error: ExecError,
    pub vertices_so_far: u32,
}

/// Wall-clock and cancellation limits enforced inside the evaluation loop.
#[derive(Debug, Clone, Default)]
pub struct ExecLimits {
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Everything a finished sandbox hands back, moved out by value.
#[derive(Debug)]
pub struct SandboxOutput {
    pub buffer: MeshBuffer,
    pub material: MaterialHints,
}

pub(crate) struct GeomState {
    pub(crate) buffer: MeshBuffer,
    pub(crate) material: MaterialHints,
    pub(crate) rng: Mulberry32,
    pub(crate) noise: ValueNoise,
}

pub(crate) struct Interp {
    pub(crate) geom: GeomState,
    limits: ExecLimits,
    steps: u64,
    call_depth: u32,
}

/// Runs a validated program with fresh geometry state. The seed drives both
/// the sequential RNG and the noise lattice; identical inputs produce
/// bitwise-identical output.
pub fn execute(
    program: &Program,
    seed: u32,
    scene_bounds: SceneBounds,
    limits: ExecLimits,
) -> Result<SandboxOutput, ExecFailure> {
    let mut interp = Interp {
        geom: GeomState {
            buffer: MeshBuffer::new(),
            material: MaterialHints::default(),
            rng: Mulberry32::new(seed),
            noise: ValueNoise::new(seed),
        },
        limits,
        steps: 0,
        call_depth: 0,
    };

    let globals = bindings::global_scope(scene_bounds);
    let result = interp.exec_block(&program.stmts, &globals);
    // Top-level closures capture the global scope while being stored in it;
    // clearing the scope breaks those reference cycles so the run's
    // environment is actually reclaimed.
    globals.borrow_mut().vars.clear();

    match result {
        Ok(_) => Ok(SandboxOutput {
            buffer: interp.geom.buffer,
            material: interp.geom.material,
        }),
        Err(error) => Err(ExecFailure {
            vertices_so_far: interp.geom.buffer.vertex_count(),
            error,
        }),
    }
}

pub(crate) fn runtime(message: impl Into<String>, line: u32) -> ExecError {
    ExecError::Runtime {
        message: message.into(),
        line,
    }
}

impl Interp {
    fn tick(&mut self) -> Result<(), ExecError> {
        self.steps += 1;
        if (self.steps & TICK_MASK) == 0 {
            if let Some(cancel) = &self.limits.cancel
                && cancel.load(Ordering::Relaxed)
            {
                return Err(ExecError::Cancelled);
            }
            if let Some(deadline) = self.limits.deadline
                && Instant::now() > deadline
            {
                return Err(ExecError::Timeout);
            }
        }
        Ok(())
    }

    pub(crate) fn exec_block(
        &mut self,
        stmts: &[Stmt],
        scope: &ScopeRef,
    ) -> Result<Value, ExecError> {
        let mut last = Value::Nil;
        for stmt in stmts {
            last = self.exec_stmt(stmt, scope)?;
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Value, ExecError> {
        self.tick()?;
        match stmt {
            Stmt::Let { name, value, .. } => {
                let value = self.eval(value, scope)?;
                Scope::declare(scope, name, value);
                Ok(Value::Nil)
            }
            Stmt::Assign { name, value, line } => {
                let value = self.eval(value, scope)?;
                if Scope::assign(scope, name, value) {
                    Ok(Value::Nil)
                } else {
                    Err(runtime(format!("assignment to undefined variable '{name}'"), *line))
                }
            }
            Stmt::For {
                var,
                start,
                end,
                body,
                line,
            } => {
                let start = self.eval_number(start, scope)?;
                let end = self.eval_number(end, scope)?;
                if !start.is_finite() || !end.is_finite() {
                    return Err(runtime("range bounds must be finite", *line));
                }
                let mut i = start as i64;
                let end = end as i64;
                while i < end {
                    self.tick()?;
                    let body_scope = Scope::child(scope);
                    Scope::declare(&body_scope, var, Value::Number(i as f64));
                    self.exec_block(body, &body_scope)?;
                    i += 1;
                }
                Ok(Value::Nil)
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                line,
            } => {
                let cond = match self.eval(cond, scope)? {
                    Value::Bool(flag) => flag,
                    other => {
                        return Err(runtime(
                            format!("condition must be a bool, got {}", other.type_name()),
                            *line,
                        ));
                    }
                };
                if cond {
                    self.exec_block(then_body, &Scope::child(scope))
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body, &Scope::child(scope))
                } else {
                    Ok(Value::Nil)
                }
            }
            Stmt::Expr(expr) => self.eval(expr, scope),
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value, ExecError> {
        self.tick()?;
        let line = expr.line;
        match &expr.kind {
            ExprKind::Number(value) => Ok(Value::Number(*value)),
            ExprKind::Str(value) => Ok(Value::Str(Rc::from(value.as_str()))),
            ExprKind::Bool(value) => Ok(Value::Bool(*value)),
            ExprKind::Var(name) => Scope::get(scope, name)
                .ok_or_else(|| runtime(format!("undefined variable '{name}'"), line)),
            ExprKind::Unary { op, expr } => {
                let value = self.eval(expr, scope)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, other) => Err(runtime(
                        format!("cannot negate {}", other.type_name()),
                        line,
                    )),
                    (UnaryOp::Not, other) => Err(runtime(
                        format!("cannot apply '!' to {}", other.type_name()),
                        line,
                    )),
                }
            }
            ExprKind::Binary { lhs, op, rhs } => self.eval_binary(lhs, *op, rhs, scope, line),
            ExprKind::Call { callee, args } => {
                let callee = self.eval(callee, scope)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, scope)?);
                }
                self.call_value(callee, evaluated, line)
            }
            ExprKind::Index { target, index } => {
                let target = self.eval(target, scope)?;
                let index = self.eval(index, scope)?;
                self.eval_index(target, index, line)
            }
            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element, scope)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }
            ExprKind::Map(entries) => {
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    values.push((key.clone(), self.eval(value, scope)?));
                }
                Ok(Value::Map(Rc::new(RefCell::new(values))))
            }
            ExprKind::Closure { params, body } => Ok(Value::Closure(Rc::new(ClosureValue {
                params: params.clone(),
                body: body.clone(),
                env: Rc::clone(scope),
            }))),
        }
    }

    fn eval_binary(
        &mut self,
        lhs: &Expr,
        op: BinaryOp,
        rhs: &Expr,
        scope: &ScopeRef,
        line: u32,
    ) -> Result<Value, ExecError> {
        // Short-circuit forms first.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left = match self.eval(lhs, scope)? {
                Value::Bool(flag) => flag,
                other => {
                    return Err(runtime(
                        format!("logical operand must be a bool, got {}", other.type_name()),
                        line,
                    ));
                }
            };
            if (op == BinaryOp::And && !left) || (op == BinaryOp::Or && left) {
                return Ok(Value::Bool(left));
            }
            return match self.eval(rhs, scope)? {
                Value::Bool(flag) => Ok(Value::Bool(flag)),
                other => Err(runtime(
                    format!("logical operand must be a bool, got {}", other.type_name()),
                    line,
                )),
            };
        }

        let left = self.eval(lhs, scope)?;
        let right = self.eval(rhs, scope)?;

        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let equal = values_equal(&left, &right)
                .ok_or_else(|| {
                    runtime(
                        format!(
                            "cannot compare {} with {}",
                            left.type_name(),
                            right.type_name()
                        ),
                        line,
                    )
                })?;
            return Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }));
        }

        let (a, b) = match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => {
                return Err(runtime(
                    format!(
                        "arithmetic needs numbers, got {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                    line,
                ));
            }
        };

        Ok(match op {
            BinaryOp::Add => Value::Number(a + b),
            BinaryOp::Sub => Value::Number(a - b),
            BinaryOp::Mul => Value::Number(a * b),
            BinaryOp::Div => Value::Number(a / b),
            BinaryOp::Rem => Value::Number(a % b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => unreachable!(),
        })
    }

    fn eval_index(&mut self, target: Value, index: Value, line: u32) -> Result<Value, ExecError> {
        match (&target, &index) {
            (Value::Array(items), Value::Number(i)) => {
                let items = items.borrow();
                let idx = *i as i64;
                if !i.is_finite() || idx < 0 || idx as usize >= items.len() {
                    return Err(runtime(
                        format!("index {i} out of range for array of length {}", items.len()),
                        line,
                    ));
                }
                Ok(items[idx as usize].clone())
            }
            (Value::Map(entries), Value::Str(key)) => {
                let entries = entries.borrow();
                entries
                    .iter()
                    .find(|(name, _)| name.as_str() == &**key)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| runtime(format!("no key '{key}' in map"), line))
            }
            _ => Err(runtime(
                format!(
                    "cannot index {} with {}",
                    target.type_name(),
                    index.type_name()
                ),
                line,
            )),
        }
    }

    fn eval_number(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<f64, ExecError> {
        match self.eval(expr, scope)? {
            Value::Number(n) => Ok(n),
            other => Err(runtime(
                format!("expected a number, got {}", other.type_name()),
                expr.line,
            )),
        }
    }

    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        line: u32,
    ) -> Result<Value, ExecError> {
        match callee {
            Value::Closure(closure) => {
                if args.len() != closure.params.len() {
                    return Err(runtime(
                        format!(
                            "function expects {} argument(s), got {}",
                            closure.params.len(),
                            args.len()
                        ),
                        line,
                    ));
                }
                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(runtime("call stack exceeded", line));
                }
                self.call_depth += 1;
                let scope = Scope::child(&closure.env);
                for (param, arg) in closure.params.iter().zip(args) {
                    Scope::declare(&scope, param, arg);
                }
                let result = self.exec_block(&closure.body, &scope);
                self.call_depth -= 1;
                result
            }
            Value::Builtin(builtin) => bindings::call_builtin(self, builtin, args, line),
            other => Err(runtime(
                format!("value of type {} is not callable", other.type_name()),
                line,
            )),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Nil, Value::Nil) => Some(true),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::Number(a), Value::Number(b)) => Some(a == b),
        (Value::Str(a), Value::Str(b)) => Some(a == b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    use super::{ExecError, ExecLimits, execute};
    use crate::SceneBounds;
    use crate::parser::parse_program;

    fn run(source: &str) -> Result<super::SandboxOutput, super::ExecFailure> {
        let program = parse_program(source).expect("test source should parse");
        execute(&program, 1, SceneBounds::default(), ExecLimits::default())
    }

    #[test]
    fn empty_program_yields_empty_buffer() {
        let output = run("").expect("empty program runs");
        assert_eq!(output.buffer.vertex_count(), 0);
        assert!(!output.buffer.has_custom_normals());
    }

    #[test]
    fn emits_triangles_from_loops() {
        let output = run(
            "for i in 0..4 {\n  emit_triangle([i, 0, 0], [i + 1, 0, 0], [i, 1, 0], [1, 0, 0])\n}",
        )
        .expect("loop program runs");
        assert_eq!(output.buffer.vertex_count(), 12);
    }

    #[test]
    fn closures_capture_their_scope() {
        let output = run(
            "let height = 2\nlet lift = |p| [p[0], p[1] + height, p[2]]\nlet q = lift([0, 0, 0])\nemit_triangle(q, [1, 2, 0], [0, 2, 1], [1, 1, 1])",
        )
        .expect("closure program runs");
        assert_eq!(output.buffer.positions()[1], 2.0);
    }

    #[test]
    fn if_branches_produce_values() {
        let output = run(
            "let pick = |flag| if flag { 3 } else { 7 }\nlet x = pick(true)\nemit_triangle([x, 0, 0], [0, 1, 0], [0, 0, 1], [1, 1, 1])",
        )
        .expect("if program runs");
        assert_eq!(output.buffer.positions()[0], 3.0);
    }

    #[test]
    fn arithmetic_follows_ieee_semantics() {
        // Division by zero is not a trap; the validator downstream flags the
        // resulting non-finite geometry.
        let output = run("let x = 1 / 0\nlet y = 0 / 0");
        assert!(output.is_ok());
    }

    #[test]
    fn runtime_errors_carry_the_source_line() {
        let failure = run("let a = 1\nlet b = missing + 2").expect_err("should fail");
        match failure.error {
            ExecError::Runtime { message, line } => {
                assert!(message.contains("missing"));
                assert_eq!(line, 2);
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn failure_reports_vertices_emitted_so_far() {
        let failure = run(
            "emit_triangle([0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 1])\nboom()",
        )
        .expect_err("should fail");
        assert_eq!(failure.vertices_so_far, 3);
    }

    #[test]
    fn same_seed_is_bitwise_reproducible() {
        let source = "for i in 0..50 {\n  let x = random() * 2 - 1\n  let n = noise3(x, i, 0.5)\n  emit_triangle([x, n, 0], [x + 0.1, n, 0], [x, n + 0.1, 0], [1, 1, 1])\n}";
        let a = run(source).expect("first run");
        let b = run(source).expect("second run");
        assert_eq!(a.buffer.positions(), b.buffer.positions());
    }

    #[test]
    fn deadline_stops_infinite_loops() {
        let program = parse_program("let i = 0\nfor k in 0..100000000 {\n  i = i + 1\n}")
            .expect("parses");
        let limits = ExecLimits {
            deadline: Some(Instant::now() + Duration::from_millis(50)),
            cancel: None,
        };
        let failure =
            execute(&program, 1, SceneBounds::default(), limits).expect_err("should time out");
        assert_eq!(failure.error, ExecError::Timeout);
    }

    #[test]
    fn cancellation_token_stops_execution() {
        let cancel = Arc::new(AtomicBool::new(false));
        cancel.store(true, Ordering::Relaxed);
        let program = parse_program("for k in 0..100000000 { let x = k * 2 }").expect("parses");
        let limits = ExecLimits {
            deadline: None,
            cancel: Some(cancel),
        };
        let failure =
            execute(&program, 1, SceneBounds::default(), limits).expect_err("should cancel");
        assert_eq!(failure.error, ExecError::Cancelled);
    }

    #[test]
    fn runaway_recursion_is_a_runtime_error() {
        let failure = run("let f = |x| f(x)\nf(1)").expect_err("should overflow");
        match failure.error {
            ExecError::Runtime { message, .. } => assert!(message.contains("call stack")),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn scene_constants_are_injected() {
        let output = run(
            "emit_triangle([SCENE_MIN_X, SCENE_MIN_Y, SCENE_MIN_Z], [SCENE_MAX_X, SCENE_MAX_Y, SCENE_MAX_Z], [SCENE_CENTER_X, SCENE_CENTER_Y, SCENE_CENTER_Z], [1, 1, 1])",
        )
        .expect("constants resolve");
        let p = output.buffer.positions();
        assert_eq!(&p[0..3], &[-3.0, -1.5, -6.0]);
        assert_eq!(&p[3..6], &[3.0, 1.5, -1.0]);
        assert_eq!(&p[6..9], &[0.0, 0.0, -3.0]);
    }
}
