//! Static analysis of a parsed program. Runs entirely before sandbox
//! execution; a rejected program never reaches the interpreter.

use crate::ScriptError;
use crate::ast::{Expr, ExprKind, Program, Stmt};

/// Identifiers that must never appear anywhere in user code. These name
/// host-environment escape hatches; the sandbox binds none of them, but the
/// contract is to reject them before execution rather than fail inside it.
const FORBIDDEN_IDENTIFIERS: &[&str] = &[
    "fetch",
    "XMLHttpRequest",
    "Worker",
    "eval",
    "Function",
    "import",
    "require",
    "globalThis",
    "window",
    "document",
    "self",
    "postMessage",
    "importScripts",
    "SharedArrayBuffer",
    "Atomics",
    "WebSocket",
    "EventSource",
    "navigator",
    "location",
    "localStorage",
    "sessionStorage",
    "indexedDB",
    "crypto",
    "setTimeout",
    "setInterval",
    "requestAnimationFrame",
];

// Scheme prefixes only: an opaque-path URI like "http:evil" must be caught
// just as "http://evil" is.
const FORBIDDEN_STRING_PREFIXES: &[&str] = &["data:", "blob:", "http:", "https:"];

const MAX_NESTING_DEPTH: usize = 64;

/// Checks a parsed program against the sandbox deny rules.
pub fn validate(program: &Program) -> Result<(), ScriptError> {
    for stmt in &program.stmts {
        check_stmt(stmt, 1)?;
    }
    Ok(())
}

fn check_stmt(stmt: &Stmt, depth: usize) -> Result<(), ScriptError> {
    check_depth(depth, stmt_line(stmt))?;
    match stmt {
        Stmt::Let { name, value, line } | Stmt::Assign { name, value, line } => {
            check_identifier(name, *line)?;
            check_expr(value, depth + 1)
        }
        Stmt::For {
            var,
            start,
            end,
            body,
            line,
        } => {
            check_identifier(var, *line)?;
            check_expr(start, depth + 1)?;
            check_expr(end, depth + 1)?;
            for stmt in body {
                check_stmt(stmt, depth + 1)?;
            }
            Ok(())
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            check_expr(cond, depth + 1)?;
            for stmt in then_body {
                check_stmt(stmt, depth + 1)?;
            }
            if let Some(else_body) = else_body {
                for stmt in else_body {
                    check_stmt(stmt, depth + 1)?;
                }
            }
            Ok(())
        }
        Stmt::Expr(expr) => check_expr(expr, depth + 1),
    }
}

fn check_expr(expr: &Expr, depth: usize) -> Result<(), ScriptError> {
    check_depth(depth, expr.line)?;
    match &expr.kind {
        ExprKind::Number(_) | ExprKind::Bool(_) => Ok(()),
        ExprKind::Str(value) => check_string(value, expr.line),
        ExprKind::Var(name) => check_identifier(name, expr.line),
        ExprKind::Unary { expr: inner, .. } => check_expr(inner, depth + 1),
        ExprKind::Binary { lhs, rhs, .. } => {
            check_expr(lhs, depth + 1)?;
            check_expr(rhs, depth + 1)
        }
        ExprKind::Call { callee, args } => {
            check_expr(callee, depth + 1)?;
            for arg in args {
                check_expr(arg, depth + 1)?;
            }
            Ok(())
        }
        ExprKind::Index { target, index } => {
            check_expr(target, depth + 1)?;
            check_expr(index, depth + 1)
        }
        ExprKind::Array(elements) => {
            for element in elements {
                check_expr(element, depth + 1)?;
            }
            Ok(())
        }
        ExprKind::Map(entries) => {
            for (key, value) in entries {
                check_identifier(key, expr.line)?;
                check_expr(value, depth + 1)?;
            }
            Ok(())
        }
        ExprKind::Closure { params, body } => {
            for param in params {
                check_identifier(param, expr.line)?;
            }
            for stmt in body {
                check_stmt(stmt, depth + 1)?;
            }
            Ok(())
        }
    }
}

fn check_identifier(name: &str, line: u32) -> Result<(), ScriptError> {
    if FORBIDDEN_IDENTIFIERS.contains(&name) {
        return Err(ScriptError::at(
            format!("forbidden identifier '{name}'"),
            line,
            0,
        ));
    }
    Ok(())
}

fn check_string(value: &str, line: u32) -> Result<(), ScriptError> {
    for prefix in FORBIDDEN_STRING_PREFIXES {
        if value.starts_with(prefix) {
            return Err(ScriptError::at(
                format!("forbidden URL-like string literal '{prefix}...'"),
                line,
                0,
            ));
        }
    }
    Ok(())
}

fn check_depth(depth: usize, line: u32) -> Result<(), ScriptError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ScriptError::at(
            format!("nesting exceeds the {MAX_NESTING_DEPTH}-level limit"),
            line,
            0,
        ));
    }
    Ok(())
}

fn stmt_line(stmt: &Stmt) -> u32 {
    match stmt {
        Stmt::Let { line, .. }
        | Stmt::Assign { line, .. }
        | Stmt::For { line, .. }
        | Stmt::If { line, .. } => *line,
        Stmt::Expr(expr) => expr.line,
    }
}
