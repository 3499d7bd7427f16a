use crate::ScriptError;
use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parses source text as a statement sequence (the sandbox wraps nothing
/// around user code).
pub fn parse_program(source: &str) -> Result<Program, ScriptError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse_program(&mut self) -> Result<Program, ScriptError> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ScriptError> {
        let stmt = match &self.peek().kind {
            TokenKind::Let => self.parse_let()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::Ident(_) if self.peek_second_is(&TokenKind::Eq) => self.parse_assign()?,
            _ => Stmt::Expr(self.parse_expr()?),
        };
        // Semicolons are optional separators.
        while self.check(&TokenKind::Semi) {
            self.advance();
        }
        Ok(stmt)
    }

    fn parse_let(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.peek().line;
        self.advance();
        let name = self.expect_ident("variable name after 'let'")?;
        self.expect(&TokenKind::Eq, "'=' after variable name")?;
        let value = self.parse_expr()?;
        Ok(Stmt::Let { name, value, line })
    }

    fn parse_assign(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.peek().line;
        let name = self.expect_ident("assignment target")?;
        self.expect(&TokenKind::Eq, "'=' in assignment")?;
        let value = self.parse_expr()?;
        Ok(Stmt::Assign { name, value, line })
    }

    fn parse_for(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.peek().line;
        self.advance();
        let var = self.expect_ident("loop variable after 'for'")?;
        self.expect(&TokenKind::In, "'in' after loop variable")?;
        let start = self.parse_expr()?;
        self.expect(&TokenKind::DotDot, "'..' in range")?;
        let end = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var,
            start,
            end,
            body,
            line,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.peek().line;
        self.advance();
        let cond = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let else_body = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            line,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                let token = self.peek();
                return Err(ScriptError::at("unclosed block", token.line, token.column));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.advance();
        Ok(stmts)
    }

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let line = self.peek().line;
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(lhs, BinaryOp::Or, rhs, line);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let line = self.peek().line;
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = binary(lhs, BinaryOp::And, rhs, line);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let line = self.peek().line;
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(lhs, op, rhs, line);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ScriptError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek().kind {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        let line = self.peek().line;
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(binary(lhs, op, rhs, line))
    }

    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.peek().line;
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(lhs, op, rhs, line);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            let line = self.peek().line;
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(lhs, op, rhs, line);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let line = self.peek().line;
        self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            line,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;
        loop {
            // A call or index suffix must start on the same line as the
            // expression it applies to; otherwise it begins a new statement.
            let prev_line = self.tokens[self.pos.saturating_sub(1)].line;
            match self.peek().kind {
                TokenKind::LParen if self.peek().line == prev_line => {
                    let line = self.peek().line;
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')' after arguments")?;
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        line,
                    };
                }
                TokenKind::LBracket if self.peek().line == prev_line => {
                    let line = self.peek().line;
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']' after index")?;
                    expr = Expr {
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self.peek().clone();
        let line = token.line;
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Number(value),
                    line,
                })
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Str(value),
                    line,
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Bool(true),
                    line,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Bool(false),
                    line,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Var(name),
                    line,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "']' after array elements")?;
                Ok(Expr {
                    kind: ExprKind::Array(elements),
                    line,
                })
            }
            TokenKind::LBrace => self.parse_map(line),
            TokenKind::Pipe => self.parse_closure(line),
            TokenKind::OrOr => {
                // `||` in expression position is an empty parameter list.
                self.advance();
                let body = self.parse_closure_body()?;
                Ok(Expr {
                    kind: ExprKind::Closure {
                        params: Vec::new(),
                        body,
                    },
                    line,
                })
            }
            _ => Err(ScriptError::at(
                "unexpected token at start of expression",
                token.line,
                token.column,
            )),
        }
    }

    fn parse_map(&mut self, line: u32) -> Result<Expr, ScriptError> {
        self.advance();
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = self.expect_ident("map key")?;
                self.expect(&TokenKind::Colon, "':' after map key")?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}' after map entries")?;
        Ok(Expr {
            kind: ExprKind::Map(entries),
            line,
        })
    }

    fn parse_closure(&mut self, line: u32) -> Result<Expr, ScriptError> {
        self.advance();
        let mut params = Vec::new();
        if !self.check(&TokenKind::Pipe) {
            loop {
                params.push(self.expect_ident("closure parameter")?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::Pipe, "'|' after closure parameters")?;
        let body = self.parse_closure_body()?;
        Ok(Expr {
            kind: ExprKind::Closure { params, body },
            line,
        })
    }

    fn parse_closure_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        if self.check(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![Stmt::Expr(self.parse_expr()?)])
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_second_is(&self, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.pos + 1)
            .map(|token| &token.kind == kind)
            .unwrap_or(false)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ScriptError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek();
            Err(ScriptError::at(
                format!("expected {what}"),
                token.line,
                token.column,
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ScriptError> {
        let token = self.peek().clone();
        if let TokenKind::Ident(name) = token.kind {
            self.advance();
            Ok(name)
        } else {
            Err(ScriptError::at(
                format!("expected {what}"),
                token.line,
                token.column,
            ))
        }
    }
}

fn binary(lhs: Expr, op: BinaryOp, rhs: Expr, line: u32) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        },
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_program;
    use crate::ast::{ExprKind, Stmt};

    #[test]
    fn parses_let_and_call_statements() {
        let program = parse_program("let r = 0.5\nsphere_mesh(0, 0, -3, r, 1, 1, 1)")
            .expect("program should parse");
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(program.stmts[0], Stmt::Let { ref name, .. } if name == "r"));
        match &program.stmts[1] {
            Stmt::Expr(expr) => match &expr.kind {
                ExprKind::Call { args, .. } => assert_eq!(args.len(), 7),
                other => panic!("expected call, got {other:?}"),
            },
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_for_loops_with_ranges() {
        let program = parse_program("for i in 0..10 { emit(i) }").expect("program should parse");
        match &program.stmts[0] {
            Stmt::For { var, body, .. } => {
                assert_eq!(var, "i");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected for loop, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else_chains() {
        let program =
            parse_program("if x < 1 { a() } else if x < 2 { b() } else { c() }").expect("parse");
        match &program.stmts[0] {
            Stmt::If { else_body, .. } => {
                let else_body = else_body.as_ref().expect("else branch");
                assert!(matches!(else_body[0], Stmt::If { .. }));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parses_closures_with_expression_and_block_bodies() {
        let program = parse_program("let f = |x, y| x + y\nlet g = |x| { let t = x * 2; t }")
            .expect("program should parse");
        match &program.stmts[0] {
            Stmt::Let { value, .. } => match &value.kind {
                ExprKind::Closure { params, body } => {
                    assert_eq!(params, &["x".to_string(), "y".to_string()]);
                    assert_eq!(body.len(), 1);
                }
                other => panic!("expected closure, got {other:?}"),
            },
            other => panic!("expected let, got {other:?}"),
        }
        match &program.stmts[1] {
            Stmt::Let { value, .. } => match &value.kind {
                ExprKind::Closure { body, .. } => assert_eq!(body.len(), 2),
                other => panic!("expected closure, got {other:?}"),
            },
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn parses_arrays_maps_and_indexing() {
        let program = parse_program("let p = [1, 2, 3]\nlet m = {roughness: 0.4}\nlet x = p[0]")
            .expect("program should parse");
        assert_eq!(program.stmts.len(), 3);
        match &program.stmts[2] {
            Stmt::Let { value, .. } => assert!(matches!(value.kind, ExprKind::Index { .. })),
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn precedence_binds_mul_tighter_than_add() {
        let program = parse_program("1 + 2 * 3").expect("program should parse");
        match &program.stmts[0] {
            Stmt::Expr(expr) => match &expr.kind {
                ExprKind::Binary { op, rhs, .. } => {
                    assert_eq!(*op, crate::ast::BinaryOp::Add);
                    assert!(matches!(rhs.kind, ExprKind::Binary { .. }));
                }
                other => panic!("expected binary, got {other:?}"),
            },
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn newline_separates_statement_from_bracket_literal() {
        // Without the same-line rule the second statement would parse as an
        // index into the call result.
        let program = parse_program("f(1)\n[1, 2, 3]").expect("program should parse");
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(
            program.stmts[1],
            Stmt::Expr(ref e) if matches!(e.kind, ExprKind::Array(_))
        ));
    }

    #[test]
    fn assignment_requires_existing_syntax_shape() {
        let program = parse_program("x = 4").expect("program should parse");
        assert!(matches!(program.stmts[0], Stmt::Assign { ref name, .. } if name == "x"));
    }

    #[test]
    fn reports_parse_errors_with_position() {
        let err = parse_program("let = 3").expect_err("should fail");
        let text = err.to_string();
        assert!(text.contains("line 1"), "error missing position: {text}");
    }

    #[test]
    fn rejects_unclosed_blocks() {
        assert!(parse_program("for i in 0..3 { emit(i)").is_err());
        assert!(parse_program("(1 + 2").is_err());
    }
}
