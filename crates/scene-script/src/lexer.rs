use crate::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Let,
    For,
    In,
    If,
    Else,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semi,
    Eq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
    Not,
    AndAnd,
    OrOr,
    Pipe,
    DotDot,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    index: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            index: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
                continue;
            }
            if self.starts_with("//") {
                self.skip_line_comment();
                continue;
            }
            if self.starts_with("/*") {
                self.skip_block_comment()?;
                continue;
            }

            let line = self.line;
            let column = self.column;
            let push = |kind: TokenKind| Token { kind, line, column };

            match ch {
                '(' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::LParen));
                }
                ')' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::RParen));
                }
                '{' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::LBrace));
                }
                '}' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::RBrace));
                }
                '[' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::LBracket));
                }
                ']' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::RBracket));
                }
                ',' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Comma));
                }
                ':' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Colon));
                }
                ';' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Semi));
                }
                '+' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Plus));
                }
                '-' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Minus));
                }
                '*' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Star));
                }
                '/' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Slash));
                }
                '%' => {
                    self.advance_char();
                    tokens.push(push(TokenKind::Percent));
                }
                '=' => {
                    self.advance_char();
                    if self.peek_char() == Some('=') {
                        self.advance_char();
                        tokens.push(push(TokenKind::EqEq));
                    } else {
                        tokens.push(push(TokenKind::Eq));
                    }
                }
                '!' => {
                    self.advance_char();
                    if self.peek_char() == Some('=') {
                        self.advance_char();
                        tokens.push(push(TokenKind::NotEq));
                    } else {
                        tokens.push(push(TokenKind::Not));
                    }
                }
                '<' => {
                    self.advance_char();
                    if self.peek_char() == Some('=') {
                        self.advance_char();
                        tokens.push(push(TokenKind::Le));
                    } else {
                        tokens.push(push(TokenKind::Lt));
                    }
                }
                '>' => {
                    self.advance_char();
                    if self.peek_char() == Some('=') {
                        self.advance_char();
                        tokens.push(push(TokenKind::Ge));
                    } else {
                        tokens.push(push(TokenKind::Gt));
                    }
                }
                '&' => {
                    self.advance_char();
                    if self.peek_char() == Some('&') {
                        self.advance_char();
                        tokens.push(push(TokenKind::AndAnd));
                    } else {
                        return Err(ScriptError::at("expected '&&'", line, column));
                    }
                }
                '|' => {
                    self.advance_char();
                    if self.peek_char() == Some('|') {
                        self.advance_char();
                        tokens.push(push(TokenKind::OrOr));
                    } else {
                        tokens.push(push(TokenKind::Pipe));
                    }
                }
                '.' if self.peek_second_char() == Some('.') => {
                    self.advance_char();
                    self.advance_char();
                    tokens.push(push(TokenKind::DotDot));
                }
                '"' => tokens.push(self.lex_string()?),
                c if is_ident_start(c) => tokens.push(self.lex_identifier()?),
                c if c.is_ascii_digit()
                    || (c == '.'
                        && self
                            .peek_second_char()
                            .map(|next| next.is_ascii_digit())
                            .unwrap_or(false)) =>
                {
                    tokens.push(self.lex_number()?)
                }
                _ => {
                    return Err(ScriptError::at(
                        format!("unexpected character '{ch}'"),
                        self.line,
                        self.column,
                    ));
                }
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
        });

        Ok(tokens)
    }

    fn lex_identifier(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let column = self.column;
        let start = self.index;

        self.advance_char();
        while self.peek_char().map(is_ident_continue).unwrap_or(false) {
            self.advance_char();
        }

        let ident = self
            .source
            .get(start..self.index)
            .ok_or_else(|| ScriptError::new("invalid identifier span"))?;

        let kind = match ident {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "let" => TokenKind::Let,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            _ => TokenKind::Ident(ident.to_string()),
        };

        Ok(Token { kind, line, column })
    }

    fn lex_number(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let column = self.column;
        let start = self.index;

        let mut seen_dot = false;
        if self.peek_char() == Some('.') {
            seen_dot = true;
            self.advance_char();
        }

        while self
            .peek_char()
            .map(|ch| ch.is_ascii_digit())
            .unwrap_or(false)
        {
            self.advance_char();
        }

        // Do not consume the dot of a `..` range.
        if self.peek_char() == Some('.') && !seen_dot && self.peek_second_char() != Some('.') {
            self.advance_char();
            while self
                .peek_char()
                .map(|ch| ch.is_ascii_digit())
                .unwrap_or(false)
            {
                self.advance_char();
            }
        }

        if let Some(exp) = self.peek_char()
            && (exp == 'e' || exp == 'E')
        {
            self.advance_char();
            if let Some(sign) = self.peek_char()
                && (sign == '+' || sign == '-')
            {
                self.advance_char();
            }

            let mut exp_digits = 0usize;
            while self
                .peek_char()
                .map(|ch| ch.is_ascii_digit())
                .unwrap_or(false)
            {
                exp_digits += 1;
                self.advance_char();
            }

            if exp_digits == 0 {
                return Err(ScriptError::at("invalid exponent in number", line, column));
            }
        }

        let text = self
            .source
            .get(start..self.index)
            .ok_or_else(|| ScriptError::new("invalid number span"))?;
        let value = text
            .parse::<f64>()
            .map_err(|_| ScriptError::at(format!("invalid number '{text}'"), line, column))?;

        Ok(Token {
            kind: TokenKind::Number(value),
            line,
            column,
        })
    }

    fn lex_string(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let column = self.column;
        self.advance_char();

        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => return Err(ScriptError::at("unterminated string", line, column)),
                Some('"') => {
                    self.advance_char();
                    break;
                }
                Some('\\') => {
                    self.advance_char();
                    let escaped = self
                        .peek_char()
                        .ok_or_else(|| ScriptError::at("unterminated string", line, column))?;
                    self.advance_char();
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        other => {
                            return Err(ScriptError::at(
                                format!("unknown escape '\\{other}'"),
                                self.line,
                                self.column,
                            ));
                        }
                    }
                }
                Some(ch) => {
                    self.advance_char();
                    value.push(ch);
                }
            }
        }

        Ok(Token {
            kind: TokenKind::Str(value),
            line,
            column,
        })
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            self.advance_char();
            if ch == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ScriptError> {
        let line = self.line;
        let column = self.column;
        self.advance_char();
        self.advance_char();
        loop {
            if self.starts_with("*/") {
                self.advance_char();
                self.advance_char();
                return Ok(());
            }
            if self.peek_char().is_none() {
                return Err(ScriptError::at("unterminated block comment", line, column));
            }
            self.advance_char();
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        self.source[self.index..].starts_with(text)
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.index..].chars().next()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut chars = self.source[self.index..].chars();
        chars.next();
        chars.next()
    }

    fn advance_char(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.index += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::{Lexer, TokenKind};

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("lexing should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_statement_shapes() {
        let tokens = kinds("let r = 0.5\nsphere_mesh(0, 0, -3, r, 1, 1, 1)");
        assert!(tokens.contains(&TokenKind::Let));
        assert!(tokens.contains(&TokenKind::Ident("sphere_mesh".to_string())));
        assert!(tokens.contains(&TokenKind::Number(0.5)));
    }

    #[test]
    fn range_dots_do_not_merge_into_numbers() {
        let tokens = kinds("for i in 0..10 { }");
        assert!(tokens.contains(&TokenKind::DotDot));
        assert!(tokens.contains(&TokenKind::Number(0.0)));
        assert!(tokens.contains(&TokenKind::Number(10.0)));
    }

    #[test]
    fn distinguishes_pipes_and_logical_or() {
        let tokens = kinds("|x| x || y");
        let pipes = tokens.iter().filter(|k| **k == TokenKind::Pipe).count();
        let ors = tokens.iter().filter(|k| **k == TokenKind::OrOr).count();
        assert_eq!(pipes, 2);
        assert_eq!(ors, 1);
    }

    #[test]
    fn lexes_strings_with_escapes() {
        let tokens = kinds(r#"let s = "a\"b\n""#);
        assert!(tokens.contains(&TokenKind::Str("a\"b\n".to_string())));
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = kinds("1 // trailing\n/* block\nspanning */ 2");
        assert_eq!(
            tokens,
            vec![TokenKind::Number(1.0), TokenKind::Number(2.0), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_line_numbers() {
        let tokens = Lexer::new("a\nb\n  c").tokenize().expect("lexing should succeed");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
        assert_eq!(tokens[2].column, 3);
    }

    #[test]
    fn rejects_stray_characters() {
        assert!(Lexer::new("let a = 1 @ 2").tokenize().is_err());
        assert!(Lexer::new("a & b").tokenize().is_err());
        assert!(Lexer::new("\"open").tokenize().is_err());
    }
}
