//! Recursive-descent parser and static checks.
//!
//! Produces a [`Program`] that the interpreter can run without further
//! validation: every function call has been resolved to a [`Builtin`] with
//! a legal argument count, every variable reference names a `let` that is
//! in scope, and every `smooth` call site owns a window slot.

use crate::error::CompileError;

use super::lexer::{Token, TokenKind, tokenize};

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, value: Expr },
    Return(Expr),
    If { cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Text(String),
    Bool(bool),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    /// Moving average of `value` over the last `window` evaluations of this
    /// call site.  `slot` indexes the policy's window table.
    Smooth { value: Box<Expr>, slot: usize, window: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Software,
    Default,
    Undefined,
    Sensor,
    SensorOr,
    Min,
    Max,
    Clamp,
    Abs,
    Round,
    Curve,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "software" => Self::Software,
            "default" => Self::Default,
            "undefined" => Self::Undefined,
            "sensor" => Self::Sensor,
            "sensor_or" => Self::SensorOr,
            "min" => Self::Min,
            "max" => Self::Max,
            "clamp" => Self::Clamp,
            "abs" => Self::Abs,
            "round" => Self::Round,
            "curve" => Self::Curve,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Default => "default",
            Self::Undefined => "undefined",
            Self::Sensor => "sensor",
            Self::SensorOr => "sensor_or",
            Self::Min => "min",
            Self::Max => "max",
            Self::Clamp => "clamp",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Curve => "curve",
        }
    }

    /// Inclusive argument-count range.
    fn arity(self) -> (usize, usize) {
        match self {
            Self::Software => (1, 2),
            Self::Default | Self::Undefined => (0, 1),
            Self::Sensor | Self::Abs => (1, 1),
            Self::SensorOr => (2, 2),
            Self::Min | Self::Max => (1, usize::MAX),
            Self::Clamp => (3, 3),
            Self::Round => (1, 2),
            Self::Curve => (3, usize::MAX),
        }
    }
}

/// A checked program plus the smoothing windows its call sites need.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    /// Window length per `smooth` call site, indexed by slot.
    pub windows: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse and check `source`.  `max_window` bounds `smooth` windows.
pub fn parse(source: &str, max_window: usize) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        scopes: vec![Vec::new()],
        windows: Vec::new(),
        max_window,
        saw_return: false,
        depth: 0,
    };

    let mut body = Vec::new();
    while parser.peek().kind != TokenKind::Eof {
        body.push(parser.statement()?);
    }
    if !parser.saw_return {
        return Err(CompileError::new("policy never returns a result"));
    }
    Ok(Program {
        body,
        windows: parser.windows,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Declared variable names, innermost block last.
    scopes: Vec<Vec<String>>,
    windows: Vec<usize>,
    max_window: usize,
    saw_return: bool,
    /// Nesting of blocks and expressions plus operators chained at the
    /// current level, bounded by [`MAX_NESTING`].
    depth: usize,
}

/// Deepest syntax tree a policy may build: parentheses, call arguments,
/// blocks, `else if` links, unary operators and chained binary operators
/// all count.  Keeps the parser, the interpreter and the tree's drop glue
/// well inside a thread's stack.
pub const MAX_NESTING: usize = 128;

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, CompileError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn enter(&mut self, what: &str) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let at = self.peek();
            return Err(CompileError::at(
                format!("{what} nested too deeply"),
                at.line,
                at.column,
            ));
        }
        Ok(())
    }

    fn unexpected(&self, wanted: &str) -> CompileError {
        let found = self.peek();
        CompileError::at(
            format!("expected {wanted}, found {}", found.kind.describe()),
            found.line,
            found.column,
        )
    }

    // ── Statements ────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        match self.peek().kind {
            TokenKind::Let => {
                self.advance();
                let name_token = self.advance();
                let TokenKind::Ident(name) = name_token.kind else {
                    return Err(CompileError::at(
                        format!("expected variable name, found {}", name_token.kind.describe()),
                        name_token.line,
                        name_token.column,
                    ));
                };
                if Builtin::lookup(&name).is_some() || name == "smooth" {
                    return Err(CompileError::at(
                        format!("'{name}' is a built-in function"),
                        name_token.line,
                        name_token.column,
                    ));
                }
                self.expect(&TokenKind::Assign)?;
                let value = self.expression()?;
                self.expect(&TokenKind::Semi)?;
                // Declared after the initialiser: `let x = x;` needs an outer x.
                if let Some(scope) = self.scopes.last_mut() {
                    scope.push(name.clone());
                }
                Ok(Stmt::Let { name, value })
            }
            TokenKind::Return => {
                self.advance();
                let value = self.expression()?;
                self.expect(&TokenKind::Semi)?;
                self.saw_return = true;
                Ok(Stmt::Return(value))
            }
            TokenKind::If => self.if_statement(),
            _ => Err(self.unexpected("'let', 'return' or 'if'")),
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::If)?;
        let cond = self.expression()?;
        let then = self.block()?;
        let otherwise = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                let base = self.depth;
                self.enter("block")?;
                let chained = self.if_statement();
                self.depth = base;
                vec![chained?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let base = self.depth;
        self.enter("block")?;
        let stmts = self.block_body();
        self.depth = base;
        stmts
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect(&TokenKind::LBrace)?;
        self.scopes.push(Vec::new());
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        self.scopes.pop();
        Ok(stmts)
    }

    // ── Expressions ───────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        self.enter("expression")?;
        let expr = self.or();
        self.depth = base;
        expr
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.and()?;
        while self.check(&TokenKind::OrOr) {
            let op = self.advance();
            self.enter("expression")?;
            let rhs = self.and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs, &op);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.comparison()?;
        while self.check(&TokenKind::AndAnd) {
            let op = self.advance();
            self.enter("expression")?;
            let rhs = self.comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs, &op);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.additive()?;
        let op = match self.peek().kind {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            _ => return Ok(lhs),
        };
        let token = self.advance();
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs, &token))
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let token = self.advance();
            self.enter("expression")?;
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs, &token);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            let token = self.advance();
            self.enter("expression")?;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, &token);
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.primary(),
        };
        let token = self.advance();
        self.enter("expression")?;
        let operand = self.unary()?;
        Ok(Expr {
            kind: ExprKind::Unary(op, Box::new(operand)),
            line: token.line,
            column: token.column,
        })
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let token = self.advance();
        let (line, column) = (token.line, token.column);
        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::Text(s) => ExprKind::Text(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Ident(name) if self.check(&TokenKind::LParen) => {
                return self.call(&name, line, column);
            }
            TokenKind::Ident(name) => {
                if !self.scopes.iter().any(|scope| scope.contains(&name)) {
                    return Err(CompileError::at(
                        format!("unknown variable '{name}'"),
                        line,
                        column,
                    ));
                }
                ExprKind::Var(name)
            }
            other => {
                return Err(CompileError::at(
                    format!("expected expression, found {}", other.describe()),
                    line,
                    column,
                ));
            }
        };
        Ok(Expr { kind, line, column })
    }

    fn call(&mut self, name: &str, line: u32, column: u32) -> Result<Expr, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                self.expect(&TokenKind::Comma)?;
            }
        }

        if name == "smooth" {
            return self.smooth(args, line, column);
        }

        let Some(builtin) = Builtin::lookup(name) else {
            return Err(CompileError::at(
                format!("unknown function '{name}'"),
                line,
                column,
            ));
        };
        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else if max == usize::MAX {
                format!("at least {min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(CompileError::at(
                format!(
                    "'{name}' takes {expected} argument(s), got {}",
                    args.len()
                ),
                line,
                column,
            ));
        }
        if builtin == Builtin::Curve && args.len() % 2 == 0 {
            return Err(CompileError::at(
                "'curve' takes x followed by (x, y) point pairs",
                line,
                column,
            ));
        }
        Ok(Expr {
            kind: ExprKind::Call(builtin, args),
            line,
            column,
        })
    }

    fn smooth(&mut self, mut args: Vec<Expr>, line: u32, column: u32) -> Result<Expr, CompileError> {
        if args.len() != 2 {
            return Err(CompileError::at(
                format!("'smooth' takes 2 argument(s), got {}", args.len()),
                line,
                column,
            ));
        }
        let window_arg = args.pop().map(|e| e.kind);
        let window = match window_arg {
            Some(ExprKind::Number(n)) if n.fract() == 0.0 && n >= 1.0 && n <= self.max_window as f64 => {
                n as usize
            }
            _ => {
                return Err(CompileError::at(
                    format!(
                        "'smooth' window must be an integer literal between 1 and {}",
                        self.max_window
                    ),
                    line,
                    column,
                ));
            }
        };
        let value = args.pop().map(Box::new).ok_or_else(|| CompileError::at("missing value", line, column))?;
        let slot = self.windows.len();
        self.windows.push(window);
        Ok(Expr {
            kind: ExprKind::Smooth { value, slot, window },
            line,
            column,
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, token: &Token) -> Expr {
    Expr {
        kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
        line: token.line,
        column: token.column,
    }
}
