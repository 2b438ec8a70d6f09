//! Tokenizer for policy source text.

use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Text(String),
    Ident(String),

    // Keywords
    Let,
    Return,
    If,
    Else,
    True,
    False,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Assign,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,

    Eof,
}

impl TokenKind {
    /// Short human form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Text(_) => "string".to_owned(),
            Self::Ident(name) => format!("'{name}'"),
            Self::Let => "'let'".to_owned(),
            Self::Return => "'return'".to_owned(),
            Self::If => "'if'".to_owned(),
            Self::Else => "'else'".to_owned(),
            Self::True => "'true'".to_owned(),
            Self::False => "'false'".to_owned(),
            Self::LParen => "'('".to_owned(),
            Self::RParen => "')'".to_owned(),
            Self::LBrace => "'{'".to_owned(),
            Self::RBrace => "'}'".to_owned(),
            Self::Comma => "','".to_owned(),
            Self::Semi => "';'".to_owned(),
            Self::Assign => "'='".to_owned(),
            Self::Plus => "'+'".to_owned(),
            Self::Minus => "'-'".to_owned(),
            Self::Star => "'*'".to_owned(),
            Self::Slash => "'/'".to_owned(),
            Self::Percent => "'%'".to_owned(),
            Self::Lt => "'<'".to_owned(),
            Self::Le => "'<='".to_owned(),
            Self::Gt => "'>'".to_owned(),
            Self::Ge => "'>='".to_owned(),
            Self::EqEq => "'=='".to_owned(),
            Self::NotEq => "'!='".to_owned(),
            Self::AndAnd => "'&&'".to_owned(),
            Self::OrOr => "'||'".to_owned(),
            Self::Bang => "'!'".to_owned(),
            Self::Eof => "end of input".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

/// Split `source` into tokens.  The last token is always [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut cur = Cursor {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();

    loop {
        // Whitespace and `#` comments.
        while let Some(c) = cur.peek() {
            if c.is_whitespace() {
                cur.bump();
            } else if c == '#' {
                while cur.peek().is_some_and(|c| c != '\n') {
                    cur.bump();
                }
            } else {
                break;
            }
        }

        let (line, column) = (cur.line, cur.column);
        let Some(c) = cur.bump() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
            return Ok(tokens);
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' if cur.eat('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if cur.eat('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '=' if cur.eat('=') => TokenKind::EqEq,
            '=' => TokenKind::Assign,
            '!' if cur.eat('=') => TokenKind::NotEq,
            '!' => TokenKind::Bang,
            '&' if cur.eat('&') => TokenKind::AndAnd,
            '|' if cur.eat('|') => TokenKind::OrOr,
            '"' => TokenKind::Text(lex_text(&mut cur, line, column)?),
            c if c.is_ascii_digit() => TokenKind::Number(lex_number(&mut cur, c, line, column)?),
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(c) = cur.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                    word.push(c);
                    cur.bump();
                }
                keyword(word)
            }
            other => {
                return Err(CompileError::at(
                    format!("unexpected character '{other}'"),
                    line,
                    column,
                ));
            }
        };
        tokens.push(Token { kind, line, column });
    }
}

fn keyword(word: String) -> TokenKind {
    match word.as_str() {
        "let" => TokenKind::Let,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => TokenKind::Ident(word),
    }
}

fn lex_number(cur: &mut Cursor<'_>, first: char, line: u32, column: u32) -> Result<f64, CompileError> {
    let mut digits = String::from(first);
    while let Some(c) = cur.peek().filter(char::is_ascii_digit) {
        digits.push(c);
        cur.bump();
    }
    if cur.eat('.') {
        digits.push('.');
        let mut fraction = false;
        while let Some(c) = cur.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            cur.bump();
            fraction = true;
        }
        if !fraction {
            return Err(CompileError::at("expected digits after '.'", line, column));
        }
    }
    digits
        .parse()
        .map_err(|_| CompileError::at(format!("invalid number '{digits}'"), line, column))
}

fn lex_text(cur: &mut Cursor<'_>, line: u32, column: u32) -> Result<String, CompileError> {
    let mut text = String::new();
    loop {
        match cur.bump() {
            None | Some('\n') => {
                return Err(CompileError::at("unterminated string", line, column));
            }
            Some('"') => return Ok(text),
            Some('\\') => {
                let escaped = match cur.bump() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    other => {
                        let shown = other.map_or_else(|| "end of input".to_owned(), |c| format!("'\\{c}'"));
                        return Err(CompileError::at(
                            format!("invalid escape {shown}"),
                            cur.line,
                            cur.column,
                        ));
                    }
                };
                text.push(escaped);
            }
            Some(c) => text.push(c),
        }
    }
}
