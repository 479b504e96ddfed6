// Sandboxed alert expression language: a small SQL-like boolean/arithmetic grammar,
// parsed into an AST and evaluated against a read-only column mapping. Nulls propagate
// with SQL three-valued logic; booleans are 1.0 / 0.0.
//
//   expr    := or
//   or      := and ( OR and )*
//   and     := not ( AND not )*
//   not     := NOT not | cmp
//   cmp     := sum ( (= | == | != | <> | < | <= | > | >=) sum )?
//   sum     := product ( (+ | -) product )*
//   product := unary ( (* | / | %) unary )*
//   unary   := - unary | primary
//   primary := number | NULL | TRUE | FALSE | ident | ident ( args ) | ( expr )

use std::collections::BTreeMap;
use thiserror::Error;

/// Nesting limit for parentheses, function arguments, NOT and unary minus.
pub const MAX_DEPTH: usize = 64;
/// Token limit; bounds the left-nested chains built by the binary operator loops.
pub const MAX_TOKENS: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    #[error("unexpected end of expression, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function {name} expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("expression has {got} tokens, limit is {limit}")]
    TooLong { got: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Null,
    True,
    False,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Ident(name) => format!("identifier '{name}'"),
            other => format!("{other:?}"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        if ch.is_ascii_digit() || (ch == '.' && next.is_some_and(|c| c.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
            tokens.push(Token::Number(n));
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let word: String = chars[start..i]
                .iter()
                .map(|(_, c)| c.to_ascii_lowercase())
                .collect();
            tokens.push(match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "null" => Token::Null,
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Ident(word),
            });
            continue;
        }
        let (token, width) = match (ch, next) {
            ('<', Some('=')) => (Token::Le, 2),
            ('<', Some('>')) => (Token::Ne, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('=', Some('=')) => (Token::Eq, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('=', _) => (Token::Eq, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            _ => return Err(ExprError::UnexpectedChar { ch, offset }),
        };
        tokens.push(token);
        i += width;
    }
    Ok(tokens)
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
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    IfNull,
    Coalesce,
    Abs,
    Least,
    Greatest,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "ifnull" => Some(Function::IfNull),
            "coalesce" => Some(Function::Coalesce),
            "abs" => Some(Function::Abs),
            "least" => Some(Function::Least),
            "greatest" => Some(Function::Greatest),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Function::IfNull => "IFNULL",
            Function::Coalesce => "COALESCE",
            Function::Abs => "ABS",
            Function::Least => "LEAST",
            Function::Greatest => "GREATEST",
        }
    }

    fn check_arity(self, got: usize) -> Result<(), ExprError> {
        let (ok, expected) = match self {
            Function::IfNull => (got == 2, "2"),
            Function::Abs => (got == 1, "1"),
            Function::Coalesce | Function::Least | Function::Greatest => (got >= 1, "1 or more"),
        };
        if ok {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: self.name(),
                expected,
                got,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Null,
    Column(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Runs `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ExprError> {
        match self.bump() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(ExprError::UnexpectedToken {
                found: t.describe(),
                expected,
            }),
            None => Err(ExprError::UnexpectedEnd(expected)),
        }
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.not()?;
        while self.eat(&Token::And) {
            let rhs = self.not()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::not)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.sum()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.product()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn product(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Minus) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        const EXPECTED: &str = "a value, column or '('";
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::True) => Ok(Expr::Number(1.0)),
            Some(Token::False) => Ok(Expr::Number(0.0)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Column(name));
                }
                let function =
                    Function::lookup(&name).ok_or(ExprError::UnknownFunction(name.clone()))?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.nested(Self::or)?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen, "',' or ')'")?;
                        break;
                    }
                }
                function.check_arity(args.len())?;
                Ok(Expr::Call(function, args))
            }
            Some(t) => Err(ExprError::UnexpectedToken {
                found: t.describe(),
                expected: EXPECTED,
            }),
            None => Err(ExprError::UnexpectedEnd(EXPECTED)),
        }
    }
}

pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.len() > MAX_TOKENS {
        return Err(ExprError::TooLong {
            got: tokens.len(),
            limit: MAX_TOKENS,
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    match parser.bump() {
        None => Ok(expr),
        Some(t) => Err(ExprError::UnexpectedToken {
            found: t.describe(),
            expected: "end of expression",
        }),
    }
}

fn bool_value(b: bool) -> Option<f64> {
    Some(if b { 1.0 } else { 0.0 })
}

impl Expr {
    /// Evaluates against a column mapping. A column present with a null value is null;
    /// a column absent from the mapping is an error.
    pub fn eval(&self, columns: &BTreeMap<String, Option<f64>>) -> Result<Option<f64>, ExprError> {
        match self {
            Expr::Number(n) => Ok(Some(*n)),
            Expr::Null => Ok(None),
            Expr::Column(name) => columns
                .get(name)
                .copied()
                .ok_or_else(|| ExprError::UnknownColumn(name.clone())),
            Expr::Unary(op, inner) => {
                let v = inner.eval(columns)?;
                Ok(match op {
                    UnaryOp::Neg => v.map(|x| -x),
                    UnaryOp::Not => v.and_then(|x| bool_value(x == 0.0)),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval(columns)?;
                let r = rhs.eval(columns)?;
                Ok(eval_binary(*op, l, r))
            }
            Expr::Call(function, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(columns))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(eval_call(*function, &values))
            }
        }
    }
}

fn eval_binary(op: BinaryOp, l: Option<f64>, r: Option<f64>) -> Option<f64> {
    match op {
        BinaryOp::And => match (l, r) {
            (Some(a), _) if a == 0.0 => bool_value(false),
            (_, Some(b)) if b == 0.0 => bool_value(false),
            (Some(_), Some(_)) => bool_value(true),
            _ => None,
        },
        BinaryOp::Or => match (l, r) {
            (Some(a), _) if a != 0.0 => bool_value(true),
            (_, Some(b)) if b != 0.0 => bool_value(true),
            (Some(_), Some(_)) => bool_value(false),
            _ => None,
        },
        _ => {
            let (a, b) = (l?, r?);
            match op {
                BinaryOp::Add => Some(a + b),
                BinaryOp::Sub => Some(a - b),
                BinaryOp::Mul => Some(a * b),
                BinaryOp::Div => (b != 0.0).then(|| a / b),
                BinaryOp::Mod => (b != 0.0).then(|| a % b),
                BinaryOp::Eq => bool_value(a == b),
                BinaryOp::Ne => bool_value(a != b),
                BinaryOp::Lt => bool_value(a < b),
                BinaryOp::Le => bool_value(a <= b),
                BinaryOp::Gt => bool_value(a > b),
                BinaryOp::Ge => bool_value(a >= b),
                BinaryOp::And | BinaryOp::Or => None,
            }
        }
    }
}

fn eval_call(function: Function, values: &[Option<f64>]) -> Option<f64> {
    match function {
        Function::IfNull => values[0].or(values[1]),
        Function::Coalesce => values.iter().find_map(|v| *v),
        Function::Abs => values[0].map(f64::abs),
        Function::Least => values
            .iter()
            .copied()
            .collect::<Option<Vec<f64>>>()?
            .into_iter()
            .reduce(f64::min),
        Function::Greatest => values
            .iter()
            .copied()
            .collect::<Option<Vec<f64>>>()?
            .into_iter()
            .reduce(f64::max),
    }
}

/// Null means "cannot be assessed"; any non-zero value is true.
pub fn truthy(value: Option<f64>) -> Option<bool> {
    value.map(|v| v != 0.0)
}
