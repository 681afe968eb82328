//! Recursive-descent expression parser.
//!
//! Precedence, loosest first: conditional (`?:`, `? :`), `||`, `&&`, equality,
//! comparison, additive, multiplicative, unary, postfix (member, index, call).

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ExprError;
use crate::lexer::{SpannedToken, Token, lex};

/// Parse an expression.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        source_len: source.len(),
    };
    let expr = parser.conditional()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(ExprError::Syntax {
            position: extra.span.start,
            message: format!("unexpected {:?} after expression", extra.token),
        });
    }
    Ok(expr)
}

struct Parser<'t, 'src> {
    tokens: &'t [SpannedToken<'src>],
    pos: usize,
    source_len: usize,
}

impl<'src> Parser<'_, 'src> {
    fn peek_spanned(&self) -> Option<&SpannedToken<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token<'src>> {
        self.peek_spanned().map(|t| &t.token)
    }

    fn next(&mut self) -> Option<Token<'src>> {
        let token = self.tokens.get(self.pos)?.token.clone();
        self.pos += 1;
        Some(token)
    }

    fn position(&self) -> usize {
        self.peek_spanned().map_or(self.source_len, |t| t.span.start)
    }

    fn eat(&mut self, token: &Token<'_>) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token<'_>, what: &str) -> Result<(), ExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: String) -> ExprError {
        ExprError::Syntax {
            position: self.position(),
            message,
        }
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let condition = self.or()?;
        if self.eat(&Token::Elvis) {
            let fallback = self.conditional()?;
            return Ok(Expr::Elvis(Box::new(condition), Box::new(fallback)));
        }
        if self.eat(&Token::Question) {
            let then = self.conditional()?;
            self.expect(&Token::Colon, "':' in conditional")?;
            let otherwise = self.conditional()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(condition)
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::and, |t| matches!(t, Token::Or).then_some(BinaryOp::Or))
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::equality, |t| {
            matches!(t, Token::And).then_some(BinaryOp::And)
        })
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::comparison, |t| match t {
            Token::EqEq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::additive, |t| match t {
            Token::Lt => Some(BinaryOp::Lt),
            Token::Lte => Some(BinaryOp::Lte),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Gte => Some(BinaryOp::Gte),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::multiplicative, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    /// Left-associative chain of one precedence level.
    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
        operator: fn(&Token<'_>) -> Option<BinaryOp>,
    ) -> Result<Expr, ExprError> {
        let mut left = operand(self)?;
        while let Some(op) = self.peek().and_then(operator) {
            self.pos += 1;
            let right = operand(self)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name.to_owned()),
                    _ => return Err(self.error("expected property name after '.'".to_owned())),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.conditional()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        let Some(token) = self.next() else {
            return Err(self.error("unexpected end of expression".to_owned()));
        };
        match token {
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::This => Ok(Expr::This),
            Token::Number(text) => parse_number(text)
                .map(Expr::Literal)
                .ok_or_else(|| ExprError::Syntax {
                    position,
                    message: format!("invalid number '{text}'"),
                }),
            Token::String(text) => Ok(Expr::Literal(Value::String(unquote(text)))),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.arguments()?;
                    Ok(Expr::Call {
                        name: name.to_owned(),
                        args,
                    })
                } else {
                    Ok(Expr::Ident(name.to_owned()))
                }
            }
            Token::LParen => {
                let inner = self.conditional()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(ExprError::Syntax {
                position,
                message: format!("unexpected {other:?}"),
            }),
        }
    }

    /// Comma-separated arguments after an opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.conditional()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma, "',' or ')' in argument list")?;
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Strip the quotes of a string literal and resolve backslash escapes.
fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
