//! Recursive-descent parser producing an expression tree.
//!
//! Precedence, lowest first: `?:`, `||`/`or`, `&&`/`and`, `!`/`not`,
//! comparisons, `+`/`-`, unary minus, postfix member/index access.

use super::lexer::{tokenize, Token};
use super::Value;
use crate::error::{OrdoError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Literal(Value),
    Name(String),
    List(Vec<Node>),
    Member(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Call {
        name: String,
        args: Vec<Node>,
        named: Vec<(String, Node)>,
    },
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

pub(super) fn parse(src: &str) -> Result<Node> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(OrdoError::evaluation("empty expression"));
    }
    let mut p = Parser { tokens, pos: 0 };
    let node = p.ternary()?;
    if let Some(tok) = p.peek() {
        return Err(OrdoError::evaluation(format!("unexpected token {:?}", tok)));
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<()> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(OrdoError::evaluation(format!(
                "expected {:?}, found {:?}",
                tok, t
            ))),
            None => Err(OrdoError::evaluation(format!(
                "expected {:?}, found end of expression",
                tok
            ))),
        }
    }

    fn ternary(&mut self) -> Result<Node> {
        let cond = self.or()?;
        if self.eat(&Token::Question) {
            let then = self.ternary()?;
            self.expect(Token::Colon)?;
            let otherwise = self.ternary()?;
            return Ok(Node::Ternary(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn or(&mut self) -> Result<Node> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) || self.eat_keyword("or") {
            let rhs = self.and()?;
            lhs = Node::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node> {
        let mut lhs = self.not()?;
        while self.eat(&Token::AndAnd) || self.eat_keyword("and") {
            let rhs = self.not()?;
            lhs = Node::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Node> {
        if self.eat(&Token::Bang) || self.eat_keyword("not") {
            return Ok(Node::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Ok(Node::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Minus) {
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut node = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Token::Ident(field)) => node = Node::Member(Box::new(node), field),
                    other => {
                        return Err(OrdoError::evaluation(format!(
                            "expected field name after '.', found {:?}",
                            other
                        )))
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let idx = self.ternary()?;
                self.expect(Token::RBracket)?;
                node = Node::Index(Box::new(node), Box::new(idx));
            } else {
                return Ok(node);
            }
        }
    }

    fn primary(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Node::Literal(Value::Text(s))),
            Some(Token::Int(i)) => Ok(Node::Literal(Value::Int(i))),
            Some(Token::LParen) => {
                let inner = self.ternary()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Node::List(items))
            }
            Some(Token::Ident(name)) => {
                let literal = match name.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" => Some(Value::Null),
                    _ => None,
                };
                if let Some(v) = literal {
                    Ok(Node::Literal(v))
                } else if self.eat(&Token::LParen) {
                    self.call(name)
                } else {
                    Ok(Node::Name(name))
                }
            }
            Some(tok) => Err(OrdoError::evaluation(format!("unexpected token {:?}", tok))),
            None => Err(OrdoError::evaluation("unexpected end of expression")),
        }
    }

    fn call(&mut self, name: String) -> Result<Node> {
        let mut args = Vec::new();
        let mut named = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(Node::Call { name, args, named });
        }
        loop {
            let key = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(k)), Some(Token::Assign)) => Some(k.clone()),
                _ => None,
            };
            if let Some(key) = key {
                self.pos += 2;
                named.push((key, self.ternary()?));
            } else if !named.is_empty() {
                return Err(OrdoError::evaluation(format!(
                    "positional argument after named argument in call to '{}'",
                    name
                )));
            } else {
                args.push(self.ternary()?);
            }
            if self.eat(&Token::RParen) {
                return Ok(Node::Call { name, args, named });
            }
            self.expect(Token::Comma)?;
        }
    }
}
