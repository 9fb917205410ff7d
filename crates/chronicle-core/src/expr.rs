//! Integer expression evaluator used by `!roll`.
//!
//! Grammar (whitespace ignored):
//! - integers, `+ - * /`, parentheses
//! - `[n1,n2,...]` lists, which evaluate to the sum of their members
//!
//! Operators bind in a fixed order, tightest first: `*`, `/`, `+`, `-`. Each
//! level is left-associative, so `8/2*2` is `8/(2*2)` and `5-2+1` is `5-(2+1)`.
//! This is the ordering rooms have always seen from the bot, not school
//! arithmetic.
//!
//! Evaluation is permissive: text that is not an expression evaluates to `0`,
//! and anything after the longest valid expression prefix is ignored. Division
//! by zero, overflow and nesting deeper than [`MAX_NESTING`] are errors.

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Num(i64),
    /// Pre-summed `[a,b,c]` list.
    List(i64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    /// First character the tokenizer could not understand; nothing follows it.
    Junk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
    Mul,
    Div,
    Add,
    Sub,
}

/// Binding order, tightest first.
const PRECEDENCE: [BinOp; 4] = [BinOp::Mul, BinOp::Div, BinOp::Add, BinOp::Sub];
const LOOSEST: usize = PRECEDENCE.len() - 1;

impl BinOp {
    fn token(self) -> Token {
        match self {
            Self::Mul => Token::Star,
            Self::Div => Token::Slash,
            Self::Add => Token::Plus,
            Self::Sub => Token::Minus,
        }
    }

    fn apply(self, lhs: i64, rhs: i64) -> Result<i64> {
        let out = match self {
            Self::Mul => lhs.checked_mul(rhs),
            Self::Add => lhs.checked_add(rhs),
            Self::Sub => lhs.checked_sub(rhs),
            Self::Div => {
                if rhs == 0 {
                    return Err(Error::InvalidArgument("division by zero".to_string()));
                }
                lhs.checked_div(rhs)
            }
        };
        out.ok_or_else(overflow)
    }
}

/// Deepest run of open groups and sign prefixes the parser will follow.
pub const MAX_NESTING: usize = 64;

fn overflow() -> Error {
    Error::InvalidArgument("number out of range".to_string())
}

/// Reduce `text` to a single integer.
pub fn solve(text: &str) -> Result<i64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let tokens = tokenize(&compact)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    Ok(parser.binary(LOOSEST)?.unwrap_or(0))
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut chars = s.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '0'..='9' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                Token::Num(s[start..end].parse::<i64>().map_err(|_| overflow())?)
            }
            '[' => {
                let body_start = start + 1;
                let mut body_end = None;
                for (i, d) in chars.by_ref() {
                    if d == ']' {
                        body_end = Some(i);
                        break;
                    }
                }
                match body_end {
                    Some(end) => sum_list(&s[body_start..end])?.map_or(Token::Junk, Token::List),
                    None => Token::Junk,
                }
            }
            _ => Token::Junk,
        };

        out.push(token);
        if token == Token::Junk {
            break;
        }
    }

    Ok(out)
}

/// Sum of a comma-separated digit list; `None` if the list holds anything else.
fn sum_list(body: &str) -> Result<Option<i64>> {
    if !body.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return Ok(None);
    }

    let mut total: i64 = 0;
    for part in body.split(',').filter(|p| !p.is_empty()) {
        let n = part.parse::<i64>().map_err(|_| overflow())?;
        total = total.checked_add(n).ok_or_else(overflow)?;
    }
    Ok(Some(total))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    /// Run `f` one nesting level deeper; every recursion back into the
    /// grammar goes through here so the call stack stays bounded.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(Error::InvalidArgument(
                "expression nested too deeply".to_string(),
            ));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// Parse a left-associative chain of `PRECEDENCE[level]`.
    ///
    /// An operator without a usable right operand ends the chain and is left
    /// unconsumed.
    fn binary(&mut self, level: usize) -> Result<Option<i64>> {
        let Some(mut acc) = self.operand(level)? else {
            return Ok(None);
        };

        let op = PRECEDENCE[level];
        while self.peek() == Some(op.token()) {
            let checkpoint = self.pos;
            self.pos += 1;
            match self.operand(level)? {
                Some(rhs) => acc = op.apply(acc, rhs)?,
                None => {
                    self.pos = checkpoint;
                    break;
                }
            }
        }

        Ok(Some(acc))
    }

    fn operand(&mut self, level: usize) -> Result<Option<i64>> {
        if level == 0 {
            self.unary()
        } else {
            self.binary(level - 1)
        }
    }

    fn unary(&mut self) -> Result<Option<i64>> {
        let checkpoint = self.pos;
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                match self.nested(Self::unary)? {
                    Some(v) => Ok(Some(v.checked_neg().ok_or_else(overflow)?)),
                    None => {
                        self.pos = checkpoint;
                        Ok(None)
                    }
                }
            }
            Some(Token::Plus) => {
                self.pos += 1;
                let v = self.nested(Self::unary)?;
                if v.is_none() {
                    self.pos = checkpoint;
                }
                Ok(v)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Option<i64>> {
        match self.peek() {
            Some(Token::Num(n)) | Some(Token::List(n)) => {
                self.pos += 1;
                Ok(Some(n))
            }
            Some(Token::LParen) => {
                let checkpoint = self.pos;
                self.pos += 1;
                let inner = self.nested(|p| p.binary(LOOSEST))?.unwrap_or(0);
                if self.skip_to_close() {
                    Ok(Some(inner))
                } else {
                    self.pos = checkpoint;
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    /// Consume up to and including the `)` closing the current group.
    ///
    /// Unparsable text inside the group is dropped. Returns false when the
    /// group is never closed.
    fn skip_to_close(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            self.pos += 1;
            match tok {
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => return true,
                Token::RParen => depth -= 1,
                _ => {}
            }
        }
        false
    }
}
