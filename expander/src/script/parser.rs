use std::ops::Range;

use crate::error::EvalError;
use crate::script::ast::{Arg, Ast, AstKind, BinOp, CmpOp, Stmt, UnaryOp};
use crate::script::lexer::{Spanned, Token, tokenize};

// ---------------------------------------------------------------------------
// Binding powers (higher binds tighter)
// ---------------------------------------------------------------------------

// Left bp, right bp.
const BP_OR: u8 = 2; // or
const BP_AND: u8 = 4; // and
const BP_NOT: u8 = 6; // not (prefix)
const BP_COMPARISON: u8 = 8; // == != < <= > >=
const BP_CONCAT: u8 = 10; // &
const BP_ADDITIVE: u8 = 12; // + -
const BP_MULTIPLICATIVE: u8 = 14; // * @ / // %
const BP_UNARY: u8 = 16; // + - (prefix)
const BP_POWER: u8 = 18; // ** (right side parsed at unary level)
const BP_POSTFIX: u8 = 20; // call, index, attribute

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse newline- or `;`-separated statements.
pub(crate) fn parse_program(source: &str) -> Result<Vec<Stmt>, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, source.len());
    let mut stmts = Vec::new();

    loop {
        parser.skip_separators();
        if parser.at_end() {
            break;
        }
        stmts.push(parser.parse_stmt()?);
        if !parser.at_end() && parser.peek() != Some(&Token::Separator) {
            return Err(parser.unexpected());
        }
    }

    Ok(stmts)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, source_len: usize) -> Self {
        Parser {
            tokens,
            pos: 0,
            source_len,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current_span(&self) -> Range<usize> {
        match self.tokens.get(self.pos) {
            Some(t) => t.span.clone(),
            None => self.source_len..self.source_len,
        }
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn skip_separators(&mut self) {
        while self.peek() == Some(&Token::Separator) {
            self.pos += 1;
        }
    }

    fn error(&self, msg: impl Into<String>) -> EvalError {
        EvalError::raised(msg).at(self.current_span())
    }

    fn unexpected(&self) -> EvalError {
        match self.peek() {
            Some(token) => self.error(format!("invalid syntax: unexpected {}", token.describe())),
            None => self.error("invalid syntax: unexpected end of input"),
        }
    }

    fn expect(&mut self, token: Token) -> Result<Range<usize>, EvalError> {
        if self.peek() == Some(&token) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.error(format!("expected {}", token.describe())))
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, EvalError> {
        if let (Some(Token::Ident(name)), Some(Token::Eq)) = (self.peek(), self.peek_at(1)) {
            let target = name.clone();
            let start = self.current_span().start;
            self.pos += 2;
            let value = self.parse_expr(0)?;
            let span = start..value.span.end;
            return Ok(Stmt::Assign {
                target,
                value,
                span,
            });
        }
        Ok(Stmt::Expr(self.parse_expr(0)?))
    }

    // ------------------------------------------------------------------
    // Pratt parser core
    // ------------------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> Result<Ast, EvalError> {
        let mut left = self.parse_prefix()?;
        // Set while `left` is a comparison chain built by this loop.
        let mut chaining = false;

        loop {
            let Some(token) = self.peek() else { break };
            let Some((l_bp, r_bp)) = infix_bp(token) else { break };

            if l_bp < min_bp {
                break;
            }

            let start = left.span.start;
            let Some(op) = self.advance() else { break };

            match op.token {
                Token::LParen => {
                    let args = self.parse_args()?;
                    let end = self.prev_end();
                    left = Ast::new(
                        AstKind::Call {
                            callee: Box::new(left),
                            args,
                        },
                        start..end,
                    );
                    chaining = false;
                    continue;
                }
                Token::LBracket => {
                    let index = self.parse_expr(0)?;
                    let end = self.expect(Token::RBracket)?.end;
                    left = Ast::new(
                        AstKind::Index {
                            base: Box::new(left),
                            index: Box::new(index),
                        },
                        start..end,
                    );
                    chaining = false;
                    continue;
                }
                Token::Dot => {
                    let Some(Spanned {
                        token: Token::Ident(name),
                        span,
                    }) = self.advance()
                    else {
                        return Err(self.error("expected attribute name after `.`"));
                    };
                    left = Ast::new(
                        AstKind::Attr {
                            base: Box::new(left),
                            name,
                        },
                        start..span.end,
                    );
                    chaining = false;
                    continue;
                }
                _ => {}
            }

            let right = self.parse_expr(r_bp)?;
            let span = start..right.span.end;

            if let Some(cmp) = comparison(&op.token) {
                if chaining
                    && let AstKind::Compare { rest, .. } = &mut left.kind
                {
                    rest.push((cmp, right));
                    left.span = span;
                } else {
                    left = Ast::new(
                        AstKind::Compare {
                            first: Box::new(left),
                            rest: vec![(cmp, right)],
                        },
                        span,
                    );
                    chaining = true;
                }
                continue;
            }

            let kind = match op.token {
                Token::Or => AstKind::Or(Box::new(left), Box::new(right)),
                Token::And => AstKind::And(Box::new(left), Box::new(right)),
                Token::Plus => binary(BinOp::Add, left, right),
                Token::Minus => binary(BinOp::Sub, left, right),
                Token::Star => binary(BinOp::Mul, left, right),
                Token::At => binary(BinOp::MatMul, left, right),
                Token::Slash => binary(BinOp::Div, left, right),
                Token::DoubleSlash => binary(BinOp::FloorDiv, left, right),
                Token::Percent => binary(BinOp::Mod, left, right),
                Token::DoubleStar => binary(BinOp::Pow, left, right),
                Token::Amp => binary(BinOp::Concat, left, right),
                _ => return Err(EvalError::raised("unexpected infix operator").at(op.span)),
            };
            left = Ast::new(kind, span);
            chaining = false;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Ast, EvalError> {
        let Some(Spanned { token, span }) = self.advance() else {
            return Err(self.error("invalid syntax: unexpected end of input"));
        };

        let kind = match token {
            Token::Number(n) => AstKind::Number(n),
            Token::Str(mut text) => {
                let mut end = span.end;
                // Adjacent literals are joined
                while let Some(Token::Str(next)) = self.peek() {
                    text.push_str(next);
                    end = self.current_span().end;
                    self.pos += 1;
                }
                return Ok(Ast::new(AstKind::Str(text), span.start..end));
            }
            Token::True => AstKind::Bool(true),
            Token::False => AstKind::Bool(false),
            Token::None => AstKind::None,
            Token::Ident(name) => AstKind::Name(name),

            Token::Minus | Token::Plus | Token::Not => {
                let (op, bp) = match token {
                    Token::Minus => (UnaryOp::Minus, BP_UNARY),
                    Token::Plus => (UnaryOp::Plus, BP_UNARY),
                    _ => (UnaryOp::Not, BP_NOT),
                };
                let operand = self.parse_expr(bp)?;
                let end = operand.span.end;
                return Ok(Ast::new(
                    AstKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span.start..end,
                ));
            }

            Token::LParen => {
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Ast::new(AstKind::List(Vec::new()), span.start..self.prev_end()));
                }
                let first = self.parse_expr(0)?;
                if self.peek() != Some(&Token::Comma) {
                    self.expect(Token::RParen)?;
                    return Ok(first);
                }
                // Tuples behave as lists
                let mut items = vec![first];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    if self.peek() == Some(&Token::RParen) {
                        break;
                    }
                    items.push(self.parse_expr(0)?);
                }
                let end = self.expect(Token::RParen)?.end;
                return Ok(Ast::new(AstKind::List(items), span.start..end));
            }

            Token::LBracket => {
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RBracket) {
                    items.push(self.parse_expr(0)?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let end = self.expect(Token::RBracket)?.end;
                return Ok(Ast::new(AstKind::List(items), span.start..end));
            }

            other => {
                return Err(EvalError::raised(format!(
                    "invalid syntax: unexpected {}",
                    other.describe()
                ))
                .at(span));
            }
        };

        Ok(Ast::new(kind, span))
    }

    /// Arguments after an opening `(`, through the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>, EvalError> {
        let mut args: Vec<Arg> = Vec::new();
        while self.peek() != Some(&Token::RParen) {
            let name = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Eq)) => {
                    let name = name.clone();
                    self.pos += 2;
                    Some(name)
                }
                _ => None,
            };
            let value = self.parse_expr(0)?;
            if name.is_none() && args.iter().any(|a| a.name.is_some()) {
                return Err(EvalError::raised("positional argument follows keyword argument")
                    .at(value.span));
            }
            args.push(Arg { name, value });
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

fn binary(op: BinOp, left: Ast, right: Ast) -> AstKind {
    AstKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn comparison(token: &Token) -> Option<CmpOp> {
    match token {
        Token::EqEq => Some(CmpOp::Eq),
        Token::BangEq => Some(CmpOp::Ne),
        Token::Lt => Some(CmpOp::Lt),
        Token::LtEq => Some(CmpOp::Le),
        Token::Gt => Some(CmpOp::Gt),
        Token::GtEq => Some(CmpOp::Ge),
        _ => None,
    }
}

/// Infix binding powers: returns (left_bp, right_bp) or None if not infix.
fn infix_bp(token: &Token) -> Option<(u8, u8)> {
    match token {
        Token::Or => Some((BP_OR, BP_OR + 1)),
        Token::And => Some((BP_AND, BP_AND + 1)),
        Token::EqEq | Token::BangEq | Token::Lt | Token::LtEq | Token::Gt | Token::GtEq => {
            Some((BP_COMPARISON, BP_COMPARISON + 1))
        }
        Token::Amp => Some((BP_CONCAT, BP_CONCAT + 1)),
        Token::Plus | Token::Minus => Some((BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Star | Token::At | Token::Slash | Token::DoubleSlash | Token::Percent => {
            Some((BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1))
        }
        Token::DoubleStar => Some((BP_POWER, BP_UNARY)),
        Token::LParen | Token::LBracket | Token::Dot => Some((BP_POSTFIX, 0)),
        _ => None,
    }
}
