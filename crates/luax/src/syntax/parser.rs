// Recursive-descent parser producing the evaluator AST.
// Grammar follows Lua 5.4; blocks receive unique ids for the resume chain.

use super::ast::*;
use super::lexer::{Lexer, Tok, Token};
use smol_str::SmolStr;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

// Block ids identify suspended blocks in coroutine resume chains, so they
// must stay unique across every chunk parsed in the process.
static NEXT_BLOCK_ID: AtomicUsize = AtomicUsize::new(0);

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    chunk_name: String,
}

pub type ParseResult<T> = Result<T, String>;

/// Parse a chunk into its top-level block.
pub fn parse(source: &str, chunk_name: &str) -> ParseResult<Rc<Block>> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| format!("{}: {}", chunk_name, e))?;
    let mut p = Parser {
        tokens,
        pos: 0,
        chunk_name: chunk_name.to_string(),
    };
    let block = p.parse_block_body(&[Tok::Eof])?;
    p.expect(Tok::Eof)?;
    Ok(block)
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn peek_at(&self, off: usize) -> &Tok {
        &self.tokens[(self.pos + off).min(self.tokens.len() - 1)].tok
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn bump(&mut self) -> Tok {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].tok.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: Tok) -> bool {
        if *self.peek() == t {
            self.bump();
            true
        } else {
            false
        }
    }

    fn err(&self, msg: impl Into<String>) -> String {
        format!("{}:{}: {}", self.chunk_name, self.line(), msg.into())
    }

    fn expect(&mut self, t: Tok) -> ParseResult<()> {
        if *self.peek() == t {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!(
                "{} expected near {}",
                t.describe(),
                self.peek().describe()
            )))
        }
    }

    fn expect_name(&mut self) -> ParseResult<SmolStr> {
        match self.peek().clone() {
            Tok::Name(n) => {
                self.bump();
                Ok(n)
            }
            other => Err(self.err(format!("<name> expected near {}", other.describe()))),
        }
    }

    fn new_block(&mut self, stmts: Vec<Stat>) -> Rc<Block> {
        let id = NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed);
        Rc::new(Block { id, stmts })
    }

    /// Parse statements until one of `enders` (not consumed).
    fn parse_block_body(&mut self, enders: &[Tok]) -> ParseResult<Rc<Block>> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(Tok::Semi) {}
            if enders.contains(self.peek()) {
                break;
            }
            if *self.peek() == Tok::Return {
                stmts.push(self.parse_return()?);
                while self.eat(Tok::Semi) {}
                break;
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(self.new_block(stmts))
    }

    fn parse_return(&mut self) -> ParseResult<Stat> {
        let line = self.line();
        self.expect(Tok::Return)?;
        let mut exprs = Vec::new();
        if !matches!(
            self.peek(),
            Tok::End | Tok::Else | Tok::Elseif | Tok::Until | Tok::Eof | Tok::Semi
        ) {
            exprs = self.parse_expr_list()?;
        }
        Ok(Stat::Return { exprs, line })
    }

    fn parse_statement(&mut self) -> ParseResult<Stat> {
        match self.peek() {
            Tok::Do => {
                self.bump();
                let body = self.parse_block_body(&[Tok::End])?;
                self.expect(Tok::End)?;
                Ok(Stat::Do(body))
            }
            Tok::If => self.parse_if(),
            Tok::While => self.parse_while(),
            Tok::Repeat => self.parse_repeat(),
            Tok::For => self.parse_for(),
            Tok::Function => self.parse_function_stat(false),
            Tok::Local => {
                self.bump();
                if *self.peek() == Tok::Function {
                    self.parse_function_stat(true)
                } else {
                    self.parse_local()
                }
            }
            Tok::Break => {
                self.bump();
                Ok(Stat::Break)
            }
            Tok::Goto => {
                self.bump();
                Ok(Stat::Goto(self.expect_name()?))
            }
            Tok::DColon => {
                self.bump();
                let name = self.expect_name()?;
                self.expect(Tok::DColon)?;
                Ok(Stat::Label(name))
            }
            _ => self.parse_expr_stat(),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Stat> {
        self.expect(Tok::If)?;
        let mut arms = Vec::new();
        loop {
            let cond = self.parse_expr()?;
            self.expect(Tok::Then)?;
            let body = self.parse_block_body(&[Tok::End, Tok::Else, Tok::Elseif])?;
            arms.push((cond, body));
            if !self.eat(Tok::Elseif) {
                break;
            }
        }
        let else_block = if self.eat(Tok::Else) {
            Some(self.parse_block_body(&[Tok::End])?)
        } else {
            None
        };
        self.expect(Tok::End)?;
        Ok(Stat::If { arms, else_block })
    }

    fn parse_while(&mut self) -> ParseResult<Stat> {
        let line = self.line();
        self.expect(Tok::While)?;
        let cond = self.parse_expr()?;
        self.expect(Tok::Do)?;
        let body = self.parse_block_body(&[Tok::End])?;
        self.expect(Tok::End)?;
        Ok(Stat::While { cond, body, line })
    }

    fn parse_repeat(&mut self) -> ParseResult<Stat> {
        let line = self.line();
        self.expect(Tok::Repeat)?;
        let body = self.parse_block_body(&[Tok::Until])?;
        self.expect(Tok::Until)?;
        let cond = self.parse_expr()?;
        Ok(Stat::Repeat { body, cond, line })
    }

    fn parse_for(&mut self) -> ParseResult<Stat> {
        let line = self.line();
        self.expect(Tok::For)?;
        let first = self.expect_name()?;
        if self.eat(Tok::Assign) {
            let start = self.parse_expr()?;
            self.expect(Tok::Comma)?;
            let end = self.parse_expr()?;
            let step = if self.eat(Tok::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(Tok::Do)?;
            let body = self.parse_block_body(&[Tok::End])?;
            self.expect(Tok::End)?;
            Ok(Stat::NumericFor {
                var: first,
                start,
                end,
                step,
                body,
                line,
            })
        } else {
            let mut names = vec![first];
            while self.eat(Tok::Comma) {
                names.push(self.expect_name()?);
            }
            self.expect(Tok::In)?;
            let exprs = self.parse_expr_list()?;
            self.expect(Tok::Do)?;
            let body = self.parse_block_body(&[Tok::End])?;
            self.expect(Tok::End)?;
            Ok(Stat::GenericFor {
                names,
                exprs,
                body,
                line,
            })
        }
    }

    fn parse_function_stat(&mut self, is_local: bool) -> ParseResult<Stat> {
        let line = self.line();
        self.expect(Tok::Function)?;
        let first = self.expect_name()?;
        let mut is_method = false;
        let name = if is_local {
            FuncName::Ident(first)
        } else {
            let mut target: Option<Expr> = None;
            let mut last = first;
            loop {
                if self.eat(Tok::Dot) {
                    let next = self.expect_name()?;
                    target = Some(match target {
                        None => Expr::Ident(last),
                        Some(t) => Expr::Field {
                            target: Box::new(t),
                            name: last,
                            line,
                        },
                    });
                    last = next;
                } else if self.eat(Tok::Colon) {
                    let next = self.expect_name()?;
                    target = Some(match target {
                        None => Expr::Ident(last),
                        Some(t) => Expr::Field {
                            target: Box::new(t),
                            name: last,
                            line,
                        },
                    });
                    last = next;
                    is_method = true;
                    break;
                } else {
                    break;
                }
            }
            match target {
                None => FuncName::Ident(last),
                Some(t) => FuncName::Chain {
                    target: Box::new(t),
                    name: last,
                    is_method,
                },
            }
        };
        let func = self.parse_func_body(is_method)?;
        Ok(Stat::Function {
            is_local,
            name,
            func,
        })
    }

    fn parse_func_body(&mut self, is_method: bool) -> ParseResult<Rc<FuncBody>> {
        let line = self.line();
        self.expect(Tok::LParen)?;
        let mut params = Vec::new();
        if is_method {
            params.push(SmolStr::new("self"));
        }
        let mut is_vararg = false;
        if !self.eat(Tok::RParen) {
            loop {
                match self.peek().clone() {
                    Tok::Ellipsis => {
                        self.bump();
                        is_vararg = true;
                        break;
                    }
                    Tok::Name(n) => {
                        self.bump();
                        params.push(n);
                    }
                    other => {
                        return Err(
                            self.err(format!("<name> expected near {}", other.describe()))
                        );
                    }
                }
                if !self.eat(Tok::Comma) {
                    break;
                }
            }
            self.expect(Tok::RParen)?;
        }
        let body = self.parse_block_body(&[Tok::End])?;
        self.expect(Tok::End)?;
        Ok(Rc::new(FuncBody {
            params,
            is_vararg,
            body,
            line,
        }))
    }

    fn parse_local(&mut self) -> ParseResult<Stat> {
        let line = self.line();
        let mut names = Vec::new();
        loop {
            let name = self.expect_name()?;
            let attrib = if self.eat(Tok::Lt) {
                let a = self.expect_name()?;
                self.expect(Tok::Gt)?;
                match a.as_str() {
                    "const" => Attrib::Const,
                    "close" => Attrib::Close,
                    other => {
                        return Err(self.err(format!("unknown attribute '{}'", other)));
                    }
                }
            } else {
                Attrib::None
            };
            names.push((name, attrib));
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        let exprs = if self.eat(Tok::Assign) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stat::Local { names, exprs, line })
    }

    fn parse_expr_stat(&mut self) -> ParseResult<Stat> {
        let line = self.line();
        let first = self.parse_suffixed_expr()?;
        if *self.peek() == Tok::Assign || *self.peek() == Tok::Comma {
            let mut targets = vec![first];
            while self.eat(Tok::Comma) {
                targets.push(self.parse_suffixed_expr()?);
            }
            for t in &targets {
                if !matches!(t, Expr::Ident(_) | Expr::Index { .. } | Expr::Field { .. }) {
                    return Err(self.err("syntax error: cannot assign to this expression"));
                }
            }
            self.expect(Tok::Assign)?;
            let exprs = self.parse_expr_list()?;
            Ok(Stat::Assign {
                targets,
                exprs,
                line,
            })
        } else {
            if !matches!(first, Expr::Call { .. } | Expr::MethodCall { .. }) {
                return Err(self.err("syntax error near unexpected expression"));
            }
            Ok(Stat::Expr(first))
        }
    }

    fn parse_expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut out = vec![self.parse_expr()?];
        while self.eat(Tok::Comma) {
            out.push(self.parse_expr()?);
        }
        Ok(out)
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_binary(0)
    }

    /// (left, right) binding powers; `..` and `^` are right-associative.
    fn binop_prec(t: &Tok) -> Option<(BinOp, u8, u8)> {
        Some(match t {
            Tok::Or => (BinOp::Or, 1, 2),
            Tok::And => (BinOp::And, 3, 4),
            Tok::Lt => (BinOp::Lt, 5, 6),
            Tok::Gt => (BinOp::Gt, 5, 6),
            Tok::Le => (BinOp::Le, 5, 6),
            Tok::Ge => (BinOp::Ge, 5, 6),
            Tok::Ne => (BinOp::Ne, 5, 6),
            Tok::Eq => (BinOp::Eq, 5, 6),
            Tok::Pipe => (BinOp::BOr, 7, 8),
            Tok::Tilde => (BinOp::BXor, 9, 10),
            Tok::Amp => (BinOp::BAnd, 11, 12),
            Tok::Shl => (BinOp::Shl, 13, 14),
            Tok::Shr => (BinOp::Shr, 13, 14),
            Tok::Concat => (BinOp::Concat, 18, 17),
            Tok::Plus => (BinOp::Add, 19, 20),
            Tok::Minus => (BinOp::Sub, 19, 20),
            Tok::Star => (BinOp::Mul, 21, 22),
            Tok::Slash => (BinOp::Div, 21, 22),
            Tok::DSlash => (BinOp::IDiv, 21, 22),
            Tok::Percent => (BinOp::Mod, 21, 22),
            Tok::Caret => (BinOp::Pow, 28, 27),
            _ => return None,
        })
    }

    const UNARY_PREC: u8 = 25;

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let line = self.line();
        let mut lhs = match self.peek() {
            Tok::Not => {
                self.bump();
                let operand = self.parse_binary(Self::UNARY_PREC)?;
                Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                    line,
                }
            }
            Tok::Minus => {
                self.bump();
                let operand = self.parse_binary(Self::UNARY_PREC)?;
                Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                    line,
                }
            }
            Tok::Hash => {
                self.bump();
                let operand = self.parse_binary(Self::UNARY_PREC)?;
                Expr::Unary {
                    op: UnOp::Len,
                    operand: Box::new(operand),
                    line,
                }
            }
            Tok::Tilde => {
                self.bump();
                let operand = self.parse_binary(Self::UNARY_PREC)?;
                Expr::Unary {
                    op: UnOp::BNot,
                    operand: Box::new(operand),
                    line,
                }
            }
            _ => self.parse_simple_expr()?,
        };
        while let Some((op, lp, rp)) = Self::binop_prec(self.peek()) {
            if lp < min_prec {
                break;
            }
            let line = self.line();
            self.bump();
            let rhs = self.parse_binary(rp)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_simple_expr(&mut self) -> ParseResult<Expr> {
        match self.peek().clone() {
            Tok::Nil => {
                self.bump();
                Ok(Expr::Nil)
            }
            Tok::True => {
                self.bump();
                Ok(Expr::True)
            }
            Tok::False => {
                self.bump();
                Ok(Expr::False)
            }
            Tok::Int(i) => {
                self.bump();
                Ok(Expr::Integer(i))
            }
            Tok::Float(f) => {
                self.bump();
                Ok(Expr::Float(f))
            }
            Tok::Str(s) => {
                self.bump();
                Ok(Expr::Str(Rc::from(s.as_str())))
            }
            Tok::Ellipsis => {
                self.bump();
                Ok(Expr::Vararg)
            }
            Tok::Function => {
                self.bump();
                Ok(Expr::Function(self.parse_func_body(false)?))
            }
            Tok::LBrace => self.parse_table(),
            _ => self.parse_suffixed_expr(),
        }
    }

    fn parse_table(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        self.expect(Tok::LBrace)?;
        let mut items = Vec::new();
        while *self.peek() != Tok::RBrace {
            match self.peek().clone() {
                Tok::LBracket => {
                    self.bump();
                    let key = self.parse_expr()?;
                    self.expect(Tok::RBracket)?;
                    self.expect(Tok::Assign)?;
                    items.push(TableItem::Keyed(key, self.parse_expr()?));
                }
                Tok::Name(n) if *self.peek_at(1) == Tok::Assign => {
                    self.bump();
                    self.bump();
                    items.push(TableItem::Named(n, self.parse_expr()?));
                }
                _ => items.push(TableItem::Positional(self.parse_expr()?)),
            }
            if !self.eat(Tok::Comma) && !self.eat(Tok::Semi) {
                break;
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(Expr::Table { items, line })
    }

    /// Primary expression followed by `.name`, `[k]`, `:m(...)` and call suffixes.
    fn parse_suffixed_expr(&mut self) -> ParseResult<Expr> {
        let mut e = match self.peek().clone() {
            Tok::Name(n) => {
                self.bump();
                Expr::Ident(n)
            }
            Tok::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                if inner.is_multi() {
                    Expr::Paren(Box::new(inner))
                } else {
                    inner
                }
            }
            other => {
                return Err(self.err(format!(
                    "unexpected symbol near {}",
                    other.describe()
                )));
            }
        };
        loop {
            let line = self.line();
            match self.peek().clone() {
                Tok::Dot => {
                    self.bump();
                    let name = self.expect_name()?;
                    e = Expr::Field {
                        target: Box::new(e),
                        name,
                        line,
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let key = self.parse_expr()?;
                    self.expect(Tok::RBracket)?;
                    e = Expr::Index {
                        target: Box::new(e),
                        key: Box::new(key),
                        line,
                    };
                }
                Tok::Colon => {
                    self.bump();
                    let name = self.expect_name()?;
                    let args = self.parse_call_args()?;
                    e = Expr::MethodCall {
                        target: Box::new(e),
                        name,
                        args,
                        line,
                    };
                }
                Tok::LParen | Tok::Str(_) | Tok::LBrace => {
                    let args = self.parse_call_args()?;
                    e = Expr::Call {
                        callee: Box::new(e),
                        args,
                        line,
                    };
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Expr>> {
        match self.peek().clone() {
            Tok::LParen => {
                self.bump();
                let args = if *self.peek() == Tok::RParen {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(Tok::RParen)?;
                Ok(args)
            }
            Tok::Str(s) => {
                self.bump();
                Ok(vec![Expr::Str(Rc::from(s.as_str()))])
            }
            Tok::LBrace => Ok(vec![self.parse_table()?]),
            other => Err(self.err(format!(
                "function arguments expected near {}",
                other.describe()
            ))),
        }
    }
}
