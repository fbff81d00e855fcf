// Syntax front end: lexer, parser and the AST walked by the evaluator.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Attrib, BinOp, Block, Expr, FuncBody, FuncName, Stat, TableItem, UnOp};
pub use parser::parse;

use crate::lua_value::LuaValue;

/// Numeric conversion shared by the lexer and `tonumber`: accepts decimal
/// integers, hex integers, decimal floats and exponent notation.
pub fn parse_number(text: &str) -> Option<LuaValue> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };
    if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut v: i64 = 0;
        for b in hex.bytes() {
            v = v
                .wrapping_mul(16)
                .wrapping_add((b as char).to_digit(16).unwrap() as i64);
        }
        return Some(LuaValue::integer(if neg { v.wrapping_neg() } else { v }));
    }
    if !body.contains(['.', 'e', 'E', 'n', 'i']) {
        if let Ok(i) = body.parse::<i64>() {
            return Some(LuaValue::integer(if neg { i.wrapping_neg() } else { i }));
        }
    }
    match body.parse::<f64>() {
        Ok(f) if body.bytes().next().is_some_and(|b| b.is_ascii_digit() || b == b'.') => {
            Some(LuaValue::float(if neg { -f } else { f }))
        }
        _ => None,
    }
}
