// Expression evaluation.
// Pure reduction of an expression to a value; `Multi` escapes only from
// calls and `...`, and only list contexts keep it (callers collapse with
// `first()` everywhere else).

use super::call::call_any;
use super::environment;
use super::lua_vm::LuaVM;
use super::metamethod;
use super::LuaResult;
use crate::lua_value::{LuaFunction, LuaValue};
use crate::syntax::ast::{BinOp, Expr, TableItem, UnOp};
use std::rc::Rc;

pub fn eval_expr(vm: &mut LuaVM, e: &Expr) -> LuaResult<LuaValue> {
    match e {
        Expr::Nil => Ok(LuaValue::Nil),
        Expr::True => Ok(LuaValue::Boolean(true)),
        Expr::False => Ok(LuaValue::Boolean(false)),
        Expr::Integer(i) => Ok(LuaValue::Integer(*i)),
        Expr::Float(f) => Ok(LuaValue::Float(*f)),
        Expr::Str(s) => Ok(vm.create_string(s)),
        Expr::Ident(name) => Ok(environment::get(&vm.env, name).unwrap_or(LuaValue::Nil)),
        Expr::Vararg => eval_vararg(vm),
        Expr::Paren(inner) => Ok(eval_expr(vm, inner)?.first()),
        Expr::Function(proto) => Ok(LuaValue::Function(Rc::new(LuaFunction {
            proto: Rc::clone(proto),
            env: Rc::clone(&vm.env),
        }))),
        Expr::Unary { op, operand, line } => {
            vm.current_line = *line;
            let v = eval_expr(vm, operand)?.first();
            eval_unary(vm, *op, v)
        }
        Expr::Binary { op, lhs, rhs, line } => eval_binary(vm, *op, lhs, rhs, *line),
        Expr::Field { target, name, line } => {
            vm.current_line = *line;
            let t = eval_expr(vm, target)?.first();
            let key = vm.create_string(name);
            metamethod::index_get(vm, &t, &key)
        }
        Expr::Index { target, key, line } => {
            vm.current_line = *line;
            let t = eval_expr(vm, target)?.first();
            let k = eval_expr(vm, key)?.first();
            metamethod::index_get(vm, &t, &k)
        }
        Expr::Call { callee, args, line } => {
            let f = eval_expr(vm, callee)?.first();
            let argv = eval_expr_list(vm, args)?;
            vm.current_line = *line;
            call_any(vm, &f, argv)
        }
        Expr::MethodCall {
            target,
            name,
            args,
            line,
        } => {
            let obj = eval_expr(vm, target)?.first();
            let key = vm.create_string(name);
            vm.current_line = *line;
            let method = metamethod::index_get(vm, &obj, &key)?;
            let mut argv = vec![obj];
            argv.extend(eval_expr_list(vm, args)?);
            vm.current_line = *line;
            call_any(vm, &method, argv)
        }
        Expr::Table { items, line } => {
            vm.current_line = *line;
            eval_table_ctor(vm, items)
        }
    }
}

/// Evaluate an expression list with tail expansion: every element takes its
/// first value except the last, whose multi-value spreads.
pub fn eval_expr_list(vm: &mut LuaVM, exprs: &[Expr]) -> LuaResult<Vec<LuaValue>> {
    let mut out = Vec::with_capacity(exprs.len());
    for (i, e) in exprs.iter().enumerate() {
        let v = eval_expr(vm, e)?;
        if i + 1 == exprs.len() {
            out.extend(v.spread());
        } else {
            out.push(v.first());
        }
    }
    Ok(out)
}

fn eval_vararg(vm: &mut LuaVM) -> LuaResult<LuaValue> {
    let pack = match environment::get(&vm.env, "...") {
        Some(v) => v,
        None => return Err(vm.error("cannot use '...' outside a vararg function".to_string())),
    };
    let Some(t) = pack.as_table() else {
        return Ok(LuaValue::Nil);
    };
    let n = {
        let t = t.borrow();
        let nkey = LuaValue::Str(Rc::new(crate::lua_value::LuaString::new("n".to_string())));
        t.raw_get(&nkey)
            .and_then(|v| v.as_integer())
            .unwrap_or_else(|| t.border())
    };
    let mut values = Vec::with_capacity(n.max(0) as usize);
    for i in 1..=n {
        values.push(t.borrow().get_int(i).unwrap_or(LuaValue::Nil));
    }
    Ok(LuaValue::Multi(Rc::new(values)))
}

fn eval_table_ctor(vm: &mut LuaVM, items: &[TableItem]) -> LuaResult<LuaValue> {
    let table = vm.new_table();
    let handle = table.as_table().cloned().expect("fresh table");
    let mut next_index: i64 = 1;
    for (i, item) in items.iter().enumerate() {
        match item {
            TableItem::Named(name, value) => {
                let k = vm.create_string(name);
                let v = eval_expr(vm, value)?.first();
                handle
                    .borrow_mut()
                    .raw_set(k, v)
                    .map_err(|e| vm.error(e.message().to_string()))?;
            }
            TableItem::Keyed(key, value) => {
                let k = eval_expr(vm, key)?.first();
                let v = eval_expr(vm, value)?.first();
                handle
                    .borrow_mut()
                    .raw_set(k, v)
                    .map_err(|e| vm.error(e.message().to_string()))?;
            }
            TableItem::Positional(value) => {
                let v = eval_expr(vm, value)?;
                let is_last = i + 1 == items.len();
                if is_last && value.is_multi() {
                    for item in v.spread() {
                        handle.borrow_mut().set_int(next_index, item);
                        next_index += 1;
                    }
                } else {
                    handle.borrow_mut().set_int(next_index, v.first());
                    next_index += 1;
                }
            }
        }
    }
    Ok(table)
}

fn eval_unary(vm: &mut LuaVM, op: UnOp, v: LuaValue) -> LuaResult<LuaValue> {
    match op {
        UnOp::Not => Ok(LuaValue::Boolean(!v.is_truthy())),
        UnOp::Neg => match v {
            LuaValue::Integer(i) => Ok(LuaValue::Integer(i.wrapping_neg())),
            LuaValue::Float(f) => Ok(LuaValue::Float(-f)),
            other => match metamethod::try_unary(vm, "__unm", &other)? {
                Some(r) => Ok(r),
                None => Err(vm.error(format!(
                    "attempt to perform arithmetic on a {} value",
                    other.type_name()
                ))),
            },
        },
        UnOp::Len => eval_length(vm, v),
        UnOp::BNot => match v.as_integer() {
            Some(i) => Ok(LuaValue::Integer(!i)),
            None => match metamethod::try_unary(vm, "__bnot", &v)? {
                Some(r) => Ok(r),
                None => Err(vm.error(format!(
                    "attempt to perform bitwise operation on a {} value",
                    v.type_name()
                ))),
            },
        },
    }
}

pub fn eval_length(vm: &mut LuaVM, v: LuaValue) -> LuaResult<LuaValue> {
    match &v {
        LuaValue::Str(s) => Ok(LuaValue::Integer(s.len() as i64)),
        LuaValue::Table(t) => {
            if let Some(r) = metamethod::try_unary(vm, "__len", &v)? {
                return Ok(r);
            }
            let b = t.borrow().border();
            Ok(LuaValue::Integer(b))
        }
        other => match metamethod::try_unary(vm, "__len", other)? {
            Some(r) => Ok(r),
            None => Err(vm.error(format!(
                "attempt to get length of a {} value",
                other.type_name()
            ))),
        },
    }
}

fn eval_binary(
    vm: &mut LuaVM,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    line: u32,
) -> LuaResult<LuaValue> {
    // short-circuit forms never evaluate the right side eagerly
    match op {
        BinOp::And => {
            let a = eval_expr(vm, lhs)?.first();
            if !a.is_truthy() {
                return Ok(a);
            }
            return Ok(eval_expr(vm, rhs)?.first());
        }
        BinOp::Or => {
            let a = eval_expr(vm, lhs)?.first();
            if a.is_truthy() {
                return Ok(a);
            }
            return Ok(eval_expr(vm, rhs)?.first());
        }
        _ => {}
    }
    let a = eval_expr(vm, lhs)?.first();
    let b = eval_expr(vm, rhs)?.first();
    vm.current_line = line;
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::IDiv | BinOp::Mod
        | BinOp::Pow => arith(vm, op, a, b),
        BinOp::Concat => concat(vm, a, b),
        BinOp::Eq => Ok(LuaValue::Boolean(metamethod::values_equal(vm, &a, &b)?)),
        BinOp::Ne => Ok(LuaValue::Boolean(!metamethod::values_equal(vm, &a, &b)?)),
        BinOp::Lt => compare(vm, false, a, b),
        BinOp::Le => compare(vm, true, a, b),
        // a > b  ==  b < a ; a >= b  ==  b <= a
        BinOp::Gt => compare(vm, false, b, a),
        BinOp::Ge => compare(vm, true, b, a),
        BinOp::BAnd | BinOp::BOr | BinOp::BXor | BinOp::Shl | BinOp::Shr => {
            bitwise(vm, op, a, b)
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn arith_metamethod(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "__add",
        BinOp::Sub => "__sub",
        BinOp::Mul => "__mul",
        BinOp::Div => "__div",
        BinOp::IDiv => "__idiv",
        BinOp::Mod => "__mod",
        BinOp::Pow => "__pow",
        _ => unreachable!(),
    }
}

pub fn arith(vm: &mut LuaVM, op: BinOp, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    // Int op Int stays Int except for / and ^, which always produce floats.
    if let (LuaValue::Integer(x), LuaValue::Integer(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        return match op {
            BinOp::Add => Ok(LuaValue::Integer(x.wrapping_add(y))),
            BinOp::Sub => Ok(LuaValue::Integer(x.wrapping_sub(y))),
            BinOp::Mul => Ok(LuaValue::Integer(x.wrapping_mul(y))),
            BinOp::Div => Ok(LuaValue::Float(x as f64 / y as f64)),
            BinOp::Pow => Ok(LuaValue::Float((x as f64).powf(y as f64))),
            BinOp::IDiv => {
                if y == 0 {
                    return Err(vm.error("attempt to perform 'n//0'".to_string()));
                }
                let q = x.wrapping_div(y);
                let r = x.wrapping_rem(y);
                Ok(LuaValue::Integer(if r != 0 && (r < 0) != (y < 0) {
                    q - 1
                } else {
                    q
                }))
            }
            BinOp::Mod => {
                if y == 0 {
                    return Err(vm.error("attempt to perform 'n%%0'".to_string()));
                }
                let r = x.wrapping_rem(y);
                Ok(LuaValue::Integer(if r != 0 && (r < 0) != (y < 0) {
                    r + y
                } else {
                    r
                }))
            }
            _ => unreachable!(),
        };
    }
    if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
        if a.is_number() && b.is_number() {
            return Ok(LuaValue::Float(match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div => x / y,
                BinOp::Pow => x.powf(y),
                BinOp::IDiv => (x / y).floor(),
                BinOp::Mod => {
                    let r = x % y;
                    if r != 0.0 && (r < 0.0) != (y < 0.0) {
                        r + y
                    } else {
                        r
                    }
                }
                _ => unreachable!(),
            }));
        }
    }
    match metamethod::try_binary(vm, arith_metamethod(op), &a, &b)? {
        Some(r) => Ok(r),
        None => {
            let culprit = if a.is_number() { &b } else { &a };
            Err(vm.error(format!(
                "attempt to perform arithmetic on a {} value",
                culprit.type_name()
            )))
        }
    }
}

fn concat_part(v: &LuaValue) -> Option<String> {
    match v {
        LuaValue::Str(s) => Some(s.as_str().to_string()),
        LuaValue::Integer(_) | LuaValue::Float(_) => Some(LuaVM::number_to_string(v)),
        _ => None,
    }
}

pub fn concat(vm: &mut LuaVM, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    if let (Some(x), Some(y)) = (concat_part(&a), concat_part(&b)) {
        let mut s = String::with_capacity(x.len() + y.len());
        s.push_str(&x);
        s.push_str(&y);
        return Ok(vm.create_string(&s));
    }
    match metamethod::try_binary(vm, "__concat", &a, &b)? {
        Some(r) => Ok(r),
        None => {
            let culprit = if concat_part(&a).is_some() { &b } else { &a };
            Err(vm.error(format!(
                "attempt to concatenate a {} value",
                culprit.type_name()
            )))
        }
    }
}

fn compare(vm: &mut LuaVM, or_equal: bool, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    let result = match (&a, &b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => {
            Some(if or_equal { x <= y } else { x < y })
        }
        (LuaValue::Str(x), LuaValue::Str(y)) => {
            let (x, y) = (x.as_str().as_bytes(), y.as_str().as_bytes());
            Some(if or_equal { x <= y } else { x < y })
        }
        _ if a.is_number() && b.is_number() => {
            let (x, y) = (a.as_float().unwrap_or(f64::NAN), b.as_float().unwrap_or(f64::NAN));
            Some(if or_equal { x <= y } else { x < y })
        }
        _ => None,
    };
    if let Some(r) = result {
        return Ok(LuaValue::Boolean(r));
    }
    let name = if or_equal { "__le" } else { "__lt" };
    match metamethod::try_binary(vm, name, &a, &b)? {
        Some(r) => Ok(LuaValue::Boolean(r.is_truthy())),
        None => Err(vm.error(format!(
            "attempt to compare {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Raw `<` with metamethod fallback, for library consumers (table.sort).
pub fn value_lt(vm: &mut LuaVM, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    Ok(compare(vm, false, a.clone(), b.clone())?.is_truthy())
}

fn bitwise(vm: &mut LuaVM, op: BinOp, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    if let (Some(x), Some(y)) = (a.as_integer(), b.as_integer()) {
        return Ok(LuaValue::Integer(match op {
            BinOp::BAnd => x & y,
            BinOp::BOr => x | y,
            BinOp::BXor => x ^ y,
            BinOp::Shl => shift(x, y),
            BinOp::Shr => shift(x, -y.max(-64).min(64)),
            _ => unreachable!(),
        }));
    }
    let name = match op {
        BinOp::BAnd => "__band",
        BinOp::BOr => "__bor",
        BinOp::BXor => "__bxor",
        BinOp::Shl => "__shl",
        BinOp::Shr => "__shr",
        _ => unreachable!(),
    };
    match metamethod::try_binary(vm, name, &a, &b)? {
        Some(r) => Ok(r),
        None => {
            let culprit = if a.as_integer().is_some() { &b } else { &a };
            Err(vm.error(format!(
                "attempt to perform bitwise operation on a {} value",
                culprit.type_name()
            )))
        }
    }
}

/// Logical shift left by `n` (negative shifts go right); shifts of 64 or
/// more produce 0, like Lua.
fn shift(x: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((x as u64) << n) as i64
    } else {
        ((x as u64) >> (-n)) as i64
    }
}
