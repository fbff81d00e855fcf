// Math library
// Implements: abs, ceil, floor, sqrt, sin, cos, tan, exp, log, fmod, modf,
// max, min, tointeger, type, random, randomseed + pi/huge/maxinteger/
// mininteger constants

use super::{arg, check_number};
use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{eval_expr::value_lt, LuaResult, LuaVM};
use rand::{Rng, SeedableRng};
use std::rc::Rc;

pub fn create_math_lib() -> LibraryModule {
    crate::lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "floor" => math_floor,
        "sqrt" => math_sqrt,
        "sin" => math_sin,
        "cos" => math_cos,
        "tan" => math_tan,
        "exp" => math_exp,
        "log" => math_log,
        "fmod" => math_fmod,
        "modf" => math_modf,
        "max" => math_max,
        "min" => math_min,
        "tointeger" => math_tointeger,
        "type" => math_type,
        "random" => math_random,
        "randomseed" => math_randomseed,
    })
    .with_value("pi", |_| LuaValue::Float(std::f64::consts::PI))
    .with_value("huge", |_| LuaValue::Float(f64::INFINITY))
    .with_value("maxinteger", |_| LuaValue::Integer(i64::MAX))
    .with_value("mininteger", |_| LuaValue::Integer(i64::MIN))
}

fn math_abs(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1) {
        LuaValue::Integer(i) => Ok(LuaValue::Integer(i.wrapping_abs())),
        LuaValue::Float(f) => Ok(LuaValue::Float(f.abs())),
        other => Err(vm.error(format!(
            "bad argument #1 to 'abs' (number expected, got {})",
            other.type_name()
        ))),
    }
}

fn to_int_result(f: f64) -> LuaValue {
    if f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        LuaValue::Integer(f as i64)
    } else {
        LuaValue::Float(f)
    }
}

fn math_ceil(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1) {
        LuaValue::Integer(i) => Ok(LuaValue::Integer(i)),
        other => {
            let f = check_number(vm, &[other], 1, "ceil")?;
            Ok(to_int_result(f.ceil()))
        }
    }
}

fn math_floor(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1) {
        LuaValue::Integer(i) => Ok(LuaValue::Integer(i)),
        other => {
            let f = check_number(vm, &[other], 1, "floor")?;
            Ok(to_int_result(f.floor()))
        }
    }
}

fn math_sqrt(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Float(check_number(vm, args, 1, "sqrt")?.sqrt()))
}

fn math_sin(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Float(check_number(vm, args, 1, "sin")?.sin()))
}

fn math_cos(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Float(check_number(vm, args, 1, "cos")?.cos()))
}

fn math_tan(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Float(check_number(vm, args, 1, "tan")?.tan()))
}

fn math_exp(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Float(check_number(vm, args, 1, "exp")?.exp()))
}

/// math.log(x [, base])
fn math_log(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let x = check_number(vm, args, 1, "log")?;
    match args.get(1).filter(|v| !v.is_nil()) {
        Some(b) => {
            let base = b
                .as_float()
                .ok_or_else(|| vm.error("bad argument #2 to 'log' (number expected)".to_string()))?;
            Ok(LuaValue::Float(x.log(base)))
        }
        None => Ok(LuaValue::Float(x.ln())),
    }
}

fn math_fmod(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let x = check_number(vm, args, 1, "fmod")?;
    let y = check_number(vm, args, 2, "fmod")?;
    Ok(LuaValue::Float(x % y))
}

/// math.modf(x) - integral and fractional parts
fn math_modf(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let x = check_number(vm, args, 1, "modf")?;
    let int = x.trunc();
    Ok(LuaValue::Multi(Rc::new(vec![
        to_int_result(int),
        LuaValue::Float(x - int),
    ])))
}

fn math_max(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    if args.is_empty() {
        return Err(vm.error("bad argument #1 to 'max' (value expected)".to_string()));
    }
    let mut best = args[0].clone();
    for v in &args[1..] {
        if value_lt(vm, &best, v)? {
            best = v.clone();
        }
    }
    Ok(best)
}

fn math_min(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    if args.is_empty() {
        return Err(vm.error("bad argument #1 to 'min' (value expected)".to_string()));
    }
    let mut best = args[0].clone();
    for v in &args[1..] {
        if value_lt(vm, v, &best)? {
            best = v.clone();
        }
    }
    Ok(best)
}

/// math.tointeger(x) - integer value or nil
fn math_tointeger(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1) {
        LuaValue::Integer(i) => Ok(LuaValue::Integer(i)),
        LuaValue::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Ok(LuaValue::Integer(f as i64))
        }
        _ => Ok(LuaValue::Nil),
    }
}

/// math.type(x) - "integer", "float" or nil
fn math_type(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1) {
        LuaValue::Integer(_) => Ok(vm.create_string("integer")),
        LuaValue::Float(_) => Ok(vm.create_string("float")),
        _ => Ok(LuaValue::Nil),
    }
}

/// math.random([m [, n]])
fn math_random(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match args.len() {
        0 => Ok(LuaValue::Float(vm.rng.r#gen::<f64>())),
        1 => {
            let m = args[0].as_integer().ok_or_else(|| {
                vm.error("bad argument #1 to 'random' (number expected)".to_string())
            })?;
            if m < 1 {
                return Err(vm.error("bad argument #1 to 'random' (interval is empty)".to_string()));
            }
            Ok(LuaValue::Integer(vm.rng.gen_range(1..=m)))
        }
        _ => {
            let m = args[0].as_integer().ok_or_else(|| {
                vm.error("bad argument #1 to 'random' (number expected)".to_string())
            })?;
            let n = args[1].as_integer().ok_or_else(|| {
                vm.error("bad argument #2 to 'random' (number expected)".to_string())
            })?;
            if m > n {
                return Err(vm.error("bad argument #2 to 'random' (interval is empty)".to_string()));
            }
            Ok(LuaValue::Integer(vm.rng.gen_range(m..=n)))
        }
    }
}

/// math.randomseed([x])
fn math_randomseed(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1).as_integer() {
        Some(seed) => vm.rng = rand::rngs::StdRng::seed_from_u64(seed as u64),
        None => vm.rng = rand::rngs::StdRng::from_entropy(),
    }
    Ok(LuaValue::Nil)
}
