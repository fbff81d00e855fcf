// Standard libraries, implemented against the public value/table/env API.

pub mod basic;
pub mod coroutine;
pub mod io;
pub mod math;
pub mod os;
pub mod package;
pub mod string;
pub mod table;

use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::{LuaResult, LuaVM};
use std::cell::RefCell;
use std::rc::Rc;

/// 1-based argument access; missing arguments read as nil.
#[inline]
pub(crate) fn arg(args: &[LuaValue], i: usize) -> LuaValue {
    args.get(i - 1).cloned().unwrap_or(LuaValue::Nil)
}

pub(crate) fn check_table(
    vm: &mut LuaVM,
    args: &[LuaValue],
    i: usize,
    fname: &str,
) -> LuaResult<Rc<RefCell<LuaTable>>> {
    match arg(args, i) {
        LuaValue::Table(t) => Ok(t),
        other => Err(vm.error(format!(
            "bad argument #{} to '{}' (table expected, got {})",
            i,
            fname,
            other.type_name()
        ))),
    }
}

pub(crate) fn check_number(
    vm: &mut LuaVM,
    args: &[LuaValue],
    i: usize,
    fname: &str,
) -> LuaResult<f64> {
    let v = arg(args, i);
    v.as_float().ok_or_else(|| {
        vm.error(format!(
            "bad argument #{} to '{}' (number expected, got {})",
            i,
            fname,
            v.type_name()
        ))
    })
}

pub(crate) fn check_str(
    vm: &mut LuaVM,
    args: &[LuaValue],
    i: usize,
    fname: &str,
) -> LuaResult<String> {
    let v = arg(args, i);
    match &v {
        LuaValue::Str(s) => Ok(s.as_str().to_string()),
        LuaValue::Integer(_) | LuaValue::Float(_) => Ok(LuaVM::number_to_string(&v)),
        other => Err(vm.error(format!(
            "bad argument #{} to '{}' (string expected, got {})",
            i,
            fname,
            other.type_name()
        ))),
    }
}

pub(crate) fn opt_int(args: &[LuaValue], i: usize, default: i64) -> i64 {
    args.get(i - 1)
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}
