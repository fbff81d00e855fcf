// Table library
// Implements: insert, remove, concat, pack, unpack, sort, move

use super::{arg, check_table, opt_int};
use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{call_any, eval_expr::value_lt, LuaResult, LuaVM};
use std::rc::Rc;

pub fn create_table_lib() -> LibraryModule {
    crate::lib_module!("table", {
        "insert" => table_insert,
        "remove" => table_remove,
        "concat" => table_concat,
        "pack" => table_pack,
        "unpack" => super::basic::lua_unpack,
        "sort" => table_sort,
        "move" => table_move,
    })
}

/// table.insert(t, [pos,] value)
fn table_insert(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "insert")?;
    match args.len() {
        2 => {
            let len = t.borrow().border();
            t.borrow_mut().set_int(len + 1, arg(args, 2));
            Ok(LuaValue::Nil)
        }
        3 => {
            let pos = args[1]
                .as_integer()
                .ok_or_else(|| vm.error("bad argument #2 to 'insert' (number expected)".to_string()))?;
            t.borrow_mut()
                .insert_at(pos, arg(args, 3))
                .map_err(|_| vm.error("bad argument #2 to 'insert' (position out of bounds)".to_string()))?;
            Ok(LuaValue::Nil)
        }
        _ => Err(vm.error("wrong number of arguments to 'insert'".to_string())),
    }
}

/// table.remove(t [, pos])
fn table_remove(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "remove")?;
    let len = t.borrow().border();
    let pos = opt_int(args, 2, len);
    let removed = t
        .borrow_mut()
        .remove_at(pos)
        .map_err(|_| vm.error("bad argument #2 to 'remove' (position out of bounds)".to_string()))?;
    Ok(removed)
}

/// table.concat(t [, sep [, i [, j]]])
fn table_concat(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "concat")?;
    let sep = args
        .get(1)
        .filter(|v| !v.is_nil())
        .map(|v| match v {
            LuaValue::Str(s) => Ok(s.as_str().to_string()),
            LuaValue::Integer(_) | LuaValue::Float(_) => Ok(LuaVM::number_to_string(v)),
            other => Err(format!(
                "bad argument #2 to 'concat' (string expected, got {})",
                other.type_name()
            )),
        })
        .transpose()
        .map_err(|e| vm.error(e))?
        .unwrap_or_default();
    let i = opt_int(args, 3, 1);
    let j = opt_int(args, 4, t.borrow().border());
    let mut out = String::new();
    let mut k = i;
    while k <= j {
        let v = t.borrow().raw_get(&LuaValue::Integer(k)).unwrap_or(LuaValue::Nil);
        match &v {
            LuaValue::Str(s) => out.push_str(s.as_str()),
            LuaValue::Integer(_) | LuaValue::Float(_) => {
                out.push_str(&LuaVM::number_to_string(&v))
            }
            other => {
                return Err(vm.error(format!(
                    "invalid value (at index {}) in table for 'concat' ({})",
                    k,
                    other.type_name()
                )));
            }
        }
        if k < j {
            out.push_str(&sep);
        }
        k += 1;
    }
    Ok(vm.create_string(&out))
}

/// table.pack(...) - a new table with the arguments and an `n` field
fn table_pack(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(vm.pack_values(args))
}

/// table.sort(t [, comp])
fn table_sort(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "sort")?;
    let comp = args.get(1).filter(|v| !v.is_nil()).cloned();
    let len = t.borrow().border();
    let mut items: Vec<LuaValue> = Vec::with_capacity(len.max(0) as usize);
    for i in 1..=len {
        items.push(t.borrow().raw_get(&LuaValue::Integer(i)).unwrap_or(LuaValue::Nil));
    }

    let less = |vm: &mut LuaVM, a: &LuaValue, b: &LuaValue| -> LuaResult<bool> {
        match &comp {
            Some(f) => {
                let r = call_any(vm, f, vec![a.clone(), b.clone()])?.first();
                Ok(r.is_truthy())
            }
            None => value_lt(vm, a, b),
        }
    };

    merge_sort(vm, &mut items, &less)?;

    // an inconsistent comparator (NaN ordering) shows up as a broken run
    for w in items.windows(2) {
        if less(vm, &w[1], &w[0])? && less(vm, &w[0], &w[1])? {
            return Err(vm.error("invalid order function for sorting".to_string()));
        }
    }
    let mut tb = t.borrow_mut();
    for (i, v) in items.into_iter().enumerate() {
        tb.set_int(i as i64 + 1, v);
    }
    Ok(LuaValue::Nil)
}

/// Stable bottom-up merge sort so the comparator can fail midway without
/// leaving the VM in a partial borrow.
fn merge_sort(
    vm: &mut LuaVM,
    items: &mut Vec<LuaValue>,
    less: &dyn Fn(&mut LuaVM, &LuaValue, &LuaValue) -> LuaResult<bool>,
) -> LuaResult<()> {
    let n = items.len();
    let mut width = 1;
    let mut buf = items.clone();
    while width < n {
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j, mut k) = (start, mid, start);
            while i < mid && j < end {
                if less(vm, &items[j], &items[i])? {
                    buf[k] = items[j].clone();
                    j += 1;
                } else {
                    buf[k] = items[i].clone();
                    i += 1;
                }
                k += 1;
            }
            while i < mid {
                buf[k] = items[i].clone();
                i += 1;
                k += 1;
            }
            while j < end {
                buf[k] = items[j].clone();
                j += 1;
                k += 1;
            }
            start = end;
        }
        std::mem::swap(items, &mut buf);
        width *= 2;
    }
    Ok(())
}

/// table.move(a1, f, e, t [, a2])
fn table_move(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let a1 = check_table(vm, args, 1, "move")?;
    let f = args
        .get(1)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| vm.error("bad argument #2 to 'move' (number expected)".to_string()))?;
    let e = args
        .get(2)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| vm.error("bad argument #3 to 'move' (number expected)".to_string()))?;
    let d = args
        .get(3)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| vm.error("bad argument #4 to 'move' (number expected)".to_string()))?;
    let dest = match args.get(4).filter(|v| !v.is_nil()) {
        Some(v) => v
            .as_table()
            .cloned()
            .ok_or_else(|| vm.error("bad argument #5 to 'move' (table expected)".to_string()))?,
        None => Rc::clone(&a1),
    };
    if e >= f {
        if e - f >= i64::MAX - d {
            return Err(vm.error("destination wrap around in 'move'".to_string()));
        }
        if d > e || d <= f || !Rc::ptr_eq(&a1, &dest) {
            for i in 0..=(e - f) {
                let v = a1.borrow().raw_get(&LuaValue::Integer(f + i)).unwrap_or(LuaValue::Nil);
                dest.borrow_mut().set_int(d + i, v);
            }
        } else {
            // overlapping forward move copies backwards
            for i in (0..=(e - f)).rev() {
                let v = a1.borrow().raw_get(&LuaValue::Integer(f + i)).unwrap_or(LuaValue::Nil);
                dest.borrow_mut().set_int(d + i, v);
            }
        }
    }
    Ok(LuaValue::Table(dest))
}
