// Metamethod resolution and dispatch.
// Binary operators consult the left operand's metatable first, then the
// right; unary operators only the left. Index read/write follow the
// table-or-callable chain with a cycle guard.

use super::call::call_any;
use super::lua_limits::MAX_INDEX_CHAIN;
use super::lua_vm::LuaVM;
use super::{LuaError, LuaResult};
use crate::lua_value::LuaValue;

/// The raw metatable of a value (only tables carry one here).
pub fn raw_metatable(v: &LuaValue) -> Option<LuaValue> {
    match v {
        LuaValue::Table(t) => t.borrow().get_metatable(),
        _ => None,
    }
}

/// Look up `name` in `v`'s metatable.
pub fn get_metamethod(v: &LuaValue, name: &str) -> Option<LuaValue> {
    let mt = raw_metatable(v)?;
    let t = mt.as_table()?;
    let entry = t.borrow().raw_get(&LuaValue::Str(std::rc::Rc::new(
        crate::lua_value::LuaString::new(name.to_string()),
    )));
    entry.filter(|e| !e.is_nil())
}

/// Resolve a binary metamethod on either operand and apply it.
/// Returns `None` when neither operand supplies it.
pub fn try_binary(
    vm: &mut LuaVM,
    name: &str,
    a: &LuaValue,
    b: &LuaValue,
) -> LuaResult<Option<LuaValue>> {
    let handler = get_metamethod(a, name).or_else(|| get_metamethod(b, name));
    match handler {
        Some(h) => {
            let r = call_any(vm, &h, vec![a.clone(), b.clone()])?;
            Ok(Some(r.first()))
        }
        None => Ok(None),
    }
}

/// Resolve a unary metamethod; only the operand itself is consulted.
pub fn try_unary(vm: &mut LuaVM, name: &str, a: &LuaValue) -> LuaResult<Option<LuaValue>> {
    match get_metamethod(a, name) {
        Some(h) => {
            let r = call_any(vm, &h, vec![a.clone(), a.clone()])?;
            Ok(Some(r.first()))
        }
        None => Ok(None),
    }
}

/// Index read `t[k]` honouring `__index` chains.
pub fn index_get(vm: &mut LuaVM, target: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
    let mut cur = target.clone();
    for _ in 0..MAX_INDEX_CHAIN {
        if let LuaValue::Table(t) = &cur {
            if let Some(v) = t.borrow().raw_get(key) {
                return Ok(v);
            }
            match get_metamethod(&cur, "__index") {
                None => return Ok(LuaValue::Nil),
                Some(LuaValue::Table(next)) => {
                    cur = LuaValue::Table(next);
                }
                Some(handler) => {
                    let r = call_any(vm, &handler, vec![cur.clone(), key.clone()])?;
                    return Ok(r.first());
                }
            }
        } else {
            match get_metamethod(&cur, "__index") {
                Some(LuaValue::Table(next)) => cur = LuaValue::Table(next),
                Some(handler) => {
                    let r = call_any(vm, &handler, vec![cur.clone(), key.clone()])?;
                    return Ok(r.first());
                }
                None => {
                    return Err(vm.error(format!(
                        "attempt to index a {} value",
                        cur.type_name()
                    )));
                }
            }
        }
    }
    Err(vm.error("'__index' chain too long; possible loop".to_string()))
}

/// Index write `t[k] = v` honouring `__newindex` chains.
pub fn index_set(
    vm: &mut LuaVM,
    target: &LuaValue,
    key: LuaValue,
    value: LuaValue,
) -> LuaResult<()> {
    let mut cur = target.clone();
    for _ in 0..MAX_INDEX_CHAIN {
        if let LuaValue::Table(t) = &cur {
            let has_raw = t.borrow().raw_get(&key).is_some();
            if has_raw {
                return raw_write(vm, t, key, value);
            }
            match get_metamethod(&cur, "__newindex") {
                None => return raw_write(vm, t, key, value),
                Some(LuaValue::Table(next)) => cur = LuaValue::Table(next),
                Some(handler) => {
                    call_any(vm, &handler, vec![cur.clone(), key, value])?;
                    return Ok(());
                }
            }
        } else {
            match get_metamethod(&cur, "__newindex") {
                Some(LuaValue::Table(next)) => cur = LuaValue::Table(next),
                Some(handler) => {
                    call_any(vm, &handler, vec![cur.clone(), key, value])?;
                    return Ok(());
                }
                None => {
                    return Err(vm.error(format!(
                        "attempt to index a {} value",
                        cur.type_name()
                    )));
                }
            }
        }
    }
    Err(vm.error("'__newindex' chain too long; possible loop".to_string()))
}

fn raw_write(
    vm: &mut LuaVM,
    t: &std::rc::Rc<std::cell::RefCell<crate::lua_value::LuaTable>>,
    key: LuaValue,
    value: LuaValue,
) -> LuaResult<()> {
    t.borrow_mut()
        .raw_set(key, value)
        .map_err(|e| vm.error(e.message().to_string()))
}

/// Equality with `__eq` fallback (only consulted when both operands are
/// tables and raw equality failed).
pub fn values_equal(vm: &mut LuaVM, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    if a.raw_equals(b) {
        return Ok(true);
    }
    if matches!((a, b), (LuaValue::Table(_), LuaValue::Table(_))) {
        if let Some(r) = try_binary(vm, "__eq", a, b)? {
            return Ok(r.is_truthy());
        }
    }
    Ok(false)
}

/// `tostring` with `__tostring`/`__name` dispatch.
pub fn tostring(vm: &mut LuaVM, v: &LuaValue) -> LuaResult<String> {
    if let Some(handler) = get_metamethod(v, "__tostring") {
        let r = call_any(vm, &handler, vec![v.clone()])?.first();
        return match r.as_str() {
            Some(s) => Ok(s.to_string()),
            None => Err(vm.error("'__tostring' must return a string".to_string())),
        };
    }
    if let Some(name) = get_metamethod(v, "__name").and_then(|n| {
        n.as_str().map(|s| s.to_string())
    }) {
        if let LuaValue::Table(t) = v {
            return Ok(format!("{}: {:p}", name, std::rc::Rc::as_ptr(t)));
        }
    }
    Ok(vm.display_value(v))
}

/// Run the `__close` metamethod of a to-be-closed value with the given
/// error value (Nil on normal exit). False and nil values are skipped.
pub fn close_value(vm: &mut LuaVM, v: &LuaValue, err: &LuaValue) -> LuaResult<()> {
    if !v.is_truthy() {
        return Ok(());
    }
    match get_metamethod(v, "__close") {
        Some(handler) => {
            call_any(vm, &handler, vec![v.clone(), err.clone()])?;
            Ok(())
        }
        // closability is validated at declaration time; a missing handler
        // here means the metatable was mutated afterwards
        None => Ok(()),
    }
}

/// Declaration-time check for `<close>` variables.
pub fn check_closable(vm: &mut LuaVM, name: &str, v: &LuaValue) -> LuaResult<()> {
    if !v.is_truthy() {
        return Ok(());
    }
    if get_metamethod(v, "__close").is_none() {
        return Err(vm.error(format!("variable '{}' got a non-closable value", name)));
    }
    Ok(())
}

/// Close every registered slot of `env` in reverse registration order.
/// Yield unwinding never calls this; error unwinding passes the error value.
pub fn close_env(vm: &mut LuaVM, env: &super::EnvRef, err: &LuaValue) -> LuaResult<()> {
    if !env.borrow().has_closers() {
        return Ok(());
    }
    let closers = env.borrow_mut().take_closers();
    let mut first_err: Option<LuaError> = None;
    for slot in closers {
        let v = env.borrow().slot_value(slot);
        if let Err(e) = close_value(vm, &v, err) {
            if e == LuaError::Yield || e == LuaError::Exit {
                return Err(e);
            }
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
