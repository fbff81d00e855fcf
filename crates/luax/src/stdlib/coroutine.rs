// Coroutine library - surface over the engine
// Implements: create, resume, yield, status, running, wrap, isyieldable, close

use super::arg;
use crate::lib_registry::LibraryModule;
use crate::lua_value::{CoroutineStatus, LuaValue};
use crate::lua_vm::{coroutine_engine, LuaResult, LuaVM};
use std::rc::Rc;

pub fn create_coroutine_lib() -> LibraryModule {
    crate::lib_module!("coroutine", {
        "create" => coroutine_create,
        "resume" => coroutine_resume,
        "yield" => coroutine_yield,
        "status" => coroutine_status,
        "running" => coroutine_running,
        "wrap" => coroutine_wrap,
        "isyieldable" => coroutine_isyieldable,
        "close" => coroutine_close,
    })
}

/// coroutine.create(f)
fn coroutine_create(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let func = arg(args, 1);
    if !func.is_callable() {
        return Err(vm.error("bad argument #1 to 'create' (function expected)".to_string()));
    }
    Ok(coroutine_engine::create(func))
}

/// coroutine.resume(co, ...)
fn coroutine_resume(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let co = arg(args, 1);
    let Some(thread) = co.as_thread().cloned() else {
        return Err(vm.error("bad argument #1 to 'resume' (coroutine expected)".to_string()));
    };
    let rest: Vec<LuaValue> = args.iter().skip(1).cloned().collect();
    let (ok, values) = coroutine_engine::resume(vm, &thread, rest)?;
    let mut out = Vec::with_capacity(values.len() + 1);
    out.push(LuaValue::Boolean(ok));
    out.extend(values);
    Ok(LuaValue::Multi(Rc::new(out)))
}

/// coroutine.yield(...)
fn coroutine_yield(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    coroutine_engine::yield_values(vm, args.to_vec())
}

/// coroutine.status(co)
fn coroutine_status(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let co = arg(args, 1);
    let Some(thread) = co.as_thread() else {
        return Err(vm.error("bad argument #1 to 'status' (coroutine expected)".to_string()));
    };
    let status = thread.borrow().status;
    Ok(vm.create_string(status.as_str()))
}

/// coroutine.running() - the running coroutine, or nil on the main thread
fn coroutine_running(vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<LuaValue> {
    match &vm.active_co {
        Some(co) => Ok(LuaValue::Thread(Rc::clone(co))),
        None => Ok(LuaValue::Nil),
    }
}

/// coroutine.isyieldable()
fn coroutine_isyieldable(vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<LuaValue> {
    let yieldable = vm
        .active_co
        .as_ref()
        .is_some_and(|co| co.borrow().status == CoroutineStatus::Running);
    Ok(LuaValue::Boolean(yieldable))
}

/// coroutine.wrap(f) - a callable that resumes and re-raises errors.
/// Native functions carry no captured state, so the wrapper is a table
/// holding the thread with a `__call` metamethod.
fn coroutine_wrap(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let func = arg(args, 1);
    if !func.is_callable() {
        return Err(vm.error("bad argument #1 to 'wrap' (function expected)".to_string()));
    }
    let co = coroutine_engine::create(func);

    let wrapper = vm.new_table();
    let co_key = vm.create_string("co");
    let call_key = vm.create_string("__call");
    let mt = vm.new_table();
    if let (Some(w), Some(m)) = (wrapper.as_table(), mt.as_table()) {
        w.borrow_mut()
            .raw_set(co_key, co)
            .map_err(|e| vm.error(e.message().to_string()))?;
        m.borrow_mut()
            .raw_set(call_key, LuaValue::NativeFn(coroutine_wrap_call))
            .map_err(|e| vm.error(e.message().to_string()))?;
        w.borrow_mut().set_metatable(Some(mt.clone()));
    }
    Ok(wrapper)
}

/// `__call` handler for wrapped coroutines: args[0] is the wrapper itself.
fn coroutine_wrap_call(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let wrapper = arg(args, 1);
    let co_key = vm.create_string("co");
    let co = wrapper
        .as_table()
        .and_then(|t| t.borrow().raw_get(&co_key))
        .unwrap_or(LuaValue::Nil);
    let Some(thread) = co.as_thread().cloned() else {
        return Err(vm.error("invalid wrapped coroutine".to_string()));
    };
    let rest: Vec<LuaValue> = args.iter().skip(1).cloned().collect();
    let (ok, values) = coroutine_engine::resume(vm, &thread, rest)?;
    if !ok {
        let err = values.into_iter().next().unwrap_or(LuaValue::Nil);
        return Err(vm.raise(err));
    }
    Ok(LuaValue::from_values(values))
}

/// coroutine.close(co)
fn coroutine_close(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let co = arg(args, 1);
    let Some(thread) = co.as_thread().cloned() else {
        return Err(vm.error("bad argument #1 to 'close' (coroutine expected)".to_string()));
    };
    let (ok, err) = coroutine_engine::close(vm, &thread)?;
    if ok {
        Ok(LuaValue::Boolean(true))
    } else {
        Ok(LuaValue::Multi(Rc::new(vec![LuaValue::Boolean(false), err])))
    }
}
