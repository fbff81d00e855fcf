// Call machinery.
// Dispatches native functions, interpreted closures and `__call` values.
// The VM's control-flow flags are saved and restored around every closure
// body so the evaluator stays re-entrant.

use super::environment::Env;
use super::exec_stmt;
use super::lua_limits::MAX_CALL_DEPTH;
use super::lua_vm::LuaVM;
use super::metamethod;
use super::{LuaError, LuaResult};
use crate::lua_value::{LuaFunction, LuaValue};
use smol_str::SmolStr;
use std::rc::Rc;

/// Invoke any callable with the given arguments. The result may be a
/// `Multi`; callers collapse or spread it according to position.
pub fn call_any(vm: &mut LuaVM, callee: &LuaValue, args: Vec<LuaValue>) -> LuaResult<LuaValue> {
    if vm.call_depth >= MAX_CALL_DEPTH {
        return Err(vm.error("stack overflow".to_string()));
    }
    vm.call_depth += 1;
    let r = dispatch(vm, callee, args);
    vm.call_depth -= 1;
    r
}

fn dispatch(vm: &mut LuaVM, callee: &LuaValue, args: Vec<LuaValue>) -> LuaResult<LuaValue> {
    match callee {
        LuaValue::NativeFn(f) => f(vm, &args),
        LuaValue::Function(f) => call_closure(vm, f, args),
        other => {
            // non-callables may still carry a `__call` metamethod
            if let Some(handler) = metamethod::get_metamethod(other, "__call") {
                let mut forwarded = Vec::with_capacity(args.len() + 1);
                forwarded.push(other.clone());
                forwarded.extend(args);
                return call_any(vm, &handler, forwarded);
            }
            Err(vm.error(format!("attempt to call a {} value", other.type_name())))
        }
    }
}

fn call_closure(vm: &mut LuaVM, f: &Rc<LuaFunction>, args: Vec<LuaValue>) -> LuaResult<LuaValue> {
    // Re-entry: when the resume chain ends in this closure's body, the body
    // block adopts its saved environment, so parameter binding is skipped
    // (the saved scope already holds the bound parameters).
    let resuming = vm
        .co_resume
        .last()
        .is_some_and(|frame| frame.block_id == f.proto.body.id);

    let saved_env = Rc::clone(&vm.env);
    if !resuming {
        let call_env = Env::child(&f.env);
        {
            let mut env = call_env.borrow_mut();
            for (i, p) in f.proto.params.iter().enumerate() {
                env.add(p.clone(), args.get(i).cloned().unwrap_or(LuaValue::Nil), true);
            }
        }
        if f.proto.is_vararg {
            let rest: Vec<LuaValue> = args
                .iter()
                .skip(f.proto.params.len())
                .cloned()
                .collect();
            let pack = vm.pack_values(&rest);
            call_env.borrow_mut().add(SmolStr::new("..."), pack, true);
        }
        vm.env = call_env;
    } else {
        vm.env = Rc::clone(&f.env);
    }

    // a call boundary insulates the caller's control-flow signals
    let saved_ret = vm.ret_val.take();
    let saved_break = std::mem::replace(&mut vm.break_pending, false);
    let saved_goto = vm.goto_pending.take();

    let r = exec_stmt::exec_block(vm, &f.proto.body);

    let result = vm.ret_val.take().unwrap_or(LuaValue::Nil);
    vm.ret_val = saved_ret;
    vm.break_pending = saved_break;
    vm.goto_pending = saved_goto;
    vm.env = saved_env;

    match r {
        Ok(()) => Ok(result),
        Err(e) => Err(e),
    }
}

/// Library-facing re-entry point, spread to a value vector.
pub fn call_values(
    vm: &mut LuaVM,
    callee: &LuaValue,
    args: Vec<LuaValue>,
) -> LuaResult<Vec<LuaValue>> {
    Ok(call_any(vm, callee, args)?.spread())
}

/// Protected call: pushes an error frame, invokes, and recovers a runtime
/// error into `(false, err)`. Yield and exit signals pass through.
pub fn protected_call(
    vm: &mut LuaVM,
    callee: &LuaValue,
    args: Vec<LuaValue>,
) -> LuaResult<(bool, LuaValue)> {
    vm.push_frame();
    let saved_depth = vm.call_depth;
    let r = call_any(vm, callee, args);
    let frame = vm.pop_frame();
    match r {
        Ok(v) => Ok((true, v)),
        Err(LuaError::Runtime) => {
            if let Some(frame) = frame {
                vm.env = frame.env;
            }
            vm.call_depth = saved_depth;
            let err = std::mem::replace(&mut vm.error_object, LuaValue::Nil);
            Ok((false, err))
        }
        Err(other) => Err(other),
    }
}
