// Coroutine engine: the resume/yield harness over the call machinery.
//
// yield buffers its arguments on the thread and unwinds as
// `Err(LuaError::Yield)`; each live block appends a resume frame on the way
// out. resume installs the saved chain, arms the pending-yield-return flag
// and re-enters the entry function; the block walker routes execution back
// into the suspended iteration and the armed yield returns the resume
// values at the original call site.

use super::call::call_any;
use super::lua_vm::LuaVM;
use super::{LuaError, LuaResult};
use crate::lua_value::{CoroutineStatus, LuaThread, LuaValue};
use std::cell::RefCell;
use std::rc::Rc;

pub fn create(func: LuaValue) -> LuaValue {
    LuaValue::Thread(Rc::new(RefCell::new(LuaThread::new(func))))
}

/// Resume a coroutine with the given arguments.
/// Returns `(true, values…)` on yield or completion, `(false, err)` when the
/// body died with an error. Status misuse reports `(false, message)` without
/// raising, like the reference implementation.
pub fn resume(
    vm: &mut LuaVM,
    co: &Rc<RefCell<LuaThread>>,
    args: Vec<LuaValue>,
) -> LuaResult<(bool, Vec<LuaValue>)> {
    {
        let status = co.borrow().status;
        match status {
            CoroutineStatus::Running | CoroutineStatus::Normal => {
                let msg = vm.create_string("cannot resume non-suspended coroutine");
                return Ok((false, vec![msg]));
            }
            CoroutineStatus::Dead => {
                let msg = vm.create_string("cannot resume dead coroutine");
                return Ok((false, vec![msg]));
            }
            CoroutineStatus::Suspended => {}
        }
    }

    // nesting: the resumer goes Normal for the duration
    let caller = vm.active_co.take();
    if let Some(c) = &caller {
        c.borrow_mut().status = CoroutineStatus::Normal;
    }
    co.borrow_mut().caller = caller.clone();
    co.borrow_mut().status = CoroutineStatus::Running;
    vm.active_co = Some(Rc::clone(co));

    // the caller's own suspension state must survive this resume
    let saved_unwind = std::mem::take(&mut vm.co_unwind);
    let saved_resume = std::mem::take(&mut vm.co_resume);
    let saved_yielding = std::mem::replace(&mut vm.co_yielding, false);

    let func = co.borrow().func.clone();
    let started = co.borrow().started;
    let r = if !started {
        co.borrow_mut().started = true;
        call_any(vm, &func, args)
    } else {
        // re-entry: install the saved chain and arm the pending return
        {
            let mut t = co.borrow_mut();
            t.resume_values = args;
            t.pending_yield_return = true;
            vm.co_resume = std::mem::take(&mut t.resume_stack);
        }
        call_any(vm, &func, Vec::new())
    };

    let outcome = match r {
        Err(LuaError::Yield) => {
            let mut t = co.borrow_mut();
            t.status = CoroutineStatus::Suspended;
            t.resume_stack = std::mem::take(&mut vm.co_unwind);
            let values = std::mem::take(&mut t.yield_values);
            Ok((true, values))
        }
        Ok(v) => {
            co.borrow_mut().status = CoroutineStatus::Dead;
            Ok((true, v.spread()))
        }
        Err(LuaError::Runtime) => {
            co.borrow_mut().status = CoroutineStatus::Dead;
            let err = std::mem::replace(&mut vm.error_object, LuaValue::Nil);
            Ok((false, vec![err]))
        }
        Err(LuaError::Exit) => Err(LuaError::Exit),
    };

    // restore the caller's context
    co.borrow_mut().caller = None;
    co.borrow_mut().pending_yield_return = false;
    vm.co_yielding = saved_yielding;
    vm.co_unwind = saved_unwind;
    vm.co_resume = saved_resume;
    vm.active_co = caller;
    if let Some(c) = &vm.active_co {
        c.borrow_mut().status = CoroutineStatus::Running;
    }
    outcome
}

/// Suspend the running coroutine, or return the buffered resume values when
/// the pending-yield-return flag is armed (re-entry at the yield site).
pub fn yield_values(vm: &mut LuaVM, args: Vec<LuaValue>) -> LuaResult<LuaValue> {
    let Some(co) = vm.active_co.clone() else {
        return Err(vm.error("attempt to yield from outside a coroutine".to_string()));
    };
    {
        let mut t = co.borrow_mut();
        if t.pending_yield_return {
            t.pending_yield_return = false;
            let values = std::mem::take(&mut t.resume_values);
            return Ok(LuaValue::from_values(values));
        }
        if vm.co_yielding {
            drop(t);
            return Err(vm.error("attempt to yield from non-running coroutine".to_string()));
        }
        t.yield_values = args;
    }
    vm.co_yielding = true;
    Err(LuaError::Yield)
}

/// Mark a suspended or fresh coroutine dead, dropping its saved state.
pub fn close(vm: &mut LuaVM, co: &Rc<RefCell<LuaThread>>) -> LuaResult<(bool, LuaValue)> {
    let status = co.borrow().status;
    match status {
        CoroutineStatus::Running | CoroutineStatus::Normal => Err(vm.error(
            "cannot close a running coroutine".to_string(),
        )),
        CoroutineStatus::Dead => Ok((true, LuaValue::Nil)),
        CoroutineStatus::Suspended => {
            let mut t = co.borrow_mut();
            t.status = CoroutineStatus::Dead;
            t.resume_stack.clear();
            t.yield_values.clear();
            t.resume_values.clear();
            Ok((true, LuaValue::Nil))
        }
    }
}
