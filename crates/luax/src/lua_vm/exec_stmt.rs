// Statement execution.
// Blocks run under a fresh child environment with a program counter over
// their statement list. Five transient signals steer control flow: the
// return slot, break_pending, goto_pending, the yield signal (travelling as
// `Err(LuaError::Yield)`) and runtime errors. Yield unwinding appends a
// resume frame per live block; re-entry consumes the saved chain and routes
// execution back into the suspended iteration.

use super::call::call_any;
use super::environment::{self, Env, EnvRef};
use super::eval_expr::{eval_expr, eval_expr_list};
use super::lua_limits::MAX_LOOP_ITERATIONS;
use super::lua_vm::LuaVM;
use super::metamethod;
use super::{LuaError, LuaResult};
use crate::lua_value::{LuaFunction, LuaValue, ResumeFrame};
use crate::syntax::ast::{Attrib, Block, Expr, FuncName, Stat};
use smol_str::SmolStr;
use std::rc::Rc;

/// Execute a block in its own scope; closes to-be-closed locals on every
/// exit path except coroutine suspension.
pub fn exec_block(vm: &mut LuaVM, block: &Rc<Block>) -> LuaResult<()> {
    let saved = exec_block_keep_open(vm, block)?;
    let close_result = finish_scope(vm, None);
    vm.env = saved;
    close_result
}

/// Like `exec_block` but on success leaves `vm.env` inside the block scope
/// and returns the caller's environment. repeat/until needs this to test
/// its condition against the body's locals.
fn exec_block_keep_open(vm: &mut LuaVM, block: &Rc<Block>) -> LuaResult<EnvRef> {
    // re-entry: adopt the saved frame for this block, if any
    let adopt = vm
        .co_resume
        .last()
        .is_some_and(|f| f.block_id == block.id);
    let (env, start_pc, resumed) = if adopt {
        let f = vm.co_resume.pop().expect("chain tail");
        (f.env, f.pc, true)
    } else {
        (Env::child(&vm.env), 0, false)
    };
    let saved = std::mem::replace(&mut vm.env, env);
    match exec_stmts(vm, block, start_pc, resumed) {
        Ok(()) => Ok(saved),
        Err(e) => {
            let _ = finish_scope(vm, Some(e));
            vm.env = saved;
            Err(e)
        }
    }
}

/// Run the close registrations of the current scope. `failure` carries the
/// in-flight error, if any; suspension and exit skip closing entirely.
fn finish_scope(vm: &mut LuaVM, failure: Option<LuaError>) -> LuaResult<()> {
    match failure {
        None => {
            let env = Rc::clone(&vm.env);
            metamethod::close_env(vm, &env, &LuaValue::Nil)
        }
        Some(LuaError::Runtime) => {
            let env = Rc::clone(&vm.env);
            let err = vm.error_object.clone();
            // the original error wins over any error raised by __close
            let _ = metamethod::close_env(vm, &env, &err);
            Ok(())
        }
        Some(LuaError::Yield) | Some(LuaError::Exit) => Ok(()),
    }
}

fn find_label(labels: &[(SmolStr, usize)], name: &str) -> Option<usize> {
    labels.iter().find(|(n, _)| n == name).map(|(_, i)| *i)
}

fn exec_stmts(vm: &mut LuaVM, block: &Rc<Block>, start_pc: usize, resumed: bool) -> LuaResult<()> {
    let stmts = &block.stmts;
    // pre-scan for labels; goto resolution is per-block
    let mut labels: Vec<(SmolStr, usize)> = Vec::new();
    for (i, st) in stmts.iter().enumerate() {
        if let Stat::Label(name) = st {
            labels.push((name.clone(), i));
        }
    }
    let mut pc = start_pc;
    if let Some(lbl) = vm.goto_pending.clone() {
        match find_label(&labels, &lbl) {
            Some(idx) => {
                pc = idx + 1;
                vm.goto_pending = None;
            }
            // not declared here: exit and let the enclosing block re-inspect
            None => return Ok(()),
        }
    }
    let mut first = resumed;
    while pc < stmts.len() {
        match exec_statement(vm, &stmts[pc]) {
            Ok(()) => {}
            Err(LuaError::Yield) => {
                // the statement re-runs on resume; the armed yield inside it
                // will return the resume values instead of suspending again
                vm.co_unwind.push(ResumeFrame {
                    block_id: block.id,
                    pc,
                    env: Rc::clone(&vm.env),
                });
                return Err(LuaError::Yield);
            }
            Err(e) => return Err(e),
        }
        if first {
            // any frames not consumed by the resumed statement are stale
            first = false;
            vm.co_resume.clear();
        }
        if vm.ret_val.is_some() || vm.break_pending {
            return Ok(());
        }
        if let Some(lbl) = vm.goto_pending.clone() {
            match find_label(&labels, &lbl) {
                Some(idx) => {
                    pc = idx + 1;
                    vm.goto_pending = None;
                    continue;
                }
                None => return Ok(()),
            }
        }
        pc += 1;
    }
    Ok(())
}

fn exec_statement(vm: &mut LuaVM, st: &Stat) -> LuaResult<()> {
    match st {
        Stat::Expr(e) => {
            eval_expr(vm, e)?;
            Ok(())
        }
        Stat::Local { names, exprs, line } => {
            vm.current_line = *line;
            exec_local(vm, names, exprs)
        }
        Stat::Assign {
            targets,
            exprs,
            line,
        } => {
            vm.current_line = *line;
            exec_assign(vm, targets, exprs)
        }
        Stat::Do(block) => exec_block(vm, block),
        Stat::If { arms, else_block } => exec_if(vm, arms, else_block.as_ref()),
        Stat::While { cond, body, line } => exec_while(vm, cond, body, *line),
        Stat::Repeat { body, cond, line } => exec_repeat(vm, body, cond, *line),
        Stat::NumericFor {
            var,
            start,
            end,
            step,
            body,
            line,
        } => exec_numeric_for(vm, var, start, end, step.as_ref(), body, *line),
        Stat::GenericFor {
            names,
            exprs,
            body,
            line,
        } => exec_generic_for(vm, names, exprs, body, *line),
        Stat::Function {
            is_local,
            name,
            func,
        } => exec_function_stat(vm, *is_local, name, func),
        Stat::Return { exprs, line } => {
            vm.current_line = *line;
            let values = eval_expr_list(vm, exprs)?;
            vm.ret_val = Some(LuaValue::from_values(values));
            Ok(())
        }
        Stat::Break => {
            vm.break_pending = true;
            Ok(())
        }
        Stat::Goto(label) => {
            vm.goto_pending = Some(label.clone());
            Ok(())
        }
        Stat::Label(_) => Ok(()),
    }
}

fn exec_local(vm: &mut LuaVM, names: &[(SmolStr, Attrib)], exprs: &[Expr]) -> LuaResult<()> {
    let values = eval_expr_list(vm, exprs)?;
    for (i, (name, attrib)) in names.iter().enumerate() {
        let value = values.get(i).cloned().unwrap_or(LuaValue::Nil);
        if *attrib == Attrib::Close {
            metamethod::check_closable(vm, name, &value)?;
        }
        let slot = vm.env.borrow_mut().add(name.clone(), value, true);
        if *attrib == Attrib::Close {
            vm.env.borrow_mut().register_close(slot);
        }
    }
    Ok(())
}

fn exec_assign(vm: &mut LuaVM, targets: &[Expr], exprs: &[Expr]) -> LuaResult<()> {
    // all right-hand sides evaluate before any store happens
    let values = eval_expr_list(vm, exprs)?;
    for (i, target) in targets.iter().enumerate() {
        let value = values.get(i).cloned().unwrap_or(LuaValue::Nil);
        match target {
            Expr::Ident(name) => environment::assign(&vm.env, name, value),
            Expr::Field { target, name, line } => {
                vm.current_line = *line;
                let t = eval_expr(vm, target)?.first();
                let key = vm.create_string(name);
                metamethod::index_set(vm, &t, key, value)?;
            }
            Expr::Index { target, key, line } => {
                vm.current_line = *line;
                let t = eval_expr(vm, target)?.first();
                let k = eval_expr(vm, key)?.first();
                metamethod::index_set(vm, &t, k, value)?;
            }
            _ => return Err(vm.error("cannot assign to this expression".to_string())),
        }
    }
    Ok(())
}

fn exec_if(
    vm: &mut LuaVM,
    arms: &[(Expr, Rc<Block>)],
    else_block: Option<&Rc<Block>>,
) -> LuaResult<()> {
    // re-entry goes straight into the arm that was suspended
    let resume_target = vm.co_resume.last().map(|f| f.block_id);
    if let Some(tid) = resume_target {
        let target = arms
            .iter()
            .map(|(_, b)| b)
            .chain(else_block)
            .find(|b| b.id == tid);
        if let Some(b) = target {
            let b = Rc::clone(b);
            return exec_block(vm, &b);
        }
    }
    for (cond, body) in arms {
        if eval_expr(vm, cond)?.first().is_truthy() {
            return exec_block(vm, body);
        }
    }
    if let Some(b) = else_block {
        return exec_block(vm, b);
    }
    Ok(())
}

fn exec_while(vm: &mut LuaVM, cond: &Expr, body: &Rc<Block>, line: u32) -> LuaResult<()> {
    let mut resuming = vm
        .co_resume
        .last()
        .is_some_and(|f| f.block_id == body.id);
    let mut iters: u64 = 0;
    loop {
        if !resuming {
            if !eval_expr(vm, cond)?.first().is_truthy() {
                break;
            }
        }
        resuming = false;
        iters += 1;
        if iters > MAX_LOOP_ITERATIONS {
            vm.diag(
                line,
                &format!(
                    "while loop exceeded {} iterations (possible infinite loop)",
                    MAX_LOOP_ITERATIONS
                ),
            );
            break;
        }
        vm.break_pending = false;
        exec_block(vm, body)?;
        if vm.ret_val.is_some() || vm.goto_pending.is_some() {
            break;
        }
        if vm.break_pending {
            vm.break_pending = false;
            break;
        }
    }
    Ok(())
}

fn exec_repeat(vm: &mut LuaVM, body: &Rc<Block>, cond: &Expr, line: u32) -> LuaResult<()> {
    let mut iters: u64 = 0;
    loop {
        iters += 1;
        if iters > MAX_LOOP_ITERATIONS {
            vm.diag(
                line,
                &format!(
                    "repeat-until loop exceeded {} iterations (possible infinite loop)",
                    MAX_LOOP_ITERATIONS
                ),
            );
            break;
        }
        vm.break_pending = false;
        let saved = exec_block_keep_open(vm, body)?;
        let mut stop = vm.ret_val.is_some() || vm.goto_pending.is_some();
        if !stop && vm.break_pending {
            vm.break_pending = false;
            stop = true;
        }
        let mut failure: Option<LuaError> = None;
        if !stop {
            // the until condition sees the body's locals
            match eval_expr(vm, cond) {
                Ok(c) => stop = c.first().is_truthy(),
                Err(e) => failure = Some(e),
            }
        }
        let close_result = finish_scope(vm, failure);
        vm.env = saved;
        if let Some(e) = failure {
            return Err(e);
        }
        close_result?;
        if stop {
            break;
        }
    }
    Ok(())
}

fn exec_numeric_for(
    vm: &mut LuaVM,
    var: &SmolStr,
    start: &Expr,
    end: &Expr,
    step: Option<&Expr>,
    body: &Rc<Block>,
    line: u32,
) -> LuaResult<()> {
    let resuming = vm
        .co_resume
        .last()
        .is_some_and(|f| f.block_id == body.id);
    let start_v = eval_expr(vm, start)?.first();
    let end_v = eval_expr(vm, end)?.first();
    let step_v = match step {
        Some(e) => eval_expr(vm, e)?.first(),
        None => LuaValue::Integer(1),
    };
    for (label, v) in [("initial", &start_v), ("limit", &end_v), ("step", &step_v)] {
        if !v.is_number() {
            return Err(vm.error(format!("'for' {} value must be a number", label)));
        }
    }

    // the control scope owns the loop variable; body scopes chain off it
    let control_env = if resuming {
        let frame_env = vm.co_resume.last().map(|f| Rc::clone(&f.env));
        match frame_env.and_then(|e| e.borrow().parent()) {
            Some(p) => p,
            None => Env::child(&vm.env),
        }
    } else {
        let e = Env::child(&vm.env);
        e.borrow_mut().add(var.clone(), start_v.clone(), true);
        e
    };

    let saved_env = std::mem::replace(&mut vm.env, Rc::clone(&control_env));
    let r = numeric_for_loop(vm, var, &start_v, &end_v, &step_v, body, line, resuming);
    vm.env = saved_env;
    r
}

#[allow(clippy::too_many_arguments)]
fn numeric_for_loop(
    vm: &mut LuaVM,
    var: &SmolStr,
    start_v: &LuaValue,
    end_v: &LuaValue,
    step_v: &LuaValue,
    body: &Rc<Block>,
    line: u32,
    mut resuming: bool,
) -> LuaResult<()> {
    let all_int = matches!(
        (start_v, end_v, step_v),
        (LuaValue::Integer(_), LuaValue::Integer(_), LuaValue::Integer(_))
    );
    let var_slot = vm.env.borrow().find_local(var);
    let current = |vm: &LuaVM| -> LuaValue {
        var_slot
            .map(|s| vm.env.borrow().slot_value(s))
            .unwrap_or(LuaValue::Nil)
    };
    let store = |vm: &mut LuaVM, v: LuaValue| {
        if let Some(s) = var_slot {
            vm.env.borrow_mut().set_slot(s, v);
        }
    };

    let mut iters: u64 = 0;
    if all_int {
        let (LuaValue::Integer(start), LuaValue::Integer(limit), LuaValue::Integer(step)) =
            (start_v, end_v, step_v)
        else {
            unreachable!()
        };
        let (limit, step) = (*limit, *step);
        if step == 0 {
            vm.diag(line, "numeric for with step=0; skipping loop");
            return Ok(());
        }
        let mut i = if resuming {
            current(vm).as_integer().unwrap_or(*start)
        } else {
            *start
        };
        loop {
            if !resuming {
                let in_range = if step > 0 { i <= limit } else { i >= limit };
                if !in_range {
                    break;
                }
                store(vm, LuaValue::Integer(i));
            }
            iters += 1;
            if iters > MAX_LOOP_ITERATIONS {
                vm.diag(
                    line,
                    &format!("for loop exceeded {} iterations", MAX_LOOP_ITERATIONS),
                );
                break;
            }
            resuming = false;
            vm.break_pending = false;
            exec_block(vm, body)?;
            if vm.ret_val.is_some() || vm.goto_pending.is_some() {
                break;
            }
            if vm.break_pending {
                vm.break_pending = false;
                break;
            }
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        let start = start_v.as_float().unwrap_or(0.0);
        let limit = end_v.as_float().unwrap_or(0.0);
        let step = step_v.as_float().unwrap_or(0.0);
        if step == 0.0 {
            vm.diag(line, "numeric for with step=0; skipping loop");
            return Ok(());
        }
        let mut i = if resuming {
            current(vm).as_float().unwrap_or(start)
        } else {
            start
        };
        loop {
            if !resuming {
                let in_range = if step > 0.0 { i <= limit } else { i >= limit };
                if !in_range {
                    break;
                }
                store(vm, LuaValue::Float(i));
            }
            iters += 1;
            if iters > MAX_LOOP_ITERATIONS {
                vm.diag(
                    line,
                    &format!("for loop exceeded {} iterations", MAX_LOOP_ITERATIONS),
                );
                break;
            }
            resuming = false;
            vm.break_pending = false;
            exec_block(vm, body)?;
            if vm.ret_val.is_some() || vm.goto_pending.is_some() {
                break;
            }
            if vm.break_pending {
                vm.break_pending = false;
                break;
            }
            i += step;
        }
    }
    Ok(())
}

fn exec_generic_for(
    vm: &mut LuaVM,
    names: &[SmolStr],
    exprs: &[Expr],
    body: &Rc<Block>,
    line: u32,
) -> LuaResult<()> {
    let resuming = vm
        .co_resume
        .last()
        .is_some_and(|f| f.block_id == body.id);
    let values = eval_expr_list(vm, exprs)?;

    // unwrap the packed (iter, state, ctrl) triple returned by pairs/ipairs
    let (iter, state, mut ctrl, bare_table) = if values.len() == 1 {
        match values[0].as_table() {
            Some(t) => {
                let first = t.borrow().get_int(1);
                match first {
                    Some(f) if f.is_callable() => {
                        let state = t.borrow().get_int(2).unwrap_or(LuaValue::Nil);
                        let ctrl = t.borrow().get_int(3).unwrap_or(LuaValue::Nil);
                        (f, state, ctrl, None)
                    }
                    // a __call-able table (coroutine.wrap) is an iterator
                    _ if metamethod::get_metamethod(&values[0], "__call").is_some() => {
                        (values[0].clone(), LuaValue::Nil, LuaValue::Nil, None)
                    }
                    // bare table: walk all entries
                    _ => (
                        LuaValue::Nil,
                        LuaValue::Nil,
                        LuaValue::Nil,
                        Some(values[0].clone()),
                    ),
                }
            }
            None => (
                values[0].clone(),
                LuaValue::Nil,
                LuaValue::Nil,
                None,
            ),
        }
    } else {
        (
            values.first().cloned().unwrap_or(LuaValue::Nil),
            values.get(1).cloned().unwrap_or(LuaValue::Nil),
            values.get(2).cloned().unwrap_or(LuaValue::Nil),
            None,
        )
    };

    let control_env = if resuming {
        let frame_env = vm.co_resume.last().map(|f| Rc::clone(&f.env));
        match frame_env.and_then(|e| e.borrow().parent()) {
            Some(p) => p,
            None => Env::child(&vm.env),
        }
    } else {
        let e = Env::child(&vm.env);
        for name in names {
            e.borrow_mut().add(name.clone(), LuaValue::Nil, true);
        }
        e
    };

    if resuming {
        // continue from the suspended control value
        let slot = control_env.borrow().find_local(&names[0]);
        if let Some(s) = slot {
            ctrl = control_env.borrow().slot_value(s);
        }
    }

    let saved_env = std::mem::replace(&mut vm.env, control_env);
    let r = match bare_table {
        Some(t) => bare_table_loop(vm, names, &t, body, line, resuming),
        None => generic_for_loop(vm, names, &iter, &state, ctrl, body, line, resuming),
    };
    vm.env = saved_env;
    r
}

fn assign_loop_vars(vm: &mut LuaVM, names: &[SmolStr], values: &[LuaValue]) {
    for (i, name) in names.iter().enumerate() {
        let slot = vm.env.borrow().find_local(name);
        if let Some(s) = slot {
            vm.env
                .borrow_mut()
                .set_slot(s, values.get(i).cloned().unwrap_or(LuaValue::Nil));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn generic_for_loop(
    vm: &mut LuaVM,
    names: &[SmolStr],
    iter: &LuaValue,
    state: &LuaValue,
    mut ctrl: LuaValue,
    body: &Rc<Block>,
    line: u32,
    mut resuming: bool,
) -> LuaResult<()> {
    let mut iters: u64 = 0;
    loop {
        iters += 1;
        if iters > MAX_LOOP_ITERATIONS {
            vm.diag(
                line,
                &format!("for-in loop exceeded {} iterations", MAX_LOOP_ITERATIONS),
            );
            break;
        }
        if !resuming {
            let result = call_any(vm, iter, vec![state.clone(), ctrl.clone()])?;
            let values = result.spread();
            let first = values.first().cloned().unwrap_or(LuaValue::Nil);
            if first.is_nil() {
                break;
            }
            ctrl = first;
            assign_loop_vars(vm, names, &values);
        }
        resuming = false;
        vm.break_pending = false;
        exec_block(vm, body)?;
        if vm.ret_val.is_some() || vm.goto_pending.is_some() {
            break;
        }
        if vm.break_pending {
            vm.break_pending = false;
            break;
        }
        // the loop variable is the next control value
        let slot = vm.env.borrow().find_local(&names[0]);
        if let Some(s) = slot {
            ctrl = vm.env.borrow().slot_value(s);
        }
    }
    Ok(())
}

/// Fallback iteration over a bare table: every (key, value) entry in the
/// stateless `next` order. A single loop variable receives the values.
fn bare_table_loop(
    vm: &mut LuaVM,
    names: &[SmolStr],
    table: &LuaValue,
    body: &Rc<Block>,
    line: u32,
    mut resuming: bool,
) -> LuaResult<()> {
    let Some(t) = table.as_table().cloned() else {
        return Ok(());
    };
    let mut key = LuaValue::Nil;
    if resuming && names.len() > 1 {
        let slot = vm.env.borrow().find_local(&names[0]);
        if let Some(s) = slot {
            key = vm.env.borrow().slot_value(s);
        }
    }
    let mut iters: u64 = 0;
    loop {
        iters += 1;
        if iters > MAX_LOOP_ITERATIONS {
            vm.diag(
                line,
                &format!("for-in loop exceeded {} iterations", MAX_LOOP_ITERATIONS),
            );
            break;
        }
        if !resuming {
            let entry = t.borrow().next(&key);
            let Some((k, v)) = entry else { break };
            key = k.clone();
            if names.len() <= 1 {
                assign_loop_vars(vm, names, &[v]);
            } else {
                assign_loop_vars(vm, names, &[k, v]);
            }
        }
        resuming = false;
        vm.break_pending = false;
        exec_block(vm, body)?;
        if vm.ret_val.is_some() || vm.goto_pending.is_some() {
            break;
        }
        if vm.break_pending {
            vm.break_pending = false;
            break;
        }
        if names.len() > 1 {
            let slot = vm.env.borrow().find_local(&names[0]);
            if let Some(s) = slot {
                key = vm.env.borrow().slot_value(s);
            }
        }
    }
    Ok(())
}

fn exec_function_stat(
    vm: &mut LuaVM,
    is_local: bool,
    name: &FuncName,
    func: &Rc<crate::syntax::ast::FuncBody>,
) -> LuaResult<()> {
    if is_local {
        if let FuncName::Ident(n) = name {
            // the slot exists before the closure captures, so the function
            // can call itself by name
            vm.env.borrow_mut().add(n.clone(), LuaValue::Nil, true);
        }
    }
    let closure = LuaValue::Function(Rc::new(LuaFunction {
        proto: Rc::clone(func),
        env: Rc::clone(&vm.env),
    }));
    match name {
        FuncName::Ident(n) => {
            if is_local {
                if let Some((owner, slot)) = environment::find(&vm.env, n) {
                    owner.borrow_mut().set_slot(slot, closure);
                }
            } else {
                environment::assign(&vm.env, n, closure);
            }
            Ok(())
        }
        FuncName::Chain { target, name, .. } => {
            let t = eval_expr(vm, target)?.first();
            let key = vm.create_string(name);
            metamethod::index_set(vm, &t, key, closure)
        }
    }
}
