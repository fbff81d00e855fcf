// Basic library (_G global functions)
// Implements: print, type, assert, error, tonumber, tostring, select,
// ipairs, pairs, next, pcall, xpcall, getmetatable, setmetatable, rawget,
// rawset, rawlen, rawequal, unpack, collectgarbage, load, loadfile, dofile

use super::{arg, check_str, check_table, opt_int};
use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaFunction, LuaValue};
use crate::lua_vm::{call_any, metamethod, protected_call, LuaResult, LuaVM};
use crate::syntax::{self, ast::FuncBody};
use std::rc::Rc;

pub fn create_basic_lib() -> LibraryModule {
    crate::lib_module!("_G", {
        "print" => lua_print,
        "type" => lua_type,
        "assert" => lua_assert,
        "error" => lua_error,
        "tonumber" => lua_tonumber,
        "tostring" => lua_tostring,
        "select" => lua_select,
        "ipairs" => lua_ipairs,
        "pairs" => lua_pairs,
        "next" => lua_next,
        "pcall" => lua_pcall,
        "xpcall" => lua_xpcall,
        "getmetatable" => lua_getmetatable,
        "setmetatable" => lua_setmetatable,
        "rawget" => lua_rawget,
        "rawset" => lua_rawset,
        "rawlen" => lua_rawlen,
        "rawequal" => lua_rawequal,
        "unpack" => lua_unpack,
        "collectgarbage" => lua_collectgarbage,
        "require" => super::package::lua_require,
        "load" => lua_load,
        "loadfile" => lua_loadfile,
        "dofile" => lua_dofile,
    })
    .with_value("_VERSION", |vm| vm.create_string("LuaX 5.4"))
}

/// print(...) - write the arguments to stdout, tab-separated
fn lua_print(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let mut parts = Vec::with_capacity(args.len());
    for a in args {
        parts.push(metamethod::tostring(vm, a)?);
    }
    println!("{}", parts.join("\t"));
    Ok(LuaValue::Nil)
}

/// type(v) - the type of a value as a string
fn lua_type(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    if args.is_empty() {
        return Err(vm.error("bad argument #1 to 'type' (value expected)".to_string()));
    }
    Ok(vm.create_string(args[0].type_name()))
}

/// assert(v [, message]) - raise message if v is false or nil
fn lua_assert(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let cond = arg(args, 1);
    if cond.is_truthy() {
        return Ok(LuaValue::Multi(Rc::new(args.to_vec())));
    }
    match args.get(1) {
        Some(msg) if !msg.is_nil() => Err(vm.raise(msg.clone())),
        _ => Err(vm.error("assertion failed!".to_string())),
    }
}

/// error(message [, level]) - raise an error value; string messages at
/// level >= 1 carry a position prefix
fn lua_error(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let value = arg(args, 1);
    let level = opt_int(args, 2, 1);
    if level >= 1 {
        if let Some(msg) = value.as_str() {
            let line = vm.current_line;
            let decorated = if line > 0 {
                format!("{}:{}: {}", vm.chunk_name, line, msg)
            } else {
                msg.to_string()
            };
            let v = vm.create_string(&decorated);
            return Err(vm.raise(v));
        }
    }
    Err(vm.raise(value))
}

/// tonumber(v [, base])
fn lua_tonumber(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let v = arg(args, 1);
    match args.get(1).filter(|b| !b.is_nil()) {
        None => Ok(match &v {
            LuaValue::Integer(_) | LuaValue::Float(_) => v.clone(),
            LuaValue::Str(s) => syntax::parse_number(s.as_str()).unwrap_or(LuaValue::Nil),
            _ => LuaValue::Nil,
        }),
        Some(base) => {
            let base = base.as_integer().unwrap_or(10);
            if !(2..=36).contains(&base) {
                return Err(
                    vm.error("bad argument #2 to 'tonumber' (base out of range)".to_string())
                );
            }
            let Some(s) = v.as_str() else {
                return Ok(LuaValue::Nil);
            };
            match i64::from_str_radix(s.trim(), base as u32) {
                Ok(i) => Ok(LuaValue::Integer(i)),
                Err(_) => Ok(LuaValue::Nil),
            }
        }
    }
}

/// tostring(v) - honours __tostring/__name
fn lua_tostring(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = metamethod::tostring(vm, &arg(args, 1))?;
    Ok(vm.create_string(&s))
}

/// select('#', ...) or select(n, ...)
fn lua_select(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let selector = arg(args, 1);
    let rest = &args[1.min(args.len())..];
    if selector.as_str() == Some("#") {
        return Ok(LuaValue::Integer(rest.len() as i64));
    }
    let n = selector
        .as_integer()
        .ok_or_else(|| vm.error("bad argument #1 to 'select' (number expected)".to_string()))?;
    let idx = if n < 0 {
        let from_end = rest.len() as i64 + n;
        if from_end < 0 {
            return Err(vm.error("bad argument #1 to 'select' (index out of range)".to_string()));
        }
        from_end as usize
    } else if n == 0 {
        return Err(vm.error("bad argument #1 to 'select' (index out of range)".to_string()));
    } else {
        (n - 1) as usize
    };
    let picked: Vec<LuaValue> = rest.iter().skip(idx).cloned().collect();
    Ok(LuaValue::Multi(Rc::new(picked)))
}

fn ipairs_iter(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "ipairs iterator")?;
    let i = opt_int(args, 2, 0) + 1;
    let v = t.borrow().get_int(i);
    match v {
        Some(v) => Ok(LuaValue::Multi(Rc::new(vec![LuaValue::Integer(i), v]))),
        None => Ok(LuaValue::Nil),
    }
}

/// ipairs(t) - (iterator, t, 0) packed as a triple
fn lua_ipairs(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = arg(args, 1);
    Ok(vm.pack_values(&[LuaValue::NativeFn(ipairs_iter), t, LuaValue::Integer(0)]))
}

/// pairs(t) - (next, t, nil) packed as a triple
fn lua_pairs(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = arg(args, 1);
    Ok(vm.pack_values(&[LuaValue::NativeFn(lua_next), t, LuaValue::Nil]))
}

/// next(t [, key])
fn lua_next(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "next")?;
    let key = arg(args, 2);
    let entry = t.borrow().next(&key);
    match entry {
        Some((k, v)) => Ok(LuaValue::Multi(Rc::new(vec![k, v]))),
        None => Ok(LuaValue::Nil),
    }
}

/// pcall(f, ...) - protected call
fn lua_pcall(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let f = arg(args, 1);
    let rest: Vec<LuaValue> = args.iter().skip(1).cloned().collect();
    let (ok, result) = protected_call(vm, &f, rest)?;
    let mut out = vec![LuaValue::Boolean(ok)];
    out.extend(result.spread());
    Ok(LuaValue::Multi(Rc::new(out)))
}

/// xpcall(f, handler, ...) - protected call with an error handler
fn lua_xpcall(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let f = arg(args, 1);
    let handler = arg(args, 2);
    let rest: Vec<LuaValue> = args.iter().skip(2).cloned().collect();
    let (ok, result) = protected_call(vm, &f, rest)?;
    if ok {
        let mut out = vec![LuaValue::Boolean(true)];
        out.extend(result.spread());
        return Ok(LuaValue::Multi(Rc::new(out)));
    }
    let handled = call_any(vm, &handler, vec![result])?.first();
    Ok(LuaValue::Multi(Rc::new(vec![
        LuaValue::Boolean(false),
        handled,
    ])))
}

/// getmetatable(v) - honours the __metatable protection field
fn lua_getmetatable(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let v = arg(args, 1);
    let Some(mt) = metamethod::raw_metatable(&v) else {
        return Ok(LuaValue::Nil);
    };
    if let Some(protection) = metamethod::get_metamethod(&v, "__metatable") {
        return Ok(protection);
    }
    Ok(mt)
}

/// setmetatable(t, mt) - fails on protected metatables
fn lua_setmetatable(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "setmetatable")?;
    let mt = arg(args, 2);
    let target = arg(args, 1);
    if metamethod::get_metamethod(&target, "__metatable").is_some() {
        return Err(vm.error("cannot change a protected metatable".to_string()));
    }
    match &mt {
        LuaValue::Nil => t.borrow_mut().set_metatable(None),
        LuaValue::Table(_) => t.borrow_mut().set_metatable(Some(mt.clone())),
        other => {
            return Err(vm.error(format!(
                "bad argument #2 to 'setmetatable' (nil or table expected, got {})",
                other.type_name()
            )));
        }
    }
    Ok(target)
}

/// rawget(t, k) - read without metamethods
fn lua_rawget(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "rawget")?;
    let k = arg(args, 2);
    let v = t.borrow().raw_get(&k);
    Ok(v.unwrap_or(LuaValue::Nil))
}

/// rawset(t, k, v) - write without metamethods
fn lua_rawset(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "rawset")?;
    let k = arg(args, 2);
    let v = arg(args, 3);
    t.borrow_mut()
        .raw_set(k, v)
        .map_err(|e| vm.error(e.message().to_string()))?;
    Ok(arg(args, 1))
}

/// rawlen(v) - length without metamethods
fn lua_rawlen(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    match arg(args, 1) {
        LuaValue::Str(s) => Ok(LuaValue::Integer(s.len() as i64)),
        LuaValue::Table(t) => Ok(LuaValue::Integer(t.borrow().border())),
        other => Err(vm.error(format!(
            "bad argument #1 to 'rawlen' (table or string expected, got {})",
            other.type_name()
        ))),
    }
}

/// rawequal(a, b) - equality without metamethods
fn lua_rawequal(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Boolean(arg(args, 1).raw_equals(&arg(args, 2))))
}

/// unpack(list [, i [, j]]) - spread a sequence into a multi-return
pub fn lua_unpack(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let t = check_table(vm, args, 1, "unpack")?;
    let i = opt_int(args, 2, 1);
    let j = match args.get(2).filter(|v| !v.is_nil()) {
        Some(v) => v
            .as_integer()
            .ok_or_else(|| vm.error("bad argument #3 to 'unpack' (number expected)".to_string()))?,
        None => t.borrow().border(),
    };
    if j - i >= 1_000_000 {
        return Err(vm.error("too many results to unpack".to_string()));
    }
    let mut out = Vec::new();
    for idx in i..=j {
        let v = t.borrow().raw_get(&LuaValue::Integer(idx));
        out.push(v.unwrap_or(LuaValue::Nil));
    }
    Ok(LuaValue::Multi(Rc::new(out)))
}

/// collectgarbage([opt]) - placeholder collector shim
fn lua_collectgarbage(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let opt = arg(args, 1);
    match opt.as_str().unwrap_or("collect") {
        "count" => Ok(LuaValue::Float(0.0)),
        "collect" | "step" | "stop" | "restart" | "incremental" | "generational" => {
            Ok(LuaValue::Integer(0))
        }
        "isrunning" => Ok(LuaValue::Boolean(true)),
        other => Err(vm.error(format!(
            "bad argument #1 to 'collectgarbage' (invalid option '{}')",
            other
        ))),
    }
}

fn compile_chunk(vm: &mut LuaVM, source: &str, chunk_name: &str) -> LuaResult<LuaValue> {
    match syntax::parse(source, chunk_name) {
        Ok(block) => {
            let proto = Rc::new(FuncBody {
                params: Vec::new(),
                is_vararg: true,
                body: block,
                line: 0,
            });
            Ok(LuaValue::Function(Rc::new(LuaFunction {
                proto,
                env: vm.root_env(),
            })))
        }
        Err(msg) => {
            let m = vm.create_string(&msg);
            Ok(LuaValue::Multi(Rc::new(vec![LuaValue::Nil, m])))
        }
    }
}

/// load(chunk [, chunkname]) - compile a string into a callable
fn lua_load(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let source = check_str(vm, args, 1, "load")?;
    let name = args
        .get(1)
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "=(load)".to_string());
    compile_chunk(vm, &source, &name)
}

/// loadfile(path) - compile a file into a callable
fn lua_loadfile(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let path = check_str(vm, args, 1, "loadfile")?;
    match std::fs::read_to_string(&path) {
        Ok(source) => compile_chunk(vm, &source, &path),
        Err(e) => {
            let m = vm.create_string(&format!("cannot open {}: {}", path, e));
            Ok(LuaValue::Multi(Rc::new(vec![LuaValue::Nil, m])))
        }
    }
}

/// dofile(path) - compile and run a file
fn lua_dofile(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let loaded = lua_loadfile(vm, args)?;
    let f = loaded.clone().first();
    if f.is_nil() {
        let parts = loaded.spread();
        let msg = parts.get(1).cloned().unwrap_or(LuaValue::Nil);
        return Err(vm.raise(msg));
    }
    call_any(vm, &f, Vec::new())
}
