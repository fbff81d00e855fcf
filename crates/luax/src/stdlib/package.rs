// Package library
// Implements: loaded, preload, searchers, path, cpath, searchpath, loadlib
// and require(). Searchers return either a diagnostic string or a table
// whose first element is the loader and whose tail is extra loader
// arguments (conventionally the resolved path).

use super::{arg, check_str};
use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaFunction, LuaValue};
use crate::lua_vm::{call_any, LuaResult, LuaVM};
use crate::syntax::{self, ast::FuncBody};
use std::rc::Rc;

pub fn create_package_lib() -> LibraryModule {
    crate::lib_module!("package", {
        "loadlib" => package_loadlib,
        "searchpath" => package_searchpath,
    })
    .with_initializer(init_package_fields)
}

const DEFAULT_PATH: &str = "?.lua;?/init.lua;./?.lua;./?/init.lua;\
/usr/local/share/lua/5.4/?.lua;/usr/local/share/lua/5.4/?/init.lua;\
/usr/share/lua/5.4/?.lua;/usr/share/lua/5.4/?/init.lua";

const DEFAULT_CPATH: &str = "./?.so;./?.dll;./?.dylib";

/// `LUA_PATH`/`LUA_CPATH` form the primary segment when set; the default
/// template list is appended after it.
fn resolve_path(env_var: &str, default: &str) -> String {
    match std::env::var(env_var) {
        Ok(v) if !v.is_empty() => format!("{};{}", v, default),
        _ => default.to_string(),
    }
}

fn init_package_fields(vm: &mut LuaVM) -> LuaResult<()> {
    let package = vm
        .get_global("package")
        .ok_or_else(|| vm.error("package table not found".to_string()))?;
    let Some(pkg) = package.as_table().cloned() else {
        return Err(vm.error("package must be a table".to_string()));
    };

    let loaded = vm.new_table();
    let preload = vm.new_table();
    let path = resolve_path("LUA_PATH", DEFAULT_PATH);
    let cpath = resolve_path("LUA_CPATH", DEFAULT_CPATH);
    let path_value = vm.create_string(&path);
    let cpath_value = vm.create_string(&cpath);

    let searchers = vm.new_table();
    if let Some(s) = searchers.as_table() {
        let mut s = s.borrow_mut();
        s.set_int(1, LuaValue::NativeFn(searcher_preload));
        s.set_int(2, LuaValue::NativeFn(searcher_file));
        s.set_int(3, LuaValue::NativeFn(searcher_clib));
    }

    for (key, value) in [
        ("loaded", loaded),
        ("preload", preload),
        ("path", path_value),
        ("cpath", cpath_value),
        ("searchers", searchers),
    ] {
        let k = vm.create_string(key);
        pkg.borrow_mut()
            .raw_set(k, value)
            .map_err(|e| vm.error(e.message().to_string()))?;
    }
    Ok(())
}

fn package_field(vm: &mut LuaVM, name: &str) -> Option<LuaValue> {
    let pkg = vm.get_global("package")?;
    let t = pkg.as_table()?.clone();
    let key = vm.create_string(name);
    let v = t.borrow().raw_get(&key);
    v
}

// Searcher 1: package.preload[name]
fn searcher_preload(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let name = arg(args, 1);
    let preload = package_field(vm, "preload").unwrap_or(LuaValue::Nil);
    let loader = preload
        .as_table()
        .and_then(|t| t.borrow().raw_get(&name))
        .unwrap_or(LuaValue::Nil);
    if loader.is_nil() {
        let modname = name.as_str().unwrap_or("?");
        return Ok(vm.create_string(&format!(
            "\n\tno field package.preload['{}']",
            modname
        )));
    }
    let tag = vm.create_string(":preload:");
    Ok(vm.pack_values(&[loader, tag]))
}

/// Template expansion: every `?` in every `;`-separated template becomes
/// the module name with dots mapped to directory separators.
fn search_templates(name: &str, path: &str) -> Result<String, String> {
    let searchname = name.replace('.', "/");
    let mut missing = String::new();
    for template in path.split(';').filter(|t| !t.is_empty()) {
        let filepath = template.replace('?', &searchname);
        if std::path::Path::new(&filepath).exists() {
            return Ok(filepath);
        }
        missing.push_str("\n\tno file '");
        missing.push_str(&filepath);
        missing.push('\'');
    }
    Err(missing)
}

// Searcher 2: Lua files through package.path
fn searcher_file(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let name = check_str(vm, args, 1, "searcher")?;
    let path = package_field(vm, "path")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| DEFAULT_PATH.to_string());
    match search_templates(&name, &path) {
        Ok(filepath) => {
            let p = vm.create_string(&filepath);
            Ok(vm.pack_values(&[LuaValue::NativeFn(file_loader), p]))
        }
        Err(missing) => Ok(vm.create_string(&missing)),
    }
}

// Searcher 3: native libraries through package.cpath. Dynamic-symbol
// loading is an external collaborator; this searcher only reports what it
// looked at.
fn searcher_clib(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let name = check_str(vm, args, 1, "searcher")?;
    let cpath = package_field(vm, "cpath")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| DEFAULT_CPATH.to_string());
    match search_templates(&name, &cpath) {
        Ok(filepath) => Ok(vm.create_string(&format!(
            "\n\tdynamic loading of '{}' is not supported",
            filepath
        ))),
        Err(missing) => Ok(vm.create_string(&missing)),
    }
}

/// Loader for Lua files, invoked as `loader(modname, filepath)`.
fn file_loader(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let filepath = check_str(vm, args, 2, "module loader")?;
    let source = std::fs::read_to_string(&filepath)
        .map_err(|e| vm.error(format!("cannot open file '{}': {}", filepath, e)))?;
    let chunkname = format!("@{}", filepath);
    let block = match syntax::parse(&source, &chunkname) {
        Ok(b) => b,
        Err(msg) => return Err(vm.error(msg)),
    };
    let proto = Rc::new(FuncBody {
        params: Vec::new(),
        is_vararg: true,
        body: block,
        line: 0,
    });
    let chunk = LuaValue::Function(Rc::new(LuaFunction {
        proto,
        env: vm.root_env(),
    }));
    call_any(vm, &chunk, args.to_vec())
}

/// require(name): the loaded cache, then each searcher in order.
pub fn lua_require(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let name = arg(args, 1);
    let modname = check_str(vm, args, 1, "require")?;

    let loaded = package_field(vm, "loaded").unwrap_or(LuaValue::Nil);
    let Some(loaded) = loaded.as_table().cloned() else {
        return Err(vm.error("package.loaded is not a table".to_string()));
    };
    if let Some(cached) = loaded.borrow().raw_get(&name) {
        return Ok(cached);
    }

    let searchers = package_field(vm, "searchers").unwrap_or(LuaValue::Nil);
    let Some(searchers) = searchers.as_table().cloned() else {
        return Err(vm.error("package.searchers is not a table".to_string()));
    };

    let mut errors = String::new();
    let count = searchers.borrow().border();
    for idx in 1..=count {
        let searcher = searchers
            .borrow()
            .get_int(idx)
            .unwrap_or(LuaValue::Nil);
        if searcher.is_nil() {
            break;
        }
        let result = call_any(vm, &searcher, vec![name.clone()])?.first();
        match &result {
            // a diagnostic string accumulates into the failure report
            LuaValue::Str(s) => errors.push_str(s.as_str()),
            LuaValue::Table(t) => {
                let loader = t.borrow().get_int(1).unwrap_or(LuaValue::Nil);
                if loader.is_nil() {
                    continue;
                }
                let mut loader_args = vec![name.clone()];
                let extras = t.borrow().border();
                for i in 2..=extras {
                    loader_args.push(t.borrow().get_int(i).unwrap_or(LuaValue::Nil));
                }
                let value = call_any(vm, &loader, loader_args)?.first();
                let module = if value.is_nil() {
                    LuaValue::Boolean(true)
                } else {
                    value
                };
                loaded
                    .borrow_mut()
                    .raw_set(name.clone(), module.clone())
                    .map_err(|e| vm.error(e.message().to_string()))?;
                return Ok(module);
            }
            _ => {}
        }
    }
    Err(vm.error(format!("module not found: {}\n{}", modname, errors)))
}

fn package_loadlib(vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<LuaValue> {
    let err = vm.create_string("loadlib not supported");
    Ok(LuaValue::Multi(Rc::new(vec![LuaValue::Nil, err])))
}

/// package.searchpath(name, path [, sep [, rep]])
fn package_searchpath(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let name = check_str(vm, args, 1, "searchpath")?;
    let path = check_str(vm, args, 2, "searchpath")?;
    let sep = args
        .get(2)
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| ".".to_string());
    let rep = args
        .get(3)
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "/".to_string());
    let searchname = name.replace(&sep, &rep);
    let mut missing = String::new();
    for template in path.split(';').filter(|t| !t.is_empty()) {
        let filepath = template.replace('?', &searchname);
        if std::path::Path::new(&filepath).exists() {
            return Ok(vm.create_string(&filepath));
        }
        missing.push_str("\n\tno file '");
        missing.push_str(&filepath);
        missing.push('\'');
    }
    let err = vm.create_string(&missing);
    Ok(LuaValue::Multi(Rc::new(vec![LuaValue::Nil, err])))
}
