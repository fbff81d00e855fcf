// Tests for require and the package core
use super::run;

#[test]
fn test_preload_searcher() {
    run(r#"
        package.preload["answer"] = function(name)
            return {name = name, value = 42}
        end
        local m = require("answer")
        assert(m.value == 42)
        assert(m.name == "answer")
    "#);
}

#[test]
fn test_loaded_cache_returns_same_module() {
    run(r#"
        local builds = 0
        package.preload["cached"] = function()
            builds = builds + 1
            return {tag = "cached"}
        end
        local a = require("cached")
        local b = require("cached")
        assert(a == b)
        assert(builds == 1)
        assert(package.loaded["cached"] == a)
    "#);
}

#[test]
fn test_loader_returning_nil_caches_true() {
    run(r#"
        package.preload["sideonly"] = function() end
        local m = require("sideonly")
        assert(m == true)
        assert(package.loaded["sideonly"] == true)
    "#);
}

#[test]
fn test_missing_module_aggregates_searcher_messages() {
    run(r#"
        local ok, err = pcall(require, "definitely_not_a_real_module_xyz")
        assert(ok == false)
        assert(type(err) == "string")
    "#);
}

#[test]
fn test_stdlib_registered_in_loaded() {
    run(r#"
        assert(package.loaded["math"] == math)
        assert(package.loaded["string"] == string)
        assert(package.loaded["table"] == table)
        assert(require("math") == math)
    "#);
}

#[test]
fn test_searchers_table_shape() {
    run(r#"
        assert(type(package.searchers) == "table")
        assert(#package.searchers >= 3)
        assert(type(package.searchers[1]) == "function")
        assert(type(package.path) == "string")
        assert(type(package.cpath) == "string")
    "#);
}

#[test]
fn test_custom_searcher() {
    run(r#"
        table.insert(package.searchers, 1, function(name)
            if name == "virtual.mod" then
                return {function(n, extra)
                    return {loaded_as = n, extra = extra}
                end, "synthetic"}
            end
            return "\n\tnot virtual"
        end)
        local m = require("virtual.mod")
        assert(m.loaded_as == "virtual.mod")
        assert(m.extra == "synthetic")
    "#);
}

#[test]
fn test_file_searcher_loads_from_disk() {
    let dir = std::env::temp_dir().join(format!("luax_pkg_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("tmp dir");
    let module_path = dir.join("diskmod.lua");
    std::fs::write(&module_path, "return { from_disk = true }").expect("write module");

    let mut vm = crate::LuaVM::new();
    vm.open_libs().expect("stdlib");
    let script = format!(
        r#"
            package.path = "{}/?.lua;" .. package.path
            local m = require("diskmod")
            assert(m.from_disk == true)
        "#,
        dir.display()
    );
    let result = vm.execute(&script);
    let _ = std::fs::remove_dir_all(&dir);
    if result.is_err() {
        panic!("script failed: {}", vm.error_message());
    }
}

#[test]
fn test_searchpath() {
    run(r#"
        local found, err = package.searchpath("no_such_mod", "./?.lua")
        assert(found == nil)
        assert(type(err) == "string")
    "#);
}

#[test]
fn test_loadlib_reports_unsupported() {
    run(r#"
        local f, err = package.loadlib("x.so", "luaopen_x")
        assert(f == nil)
        assert(type(err) == "string")
    "#);
}
