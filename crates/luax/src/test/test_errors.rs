// Tests for error raising, protected calls and unwinding
use super::run;

#[test]
fn test_pcall_success() {
    run(r#"
        local ok, a, b = pcall(function() return 1, 2 end)
        assert(ok == true and a == 1 and b == 2)
    "#);
}

#[test]
fn test_pcall_catches_error() {
    run(r#"
        local ok, err = pcall(function() error("boom") end)
        assert(ok == false)
        assert(type(err) == "string")
        assert(string.sub(err, -4) == "boom")
    "#);
}

#[test]
fn test_pcall_never_propagates() {
    run(r#"
        local reached = false
        pcall(function() error("ignored") end)
        reached = true
        assert(reached)
    "#);
}

#[test]
fn test_error_with_non_string_value() {
    run(r#"
        local sentinel = {code = 404}
        local ok, err = pcall(function() error(sentinel) end)
        assert(ok == false)
        assert(err == sentinel)
        assert(err.code == 404)
    "#);
}

#[test]
fn test_error_level_zero_undecorated() {
    run(r#"
        local ok, err = pcall(function() error("plain", 0) end)
        assert(ok == false)
        assert(err == "plain")
    "#);
}

#[test]
fn test_xpcall_handler_transforms_error() {
    run(r#"
        local ok, out = xpcall(function()
            error("original")
        end, function(err)
            return "handled:" .. err
        end)
        assert(ok == false)
        assert(string.sub(out, 1, 8) == "handled:")
    "#);
}

#[test]
fn test_xpcall_success_passes_through() {
    run(r#"
        local ok, v = xpcall(function() return 7 end, function() return "unused" end)
        assert(ok == true and v == 7)
    "#);
}

#[test]
fn test_nested_pcall() {
    run(r#"
        local ok_outer, result = pcall(function()
            local ok_inner, err = pcall(function() error("inner") end)
            assert(ok_inner == false)
            return "survived"
        end)
        assert(ok_outer == true and result == "survived")
    "#);
}

#[test]
fn test_runtime_type_errors_are_catchable() {
    run(r#"
        local ok1 = pcall(function() return nil + 1 end)
        local ok2 = pcall(function() return {} < {} end)
        local ok3 = pcall(function() local x; return x.field end)
        assert(ok1 == false and ok2 == false and ok3 == false)
    "#);
}

#[test]
fn test_assert_passes_values_through() {
    run(r#"
        local a, b = assert(1, 2)
        assert(a == 1 and b == 2)
        local ok, err = pcall(function() assert(false, "custom") end)
        assert(ok == false and err == "custom")
        local ok2, err2 = pcall(function() assert(nil) end)
        assert(ok2 == false)
    "#);
}

#[test]
fn test_error_inside_loop_closes_and_unwinds() {
    run(r#"
        local cleaned = false
        local ok = pcall(function()
            for i = 1, 10 do
                local guard <close> = setmetatable({}, {__close = function()
                    cleaned = true
                end})
                if i == 1 then error("stop") end
            end
        end)
        assert(ok == false)
        assert(cleaned == true)
    "#);
}

#[test]
fn test_top_level_error_reported() {
    let mut vm = crate::LuaVM::new();
    vm.open_libs().expect("stdlib");
    let result = vm.execute("error('unhandled')");
    assert!(result.is_err());
    let msg = vm.error_message();
    assert!(msg.contains("unhandled"), "got: {}", msg);
}

#[test]
fn test_parse_error_is_reported() {
    let mut vm = crate::LuaVM::new();
    vm.open_libs().expect("stdlib");
    let result = vm.execute("local = 5");
    assert!(result.is_err());
}
