// Tests for calls, multi-return and varargs
use super::{eval, run};
use crate::LuaValue;

#[test]
fn test_multi_return_in_assignment() {
    run(r#"
        local function f() return 1, 2, 3 end
        local a, b, c, d = f()
        assert(a == 1 and b == 2 and c == 3 and d == nil)
        assert(a + b + c + (d or 0) == 6)
    "#);
}

#[test]
fn test_multi_return_truncated_mid_list() {
    run(r#"
        local function f() return 1, 2, 3 end
        local a, b = f(), 10
        assert(a == 1 and b == 10)
    "#);
}

#[test]
fn test_multi_return_spreads_in_tail_position() {
    run(r#"
        local function f() return 1, 2 end
        local function g(...) return select('#', ...) end
        assert(g(f()) == 2)
        assert(g(0, f()) == 3)
        assert(g(f(), 0) == 2)
    "#);
}

#[test]
fn test_parentheses_truncate_multi() {
    run(r#"
        local function f() return 1, 2 end
        local function count(...) return select('#', ...) end
        assert(count((f())) == 1)
    "#);
}

#[test]
fn test_return_forwards_multi() {
    run(r#"
        local function f() return 1, 2, 3 end
        local function g() return f() end
        local a, b, c = g()
        assert(a == 1 and b == 2 and c == 3)
    "#);
}

#[test]
fn test_vararg_basics() {
    run(r#"
        local function f(...)
            local a, b = ...
            return a + b
        end
        assert(f(3, 4) == 7)
        assert(f(3, 4, 5) == 7)
    "#);
}

#[test]
fn test_vararg_count_and_pack() {
    run(r#"
        local function count(...) return select('#', ...) end
        assert(count() == 0)
        assert(count(nil) == 1)
        assert(count(1, 2, 3) == 3)

        local function packed(...) return table.pack(...) end
        local p = packed("a", "b")
        assert(p.n == 2 and p[1] == "a" and p[2] == "b")
    "#);
}

#[test]
fn test_vararg_after_named_params() {
    run(r#"
        local function f(first, ...)
            local rest = table.pack(...)
            return first, rest.n
        end
        local head, n = f(1, 2, 3, 4)
        assert(head == 1 and n == 3)
    "#);
}

#[test]
fn test_vararg_expansion_in_table() {
    run(r#"
        local function f(...) return {...} end
        local t = f(7, 8, 9)
        assert(#t == 3 and t[1] == 7 and t[3] == 9)
    "#);
}

#[test]
fn test_select_negative_index() {
    run(r#"
        assert(select(-1, "a", "b", "c") == "c")
        assert(select(2, "a", "b", "c") == "b")
    "#);
}

#[test]
fn test_parameters_pad_with_nil() {
    run(r#"
        local function f(a, b, c) return c end
        assert(f(1) == nil)
        assert(f(1, 2, 3) == 3)
    "#);
}

#[test]
fn test_method_definition_statement() {
    run(r#"
        local obj = {count = 0}
        function obj:bump(by)
            self.count = self.count + (by or 1)
            return self.count
        end
        assert(obj:bump() == 1)
        assert(obj:bump(5) == 6)

        local ns = {inner = {}}
        function ns.inner.helper(x) return x * 2 end
        assert(ns.inner.helper(21) == 42)
    "#);
}

#[test]
fn test_call_depth_guard() {
    run(r#"
        local function loop(n) return loop(n + 1) end
        local ok, err = pcall(loop, 1)
        assert(ok == false)
    "#);
}

#[test]
fn test_chunk_return_value() {
    assert_eq!(eval("return 41 + 1"), LuaValue::Integer(42));
    assert_eq!(
        eval("local function f() return 'x' end return f()"),
        LuaValue::Str(std::rc::Rc::new(crate::LuaString::new("x".to_string())))
    );
}
