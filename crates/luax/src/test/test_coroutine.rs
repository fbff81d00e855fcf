// Tests for the coroutine engine
use super::run;

#[test]
fn test_create_resume_return() {
    run(r#"
        local co = coroutine.create(function() return 42 end)
        assert(type(co) == "thread")
        local ok, value = coroutine.resume(co)
        assert(ok == true)
        assert(value == 42)
        assert(coroutine.status(co) == "dead")
    "#);
}

#[test]
fn test_yield_sequence() {
    run(r#"
        local co = coroutine.create(function()
            coroutine.yield(1)
            coroutine.yield(2)
            return 3
        end)
        local ok1, v1 = coroutine.resume(co)
        assert(ok1 == true and v1 == 1)
        local ok2, v2 = coroutine.resume(co)
        assert(ok2 == true and v2 == 2)
        local ok3, v3 = coroutine.resume(co)
        assert(ok3 == true and v3 == 3)
        assert(coroutine.status(co) == "dead")
        local ok4 = coroutine.resume(co)
        assert(ok4 == false)
    "#);
}

#[test]
fn test_arguments_flow_both_ways() {
    run(r#"
        local co = coroutine.create(function(a)
            coroutine.yield(a + 1)
            coroutine.yield(a + 2)
            return a + 3
        end)
        local _, x = coroutine.resume(co, 10)
        local _, y = coroutine.resume(co)
        local _, z = coroutine.resume(co)
        assert(x == 11 and y == 12 and z == 13)
    "#);
}

#[test]
fn test_resume_values_become_yield_result() {
    run(r#"
        local co = coroutine.create(function()
            local got = coroutine.yield("first")
            return "saw:" .. got
        end)
        local _, out = coroutine.resume(co)
        assert(out == "first")
        local ok, final = coroutine.resume(co, "reply")
        assert(ok == true)
        assert(final == "saw:reply")
    "#);
}

#[test]
fn test_locals_survive_yield() {
    run(r#"
        local co = coroutine.create(function()
            local a, b = 1, 2
            coroutine.yield()
            assert(a == 1 and b == 2)
            a = a + 10
            coroutine.yield()
            return a + b
        end)
        coroutine.resume(co)
        coroutine.resume(co)
        local ok, sum = coroutine.resume(co)
        assert(ok == true and sum == 13)
    "#);
}

#[test]
fn test_yield_inside_loop() {
    run(r#"
        local co = coroutine.create(function()
            local s = 0
            for i = 1, 3 do
                s = s + i
                coroutine.yield(s)
            end
            return s
        end)
        local _, a = coroutine.resume(co)
        local _, b = coroutine.resume(co)
        local _, c = coroutine.resume(co)
        local ok, final = coroutine.resume(co)
        assert(a == 1 and b == 3 and c == 6)
        assert(ok == true and final == 6)
        assert(coroutine.status(co) == "dead")
    "#);
}

#[test]
fn test_yield_inside_while_loop() {
    run(r#"
        local co = coroutine.create(function()
            local n = 0
            while n < 3 do
                n = n + 1
                coroutine.yield(n)
            end
            return "done"
        end)
        local _, a = coroutine.resume(co)
        local _, b = coroutine.resume(co)
        local _, c = coroutine.resume(co)
        local _, d = coroutine.resume(co)
        assert(a == 1 and b == 2 and c == 3 and d == "done")
    "#);
}

#[test]
fn test_yield_from_nested_call() {
    run(r#"
        local function helper(x)
            coroutine.yield("from helper " .. x)
            return x * 2
        end
        local co = coroutine.create(function()
            local doubled = helper(21)
            return doubled
        end)
        local _, msg = coroutine.resume(co)
        assert(msg == "from helper 21")
        local ok, result = coroutine.resume(co)
        assert(ok == true and result == 42)
    "#);
}

#[test]
fn test_status_machine() {
    run(r#"
        local co
        co = coroutine.create(function()
            assert(coroutine.status(co) == "running")
            coroutine.yield()
        end)
        assert(coroutine.status(co) == "suspended")
        coroutine.resume(co)
        assert(coroutine.status(co) == "suspended")
        coroutine.resume(co)
        assert(coroutine.status(co) == "dead")
    "#);
}

#[test]
fn test_running_and_isyieldable() {
    run(r#"
        assert(coroutine.running() == nil)
        assert(coroutine.isyieldable() == false)
        local co
        co = coroutine.create(function()
            assert(coroutine.running() == co)
            assert(coroutine.isyieldable() == true)
        end)
        local ok = coroutine.resume(co)
        assert(ok == true)
    "#);
}

#[test]
fn test_nested_coroutines_and_normal_status() {
    run(r#"
        local outer
        local inner = coroutine.create(function()
            assert(coroutine.status(outer) == "normal")
            coroutine.yield("inner-yield")
        end)
        outer = coroutine.create(function()
            local ok, v = coroutine.resume(inner)
            assert(ok == true and v == "inner-yield")
            return "outer-done"
        end)
        local ok, v = coroutine.resume(outer)
        assert(ok == true and v == "outer-done")
    "#);
}

#[test]
fn test_error_in_coroutine_reported_to_resumer() {
    run(r#"
        local co = coroutine.create(function()
            error("inside")
        end)
        local ok, err = coroutine.resume(co)
        assert(ok == false)
        assert(type(err) == "string")
        assert(coroutine.status(co) == "dead")
    "#);
}

#[test]
fn test_yield_outside_coroutine_raises() {
    run(r#"
        local ok, err = pcall(function() coroutine.yield(1) end)
        assert(ok == false)
    "#);
}

#[test]
fn test_wrap_returns_values_and_rethrows() {
    run(r#"
        local f = coroutine.wrap(function()
            coroutine.yield(1)
            coroutine.yield(2)
            return 3
        end)
        assert(f() == 1)
        assert(f() == 2)
        assert(f() == 3)

        local g = coroutine.wrap(function() error("wrapped") end)
        local ok = pcall(g)
        assert(ok == false)
    "#);
}

#[test]
fn test_wrap_passes_arguments() {
    run(r#"
        local f = coroutine.wrap(function(a, b)
            local c = coroutine.yield(a + b)
            return c * 2
        end)
        assert(f(2, 3) == 5)
        assert(f(10) == 20)
    "#);
}

#[test]
fn test_close_coroutine() {
    run(r#"
        local co = coroutine.create(function()
            coroutine.yield()
        end)
        coroutine.resume(co)
        assert(coroutine.close(co) == true)
        assert(coroutine.status(co) == "dead")
    "#);
}

#[test]
fn test_coroutine_with_multiple_yield_values() {
    run(r#"
        local co = coroutine.create(function()
            coroutine.yield(1, 2, 3)
            return "end"
        end)
        local ok, a, b, c = coroutine.resume(co)
        assert(ok and a == 1 and b == 2 and c == 3)
    "#);
}

#[test]
fn test_generator_pattern() {
    run(r#"
        local function counter(limit)
            return coroutine.wrap(function()
                for i = 1, limit do
                    coroutine.yield(i)
                end
            end)
        end
        local sum = 0
        for v in counter(4) do sum = sum + v end
        assert(sum == 10)
    "#);
}
