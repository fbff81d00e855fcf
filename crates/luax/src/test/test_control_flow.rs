// Tests for the statement executor: loops, goto, break, repeat
use super::run;

#[test]
fn test_if_elseif_else() {
    run(r#"
        local function classify(n)
            if n < 0 then return "neg"
            elseif n == 0 then return "zero"
            elseif n < 10 then return "small"
            else return "big" end
        end
        assert(classify(-5) == "neg")
        assert(classify(0) == "zero")
        assert(classify(5) == "small")
        assert(classify(50) == "big")
    "#);
}

#[test]
fn test_while_loop() {
    run(r#"
        local n, sum = 1, 0
        while n <= 10 do
            sum = sum + n
            n = n + 1
        end
        assert(sum == 55)
    "#);
}

#[test]
fn test_while_break() {
    run(r#"
        local i = 0
        while true do
            i = i + 1
            if i == 5 then break end
        end
        assert(i == 5)
    "#);
}

#[test]
fn test_repeat_until_sees_body_locals() {
    run(r#"
        local tries = 0
        repeat
            tries = tries + 1
            local done = tries >= 3
        until done
        assert(tries == 3)
    "#);
}

#[test]
fn test_numeric_for_basic() {
    run(r#"
        local sum = 0
        for i = 1, 5 do sum = sum + i end
        assert(sum == 15)
        local down = {}
        for i = 3, 1, -1 do down[#down + 1] = i end
        assert(down[1] == 3 and down[3] == 1)
    "#);
}

#[test]
fn test_numeric_for_float_step() {
    run(r#"
        local count = 0
        for i = 1, 2, 0.5 do count = count + 1 end
        assert(count == 3)
    "#);
}

#[test]
fn test_numeric_for_zero_trip() {
    run(r#"
        local hits = 0
        for i = 5, 1 do hits = hits + 1 end
        assert(hits == 0)
    "#);
}

#[test]
fn test_numeric_for_step_zero_skips() {
    // step 0 emits a stderr diagnostic and runs zero iterations
    run(r#"
        local hits = 0
        for i = 1, 10, 0 do hits = hits + 1 end
        assert(hits == 0)
    "#);
}

#[test]
fn test_numeric_for_evaluates_bounds_once() {
    run(r#"
        local calls = 0
        local function limit() calls = calls + 1 return 3 end
        local sum = 0
        for i = 1, limit() do sum = sum + i end
        assert(sum == 6)
        assert(calls == 1)
    "#);
}

#[test]
fn test_generic_for_over_pairs_and_ipairs() {
    run(r#"
        local t = {10, 20, 30}
        local s = 0
        for _, v in ipairs(t) do s = s + v end
        assert(s == 60)

        local keys = 0
        for k in pairs({a = 1, b = 2, c = 3}) do keys = keys + 1 end
        assert(keys == 3)
    "#);
}

#[test]
fn test_generic_for_custom_iterator() {
    run(r#"
        local function range(n)
            local i = 0
            return function()
                i = i + 1
                if i <= n then return i end
            end
        end
        local sum = 0
        for v in range(4) do sum = sum + v end
        assert(sum == 10)
    "#);
}

#[test]
fn test_generic_for_stateless_protocol() {
    run(r#"
        local function iter(state, ctrl)
            if ctrl < state then return ctrl + 1, (ctrl + 1) * 10 end
        end
        local total = 0
        for i, v in iter, 3, 0 do total = total + v end
        assert(total == 60)
    "#);
}

#[test]
fn test_goto_forward() {
    run(r#"
        local reached = false
        do
            goto skip
            reached = true
            ::skip::
        end
        assert(reached == false)
    "#);
}

#[test]
fn test_goto_continue_pattern() {
    run(r#"
        local sum = 0
        for i = 1, 5 do
            if i % 2 == 0 then goto continue end
            sum = sum + i
            ::continue::
        end
        assert(sum == 9)
    "#);
}

#[test]
fn test_goto_backward() {
    run(r#"
        local i = 0
        ::top::
        i = i + 1
        if i < 3 then goto top end
        assert(i == 3)
    "#);
}

#[test]
fn test_goto_out_of_nested_blocks() {
    run(r#"
        local path = {}
        do
            do
                path[#path + 1] = "inner"
                goto done
            end
            path[#path + 1] = "unreachable"
        end
        ::done::
        path[#path + 1] = "after"
        assert(#path == 2)
        assert(path[1] == "inner" and path[2] == "after")
    "#);
}

#[test]
fn test_break_only_exits_innermost_loop() {
    run(r#"
        local outer_iters = 0
        for i = 1, 3 do
            outer_iters = outer_iters + 1
            for j = 1, 10 do
                if j == 2 then break end
            end
        end
        assert(outer_iters == 3)
    "#);
}

#[test]
fn test_return_unwinds_loops() {
    run(r#"
        local function find(t, want)
            for i, v in ipairs(t) do
                if v == want then return i end
            end
            return nil
        end
        assert(find({"a", "b", "c"}, "b") == 2)
        assert(find({"a"}, "z") == nil)
    "#);
}

#[test]
fn test_multiple_assignment() {
    run(r#"
        local a, b, c = 1, 2
        assert(a == 1 and b == 2 and c == nil)
        a, b = b, a
        assert(a == 2 and b == 1)
        local t = {}
        t.x, t.y = 10, 20
        assert(t.x == 10 and t.y == 20)
        local x, y = 1, 2, 3  -- extra values are dropped
        assert(x == 1 and y == 2)
    "#);
}
