// Tests for the table engine and table library
use super::run;

#[test]
fn test_set_get_and_nil_removal() {
    run(r#"
        local t = {}
        t.x = 1
        t[2] = "two"
        t[2.0] = "still two"
        assert(t.x == 1)
        assert(t[2] == "still two")
        t.x = nil
        assert(t.x == nil)
        assert(rawget(t, "x") == nil)
    "#);
}

#[test]
fn test_constructor_forms() {
    run(r#"
        local t = {10, 20, x = "a", [99] = "b", 30}
        assert(t[1] == 10 and t[2] == 20 and t[3] == 30)
        assert(t.x == "a")
        assert(t[99] == "b")
        assert(#t == 3)
    "#);
}

#[test]
fn test_constructor_trailing_call_expands() {
    run(r#"
        local function three() return 1, 2, 3 end
        local t = {0, three()}
        assert(#t == 4)
        assert(t[4] == 3)
        local u = {three(), 0}
        assert(u[1] == 1 and u[2] == 0)
    "#);
}

#[test]
fn test_length_of_sequences() {
    run(r#"
        local t = {}
        for i = 1, 10 do t[i] = i * i end
        assert(#t == 10)
        t[11] = 121
        assert(#t == 11)
        t[#t] = nil
        assert(#t == 10)
    "#);
}

#[test]
fn test_length_with_holes_is_a_border() {
    run(r#"
        local t = {1, 2, nil, 4}
        local n = #t
        assert(t[n] ~= nil)
        assert(t[n + 1] == nil)
    "#);
}

#[test]
fn test_nan_key_rejected() {
    run(r#"
        local t = {}
        local nan = 0/0
        local ok = pcall(function() t[nan] = 1 end)
        assert(ok == false)
        local ok2 = pcall(function() t[nil] = 1 end)
        assert(ok2 == false)
    "#);
}

#[test]
fn test_next_and_pairs_cover_all_entries() {
    run(r#"
        local t = {10, 20, a = 1, b = 2}
        local count, sum = 0, 0
        for k, v in pairs(t) do
            count = count + 1
            if type(v) == "number" then sum = sum + v end
        end
        assert(count == 4)
        assert(sum == 33)
    "#);
}

#[test]
fn test_ipairs_stops_at_hole() {
    run(r#"
        local t = {1, 2, nil, 4}
        local last = 0
        for i in ipairs(t) do last = i end
        assert(last == 2)
    "#);
}

#[test]
fn test_insert_remove() {
    run(r#"
        local t = {1, 2, 4}
        table.insert(t, 3, 3)
        assert(t[3] == 3 and t[4] == 4 and #t == 4)
        table.insert(t, 5)
        assert(t[5] == 5)
        local removed = table.remove(t, 1)
        assert(removed == 1)
        assert(t[1] == 2 and #t == 4)
        local last = table.remove(t)
        assert(last == 5 and #t == 3)
    "#);
}

#[test]
fn test_concat_library() {
    run(r#"
        local t = {"a", "b", "c"}
        assert(table.concat(t) == "abc")
        assert(table.concat(t, ",") == "a,b,c")
        assert(table.concat(t, "-", 2, 3) == "b-c")
        assert(table.concat({1, 2, 3}, "+") == "1+2+3")
    "#);
}

#[test]
fn test_pack_unpack_round_trip() {
    run(r#"
        local packed = table.pack(10, 20, 30)
        assert(packed.n == 3)
        local a, b, c = table.unpack(packed)
        assert(a == 10 and b == 20 and c == 30)
        local again = table.pack(table.unpack(packed))
        assert(again.n == 3 and again[1] == 10 and again[3] == 30)
    "#);
}

#[test]
fn test_unpack_is_true_multi_return() {
    run(r#"
        local function count(...) return select('#', ...) end
        assert(count(table.unpack({1, 2, 3})) == 3)
        assert(count(unpack({1, 2})) == 2)
    "#);
}

#[test]
fn test_unpack_range() {
    run(r#"
        local a, b = table.unpack({1, 2, 3, 4}, 2, 3)
        assert(a == 2 and b == 3)
    "#);
}

#[test]
fn test_sort() {
    run(r#"
        local t = {5, 2, 8, 1, 9, 3}
        table.sort(t)
        for i = 1, #t - 1 do assert(t[i] <= t[i + 1]) end
        table.sort(t, function(a, b) return a > b end)
        for i = 1, #t - 1 do assert(t[i] >= t[i + 1]) end
        local words = {"pear", "apple", "fig"}
        table.sort(words)
        assert(words[1] == "apple" and words[3] == "pear")
    "#);
}

#[test]
fn test_move() {
    run(r#"
        local a = {1, 2, 3, 4, 5}
        local b = table.move(a, 2, 4, 1, {})
        assert(b[1] == 2 and b[2] == 3 and b[3] == 4)
        table.move(a, 1, 3, 2)
        assert(a[1] == 1 and a[2] == 1 and a[3] == 2 and a[4] == 3)
    "#);
}

#[test]
fn test_rawlen_rawequal() {
    run(r#"
        local t = {1, 2, 3}
        assert(rawlen(t) == 3)
        assert(rawlen("abcd") == 4)
        assert(rawequal(t, t))
        assert(not rawequal(t, {1, 2, 3}))
    "#);
}
