// Tests for the supplemental libraries: math, string, os, io, basic glue
use super::run;

#[test]
fn test_math_basics() {
    run(r#"
        assert(math.abs(-5) == 5)
        assert(math.abs(5.5) == 5.5)
        assert(math.floor(3.7) == 3)
        assert(math.ceil(3.2) == 4)
        assert(math.floor(-3.5) == -4)
        assert(math.sqrt(16) == 4.0)
        assert(math.max(3, 1, 4, 1, 5) == 5)
        assert(math.min(3, 1, 4) == 1)
        assert(math.fmod(7, 3) == 1.0)
    "#);
}

#[test]
fn test_math_modf() {
    run(r#"
        local int, frac = math.modf(3.25)
        assert(int == 3)
        assert(frac == 0.25)
        local ni, nf = math.modf(-3.25)
        assert(ni == -3 and nf == -0.25)
    "#);
}

#[test]
fn test_math_type_and_tointeger() {
    run(r#"
        assert(math.type(1) == "integer")
        assert(math.type(1.0) == "float")
        assert(math.type("1") == nil)
        assert(math.tointeger(5.0) == 5)
        assert(math.tointeger(5.5) == nil)
        assert(math.maxinteger + 1 == math.mininteger)
    "#);
}

#[test]
fn test_math_random_ranges() {
    run(r#"
        math.randomseed(12345)
        for _ = 1, 50 do
            local r = math.random()
            assert(r >= 0 and r < 1)
            local d = math.random(6)
            assert(d >= 1 and d <= 6)
            local ab = math.random(10, 20)
            assert(ab >= 10 and ab <= 20)
        end
    "#);
}

#[test]
fn test_string_sub() {
    run(r#"
        local s = "hello world"
        assert(string.sub(s, 1, 5) == "hello")
        assert(string.sub(s, 7) == "world")
        assert(string.sub(s, -5) == "world")
        assert(string.sub(s, 2, -2) == "ello worl")
        assert(string.sub(s, 8, 3) == "")
    "#);
}

#[test]
fn test_string_case_rep_reverse() {
    run(r#"
        assert(string.upper("abc") == "ABC")
        assert(string.lower("AbC") == "abc")
        assert(string.rep("ab", 3) == "ababab")
        assert(string.rep("x", 3, "-") == "x-x-x")
        assert(string.rep("x", 0) == "")
        assert(string.reverse("abc") == "cba")
    "#);
}

#[test]
fn test_string_byte_char() {
    run(r#"
        assert(string.byte("A") == 65)
        local a, b = string.byte("AB", 1, 2)
        assert(a == 65 and b == 66)
        assert(string.char(104, 105) == "hi")
    "#);
}

#[test]
fn test_string_format() {
    run(r#"
        assert(string.format("%d items", 3) == "3 items")
        assert(string.format("%5d", 42) == "   42")
        assert(string.format("%-5d|", 42) == "42   |")
        assert(string.format("%05d", 42) == "00042")
        assert(string.format("%x", 255) == "ff")
        assert(string.format("%X", 255) == "FF")
        assert(string.format("%s=%s", "k", "v") == "k=v")
        assert(string.format("%.2f", 3.14159) == "3.14")
        assert(string.format("100%%") == "100%")
        assert(string.format("%c", 65) == "A")
    "#);
}

#[test]
fn test_tostring_forms() {
    run(r#"
        assert(tostring(nil) == "nil")
        assert(tostring(true) == "true")
        assert(tostring(false) == "false")
        assert(tostring(12) == "12")
        assert(tostring(1.5) == "1.5")
        assert(tostring("s") == "s")
        assert(string.sub(tostring({}), 1, 6) == "table:")
        assert(string.sub(tostring(print), 1, 9) == "function:")
    "#);
}

#[test]
fn test_type_builtin() {
    run(r#"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(1) == "number")
        assert(type(1.5) == "number")
        assert(type("") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
        assert(type(coroutine.create(function() end)) == "thread")
    "#);
}

#[test]
fn test_os_time_and_date() {
    run(r#"
        local t = os.time()
        assert(type(t) == "number")
        assert(t > 1000000000)

        local d = os.date("!*t", 1700000000)
        assert(d.year == 2023)
        assert(d.month == 11)
        assert(type(d.day) == "number")
        assert(type(d.hour) == "number")

        local formatted = os.date("!%Y-%m-%d", 1700000000)
        assert(formatted == "2023-11-14")
    "#);
}

#[test]
fn test_os_clock_and_getenv() {
    run(r#"
        local c = os.clock()
        assert(type(c) == "number")
        assert(os.getenv("LUAX_SURELY_UNSET_VAR_123") == nil)
    "#);
}

#[test]
fn test_collectgarbage_shim() {
    run(r#"
        assert(collectgarbage("count") == 0.0)
        assert(collectgarbage() == 0)
        assert(collectgarbage("isrunning") == true)
    "#);
}

#[test]
fn test_load_builtin() {
    run(r#"
        local f = load("return 1 + 2")
        assert(f() == 3)
        local bad, err = load("this is not lua ((")
        assert(bad == nil)
        assert(type(err) == "string")
        g_loaded_global = nil
        local setter = load("g_loaded_global = 'set'")
        setter()
        assert(g_loaded_global == "set")
    "#);
}

#[test]
fn test_version_string() {
    run(r#"
        assert(type(_VERSION) == "string")
        assert(string.sub(_VERSION, 1, 4) == "LuaX")
    "#);
}
