// Tests for value semantics and operators
use super::{eval, run};
use crate::LuaValue;

#[test]
fn test_integer_arithmetic_stays_integer() {
    run(r#"
        assert(1 + 2 == 3)
        assert(math.type(1 + 2) == "integer")
        assert(math.type(2 * 3) == "integer")
        assert(math.type(7 % 3) == "integer")
        assert(math.type(7 // 2) == "integer")
    "#);
}

#[test]
fn test_division_and_power_produce_floats() {
    run(r#"
        assert(5 / 2 == 2.5)
        assert(math.type(4 / 2) == "float")
        assert(2 ^ 2 == 4.0)
        assert(math.type(2 ^ 2) == "float")
    "#);
}

#[test]
fn test_mixed_arithmetic_promotes() {
    run(r#"
        assert(1 + 0.5 == 1.5)
        assert(math.type(1 + 0.5) == "float")
        assert(2 * 1.5 == 3.0)
    "#);
}

#[test]
fn test_floor_division_and_modulo() {
    run(r#"
        assert(7 // 2 == 3)
        assert(-7 // 2 == -4)
        assert(7 % 3 == 1)
        assert(-7 % 3 == 2)
        assert(7 % -3 == -2)
        assert(7.5 // 2 == 3.0)
    "#);
}

#[test]
fn test_integer_division_by_zero_raises() {
    run(r#"
        local ok = pcall(function() return 1 // 0 end)
        assert(ok == false)
        local ok2 = pcall(function() return 1 % 0 end)
        assert(ok2 == false)
    "#);
}

#[test]
fn test_integer_overflow_wraps_consistently() {
    run(r#"
        assert(math.maxinteger + 1 == math.mininteger)
        assert(math.mininteger - 1 == math.maxinteger)
        assert(math.maxinteger + 1 - 1 == math.maxinteger)
    "#);
}

#[test]
fn test_comparisons() {
    run(r#"
        assert(1 < 2)
        assert(2 <= 2)
        assert(3 > 2)
        assert(3 >= 3)
        assert(1 < 1.5)
        assert("a" < "b")
        assert("abc" < "abd")
        assert(not ("b" < "a"))
    "#);
}

#[test]
fn test_comparing_mixed_types_raises() {
    run(r#"
        local ok, err = pcall(function() return 1 < "x" end)
        assert(ok == false)
    "#);
}

#[test]
fn test_equality_across_number_kinds() {
    run(r#"
        assert(1 == 1.0)
        assert(0 == -0.0)
        assert(1 ~= 2)
        assert("1" ~= 1)
        assert(nil ~= false)
    "#);
}

#[test]
fn test_logical_operators_return_operands() {
    run(r#"
        assert((nil and 1) == nil)
        assert((false and 1) == false)
        assert((1 and 2) == 2)
        assert((nil or "x") == "x")
        assert((1 or 2) == 1)
        assert((false or nil) == nil)
    "#);
}

#[test]
fn test_short_circuit_does_not_evaluate() {
    run(r#"
        local hits = 0
        local function bump() hits = hits + 1 return true end
        local _ = false and bump()
        assert(hits == 0)
        local _ = true or bump()
        assert(hits == 0)
    "#);
}

#[test]
fn test_concat() {
    run(r#"
        assert("a" .. "b" == "ab")
        assert("n=" .. 42 == "n=42")
        assert(1 .. 2 == "12")
        assert("x" .. 2.5 == "x2.5")
    "#);
}

#[test]
fn test_concat_non_stringable_raises() {
    run(r#"
        local ok = pcall(function() return "a" .. {} end)
        assert(ok == false)
        local ok2 = pcall(function() return "a" .. nil end)
        assert(ok2 == false)
    "#);
}

#[test]
fn test_length_operator() {
    run(r#"
        assert(#"hello" == 5)
        assert(#"" == 0)
        assert(#{10, 20, 30} == 3)
        local ok = pcall(function() return #42 end)
        assert(ok == false)
    "#);
}

#[test]
fn test_bitwise_operators() {
    run(r#"
        assert(5 & 3 == 1)
        assert(5 | 3 == 7)
        assert(5 ~ 3 == 6)
        assert(~0 == -1)
        assert(1 << 4 == 16)
        assert(256 >> 4 == 16)
        assert(1 << 64 == 0)
    "#);
}

#[test]
fn test_unary_minus() {
    run(r#"
        assert(-(3) == -3)
        assert(-(2.5) == -2.5)
        local x = 7
        assert(-x == -7)
    "#);
}

#[test]
fn test_tostring_tonumber_round_trip() {
    run(r#"
        for _, s in ipairs({"7", "-12", "3.14", "-0.5", "1e20"}) do
            assert(tostring(tonumber(s)) == s, s)
        end
        assert(tonumber("0x10") == 16)
        assert(tonumber("ff", 16) == 255)
        assert(tonumber("zz") == nil)
        assert(tostring(3.0) == "3.0")
    "#);
}

#[test]
fn test_numeric_result_values() {
    assert_eq!(eval("return 2 + 3"), LuaValue::Integer(5));
    assert_eq!(eval("return 10 / 4"), LuaValue::Float(2.5));
    assert_eq!(eval("return 'a' < 'b'"), LuaValue::Boolean(true));
}
