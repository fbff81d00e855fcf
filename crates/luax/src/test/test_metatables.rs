// Tests for metatables and metamethod dispatch
use super::run;

#[test]
fn test_index_table_chain() {
    run(r#"
        local base = {greet = "hello"}
        local mid = setmetatable({extra = 1}, {__index = base})
        local leaf = setmetatable({}, {__index = mid})
        assert(leaf.greet == "hello")
        assert(leaf.extra == 1)
        assert(leaf.missing == nil)
    "#);
}

#[test]
fn test_index_function() {
    run(r#"
        local t = setmetatable({}, {__index = function(tbl, key)
            return "computed:" .. key
        end})
        assert(t.abc == "computed:abc")
        t.abc = "stored"
        assert(t.abc == "stored")
    "#);
}

#[test]
fn test_newindex_function_and_table() {
    run(r#"
        local log = {}
        local t = setmetatable({}, {__newindex = function(tbl, k, v)
            log[#log + 1] = k
            rawset(tbl, k, v)
        end})
        t.a = 1
        t.a = 2  -- raw entry exists now; no metamethod
        assert(t.a == 2)
        assert(#log == 1 and log[1] == "a")

        local store = {}
        local proxy = setmetatable({}, {__newindex = store})
        proxy.x = 5
        assert(rawget(proxy, "x") == nil)
        assert(store.x == 5)
    "#);
}

#[test]
fn test_arithmetic_metamethods() {
    run(r#"
        local mt = {
            __add = function(a, b) return a.v + b.v end,
            __mul = function(a, b) return a.v * b.v end,
            __unm = function(a) return -a.v end,
        }
        local a = setmetatable({v = 6}, mt)
        local b = setmetatable({v = 7}, mt)
        assert(a + b == 13)
        assert(a * b == 42)
        assert(-a == -6)
    "#);
}

#[test]
fn test_arithmetic_metamethod_on_right_operand() {
    run(r#"
        local mt = {__add = function(a, b)
            if type(a) == "number" then return a + b.v end
            return a.v + b
        end}
        local x = setmetatable({v = 10}, mt)
        assert(1 + x == 11)
        assert(x + 2 == 12)
    "#);
}

#[test]
fn test_eq_lt_le() {
    run(r#"
        local mt = {
            __eq = function(a, b) return a.id == b.id end,
            __lt = function(a, b) return a.id < b.id end,
            __le = function(a, b) return a.id <= b.id end,
        }
        local a = setmetatable({id = 1}, mt)
        local b = setmetatable({id = 1}, mt)
        local c = setmetatable({id = 2}, mt)
        assert(a == b)
        assert(a ~= c)
        assert(a < c)
        assert(a <= b)
        assert(c > a)
        assert(c >= a)
    "#);
}

#[test]
fn test_eq_requires_both_tables() {
    run(r#"
        local t = setmetatable({}, {__eq = function() return true end})
        assert(t ~= 1)
        assert(t ~= "x")
    "#);
}

#[test]
fn test_len_and_concat_metamethods() {
    run(r#"
        local t = setmetatable({}, {
            __len = function() return 99 end,
            __concat = function(a, b) return "joined" end,
        })
        assert(#t == 99)
        assert(t .. "x" == "joined")
        assert("x" .. t == "joined")
    "#);
}

#[test]
fn test_call_metamethod() {
    run(r#"
        local t = setmetatable({base = 10}, {__call = function(self, x)
            return self.base + x
        end})
        assert(t(5) == 15)
    "#);
}

#[test]
fn test_call_on_plain_value_raises() {
    run(r#"
        local ok = pcall(function() local x = 5; x() end)
        assert(ok == false)
        local ok2 = pcall(function() local t = {}; t() end)
        assert(ok2 == false)
    "#);
}

#[test]
fn test_metatable_protection() {
    run(r#"
        local t = setmetatable({}, {__metatable = "locked"})
        assert(getmetatable(t) == "locked")
        local ok, err = pcall(setmetatable, t, {})
        assert(ok == false)
    "#);
}

#[test]
fn test_getmetatable_plain() {
    run(r#"
        local mt = {}
        local t = setmetatable({}, mt)
        assert(getmetatable(t) == mt)
        assert(getmetatable({}) == nil)
        assert(getmetatable(1) == nil)
    "#);
}

#[test]
fn test_tostring_metamethod() {
    run(r#"
        local t = setmetatable({}, {__tostring = function() return "custom" end})
        assert(tostring(t) == "custom")
    "#);
}

#[test]
fn test_method_style_oo() {
    run(r#"
        local Point = {
            new = function(self, x, y)
                local o = {x = x, y = y}
                setmetatable(o, {__index = self})
                return o
            end,
            dist = function(self)
                return self.x * self.x + self.y * self.y
            end,
        }
        local p = Point:new(3, 4)
        assert(p:dist() == 25)
    "#);
}
