// String library
// Implements: len, sub, upper, lower, rep, reverse, byte, char, format.
// Pattern matching lives in a separate engine and is not part of this core.

use super::{arg, check_str, opt_int};
use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{metamethod, LuaResult, LuaVM};
use std::rc::Rc;

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "len" => string_len,
        "sub" => string_sub,
        "upper" => string_upper,
        "lower" => string_lower,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "byte" => string_byte,
        "char" => string_char,
        "format" => string_format,
    })
}

fn string_len(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "len")?;
    Ok(LuaValue::Integer(s.len() as i64))
}

/// Translate a possibly-negative 1-based index against a length.
fn str_index(i: i64, len: i64) -> i64 {
    if i >= 0 { i } else { (len + i + 1).max(0) }
}

/// string.sub(s, i [, j])
fn string_sub(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "sub")?;
    let len = s.len() as i64;
    let mut i = str_index(opt_int(args, 2, 1), len).max(1);
    let j = str_index(opt_int(args, 3, -1), len).min(len);
    if i > j {
        return Ok(vm.create_string(""));
    }
    i -= 1;
    let bytes = &s.as_bytes()[i as usize..j as usize];
    let out = String::from_utf8_lossy(bytes).into_owned();
    Ok(vm.create_string(&out))
}

fn string_upper(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "upper")?;
    Ok(vm.create_string(&s.to_uppercase()))
}

fn string_lower(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "lower")?;
    Ok(vm.create_string(&s.to_lowercase()))
}

/// string.rep(s, n [, sep])
fn string_rep(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "rep")?;
    let n = opt_int(args, 2, 0);
    if n <= 0 {
        return Ok(vm.create_string(""));
    }
    let sep = args
        .get(2)
        .and_then(|v| v.as_str().map(|x| x.to_string()))
        .unwrap_or_default();
    let mut out = String::with_capacity((s.len() + sep.len()) * n as usize);
    for i in 0..n {
        if i > 0 {
            out.push_str(&sep);
        }
        out.push_str(&s);
    }
    Ok(vm.create_string(&out))
}

fn string_reverse(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "reverse")?;
    let mut bytes = s.into_bytes();
    bytes.reverse();
    let out = String::from_utf8_lossy(&bytes).into_owned();
    Ok(vm.create_string(&out))
}

/// string.byte(s [, i [, j]])
fn string_byte(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let s = check_str(vm, args, 1, "byte")?;
    let len = s.len() as i64;
    let i = str_index(opt_int(args, 2, 1), len).max(1);
    let j = str_index(opt_int(args, 3, i), len).min(len);
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut k = i;
    while k <= j {
        out.push(LuaValue::Integer(bytes[(k - 1) as usize] as i64));
        k += 1;
    }
    Ok(LuaValue::Multi(Rc::new(out)))
}

/// string.char(...)
fn string_char(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let mut bytes = Vec::with_capacity(args.len());
    for (i, v) in args.iter().enumerate() {
        let c = v.as_integer().ok_or_else(|| {
            vm.error(format!("bad argument #{} to 'char' (number expected)", i + 1))
        })?;
        if !(0..=255).contains(&c) {
            return Err(vm.error(format!(
                "bad argument #{} to 'char' (value out of range)",
                i + 1
            )));
        }
        bytes.push(c as u8);
    }
    let out = String::from_utf8_lossy(&bytes).into_owned();
    Ok(vm.create_string(&out))
}

/// string.format(fmt, ...)
fn string_format(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let fmt = check_str(vm, args, 1, "format")?;
    let mut out = String::with_capacity(fmt.len());
    let mut next_arg = 2usize;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        // %[flags][width][.precision]conv
        let mut spec = String::new();
        while matches!(chars.peek(), Some('-' | '+' | ' ' | '#' | '0')) {
            spec.push(chars.next().expect("peeked"));
        }
        while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            spec.push(chars.next().expect("peeked"));
        }
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = String::new();
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                p.push(chars.next().expect("peeked"));
            }
            precision = Some(p.parse().unwrap_or(0));
        }
        let conv = chars
            .next()
            .ok_or_else(|| vm.error("invalid format string to 'format'".to_string()))?;
        let v = arg(args, next_arg);
        next_arg += 1;
        let piece = format_one(vm, conv, &spec, precision, &v)?;
        out.push_str(&piece);
    }
    Ok(vm.create_string(&out))
}

fn format_one(
    vm: &mut LuaVM,
    conv: char,
    spec: &str,
    precision: Option<usize>,
    v: &LuaValue,
) -> LuaResult<String> {
    let width: usize = spec.trim_start_matches(['-', '+', ' ', '#', '0']).parse().unwrap_or(0);
    let left = spec.contains('-');
    let zero = spec.contains('0') && !left;
    let pad = |s: String| -> String {
        if s.len() >= width {
            s
        } else if left {
            format!("{:<width$}", s, width = width)
        } else if zero && s.starts_with('-') {
            format!("-{}{}", "0".repeat(width - s.len()), &s[1..])
        } else if zero {
            format!("{}{}", "0".repeat(width - s.len()), s)
        } else {
            format!("{:>width$}", s, width = width)
        }
    };
    let want_int = |vm: &mut LuaVM, v: &LuaValue| -> LuaResult<i64> {
        v.as_integer().ok_or_else(|| {
            vm.error(format!(
                "bad argument to 'format' (number expected, got {})",
                v.type_name()
            ))
        })
    };
    let want_num = |vm: &mut LuaVM, v: &LuaValue| -> LuaResult<f64> {
        v.as_float().ok_or_else(|| {
            vm.error(format!(
                "bad argument to 'format' (number expected, got {})",
                v.type_name()
            ))
        })
    };
    Ok(match conv {
        'd' | 'i' => pad(want_int(vm, v)?.to_string()),
        'u' => pad((want_int(vm, v)? as u64).to_string()),
        'x' => pad(format!("{:x}", want_int(vm, v)?)),
        'X' => pad(format!("{:X}", want_int(vm, v)?)),
        'o' => pad(format!("{:o}", want_int(vm, v)?)),
        'c' => pad(
            char::from_u32(want_int(vm, v)? as u32)
                .unwrap_or('\u{FFFD}')
                .to_string(),
        ),
        'f' | 'F' => pad(format!("{:.*}", precision.unwrap_or(6), want_num(vm, v)?)),
        'e' => pad(format!("{:.*e}", precision.unwrap_or(6), want_num(vm, v)?)),
        'g' | 'G' => {
            let n = want_num(vm, v)?;
            pad(LuaVM::float_to_string(n))
        }
        's' => {
            let mut s = metamethod::tostring(vm, v)?;
            if let Some(p) = precision {
                s.truncate(p);
            }
            pad(s)
        }
        'q' => format!("{:?}", metamethod::tostring(vm, v)?),
        other => {
            return Err(vm.error(format!(
                "invalid conversion '%{}' to 'format'",
                other
            )));
        }
    })
}
