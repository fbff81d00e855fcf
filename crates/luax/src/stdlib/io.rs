// IO library (minimal surface)
// Implements: write, read

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaResult, LuaVM};
use crate::syntax;
use std::io::{BufRead, Write};

pub fn create_io_lib() -> LibraryModule {
    crate::lib_module!("io", {
        "write" => io_write,
        "read" => io_read,
    })
}

/// io.write(...) - strings and numbers to stdout, no separators
fn io_write(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for v in args {
        let piece = match v {
            LuaValue::Str(s) => s.as_str().to_string(),
            LuaValue::Integer(_) | LuaValue::Float(_) => LuaVM::number_to_string(v),
            other => {
                return Err(vm.error(format!(
                    "bad argument to 'write' (string expected, got {})",
                    other.type_name()
                )));
            }
        };
        out.write_all(piece.as_bytes())
            .map_err(|e| vm.error(format!("write error: {}", e)))?;
    }
    out.flush().map_err(|e| vm.error(format!("write error: {}", e)))?;
    Ok(LuaValue::Nil)
}

/// io.read([mode]) - "l" (default) one line, "n" a number, "a" everything
fn io_read(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let mode = args
        .first()
        .and_then(|v| v.as_str())
        .unwrap_or("l")
        .trim_start_matches('*')
        .to_string();
    let stdin = std::io::stdin();
    match mode.as_str() {
        "a" => {
            let mut all = String::new();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        all.push_str(&l);
                        all.push('\n');
                    }
                    Err(_) => break,
                }
            }
            Ok(vm.create_string(&all))
        }
        "n" => {
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => Ok(LuaValue::Nil),
                Ok(_) => Ok(syntax::parse_number(line.trim()).unwrap_or(LuaValue::Nil)),
            }
        }
        _ => {
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => Ok(LuaValue::Nil),
                Ok(_) => {
                    let trimmed = line.strip_suffix('\n').unwrap_or(&line);
                    Ok(vm.create_string(trimmed))
                }
            }
        }
    }
}
