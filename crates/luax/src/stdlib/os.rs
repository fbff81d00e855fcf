// OS library
// Implements: time, clock, date, getenv, exit

use super::arg;
use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaError, LuaResult, LuaVM};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

pub fn create_os_lib() -> LibraryModule {
    crate::lib_module!("os", {
        "time" => os_time,
        "clock" => os_clock,
        "date" => os_date,
        "getenv" => os_getenv,
        "exit" => os_exit,
    })
}

/// os.time() - seconds since the epoch
fn os_time(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<LuaValue> {
    Ok(LuaValue::Integer(Utc::now().timestamp()))
}

/// os.clock() - CPU-ish time in seconds since the process started
fn os_clock(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<LuaValue> {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    Ok(LuaValue::Float(start.elapsed().as_secs_f64()))
}

/// os.date([format [, time]]) - strftime-style formatting; a leading `!`
/// selects UTC, and `*t` produces the broken-down table form.
fn os_date(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let mut fmt = arg(args, 1)
        .as_str()
        .unwrap_or("%c")
        .to_string();
    let when = args
        .get(1)
        .and_then(|v| v.as_integer())
        .unwrap_or_else(|| Utc::now().timestamp());
    let utc = fmt.starts_with('!');
    if utc {
        fmt.remove(0);
    }
    if fmt.starts_with("*t") {
        let dt: DateTime<Utc> = Utc
            .timestamp_opt(when, 0)
            .single()
            .ok_or_else(|| vm.error("time out of range for 'date'".to_string()))?;
        let t = vm.new_table();
        if let Some(table) = t.as_table().cloned() {
            for (key, value) in [
                ("year", dt.year() as i64),
                ("month", dt.month() as i64),
                ("day", dt.day() as i64),
                ("hour", dt.hour() as i64),
                ("min", dt.minute() as i64),
                ("sec", dt.second() as i64),
                ("wday", dt.weekday().number_from_sunday() as i64),
                ("yday", dt.ordinal() as i64),
            ] {
                let k = vm.create_string(key);
                let _ = table.borrow_mut().raw_set(k, LuaValue::Integer(value));
            }
            let k = vm.create_string("isdst");
            let _ = table.borrow_mut().raw_set(k, LuaValue::Boolean(false));
        }
        return Ok(t);
    }
    let formatted = if utc {
        let dt: DateTime<Utc> = Utc
            .timestamp_opt(when, 0)
            .single()
            .ok_or_else(|| vm.error("time out of range for 'date'".to_string()))?;
        dt.format(&fmt).to_string()
    } else {
        let dt: DateTime<Local> = Local
            .timestamp_opt(when, 0)
            .single()
            .ok_or_else(|| vm.error("time out of range for 'date'".to_string()))?;
        dt.format(&fmt).to_string()
    };
    Ok(vm.create_string(&formatted))
}

/// os.getenv(name)
fn os_getenv(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    let name = arg(args, 1);
    let Some(name) = name.as_str() else {
        return Ok(LuaValue::Nil);
    };
    match std::env::var(name) {
        Ok(v) => Ok(vm.create_string(&v)),
        Err(_) => Ok(LuaValue::Nil),
    }
}

/// os.exit([code]) - unwinds past every protected frame
fn os_exit(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<LuaValue> {
    vm.exit_code = match arg(args, 1) {
        LuaValue::Nil | LuaValue::Boolean(true) => 0,
        LuaValue::Boolean(false) => 1,
        v => v.as_integer().unwrap_or(0) as i32,
    };
    Err(LuaError::Exit)
}
