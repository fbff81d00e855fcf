// Integration tests: each test runs a script whose own asserts verify the
// behaviour, then checks the run succeeded.

mod test_control_flow;
mod test_coroutine;
mod test_errors;
mod test_functions;
mod test_metatables;
mod test_operators;
mod test_package;
mod test_stdlib;
mod test_table;

use crate::{LuaVM, LuaValue};

/// Run a script and panic with the interpreter's error message on failure.
pub(crate) fn run(source: &str) {
    let mut vm = LuaVM::new();
    vm.open_libs().expect("stdlib");
    let result = vm.execute(source);
    if result.is_err() {
        panic!("script failed: {}", vm.error_message());
    }
}

/// Run a script and return its result value.
pub(crate) fn eval(source: &str) -> LuaValue {
    let mut vm = LuaVM::new();
    vm.open_libs().expect("stdlib");
    match vm.execute(source) {
        Ok(v) => v.first(),
        Err(_) => panic!("script failed: {}", vm.error_message()),
    }
}
