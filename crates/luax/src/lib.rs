// LuaX Runtime
// A tree-walking interpreter for a Lua-family language: tables with
// metatables, closures, coroutines, to-be-closed locals and a module system.

#[cfg(test)]
mod test;

pub mod lib_registry;
pub mod lua_value;
pub mod lua_vm;
pub mod stdlib;
pub mod syntax;

pub use lib_registry::LibraryRegistry;
pub use lua_value::{CoroutineStatus, LuaString, LuaTable, LuaThread, LuaValue};
pub use lua_vm::{LuaError, LuaResult, LuaVM};

/// Main entry point for executing source code
pub fn execute(source: &str) -> LuaResult<LuaValue> {
    let mut vm = LuaVM::new();
    vm.open_libs()?;
    vm.execute(source)
}

/// Execute source code with a custom VM instance
pub fn execute_with_vm(vm: &mut LuaVM, source: &str) -> LuaResult<LuaValue> {
    vm.execute(source)
}
