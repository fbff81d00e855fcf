// Library registration: a clean way to expose Rust functions as language
// libraries, and the registry that installs the standard set.

use crate::lua_value::{CFunction, LuaValue};
use crate::lua_vm::{LuaResult, LuaVM};
use crate::stdlib;

/// Type for value initializers - functions that create values when the module loads
pub type ValueInitializer = fn(&mut LuaVM) -> LuaValue;

/// Type for module initializers - functions that set up additional module fields
pub type ModuleInitializer = fn(&mut LuaVM) -> LuaResult<()>;

/// Entry in a library module - can be a function or a value
pub enum LibraryEntry {
    Function(CFunction),
    Value(ValueInitializer),
}

/// A library module containing multiple functions and values
pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, LibraryEntry)>,
    pub initializer: Option<ModuleInitializer>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
            initializer: None,
        }
    }

    pub fn with_function(mut self, name: &'static str, func: CFunction) -> Self {
        self.entries.push((name, LibraryEntry::Function(func)));
        self
    }

    pub fn with_value(mut self, name: &'static str, value_init: ValueInitializer) -> Self {
        self.entries.push((name, LibraryEntry::Value(value_init)));
        self
    }

    pub fn with_initializer(mut self, init: ModuleInitializer) -> Self {
        self.initializer = Some(init);
        self
    }
}

/// Builder for creating library modules with functions
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push(($item_name, $crate::lib_registry::LibraryEntry::Function($item)));
        )*
        module
    }};
}

/// Registry for the standard libraries; insertion order is load order.
pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    pub fn load_all(&self, vm: &mut LuaVM) -> LuaResult<()> {
        for module in &self.modules {
            self.load_module(vm, module)?;
        }
        Ok(())
    }

    pub fn load_module(&self, vm: &mut LuaVM, module: &LibraryModule) -> LuaResult<()> {
        if module.name == "_G" {
            // global functions register directly in the root environment
            for (name, entry) in &module.entries {
                let value = match entry {
                    LibraryEntry::Function(func) => LuaValue::NativeFn(*func),
                    LibraryEntry::Value(value_init) => value_init(vm),
                };
                vm.set_global(name, value);
            }
        } else {
            let lib_table = vm.new_table();
            for (name, entry) in &module.entries {
                let value = match entry {
                    LibraryEntry::Function(func) => LuaValue::NativeFn(*func),
                    LibraryEntry::Value(value_init) => value_init(vm),
                };
                let key = vm.create_string(name);
                if let Some(t) = lib_table.as_table() {
                    t.borrow_mut()
                        .raw_set(key, value)
                        .map_err(|e| vm.error(e.message().to_string()))?;
                }
            }
            vm.set_global(module.name, lib_table.clone());

            // register in package.loaded so require() finds the library
            if let Some(package) = vm.get_global("package") {
                if let Some(pkg) = package.as_table() {
                    let loaded_key = vm.create_string("loaded");
                    let loaded = pkg.borrow().raw_get(&loaded_key);
                    if let Some(loaded) = loaded.as_ref().and_then(|l| l.as_table()) {
                        let mod_key = vm.create_string(module.name);
                        let _ = loaded.borrow_mut().raw_set(mod_key, lib_table);
                    }
                }
            }
        }

        if let Some(init_fn) = module.initializer {
            init_fn(vm)?;
        }
        Ok(())
    }

    pub fn get_module(&self, name: &str) -> Option<&LibraryModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard library set, package first so `package.loaded` exists
/// before the other libraries register themselves.
pub fn create_standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    registry.register(stdlib::package::create_package_lib());
    registry.register(stdlib::basic::create_basic_lib());
    registry.register(stdlib::string::create_string_lib());
    registry.register(stdlib::table::create_table_lib());
    registry.register(stdlib::math::create_math_lib());
    registry.register(stdlib::os::create_os_lib());
    registry.register(stdlib::io::create_io_lib());
    registry.register(stdlib::coroutine::create_coroutine_lib());
    registry
}
