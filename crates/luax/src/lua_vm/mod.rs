// VM core: state, environments, dispatch, evaluation and control flow.

pub mod call;
pub mod coroutine_engine;
pub mod environment;
pub mod eval_expr;
pub mod exec_stmt;
pub mod lua_error;
pub mod lua_limits;
pub mod lua_vm;
pub mod metamethod;

pub use call::{call_any, call_values, protected_call};
pub use environment::{Env, EnvRef};
pub use lua_error::{LuaError, LuaResult};
pub use lua_vm::{ErrorFrame, LuaVM};
