/// Lightweight error enum threaded through the whole evaluator.
/// The actual Lua error value lives in `vm.error_object` so that `Result`
/// stays a single word on the happy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaError {
    /// Runtime error — the raised value is in `vm.error_object`.
    Runtime,
    /// Coroutine suspension — yield values are buffered on the thread, and
    /// each unwinding block appends a resume frame before propagating.
    Yield,
    /// Host-requested termination (`os.exit`); never caught by pcall.
    Exit,
}

impl std::fmt::Display for LuaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LuaError::Runtime => write!(f, "runtime error"),
            LuaError::Yield => write!(f, "coroutine yield"),
            LuaError::Exit => write!(f, "exit"),
        }
    }
}

impl std::error::Error for LuaError {}

pub type LuaResult<T> = Result<T, LuaError>;
