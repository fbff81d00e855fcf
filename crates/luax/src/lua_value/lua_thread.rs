// Coroutine record.
// A thread owns its yield/resume buffers and, while suspended, the saved
// resume chain (one frame per block that was live at the yield site).

use super::LuaValue;
use crate::lua_vm::EnvRef;
use std::cell::RefCell;
use std::rc::Rc;

/// One suspended block: which block, the statement to re-enter at, and the
/// environment that was live there. Captured innermost-first while a yield
/// unwinds; consumed outermost-first on resume.
#[derive(Clone)]
pub struct ResumeFrame {
    pub block_id: usize,
    pub pc: usize,
    pub env: EnvRef,
}

pub struct LuaThread {
    /// The coroutine entry function.
    pub func: LuaValue,
    pub status: CoroutineStatus,
    /// False until the first resume invokes the entry function.
    pub started: bool,
    /// Saved unwinding chain from the last yield.
    pub resume_stack: Vec<ResumeFrame>,
    /// Values passed to `yield(...)`, delivered to the resumer.
    pub yield_values: Vec<LuaValue>,
    /// Values passed to `resume(...)`, delivered as `yield`'s return.
    pub resume_values: Vec<LuaValue>,
    /// Armed on re-entry: the next `yield` call inside this coroutine
    /// returns `resume_values` immediately instead of suspending.
    pub pending_yield_return: bool,
    /// The coroutine that resumed this one (cleared when control returns).
    pub caller: Option<Rc<RefCell<LuaThread>>>,
}

impl LuaThread {
    pub fn new(func: LuaValue) -> Self {
        LuaThread {
            func,
            status: CoroutineStatus::Suspended,
            started: false,
            resume_stack: Vec::new(),
            yield_values: Vec::new(),
            resume_values: Vec::new(),
            pending_yield_return: false,
            caller: None,
        }
    }

    pub fn can_resume(&self) -> bool {
        matches!(self.status, CoroutineStatus::Suspended)
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.status, CoroutineStatus::Dead)
    }
}

/// Coroutine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Created or yielded; can be resumed.
    Suspended,
    /// Currently executing.
    Running,
    /// Resumed another coroutine; not directly resumable.
    Normal,
    /// Finished or died with an error.
    Dead,
}

impl CoroutineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoroutineStatus::Suspended => "suspended",
            CoroutineStatus::Running => "running",
            CoroutineStatus::Normal => "normal",
            CoroutineStatus::Dead => "dead",
        }
    }
}
