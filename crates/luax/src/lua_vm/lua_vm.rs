// VM state: current environment, control-flow signals, error frames and the
// coroutine plumbing shared with the statement executor.

use super::environment::{self, Env, EnvRef};
use super::exec_stmt;
use super::lua_limits::DIAG_PREFIX;
use super::{LuaError, LuaResult};
use crate::lua_value::{LuaString, LuaTable, LuaThread, LuaValue, ResumeFrame, StringPool};
use crate::syntax;
use rand::SeedableRng;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;

/// A protected frame: pushed by pcall/xpcall/resume, popped on the way out.
/// Records the environment at push time so unwinding can restore it.
pub struct ErrorFrame {
    pub env: EnvRef,
}

pub struct LuaVM {
    /// Root (global) environment.
    pub(crate) root: EnvRef,
    /// Environment of the statement currently executing.
    pub(crate) env: EnvRef,
    pub(crate) strings: StringPool,
    pub(crate) chunk_name: String,
    pub(crate) current_line: u32,

    // transient control-flow signals, checked after every statement
    pub(crate) break_pending: bool,
    pub(crate) ret_val: Option<LuaValue>,
    pub(crate) goto_pending: Option<SmolStr>,

    // protected frames and the in-flight error value
    pub(crate) frames: Vec<ErrorFrame>,
    pub(crate) error_object: LuaValue,
    pub(crate) error_line: Option<u32>,
    /// Exit status requested through `os.exit`.
    pub(crate) exit_code: i32,

    // coroutine plumbing
    pub(crate) co_yielding: bool,
    /// Resume frames collected while a yield unwinds (innermost first).
    pub(crate) co_unwind: Vec<ResumeFrame>,
    /// Resume chain being consumed during re-entry (outermost at the end).
    pub(crate) co_resume: Vec<ResumeFrame>,
    pub(crate) active_co: Option<Rc<RefCell<LuaThread>>>,

    pub(crate) call_depth: usize,
    pub(crate) rng: rand::rngs::StdRng,
}

impl LuaVM {
    pub fn new() -> Self {
        let root = Env::root();
        LuaVM {
            env: Rc::clone(&root),
            root,
            strings: StringPool::new(),
            chunk_name: "input".to_string(),
            current_line: 0,
            break_pending: false,
            ret_val: None,
            goto_pending: None,
            frames: Vec::new(),
            error_object: LuaValue::Nil,
            error_line: None,
            exit_code: 0,
            co_yielding: false,
            co_unwind: Vec::new(),
            co_resume: Vec::new(),
            active_co: None,
            call_depth: 0,
            rng: rand::rngs::StdRng::from_entropy(),
        }
    }

    /// Register the standard libraries into the globals.
    pub fn open_libs(&mut self) -> LuaResult<()> {
        crate::lib_registry::create_standard_registry().load_all(self)
    }

    /// Parse and run a chunk; the chunk's `return` value (if any) is the
    /// result.
    pub fn execute(&mut self, source: &str) -> LuaResult<LuaValue> {
        let name = self.chunk_name.clone();
        self.execute_named(source, &name)
    }

    pub fn execute_named(&mut self, source: &str, chunk_name: &str) -> LuaResult<LuaValue> {
        let block = match syntax::parse(source, chunk_name) {
            Ok(b) => b,
            Err(msg) => {
                let v = self.create_string(&msg);
                return Err(self.raise(v));
            }
        };
        self.chunk_name = chunk_name.to_string();
        // the chunk runs as a vararg body over the globals
        let chunk_env = Env::child(&self.root);
        let pack = self.new_table();
        if let Some(t) = pack.as_table() {
            let _ = t
                .borrow_mut()
                .raw_set(self.create_string("n"), LuaValue::integer(0));
        }
        chunk_env
            .borrow_mut()
            .add(SmolStr::new("..."), pack, true);
        let saved_env = std::mem::replace(&mut self.env, chunk_env);
        let saved_ret = self.ret_val.take();
        let saved_break = std::mem::replace(&mut self.break_pending, false);
        let saved_goto = self.goto_pending.take();

        let r = exec_stmt::exec_block(self, &block);

        self.env = saved_env;
        let result = self.ret_val.take().unwrap_or(LuaValue::Nil);
        self.ret_val = saved_ret;
        self.break_pending = saved_break;
        self.goto_pending = saved_goto;
        match r {
            Ok(()) => Ok(result),
            Err(LuaError::Yield) => {
                let v = self.create_string("attempt to yield from outside a coroutine");
                Err(self.raise(v))
            }
            Err(e) => Err(e),
        }
    }

    // ---- values -----------------------------------------------------------

    pub fn create_string(&mut self, s: &str) -> LuaValue {
        LuaValue::Str(self.strings.intern(s))
    }

    pub fn intern(&mut self, s: &str) -> Rc<LuaString> {
        self.strings.intern(s)
    }

    pub fn new_table(&mut self) -> LuaValue {
        LuaValue::Table(Rc::new(RefCell::new(LuaTable::new())))
    }

    /// Pack a value sequence into a fresh table with 1-based keys and the
    /// conventional `n` count.
    pub fn pack_values(&mut self, values: &[LuaValue]) -> LuaValue {
        let t = LuaTable::with_capacity(values.len(), 1);
        let handle = Rc::new(RefCell::new(t));
        {
            let mut t = handle.borrow_mut();
            for (i, v) in values.iter().enumerate() {
                t.set_int(i as i64 + 1, v.clone());
            }
            let _ = t.raw_set(
                self.create_string("n"),
                LuaValue::integer(values.len() as i64),
            );
        }
        LuaValue::Table(handle)
    }

    // ---- globals ----------------------------------------------------------

    pub fn root_env(&self) -> EnvRef {
        Rc::clone(&self.root)
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) {
        environment::assign(&self.root, name, value);
    }

    pub fn get_global(&self, name: &str) -> Option<LuaValue> {
        environment::get(&self.root, name)
    }

    // ---- errors -----------------------------------------------------------

    /// Raise an arbitrary error value.
    pub fn raise(&mut self, err: LuaValue) -> LuaError {
        self.error_object = err;
        self.error_line = Some(self.current_line).filter(|l| *l > 0);
        LuaError::Runtime
    }

    /// Raise a plain string error.
    pub fn error(&mut self, msg: String) -> LuaError {
        let v = self.create_string(&msg);
        self.raise(v)
    }

    /// Human-readable rendering of the in-flight error value.
    pub fn error_message(&mut self) -> String {
        let err = self.error_object.clone();
        self.display_value(&err)
    }

    pub fn error_line(&self) -> Option<u32> {
        self.error_line
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub(crate) fn push_frame(&mut self) {
        let env = Rc::clone(&self.env);
        self.frames.push(ErrorFrame { env });
    }

    pub(crate) fn pop_frame(&mut self) -> Option<ErrorFrame> {
        self.frames.pop()
    }

    /// Non-error diagnostic on stderr, `[LuaX]:`-prefixed.
    pub(crate) fn diag(&self, line: u32, msg: &str) {
        if line > 0 {
            eprintln!("{} {} at line {}", DIAG_PREFIX, msg, line);
        } else {
            eprintln!("{} {}", DIAG_PREFIX, msg);
        }
    }

    // ---- formatting -------------------------------------------------------

    /// Stable decimal rendering used by `tostring` and concat.
    pub fn number_to_string(v: &LuaValue) -> String {
        match v {
            LuaValue::Integer(i) => {
                let mut buf = itoa::Buffer::new();
                buf.format(*i).to_string()
            }
            LuaValue::Float(f) => Self::float_to_string(*f),
            _ => String::new(),
        }
    }

    pub fn float_to_string(f: f64) -> String {
        if f.is_nan() {
            return "nan".to_string();
        }
        if f.is_infinite() {
            return if f < 0.0 { "-inf" } else { "inf" }.to_string();
        }
        let abs = f.abs();
        if f.fract() == 0.0 && abs < 1e16 {
            format!("{:.1}", f)
        } else if abs != 0.0 && (abs >= 1e16 || abs < 1e-4) {
            format!("{:e}", f)
        } else {
            format!("{}", f)
        }
    }

    /// `tostring` without metamethod dispatch.
    pub fn display_value(&mut self, v: &LuaValue) -> String {
        match v {
            LuaValue::Nil => "nil".to_string(),
            LuaValue::Boolean(b) => b.to_string(),
            LuaValue::Integer(_) | LuaValue::Float(_) => Self::number_to_string(v),
            LuaValue::Str(s) => s.as_str().to_string(),
            LuaValue::Table(t) => format!("table: {:p}", Rc::as_ptr(t)),
            LuaValue::NativeFn(f) => format!("function: builtin: {:p}", *f as *const ()),
            LuaValue::Function(f) => format!("function: {:p}", Rc::as_ptr(f)),
            LuaValue::Thread(t) => format!("thread: {:p}", Rc::as_ptr(t)),
            LuaValue::Multi(_) => self.display_value(&v.clone().first()),
        }
    }
}

impl Default for LuaVM {
    fn default() -> Self {
        Self::new()
    }
}
