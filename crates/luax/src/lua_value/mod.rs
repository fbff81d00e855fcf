// Value model: tagged values, interned strings, tables and threads.
mod lua_table;
mod lua_thread;
mod lua_value;

use crate::LuaVM;
use crate::lua_vm::LuaResult;
use crate::syntax::ast::FuncBody;
use ahash::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

pub use lua_table::LuaTable;
pub use lua_thread::{CoroutineStatus, LuaThread, ResumeFrame};
pub use lua_value::{LuaValue, LuaValueKind};

/// Native function type — Rust function callable from the language.
/// Returns a single value, which may be a `Multi` bundle.
pub type CFunction = fn(&mut LuaVM, &[LuaValue]) -> LuaResult<LuaValue>;

/// Immutable string with a cached content hash.
#[derive(Debug, Clone)]
pub struct LuaString {
    hash: u64,
    data: String,
}

impl LuaString {
    pub fn new(s: String) -> Self {
        let mut hasher = RandomState::with_seeds(0x9e37, 0x79b9, 0x7f4a, 0x7c15).build_hasher();
        hasher.write(s.as_bytes());
        let hash = hasher.finish();
        LuaString { hash, data: s }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Byte length (the value of `#s`).
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn cached_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        // hashes first, content only on collision
        if self.hash != other.hash {
            return false;
        }
        self.data == other.data
    }
}

impl Eq for LuaString {}

impl std::hash::Hash for LuaString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Interpreted closure: parameter list, vararg flag, body AST and the
/// captured definition environment.
pub struct LuaFunction {
    pub proto: Rc<FuncBody>,
    pub env: crate::lua_vm::EnvRef,
}

/// Interning pool for short strings. Short strings are shared so repeated
/// identifier-like keys compare by pointer most of the time.
pub struct StringPool {
    max_short_len: usize,
    pool: HashMap<String, Rc<LuaString>, RandomState>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::with_max_len(40)
    }

    pub fn with_max_len(max_short_len: usize) -> Self {
        StringPool {
            max_short_len,
            pool: HashMap::with_capacity_and_hasher(256, RandomState::new()),
        }
    }

    pub fn intern(&mut self, s: &str) -> Rc<LuaString> {
        if s.len() <= self.max_short_len {
            if let Some(existing) = self.pool.get(s) {
                return Rc::clone(existing);
            }
            let lua_str = Rc::new(LuaString::new(s.to_string()));
            self.pool.insert(s.to_string(), Rc::clone(&lua_str));
            lua_str
        } else {
            Rc::new(LuaString::new(s.to_string()))
        }
    }

    pub fn stats(&self) -> (usize, usize) {
        let count = self.pool.len();
        let bytes: usize = self.pool.keys().map(|s| s.len()).sum();
        (count, bytes)
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}
