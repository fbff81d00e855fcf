// Interpreter limits.

/// Iteration cap applied to every loop statement. Exceeding it emits a
/// diagnostic on stderr and terminates the loop.
pub const MAX_LOOP_ITERATIONS: u64 = 10_000_000;

/// Maximum interpreted call depth (native stack protection).
pub const MAX_CALL_DEPTH: usize = 200;

/// Maximum `__index`/`__newindex` chain length before the cycle guard trips.
pub const MAX_INDEX_CHAIN: usize = 100;

/// Prefix used for all stderr diagnostics.
pub const DIAG_PREFIX: &str = "[LuaX]:";
