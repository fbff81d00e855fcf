// Lexical environments.
// An environment is an ordered slot vector plus a parent link. Name lookup
// walks parents; assignment to an undeclared name lands on the root (global)
// environment. Each environment also keeps a LIFO of slots declared with the
// close attribute.

use crate::lua_value::LuaValue;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Env>>;

pub struct Slot {
    pub name: SmolStr,
    pub value: LuaValue,
    pub is_local: bool,
}

pub struct Env {
    parent: Option<EnvRef>,
    slots: Vec<Slot>,
    /// Slot indices registered for `__close`, in declaration order.
    closers: Vec<usize>,
}

impl Env {
    pub fn root() -> EnvRef {
        Rc::new(RefCell::new(Env {
            parent: None,
            slots: Vec::new(),
            closers: Vec::new(),
        }))
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Env {
            parent: Some(Rc::clone(parent)),
            slots: Vec::new(),
            closers: Vec::new(),
        }))
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    /// Append a new binding to this environment. Shadows any binding of the
    /// same name in an enclosing scope; a duplicate in the same scope simply
    /// adds a later slot, and lookup finds the most recent one.
    pub fn add(&mut self, name: SmolStr, value: LuaValue, is_local: bool) -> usize {
        self.slots.push(Slot {
            name,
            value,
            is_local,
        });
        self.slots.len() - 1
    }

    /// Most recent slot with this name in this environment only.
    pub fn find_local(&self, name: &str) -> Option<usize> {
        self.slots.iter().rposition(|s| s.name == name)
    }

    pub fn slot_value(&self, index: usize) -> LuaValue {
        self.slots[index].value.clone()
    }

    pub fn set_slot(&mut self, index: usize, value: LuaValue) {
        self.slots[index].value = value;
    }

    pub fn slot_name(&self, index: usize) -> SmolStr {
        self.slots[index].name.clone()
    }

    /// Register a slot for closing; closed in reverse registration order.
    pub fn register_close(&mut self, index: usize) {
        self.closers.push(index);
    }

    /// Drain the close registrations, most recent first.
    pub fn take_closers(&mut self) -> Vec<usize> {
        let mut c = std::mem::take(&mut self.closers);
        c.reverse();
        c
    }

    pub fn has_closers(&self) -> bool {
        !self.closers.is_empty()
    }
}

/// Walk the chain looking for `name`; returns the owning environment and
/// slot index.
pub fn find(env: &EnvRef, name: &str) -> Option<(EnvRef, usize)> {
    let mut cur = Rc::clone(env);
    loop {
        if let Some(idx) = cur.borrow().find_local(name) {
            return Some((Rc::clone(&cur), idx));
        }
        let parent = cur.borrow().parent();
        match parent {
            Some(p) => cur = p,
            None => return None,
        }
    }
}

pub fn get(env: &EnvRef, name: &str) -> Option<LuaValue> {
    find(env, name).map(|(owner, idx)| owner.borrow().slot_value(idx))
}

/// Assign through the chain; undeclared names become globals on the root.
pub fn assign(env: &EnvRef, name: &str, value: LuaValue) {
    match find(env, name) {
        Some((owner, idx)) => owner.borrow_mut().set_slot(idx, value),
        None => {
            root_of(env)
                .borrow_mut()
                .add(SmolStr::new(name), value, false);
        }
    }
}

pub fn root_of(env: &EnvRef) -> EnvRef {
    let mut cur = Rc::clone(env);
    loop {
        let parent = cur.borrow().parent();
        match parent {
            Some(p) => cur = p,
            None => return cur,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let root = Env::root();
        root.borrow_mut()
            .add(SmolStr::new("x"), LuaValue::integer(1), false);
        let child = Env::child(&root);
        assert_eq!(get(&child, "x"), Some(LuaValue::integer(1)));
    }

    #[test]
    fn undeclared_assignment_creates_global() {
        let root = Env::root();
        let child = Env::child(&root);
        assign(&child, "g", LuaValue::integer(9));
        assert_eq!(get(&root, "g"), Some(LuaValue::integer(9)));
    }

    #[test]
    fn shadowing_finds_most_recent() {
        let root = Env::root();
        root.borrow_mut()
            .add(SmolStr::new("x"), LuaValue::integer(1), false);
        let child = Env::child(&root);
        child
            .borrow_mut()
            .add(SmolStr::new("x"), LuaValue::integer(2), true);
        assert_eq!(get(&child, "x"), Some(LuaValue::integer(2)));
        assert_eq!(get(&root, "x"), Some(LuaValue::integer(1)));
    }

    #[test]
    fn closers_drain_in_reverse() {
        let root = Env::root();
        let mut env = root.borrow_mut();
        let a = env.add(SmolStr::new("a"), LuaValue::Nil, true);
        let b = env.add(SmolStr::new("b"), LuaValue::Nil, true);
        env.register_close(a);
        env.register_close(b);
        assert_eq!(env.take_closers(), vec![b, a]);
    }
}
