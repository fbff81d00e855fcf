// Table engine following the classic array-part + hash-part split.
// - Array part stores values for integer keys [1..array.len()]
// - Hash part holds everything else
// - A Nil value means "absent"; assigning Nil removes the entry

use super::LuaValue;
use ahash::AHashMap;

/// Key rejected by `raw_set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKeyError {
    NilKey,
    NanKey,
}

impl TableKeyError {
    pub fn message(self) -> &'static str {
        match self {
            TableKeyError::NilKey => "table index is nil",
            TableKeyError::NanKey => "table index is NaN",
        }
    }
}

pub struct LuaTable {
    /// Array part: values for integer keys `1..=array.len()`.
    array: Vec<LuaValue>,
    /// Hash part for every other key.
    hash: AHashMap<LuaValue, LuaValue>,
    /// Optional metatable; always a `Table` value when present.
    metatable: Option<LuaValue>,
}

impl LuaTable {
    pub fn new() -> Self {
        LuaTable {
            array: Vec::new(),
            hash: AHashMap::new(),
            metatable: None,
        }
    }

    pub fn with_capacity(narr: usize, nhash: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(narr),
            hash: AHashMap::with_capacity(nhash),
            metatable: None,
        }
    }

    pub fn get_metatable(&self) -> Option<LuaValue> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, mt: Option<LuaValue>) {
        self.metatable = mt;
    }

    /// Integral float keys collapse onto the equal integer key so that
    /// `t[1]` and `t[1.0]` address the same slot. NaN keys are rejected.
    fn normalize_key(key: LuaValue) -> Result<LuaValue, TableKeyError> {
        match key {
            LuaValue::Nil => Err(TableKeyError::NilKey),
            LuaValue::Float(f) if f.is_nan() => Err(TableKeyError::NanKey),
            LuaValue::Float(f)
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 =>
            {
                Ok(LuaValue::Integer(f as i64))
            }
            k => Ok(k),
        }
    }

    /// Fast integer access, O(1) in the array part.
    #[inline]
    pub fn get_int(&self, key: i64) -> Option<LuaValue> {
        if key >= 1 {
            let idx = (key - 1) as usize;
            if idx < self.array.len() {
                let val = &self.array[idx];
                if !val.is_nil() {
                    return Some(val.clone());
                }
                return None;
            }
        }
        self.hash.get(&LuaValue::Integer(key)).cloned()
    }

    /// Raw read: `Some(v)` when present, `None` when absent.
    pub fn raw_get(&self, key: &LuaValue) -> Option<LuaValue> {
        let key = match Self::normalize_key(key.clone()) {
            Ok(k) => k,
            Err(_) => return None,
        };
        if let LuaValue::Integer(i) = key {
            return self.get_int(i);
        }
        self.hash.get(&key).cloned()
    }

    #[inline]
    pub fn set_int(&mut self, key: i64, value: LuaValue) {
        if key >= 1 {
            let idx = (key - 1) as usize;
            if idx < self.array.len() {
                self.array[idx] = value;
                return;
            }
            if idx == self.array.len() && !value.is_nil() {
                self.array.push(value);
                // migrate any hash entries that now extend the array
                let mut next = self.array.len() as i64 + 1;
                while let Some(v) = self.hash.remove(&LuaValue::Integer(next)) {
                    self.array.push(v);
                    next += 1;
                }
                return;
            }
        }
        if value.is_nil() {
            self.hash.remove(&LuaValue::Integer(key));
        } else {
            self.hash.insert(LuaValue::Integer(key), value);
        }
    }

    /// Raw write; assigning Nil removes the entry.
    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> Result<(), TableKeyError> {
        let key = Self::normalize_key(key)?;
        if let LuaValue::Integer(i) = key {
            self.set_int(i, value);
            return Ok(());
        }
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
        Ok(())
    }

    /// A border: an index n with `t[n] ~= nil` and `t[n+1] == nil`.
    /// Doubling probe then binary search; index 0 is never probed.
    pub fn border(&self) -> i64 {
        // fast path: dense array part with an absent successor in the hash
        let alen = self.array.len();
        if alen > 0
            && !self.array[alen - 1].is_nil()
            && !self.hash.contains_key(&LuaValue::Integer(alen as i64 + 1))
        {
            // interior holes still need the search below
            if self.array.iter().all(|v| !v.is_nil()) {
                return alen as i64;
            }
        }
        if self.get_int(1).is_none() {
            return 0;
        }
        let mut i: i64 = 1;
        let mut j: i64 = 2;
        while self.get_int(j).is_some() {
            i = j;
            if j > i64::MAX / 2 {
                // pathological: fall back to a linear scan
                let mut n = 1;
                while self.get_int(n + 1).is_some() {
                    n += 1;
                }
                return n;
            }
            j *= 2;
        }
        while j - i > 1 {
            let m = (i + j) / 2;
            if self.get_int(m).is_some() {
                i = m;
            } else {
                j = m;
            }
        }
        i
    }

    /// Number of slots in the array part (not the Lua length).
    #[inline]
    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty() && self.array.iter().all(|v| v.is_nil())
    }

    /// Stateless iteration for `next()`: array part first, then hash part.
    pub fn next(&self, key: &LuaValue) -> Option<(LuaValue, LuaValue)> {
        if key.is_nil() {
            for (i, val) in self.array.iter().enumerate() {
                if !val.is_nil() {
                    return Some((LuaValue::Integer(i as i64 + 1), val.clone()));
                }
            }
            return self
                .hash
                .iter()
                .next()
                .map(|(k, v)| (k.clone(), v.clone()));
        }
        let key = Self::normalize_key(key.clone()).ok()?;
        if let LuaValue::Integer(i) = key {
            if i >= 1 && (i as usize) <= self.array.len() {
                for j in (i as usize)..self.array.len() {
                    if !self.array[j].is_nil() {
                        return Some((LuaValue::Integer(j as i64 + 1), self.array[j].clone()));
                    }
                }
                return self
                    .hash
                    .iter()
                    .next()
                    .map(|(k, v)| (k.clone(), v.clone()));
            }
        }
        self.hash
            .iter()
            .skip_while(|(k, _)| !k.raw_equals(&key))
            .nth(1)
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Insert into the array part at 1-based position, shifting right.
    pub fn insert_at(&mut self, pos: i64, value: LuaValue) -> Result<(), &'static str> {
        let len = self.border();
        if pos < 1 || pos > len + 1 {
            return Err("position out of bounds");
        }
        let idx = (pos - 1) as usize;
        if idx <= self.array.len() {
            self.array.insert(idx, value);
        } else {
            // sparse tail lives in the hash part; shift it up
            let mut i = len;
            while i >= pos {
                if let Some(v) = self.raw_get(&LuaValue::Integer(i)) {
                    self.set_int(i + 1, v);
                }
                i -= 1;
            }
            self.set_int(pos, value);
        }
        Ok(())
    }

    /// Remove from the array part at 1-based position, shifting left.
    pub fn remove_at(&mut self, pos: i64) -> Result<LuaValue, &'static str> {
        let len = self.border();
        if len == 0 && (pos == 0 || pos == len) {
            return Ok(LuaValue::Nil);
        }
        if pos < 1 || pos > len + 1 {
            return Err("position out of bounds");
        }
        let idx = (pos - 1) as usize;
        if idx < self.array.len() {
            return Ok(self.array.remove(idx));
        }
        let removed = self.raw_get(&LuaValue::Integer(pos)).unwrap_or(LuaValue::Nil);
        let mut i = pos;
        while i < len {
            let next = self.raw_get(&LuaValue::Integer(i + 1)).unwrap_or(LuaValue::Nil);
            self.set_int(i, next);
            i += 1;
        }
        self.set_int(len, LuaValue::Nil);
        Ok(removed)
    }

    /// Snapshot of all entries, array part first. Used by iteration that
    /// must not hold a borrow across callbacks.
    pub fn iter_all(&self) -> Vec<(LuaValue, LuaValue)> {
        let mut result = Vec::with_capacity(self.array.len() + self.hash.len());
        for (i, val) in self.array.iter().enumerate() {
            if !val.is_nil() {
                result.push((LuaValue::Integer(i as i64 + 1), val.clone()));
            }
        }
        for (k, v) in &self.hash {
            result.push((k.clone(), v.clone()));
        }
        result
    }
}

impl Default for LuaTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut t = LuaTable::new();
        t.raw_set(LuaValue::Integer(1), LuaValue::Integer(10)).unwrap();
        assert_eq!(t.raw_get(&LuaValue::Integer(1)), Some(LuaValue::Integer(10)));
        t.raw_set(LuaValue::Integer(1), LuaValue::Nil).unwrap();
        assert_eq!(t.raw_get(&LuaValue::Integer(1)), None);
    }

    #[test]
    fn nan_and_nil_keys_rejected() {
        let mut t = LuaTable::new();
        assert_eq!(
            t.raw_set(LuaValue::Float(f64::NAN), LuaValue::Integer(1)),
            Err(TableKeyError::NanKey)
        );
        assert_eq!(
            t.raw_set(LuaValue::Nil, LuaValue::Integer(1)),
            Err(TableKeyError::NilKey)
        );
    }

    #[test]
    fn float_keys_normalize() {
        let mut t = LuaTable::new();
        t.raw_set(LuaValue::Float(2.0), LuaValue::Integer(7)).unwrap();
        assert_eq!(t.raw_get(&LuaValue::Integer(2)), Some(LuaValue::Integer(7)));
    }

    #[test]
    fn border_of_dense_sequence() {
        let mut t = LuaTable::new();
        for i in 1..=5 {
            t.set_int(i, LuaValue::Integer(i * 10));
        }
        assert_eq!(t.border(), 5);
        t.set_int(5, LuaValue::Nil);
        assert_eq!(t.border(), 4);
    }

    #[test]
    fn border_with_hole_is_some_border() {
        let mut t = LuaTable::new();
        t.set_int(1, LuaValue::Integer(1));
        t.set_int(2, LuaValue::Integer(2));
        t.set_int(4, LuaValue::Integer(4));
        let b = t.border();
        assert!(t.get_int(b).is_some());
        assert!(t.get_int(b + 1).is_none());
    }

    #[test]
    fn next_walks_array_then_hash() {
        let mut t = LuaTable::new();
        t.set_int(1, LuaValue::Integer(10));
        t.set_int(2, LuaValue::Integer(20));
        t.raw_set(
            LuaValue::Str(std::rc::Rc::new(crate::lua_value::LuaString::new(
                "k".to_string(),
            ))),
            LuaValue::Integer(30),
        )
        .unwrap();
        let mut count = 0;
        let mut key = LuaValue::Nil;
        while let Some((k, _)) = t.next(&key) {
            count += 1;
            key = k;
        }
        assert_eq!(count, 3);
    }
}
