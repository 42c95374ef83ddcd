// Quill hash table
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-18: Open-addressed linear-probing table keyed by interned string
//            pointer. Backs globals, every class's method table, every
//            instance's field table, and the intern set itself, so a
//            single implementation earns its keep across four call sites.

use crate::object::{as_header, GcBox, ObjString};
use crate::value::Value;

const MAX_LOAD: f64 = 0.75;

#[derive(Clone, Copy)]
struct Entry {
    key: Option<*mut GcBox<ObjString>>,
    value: Value,
}

const EMPTY: Entry = Entry {
    key: None,
    value: Value::Nil,
};

pub struct Table {
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, key: *mut GcBox<ObjString>) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = find_entry(&self.entries, key);
        self.entries[idx].key.map(|_| self.entries[idx].value)
    }

    /// Returns `true` if this created a brand new key, so callers can
    /// detect redefinition (e.g. a duplicate global) without a second
    /// lookup.
    pub fn set(&mut self, key: *mut GcBox<ObjString>, value: Value) -> bool {
        if (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD {
            self.grow();
        }
        let idx = find_entry(&self.entries, key);
        let is_new_key = self.entries[idx].key.is_none();
        if is_new_key && matches!(self.entries[idx].value, Value::Nil) {
            self.count += 1;
        }
        self.entries[idx] = Entry {
            key: Some(key),
            value,
        };
        is_new_key
    }

    pub fn delete(&mut self, key: *mut GcBox<ObjString>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let idx = find_entry(&self.entries, key);
        if self.entries[idx].key.is_none() {
            return false;
        }
        // Tombstone: {key: None, value: Bool(true)} is distinguished from
        // a truly empty slot {key: None, value: Nil} by the probe loop.
        self.entries[idx] = Entry {
            key: None,
            value: Value::Bool(true),
        };
        true
    }

    fn grow(&mut self) {
        let new_cap = if self.entries.is_empty() {
            8
        } else {
            self.entries.len() * 2
        };
        let mut fresh = vec![EMPTY; new_cap];
        let mut live = 0;
        for entry in &self.entries {
            if let Some(key) = entry.key {
                let idx = find_entry(&fresh, key);
                fresh[idx] = *entry;
                live += 1;
            }
        }
        self.entries = fresh;
        self.count = live;
    }

    /// Find an already-interned string with matching length, hash, and
    /// bytes. Used exclusively by the intern set to decide `copy`/`take`
    /// hits before allocating a new string object.
    pub fn find_string(&self, text: &str, hash: u32) -> Option<*mut GcBox<ObjString>> {
        if self.entries.is_empty() {
            return None;
        }
        let cap = self.entries.len();
        let mut idx = (hash as usize) % cap;
        loop {
            match self.entries[idx].key {
                None if matches!(self.entries[idx].value, Value::Nil) => return None,
                Some(key) => {
                    let s = unsafe { &(*key).data };
                    if s.hash == hash && s.bytes == text {
                        return Some(key);
                    }
                }
                None => {}
            }
            idx = (idx + 1) % cap;
        }
    }

    /// GC step 3: delete every intern-set entry whose key string did not
    /// survive mark-and-trace, before sweep frees the string itself.
    pub fn remove_unmarked_keys(&mut self) {
        for entry in &mut self.entries {
            if let Some(key) = entry.key {
                let marked = unsafe { (*as_header(key)).mark };
                if !marked {
                    *entry = Entry {
                        key: None,
                        value: Value::Bool(true),
                    };
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (*mut GcBox<ObjString>, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

fn find_entry(entries: &[Entry], key: *mut GcBox<ObjString>) -> usize {
    let cap = entries.len();
    let hash = unsafe { (*key).data.hash };
    let mut idx = (hash as usize) % cap;
    let mut tombstone: Option<usize> = None;
    loop {
        let entry = &entries[idx];
        match entry.key {
            Some(k) if std::ptr::eq(k, key) => return idx,
            Some(_) => {}
            None => {
                if matches!(entry.value, Value::Nil) {
                    return tombstone.unwrap_or(idx);
                } else if tombstone.is_none() {
                    tombstone = Some(idx);
                }
            }
        }
        idx = (idx + 1) % cap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{fnv1a_hash, ObjKind};

    fn make_string(bytes: &str) -> *mut GcBox<ObjString> {
        let hash = fnv1a_hash(bytes.as_bytes());
        let boxed = Box::new(GcBox {
            kind: ObjKind::String,
            mark: false,
            next: std::ptr::null_mut(),
            data: ObjString {
                bytes: bytes.to_string(),
                hash,
            },
        });
        Box::into_raw(boxed)
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut table = Table::new();
        let key = make_string("answer");
        assert!(table.set(key, Value::Number(42.0)));
        assert_eq!(table.get(key), Some(Value::Number(42.0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn redefining_a_key_is_not_a_new_entry() {
        let mut table = Table::new();
        let key = make_string("x");
        assert!(table.set(key, Value::Number(1.0)));
        assert!(!table.set(key, Value::Number(2.0)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(key), Some(Value::Number(2.0)));
    }

    #[test]
    fn delete_then_reinsert_does_not_double_count() {
        let mut table = Table::new();
        let key = make_string("x");
        table.set(key, Value::Bool(true));
        assert!(table.delete(key));
        assert_eq!(table.get(key), None);
        // Tombstone reuse: count must not grow past the true live count.
        assert!(table.set(key, Value::Bool(false)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn grows_past_75_percent_load_factor() {
        let mut table = Table::new();
        let keys: Vec<_> = (0..20).map(|i| make_string(&format!("k{i}"))).collect();
        for (i, &k) in keys.iter().enumerate() {
            table.set(k, Value::Number(i as f64));
        }
        for (i, &k) in keys.iter().enumerate() {
            assert_eq!(table.get(k), Some(Value::Number(i as f64)));
        }
    }

    #[test]
    fn find_string_matches_on_content_not_identity() {
        let mut table = Table::new();
        let key = make_string("hello");
        table.set(key, Value::Nil);
        let hash = fnv1a_hash(b"hello");
        assert!(table.find_string("hello", hash).is_some());
        assert!(table.find_string("nope", fnv1a_hash(b"nope")).is_none());
    }
}
