//! String interning.
//!
//! A [`Symbol`] is a 4-byte handle into a global string table, so two
//! equal identifiers compare in O(1) and a `Vec<Symbol>` is far cheaper
//! to carry around a MIR program than a `Vec<String>`.

use std::fmt;
use std::sync::{Mutex, OnceLock};

use rustc_hash::FxHashMap;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

struct StringTable {
    strings: Vec<&'static str>,
    index: FxHashMap<&'static str, u32>,
}

impl StringTable {
    fn new() -> Self {
        Self { strings: Vec::new(), index: FxHashMap::default() }
    }

    fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&idx) = self.index.get(s) {
            return Symbol(idx);
        }
        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        let idx = self.strings.len() as u32;
        self.strings.push(leaked);
        self.index.insert(leaked, idx);
        Symbol(idx)
    }

    fn get(&self, sym: Symbol) -> &'static str {
        self.strings[sym.0 as usize]
    }
}

fn table() -> &'static Mutex<StringTable> {
    static TABLE: OnceLock<Mutex<StringTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(StringTable::new()))
}

impl Symbol {
    pub fn intern(s: &str) -> Self {
        table().lock().unwrap().intern(s)
    }

    pub fn as_str(self) -> &'static str {
        table().lock().unwrap().get(self)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::intern(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::intern(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_intern_to_equal_symbols() {
        let a = Symbol::intern("hello");
        let b = Symbol::intern("hello");
        let c = Symbol::intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "hello");
    }
}
