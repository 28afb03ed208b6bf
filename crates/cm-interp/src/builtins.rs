//! The builtin registry (spec §6): I/O, string, array, and slice
//! operations available to every MIR program without a user definition.

use cm_util::FxHashMap;
use tracing::warn;

use crate::value::Value;

pub type Builtin = fn(&[Value]) -> Value;

pub struct BuiltinRegistry {
    table: FxHashMap<&'static str, Builtin>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut table: FxHashMap<&'static str, Builtin> = FxHashMap::default();

        table.insert("cm_println_str", b_println);
        table.insert("cm_println_i64", b_println);
        table.insert("cm_println_f64", b_println);
        table.insert("cm_println_bool", b_println);
        table.insert("cm_print_str", b_print);
        table.insert("cm_print_i64", b_print);

        table.insert("__builtin_string_len", b_string_len);
        table.insert("__builtin_string_charAt", b_string_char_at);
        table.insert("__builtin_string_substring", b_string_substring);
        table.insert("__builtin_string_indexOf", b_string_index_of);
        table.insert("__builtin_string_toUpperCase", b_string_upper);
        table.insert("__builtin_string_toLowerCase", b_string_lower);
        table.insert("__builtin_string_trim", b_string_trim);
        table.insert("__builtin_string_startsWith", b_string_starts_with);
        table.insert("__builtin_string_endsWith", b_string_ends_with);
        table.insert("__builtin_string_includes", b_string_includes);
        table.insert("__builtin_string_repeat", b_string_repeat);
        table.insert("__builtin_string_replace", b_string_replace);
        table.insert("__builtin_string_slice", b_string_substring);
        table.insert("__builtin_string_concat", b_string_concat);
        table.insert("__builtin_string_first", b_string_first);
        table.insert("__builtin_string_last", b_string_last);

        table.insert("__builtin_array_indexOf_i64", b_array_index_of);
        table.insert("__builtin_array_includes_i64", b_array_includes);
        table.insert("__builtin_array_first_i64", b_array_first);
        table.insert("__builtin_array_last_i64", b_array_last);
        table.insert("__builtin_array_reverse_i64", b_array_reverse);
        table.insert("__builtin_array_slice_i64", b_array_slice);
        table.insert("__builtin_array_sort_i64", b_array_sort);
        table.insert("__builtin_array_sort_f64", b_array_sort);

        table.insert("cm_slice_len", b_slice_len);
        table.insert("cm_slice_cap", b_slice_cap);
        table.insert("cm_slice_get", b_slice_get);
        table.insert("cm_slice_set", b_slice_set);
        table.insert("cm_slice_push", b_slice_push);
        table.insert("cm_slice_push_slice", b_slice_push_slice);
        table.insert("cm_slice_pop", b_slice_pop);
        table.insert("cm_slice_clear", b_slice_clear);
        table.insert("cm_slice_first", b_slice_first);
        table.insert("cm_slice_last", b_slice_last);
        table.insert("cm_slice_reverse", b_slice_reverse);
        table.insert("cm_slice_delete", b_slice_delete);
        table.insert("cm_slice_subslice", b_slice_subslice);
        table.insert("cm_slice_sort", b_slice_sort);
        table.insert("cm_slice_equal", b_array_equal);

        table.insert("cm_array_to_slice", b_array_to_slice);
        table.insert("cm_slice_to_array", b_slice_to_array);
        table.insert("cm_array_equal", b_array_equal);

        table.insert("malloc", b_memory_stub);
        table.insert("realloc", b_memory_stub);
        table.insert("free", b_memory_stub);
        table.insert("memcpy", b_memory_stub);
        table.insert("memset", b_memory_stub);

        Self { table }
    }

    pub fn get(&self, name: &str) -> Option<Builtin> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn b_println(args: &[Value]) -> Value {
    if let Some(v) = args.first() {
        println!("{v}");
    }
    Value::Unit
}

fn b_print(args: &[Value]) -> Value {
    if let Some(v) = args.first() {
        print!("{v}");
    }
    Value::Unit
}

fn as_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn b_string_len(args: &[Value]) -> Value {
    Value::Int(as_str(&args[0]).chars().count() as i64)
}

fn b_string_char_at(args: &[Value]) -> Value {
    let s = as_str(&args[0]);
    let idx = args.get(1).and_then(Value::as_i64).unwrap_or(0) as usize;
    Value::Char(s.chars().nth(idx).unwrap_or('\0'))
}

fn b_string_substring(args: &[Value]) -> Value {
    let s = as_str(&args[0]);
    let chars: Vec<char> = s.chars().collect();
    let start = args.get(1).and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    let end = args.get(2).and_then(Value::as_i64).map(|e| e as usize).unwrap_or(chars.len()).min(chars.len());
    if start >= end {
        return Value::String(String::new());
    }
    Value::String(chars[start..end].iter().collect())
}

fn b_string_index_of(args: &[Value]) -> Value {
    let s = as_str(&args[0]);
    let needle = as_str(&args[1]);
    match s.find(&needle) {
        Some(byte_idx) => Value::Int(s[..byte_idx].chars().count() as i64),
        None => Value::Int(-1),
    }
}

fn b_string_upper(args: &[Value]) -> Value {
    Value::String(as_str(&args[0]).to_uppercase())
}

fn b_string_lower(args: &[Value]) -> Value {
    Value::String(as_str(&args[0]).to_lowercase())
}

fn b_string_trim(args: &[Value]) -> Value {
    Value::String(as_str(&args[0]).trim().to_string())
}

fn b_string_starts_with(args: &[Value]) -> Value {
    Value::Bool(as_str(&args[0]).starts_with(&as_str(&args[1])))
}

fn b_string_ends_with(args: &[Value]) -> Value {
    Value::Bool(as_str(&args[0]).ends_with(&as_str(&args[1])))
}

fn b_string_includes(args: &[Value]) -> Value {
    Value::Bool(as_str(&args[0]).contains(&as_str(&args[1])))
}

fn b_string_repeat(args: &[Value]) -> Value {
    let n = args.get(1).and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    Value::String(as_str(&args[0]).repeat(n))
}

fn b_string_replace(args: &[Value]) -> Value {
    Value::String(as_str(&args[0]).replace(&as_str(&args[1]), &as_str(&args[2])))
}

fn b_string_concat(args: &[Value]) -> Value {
    Value::String(format!("{}{}", as_str(&args[0]), as_str(&args[1])))
}

fn b_string_first(args: &[Value]) -> Value {
    Value::Char(as_str(&args[0]).chars().next().unwrap_or('\0'))
}

fn b_string_last(args: &[Value]) -> Value {
    Value::Char(as_str(&args[0]).chars().last().unwrap_or('\0'))
}

fn as_array(v: &Value) -> &[Value] {
    match v {
        Value::Array(items) => items,
        Value::Slice { elems, .. } => elems,
        _ => &[],
    }
}

fn b_array_index_of(args: &[Value]) -> Value {
    let needle = &args[1];
    match as_array(&args[0]).iter().position(|v| v == needle) {
        Some(i) => Value::Int(i as i64),
        None => Value::Int(-1),
    }
}

fn b_array_includes(args: &[Value]) -> Value {
    Value::Bool(as_array(&args[0]).contains(&args[1]))
}

fn b_array_first(args: &[Value]) -> Value {
    as_array(&args[0]).first().cloned().unwrap_or(Value::Unit)
}

fn b_array_last(args: &[Value]) -> Value {
    as_array(&args[0]).last().cloned().unwrap_or(Value::Unit)
}

fn b_array_reverse(args: &[Value]) -> Value {
    let mut items = as_array(&args[0]).to_vec();
    items.reverse();
    Value::Array(items)
}

fn b_array_slice(args: &[Value]) -> Value {
    let items = as_array(&args[0]);
    let start = args.get(1).and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    let end = args.get(2).and_then(Value::as_i64).map(|e| e as usize).unwrap_or(items.len()).min(items.len());
    if start >= end {
        return Value::Array(Vec::new());
    }
    Value::Array(items[start..end].to_vec())
}

fn b_slice_len(args: &[Value]) -> Value {
    Value::Int(as_array(&args[0]).len() as i64)
}

fn b_slice_cap(args: &[Value]) -> Value {
    match &args[0] {
        Value::Slice { cap, .. } => Value::Int(*cap as i64),
        other => Value::Int(as_array(other).len() as i64),
    }
}

fn b_slice_get(args: &[Value]) -> Value {
    let idx = args.get(1).and_then(Value::as_i64).unwrap_or(0) as usize;
    as_array(&args[0]).get(idx).cloned().unwrap_or(Value::Unit)
}

fn b_slice_push(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    elems.push(args.get(1).cloned().unwrap_or(Value::Unit));
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_slice_pop(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    let popped = elems.pop().unwrap_or(Value::Unit);
    let _ = elems;
    popped
}

fn b_slice_clear(_args: &[Value]) -> Value {
    Value::Slice { elems: Vec::new(), cap: 0 }
}

fn b_slice_first(args: &[Value]) -> Value {
    as_array(&args[0]).first().cloned().unwrap_or(Value::Unit)
}

fn b_slice_last(args: &[Value]) -> Value {
    as_array(&args[0]).last().cloned().unwrap_or(Value::Unit)
}

fn b_slice_reverse(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    elems.reverse();
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_array_to_slice(args: &[Value]) -> Value {
    let elems = as_array(&args[0]).to_vec();
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_slice_to_array(args: &[Value]) -> Value {
    Value::Array(as_array(&args[0]).to_vec())
}

fn b_array_equal(args: &[Value]) -> Value {
    Value::Bool(as_array(&args[0]) == as_array(&args[1]))
}

fn value_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Char(x), Value::Char(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn b_array_sort(args: &[Value]) -> Value {
    let mut items = as_array(&args[0]).to_vec();
    items.sort_by(value_cmp);
    Value::Array(items)
}

fn b_slice_sort(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    elems.sort_by(value_cmp);
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_slice_set(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    let idx = args.get(1).and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    if idx < elems.len() {
        elems[idx] = args.get(2).cloned().unwrap_or(Value::Unit);
    }
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_slice_delete(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    let idx = args.get(1).and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    if idx < elems.len() {
        elems.remove(idx);
    }
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_slice_subslice(args: &[Value]) -> Value {
    let items = as_array(&args[0]);
    let start = args.get(1).and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    let end = args.get(2).and_then(Value::as_i64).map(|e| e as usize).unwrap_or(items.len()).min(items.len());
    let elems = if start >= end { Vec::new() } else { items[start..end].to_vec() };
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_slice_push_slice(args: &[Value]) -> Value {
    let mut elems = as_array(&args[0]).to_vec();
    elems.extend_from_slice(as_array(&args[1]));
    let cap = elems.len();
    Value::Slice { elems, cap }
}

fn b_memory_stub(_args: &[Value]) -> Value {
    warn!(target: "cm_interp::builtins", "manual-memory builtin invoked in the interpreter; this is a no-op stand-in");
    Value::Unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_string_and_array_builtins() {
        let reg = BuiltinRegistry::new();
        assert!(reg.contains("__builtin_string_len"));
        assert!(reg.contains("cm_slice_push"));
        assert!(!reg.contains("nonexistent"));
    }

    #[test]
    fn string_substring_uses_unicode_scalar_slicing() {
        let out = b_string_substring(&[Value::String("hello world".into()), Value::Int(6), Value::Int(11)]);
        assert_eq!(out, Value::String("world".into()));
    }

    #[test]
    fn slice_delete_removes_the_element_at_index() {
        let slice = Value::Slice { elems: vec![Value::Int(1), Value::Int(2), Value::Int(3)], cap: 3 };
        let out = b_slice_delete(&[slice, Value::Int(1)]);
        assert_eq!(out, Value::Slice { elems: vec![Value::Int(1), Value::Int(3)], cap: 2 });
    }

    #[test]
    fn slice_sort_orders_elements_ascending() {
        let slice = Value::Slice { elems: vec![Value::Int(3), Value::Int(1), Value::Int(2)], cap: 3 };
        let out = b_slice_sort(&[slice]);
        assert_eq!(out, Value::Slice { elems: vec![Value::Int(1), Value::Int(2), Value::Int(3)], cap: 3 });
    }

    #[test]
    fn slice_push_slice_concatenates_elements() {
        let a = Value::Slice { elems: vec![Value::Int(1)], cap: 1 };
        let b = Value::Array(vec![Value::Int(2), Value::Int(3)]);
        let out = b_slice_push_slice(&[a, b]);
        assert_eq!(out, Value::Slice { elems: vec![Value::Int(1), Value::Int(2), Value::Int(3)], cap: 3 });
    }
}
