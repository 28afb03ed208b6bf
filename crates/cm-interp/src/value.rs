//! The interpreter's dynamically-typed value sum (spec §4.11).

use cm_util::FxHashMap;

use crate::LocalId;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
    Struct { type_name: String, fields: FxHashMap<u32, Value> },
    Array(Vec<Value>),
    Slice { elems: Vec<Value>, cap: usize },
    Pointer { target_local: LocalId, array_index: Option<i64> },
}

impl Value {
    pub fn default_for(ty: &cm_hir::Type) -> Self {
        use cm_hir::Type;
        match ty {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Char => Value::Char('\0'),
            Type::String => Value::String(String::new()),
            Type::Array(elem, n) => Value::Array(vec![Value::default_for(elem); *n]),
            Type::Slice(_) => Value::Slice { elems: Vec::new(), cap: 0 },
            Type::Struct(name) => Value::Struct { type_name: name.to_string(), fields: FxHashMap::default() },
            Type::Unit | Type::Void | Type::Error => Value::Unit,
            _ => Value::Unit,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Unit => false,
            _ => true,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Value::Struct { type_name, .. } => Some(type_name),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Struct { type_name, .. } => write!(f, "{type_name} {{..}}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Slice { elems, .. } => {
                write!(f, "[")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Pointer { target_local, array_index } => match array_index {
                Some(idx) => write!(f, "*local{}[{idx}]", target_local.as_u32()),
                None => write!(f, "*local{}", target_local.as_u32()),
            },
        }
    }
}
