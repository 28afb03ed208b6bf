//! A call frame: a map from local id to its current value (spec §4.11).

use cm_util::FxHashMap;

use crate::value::Value;
use crate::LocalId;

pub struct Frame {
    pub function_name: String,
    pub locals: FxHashMap<LocalId, Value>,
}

impl Frame {
    pub fn new(function_name: String) -> Self {
        Self { function_name, locals: FxHashMap::default() }
    }

    pub fn get(&self, id: LocalId) -> Value {
        self.locals.get(&id).cloned().unwrap_or(Value::Unit)
    }

    pub fn set(&mut self, id: LocalId, value: Value) {
        self.locals.insert(id, value);
    }
}
