use std::collections::BTreeMap;

use crate::lang::value::Value;

/// The process-wide variable store: one flat namespace, untyped slots.
///
/// DNCL has no blocks, so there is no scope stack. Iteration is name-sorted,
/// which keeps the end-of-script dump deterministic. Nothing here is
/// synchronized; the interpreter is single threaded and embedders must
/// serialize access themselves.
pub struct Variables {
    inner: BTreeMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Variables {
            inner: BTreeMap::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn insert(&mut self, name: String, val: Value) {
        self.inner.insert(name, val);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}
