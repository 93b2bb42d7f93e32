use crate::class::{ClassId, ClassRegistry};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;

/// A plain object instance: a class id plus a field map.
///
/// Fields are seeded from property defaults along the ancestor chain,
/// parents first so a redeclared property keeps the derived default.
/// Raw access here ignores visibility; policy enforcement lives in the
/// access layer.
#[derive(Debug)]
pub struct Object {
    class: ClassId,
    fields: RefCell<IndexMap<String, Value>>,
}

impl Object {
    pub fn new(registry: &ClassRegistry, class: ClassId) -> Self {
        let mut fields = IndexMap::new();
        let mut chain = registry.ancestry(class);
        chain.reverse();
        for class_id in chain {
            for property in registry.get(class_id).properties.values() {
                if !property.is_static {
                    fields.insert(property.name.clone(), property.default.clone());
                }
            }
        }
        Object {
            class,
            fields: RefCell::new(fields),
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.borrow().keys().cloned().collect()
    }
}
