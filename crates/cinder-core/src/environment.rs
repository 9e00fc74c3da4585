//! Lexical environment chain for the tree-walking evaluator
//!
//! Environments form a chain through `outer`; lookup walks outward, binding
//! always writes to the innermost frame. Closures keep their defining
//! environment alive, and that environment in turn can hold the closure, so
//! the chain lives behind `Gc` handles and the whole graph is collected
//! together.

use crate::object::Object;
use gc::{custom_trace, Finalize, Gc, GcCell, Trace};
use std::collections::HashMap;

#[derive(Clone)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Gc<GcCell<Environment>>>,
}

impl Finalize for Environment {}
unsafe impl Trace for Environment {
    custom_trace!(this, {
        mark(&this.store);
        mark(&this.outer);
    });
}

impl Environment {
    pub fn new() -> Gc<GcCell<Environment>> {
        Gc::new(GcCell::new(Environment {
            store: HashMap::new(),
            outer: None,
        }))
    }

    pub fn new_enclosed(outer: Gc<GcCell<Environment>>) -> Gc<GcCell<Environment>> {
        Gc::new(GcCell::new(Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(obj) => Some(obj.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer| outer.borrow().get(name)),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Object) {
        self.store.insert(name.into(), value);
    }
}
