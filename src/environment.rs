use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ProlangError, Result};
use crate::value::Value;

/// A frame mapping names to runtime values plus a link to its enclosing
/// frame.  The global scope is the root with no enclosing link.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(ProlangError::runtime(
                line,
                format!("Undefined Variable '{}'.", name),
            ))
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(ProlangError::runtime(
                line,
                format!("Undefined Variable '{}'.", name),
            ))
        }
    }

    /// Read a name a fixed number of frames up the parent chain.  Existence
    /// is not checked; the resolver already proved the binding is there.
    pub fn get_at(&self, distance: usize, name: &str) -> Value {
        if distance == 0 {
            self.values.get(name).cloned().unwrap_or(Value::Nil)
        } else {
            self.ancestor().borrow().get_at(distance - 1, name)
        }
    }

    /// Write a name a fixed number of frames up the parent chain.
    pub fn assign_at(&mut self, distance: usize, name: &str, value: Value) {
        if distance == 0 {
            self.values.insert(name.to_string(), value);
        } else {
            self.ancestor().borrow_mut().assign_at(distance - 1, name, value);
        }
    }

    fn ancestor(&self) -> Rc<RefCell<Environment>> {
        self.enclosing
            .clone()
            .expect("resolved depth exceeds environment chain")
    }
}
