use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::environment::Environment;
use crate::error::ProlangError;
use crate::interpreter::{Interpreter, Unwind};
use crate::stmt::FunctionDecl;
use crate::token::Token;
use crate::value::Value;

/// A user-declared function paired with the environment it was declared in.
///
/// Bound methods are ordinary `Function`s whose closure has been extended
/// with a one-slot frame defining `this`.
#[derive(Clone)]
pub struct Function {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a copy of this method whose closure resolves `this` to the
    /// given instance.
    pub fn bind(&self, instance: &Rc<RefCell<Instance>>) -> Function {
        let environment = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance.clone()));

        Function {
            declaration: self.declaration.clone(),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    /// Execute the body in a fresh frame on top of the captured closure.
    ///
    /// The frame is created per call, not per declaration, so recursion
    /// works.  A `return` unwind is converted back into a plain value here;
    /// initializers always yield the `this` bound in their closure.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        debug!("Calling <func {}>", self.name());

        let environment = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => {}

            Err(Unwind::Return(value)) => {
                if self.is_initializer {
                    return Ok(self.closure.borrow().get_at(0, "this"));
                }
                return Ok(value);
            }

            Err(err) => return Err(err),
        }

        if self.is_initializer {
            return Ok(self.closure.borrow().get_at(0, "this"));
        }

        Ok(Value::Nil)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the closure is omitted: environments and functions reference each
        // other, and a derived impl would chase the cycle
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

/// A class: a name, a method table, and an optional superclass.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Depth-first method lookup through the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A class is called with as many arguments as its initializer takes.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Construct a new instance of `class`, running a bound `init` when one
    /// exists.
    pub fn call<W: Write>(
        class: &Rc<Class>,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        debug!("Instantiating <class {}>", class.name);

        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));

        if let Some(init) = class.find_method("init") {
            init.bind(&instance).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// An object: a class reference plus fields created on first assignment.
pub struct Instance {
    pub class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // fields can point back at this instance; a derived impl would chase
        // the cycle, so only the class is printed
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish_non_exhaustive()
    }
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance {
            class,
            fields: HashMap::new(),
        }
    }

    /// Property lookup: fields shadow methods; methods come back bound to
    /// the instance they were accessed on.
    pub fn get(this: &Rc<RefCell<Instance>>, name: &Token) -> Result<Value, ProlangError> {
        if let Some(value) = this.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = this.borrow().class.find_method(&name.lexeme);
        if let Some(method) = method {
            return Ok(Value::Function(Rc::new(method.bind(this))));
        }

        Err(ProlangError::runtime(
            name.line,
            format!(
                "Undefined property '{}' on object of '{}'",
                name.lexeme,
                this.borrow().class.name
            ),
        ))
    }

    /// Assign a field, creating it if absent.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
