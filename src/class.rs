use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::function::Function;
use crate::interpreter::{Interpreter, Interrupt};
use crate::value::Value;

/// Runtime class object: name, superclass link, and four member tables.
/// The class value itself answers property access (static lookup), which
/// makes static members uniform with instance members; `this` inside a
/// static member is the class value.
#[derive(Debug)]
pub struct Class {
    name: String,
    superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
    getters: HashMap<String, Rc<Function>>,
    static_methods: HashMap<String, Rc<Function>>,
    static_getters: HashMap<String, Rc<Function>>,
}

impl Class {
    pub const INIT: &'static str = "init";

    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
        getters: HashMap<String, Rc<Function>>,
        static_methods: HashMap<String, Rc<Function>>,
        static_getters: HashMap<String, Rc<Function>>,
    ) -> Self {
        Class {
            name,
            superclass,
            methods,
            getters,
            static_methods,
            static_getters,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    pub fn find_getter(&self, name: &str) -> Option<Rc<Function>> {
        self.getters.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_getter(name))
        })
    }

    pub fn find_static_method(&self, name: &str) -> Option<Rc<Function>> {
        self.static_methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_static_method(name))
        })
    }

    pub fn find_static_getter(&self, name: &str) -> Option<Rc<Function>> {
        self.static_getters.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_static_getter(name))
        })
    }

    /// The class's own static `init`, run once at declaration time.
    /// Inherited static initializers already ran at their own declaration
    /// and are not re-run here, so only the local table is consulted.
    pub fn static_initializer(&self) -> Option<Rc<Function>> {
        self.static_methods.get(Self::INIT).cloned()
    }

    /// Calling arity: the inherited-or-own instance `init`'s arity, or 0.
    pub fn arity(&self) -> usize {
        self.find_method(Self::INIT)
            .map_or(0, |initializer| initializer.arity())
    }

    /// Calling a class allocates an instance and runs its `init` bound to
    /// it (when one exists anywhere on the inheritance chain).
    pub fn construct(
        class: Rc<Class>,
        interpreter: &mut Interpreter,
        arguments: &[Value],
    ) -> Result<Value, Interrupt> {
        let instance = Rc::new(Instance::new(Rc::clone(&class)));

        if let Some(initializer) = class.find_method(Self::INIT) {
            initializer
                .bind(Value::Instance(Rc::clone(&instance)))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Instance of a user class: an immutable class link and a mutable field
/// map.  Field state is interiorly mutable because instances are shared
/// freely through `Rc`.
#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}
