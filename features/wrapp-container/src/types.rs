use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

/// All errors must be Send + Sync, creators and loaders may run on any thread
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Named slots assigned to an instance when it has no dedicated setter for a property
pub type Fields = HashMap<String, Value>;

/// Type erasure helper, implemented for every `Any + Send + Sync` type
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Anything a creator produces.
///
/// The default implementation has no setters and nothing to dispose, so for most types
/// `impl Component for MyService {}` is enough.
pub trait Component: AsAny {
    /// Property keys for which this component exposes a `set<Key>` setter.
    ///
    /// For `auto` components these keys are also used to discover setter dependencies.
    fn setters(&self) -> &[&'static str] {
        &[]
    }

    /// Called for every injected key listed in [Component::setters]
    fn set(&mut self, key: &str, value: Value) {
        let _ = (key, value);
    }

    /// Called once when the owning container is disposed (singletons only)
    fn dispose(&self) {}
}

/// A constructed and fully injected component
#[derive(Clone)]
pub struct Instance {
    id: Arc<str>,
    object: Arc<dyn Component>,
    fields: Arc<Fields>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Instance {
    pub(crate) fn new(id: &str, object: Arc<dyn Component>, fields: Fields) -> Self {
        Instance {
            id: Arc::from(id),
            object,
            fields: Arc::new(fields),
        }
    }

    /// Id of the component this instance was built for
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object(&self) -> &dyn Component {
        self.object.as_ref()
    }

    /// Attempts to get the concrete type back
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        AsAny::into_any(Arc::clone(&self.object)).downcast::<T>().ok()
    }

    /// Value assigned to a slot because the component had no setter for `key`
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// True if both handles point to the very same object
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
    }
}

/// A resolved dependency, argument or requested component
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Nothing could be resolved, e.g. the id was never registered
    #[default]
    Missing,
    /// A literal taken as declared in the config
    Literal(serde_json::Value),
    /// A component instance
    Instance(Instance),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_literal().and_then(serde_json::Value::as_str)
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Shortcut for `as_instance` followed by [Instance::downcast]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_instance().and_then(Instance::downcast::<T>)
    }
}

impl From<serde_json::Value> for Value {
    fn from(literal: serde_json::Value) -> Self {
        Value::Literal(literal)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Instance(instance)
    }
}

static MISSING: Value = Value::Missing;

/// Arguments handed to a creator, literals as declared and references already resolved
#[derive(Debug, Default)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Args(values)
    }

    /// Argument at `index`, [Value::Missing] if out of range
    pub fn get(&self, index: usize) -> &Value {
        self.0.get(index).unwrap_or(&MISSING)
    }

    pub fn literal(&self, index: usize) -> Option<&serde_json::Value> {
        self.get(index).as_literal()
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).as_str()
    }

    pub fn instance<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.get(index).downcast()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}
