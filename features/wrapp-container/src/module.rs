use std::{collections::HashMap, fmt::Debug, future::Future, sync::Arc};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::types::{Args, Component, DynError};

/// Creator signature shared by classes and plain functions
pub type CreateFn = Arc<dyn Fn(Args) -> Result<Box<dyn Component>, DynError> + Send + Sync>;

/// A member of a [Module] which can create components
#[derive(Clone)]
pub enum Export {
    /// Can only be constructed
    Class(CreateFn),
    /// Can be called directly as a factory, or be constructed
    Function(CreateFn),
}
impl Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Export::Class(_) => f.write_str("Export::Class"),
            Export::Function(_) => f.write_str("Export::Function"),
        }
    }
}
// The export itself is what `static` components hand out
impl Component for Export {}

impl Export {
    pub fn class<T, F>(create: F) -> Self
    where
        T: Component,
        F: Fn(Args) -> Result<T, DynError> + Send + Sync + 'static,
    {
        Export::Class(erase(create))
    }

    pub fn function<T, F>(create: F) -> Self
    where
        T: Component,
        F: Fn(Args) -> Result<T, DynError> + Send + Sync + 'static,
    {
        Export::Function(erase(create))
    }

    pub fn create_fn(&self) -> &CreateFn {
        match self {
            Export::Class(create) | Export::Function(create) => create,
        }
    }

    /// Invokes the export, regardless of whether it is a class or function
    pub fn create(&self, args: Args) -> Result<Box<dyn Component>, DynError> {
        (self.create_fn())(args)
    }
}

fn erase<T, F>(create: F) -> CreateFn
where
    T: Component,
    F: Fn(Args) -> Result<T, DynError> + Send + Sync + 'static,
{
    Arc::new(move |args| create(args).map(|component| Box::new(component) as Box<dyn Component>))
}

/// A loaded backing module: named exports
#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    exports: HashMap<String, Export>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            exports: HashMap::new(),
        }
    }

    pub fn with_export(mut self, member: impl Into<String>, export: Export) -> Self {
        self.exports.insert(member.into(), export);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export(&self, member: &str) -> Option<&Export> {
        self.exports.get(member)
    }
}

/// Loads backing modules by name.
///
/// The returned modules must match the requested names positionally.
/// Implemented for any `Fn(Vec<String>) -> impl Future<Output = Result<Vec<Module>, DynError>>`.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, names: Vec<String>) -> BoxFuture<'static, Result<Vec<Module>, DynError>>;
}
impl<Fun, FunFuture> ModuleLoader for Fun
where
    Fun: Fn(Vec<String>) -> FunFuture + Send + Sync,
    FunFuture: Future<Output = Result<Vec<Module>, DynError>> + Send + 'static,
{
    fn load(&self, names: Vec<String>) -> BoxFuture<'static, Result<Vec<Module>, DynError>> {
        Box::pin(self(names))
    }
}

/// Returned by [MemoryLoader] for names it doesn't know
#[derive(thiserror::Error, Debug, Clone)]
#[error("Module '{0}' is not known to the loader")]
pub struct UnknownModule(pub String);

/// A [ModuleLoader] serving modules from memory.
///
/// Every call is recorded, which makes it handy to check what reached the loader.
#[derive(Default)]
pub struct MemoryLoader {
    modules: HashMap<String, Module>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.insert(module.name().to_string(), module);
        self
    }

    /// Every batch of names the loader was called with, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, names: Vec<String>) -> BoxFuture<'static, Result<Vec<Module>, DynError>> {
        self.calls.lock().push(names.clone());

        let loaded = names
            .into_iter()
            .map(|name| match self.modules.get(&name) {
                Some(module) => Ok(module.clone()),
                None => Err(Box::new(UnknownModule(name)) as DynError),
            })
            .collect::<Result<Vec<_>, _>>();

        Box::pin(futures::future::ready(loaded))
    }
}

