use std::sync::Arc;

use crate::{
    errors::{BindError, ResolveError},
    module::{CreateFn, Export, ModuleLoader},
    parser::ModuleMap,
    types::{Args, Component, DynError, Fields, Instance},
};

/// How a bound creator is invoked, decided once when binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Called directly, `is_factory` components
    Call,
    /// Constructed
    Construct,
}

/// A creator resolved to something callable
pub struct BoundCreator {
    invocation: Invocation,
    create: CreateFn,
    /// The export itself, handed out by `static` components
    export: Instance,
}

impl BoundCreator {
    pub(crate) fn bind(id: &str, export: &Export, is_factory: bool) -> Result<Self, BindError> {
        let invocation = match (export, is_factory) {
            (Export::Class(_), true) => {
                return Err(BindError::ClassAsFactory { id: id.to_string() })
            }
            (_, true) => Invocation::Call,
            (_, false) => Invocation::Construct,
        };

        Ok(BoundCreator {
            invocation,
            create: Arc::clone(export.create_fn()),
            export: Instance::new(id, Arc::new(export.clone()), Fields::new()),
        })
    }

    pub fn invocation(&self) -> Invocation {
        self.invocation
    }

    pub(crate) fn export(&self) -> &Instance {
        &self.export
    }

    pub(crate) fn invoke(&self, args: Args) -> Result<Box<dyn Component>, DynError> {
        match self.invocation {
            Invocation::Call => tracing::trace!("Calling factory '{}'", self.export.id()),
            Invocation::Construct => tracing::trace!("Constructing '{}'", self.export.id()),
        }
        (self.create)(args)
    }
}

/// Loads all modules in `modules` with a single loader call and binds the waiting creators.
///
/// Does not call the loader at all if nothing is pending.
pub(crate) async fn load_modules(
    loader: Arc<dyn ModuleLoader>,
    modules: ModuleMap,
) -> Result<(), ResolveError> {
    if modules.is_empty() {
        return Ok(());
    }

    let names = modules.names();
    tracing::debug!("Loading modules {names:?}");

    let loaded = loader
        .load(names.clone())
        .await
        .map_err(|error| ResolveError::LoadFailed {
            modules: names.clone(),
            error: Arc::new(error),
        })?;

    if loaded.len() != names.len() {
        return Err(ResolveError::LoaderMismatch {
            requested: names.len(),
            loaded: loaded.len(),
        });
    }

    for ((name, pending), module) in modules.into_entries().into_iter().zip(loaded) {
        for definition in pending {
            definition.bind_from(&name, &module)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::{
        config::ComponentConfig,
        module::{MemoryLoader, Module},
        parser::dependent_modules,
        registry::ComponentRegistry,
    };

    struct Noop;
    impl Component for Noop {}

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::default();
        registry.add("a", ComponentConfig::member("lib", "A")).unwrap();
        registry.add("b", ComponentConfig::member("lib", "B")).unwrap();
        registry
            .add("missing", ComponentConfig::member("lib", "Nope"))
            .unwrap();
        registry
    }

    fn lib() -> Module {
        Module::new("lib")
            .with_export("A", Export::class(|_| Ok(Noop)))
            .with_export("B", Export::function(|_| Ok(Noop)))
    }

    #[test]
    fn class_cannot_be_called_as_factory() {
        let class = Export::class(|_| Ok(Noop));
        let function = Export::function(|_| Ok(Noop));

        assert!(matches!(
            BoundCreator::bind("x", &class, true),
            Err(BindError::ClassAsFactory { .. })
        ));
        assert_eq!(BoundCreator::bind("x", &class, false).unwrap().invocation(), Invocation::Construct);
        assert_eq!(BoundCreator::bind("x", &function, true).unwrap().invocation(), Invocation::Call);
        assert_eq!(BoundCreator::bind("x", &function, false).unwrap().invocation(), Invocation::Construct);
    }

    #[test]
    fn empty_map_never_reaches_loader() {
        let loader = Arc::new(MemoryLoader::new());

        block_on(load_modules(loader.clone(), ModuleMap::default())).unwrap();

        assert!(loader.calls().is_empty());
    }

    #[test]
    fn binds_all_pending_creators_with_one_load() {
        let registry = registry();
        let loader = Arc::new(MemoryLoader::new().with_module(lib()));
        let mut modules = ModuleMap::default();
        dependent_modules(&registry, &mut modules, &["a".to_string(), "b".to_string()]);

        block_on(load_modules(loader.clone(), modules)).unwrap();

        assert_eq!(loader.calls(), vec![vec!["lib".to_string()]]);
        assert!(registry.get("a").unwrap().creator().is_ok());
        assert!(registry.get("b").unwrap().creator().is_ok());
        assert!(registry.get("missing").unwrap().creator().is_err());
    }

    #[test]
    fn missing_export_fails_binding() {
        let registry = registry();
        let loader = Arc::new(MemoryLoader::new().with_module(lib()));
        let mut modules = ModuleMap::default();
        dependent_modules(&registry, &mut modules, &["missing".to_string()]);

        let result = block_on(load_modules(loader, modules));

        assert!(matches!(
            result,
            Err(ResolveError::Bind(BindError::MissingExport { ref member, .. })) if member == "Nope"
        ));
    }

    #[test]
    fn loader_errors_are_reported() {
        let registry = registry();
        let loader = Arc::new(MemoryLoader::new());
        let mut modules = ModuleMap::default();
        dependent_modules(&registry, &mut modules, &["a".to_string()]);

        let result = block_on(load_modules(loader, modules));

        assert!(matches!(result, Err(ResolveError::LoadFailed { ref modules, .. }) if modules == &["lib"]));
    }
}
