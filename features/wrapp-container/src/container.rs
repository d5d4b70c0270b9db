use std::{fmt::Debug, sync::Arc};

use parking_lot::RwLock;

use crate::{
    anonymous::ANONYMOUS_PREFIX,
    binding::load_modules,
    builder::ContainerBuilder,
    config::{ComponentConfig, Scope},
    errors::{ConfigError, ResolveError},
    module::ModuleLoader,
    parser::ModuleMap,
    registry::{ComponentDefinition, ComponentRegistry},
    types::{Instance, Value},
};

/// Dependency injection container
///
/// Holds component definitions and singleton instances. Cloning is cheap, all clones share
/// the same state.
#[derive(Clone)]
pub struct Container(Arc<ContainerInner>);
pub(crate) struct ContainerInner {
    /// None once disposed
    registry: RwLock<Option<ComponentRegistry>>,
    loader: RwLock<Arc<dyn ModuleLoader>>,
}
impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.0.registry.read();
        let Some(registry) = registry.as_ref() else {
            return f.write_str("Container(disposed)");
        };

        let mut map = f.debug_struct("Container");
        for definition in registry.definitions() {
            map.field(definition.id(), &definition.scope);
        }
        map.finish()
    }
}

impl Container {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Container(Arc::new(ContainerInner {
            registry: RwLock::new(Some(ComponentRegistry::default())),
            loader: RwLock::new(loader),
        }))
    }

    pub fn builder(loader: Arc<dyn ModuleLoader>) -> ContainerBuilder {
        ContainerBuilder::new(loader)
    }

    /// Registers a component.
    ///
    /// `$import` dependencies are turned into anonymous components right away, so the
    /// imported components must already be registered. Registering an id twice is ignored.
    pub fn add_component(
        &self,
        id: impl Into<String>,
        config: ComponentConfig,
    ) -> Result<(), ConfigError> {
        let id = id.into();
        if id.starts_with(ANONYMOUS_PREFIX) {
            tracing::warn!("'{id}' uses the reserved prefix '{ANONYMOUS_PREFIX}'");
        }

        let mut registry = self.0.registry.write();
        registry
            .as_mut()
            .ok_or(ConfigError::Disposed)?
            .add(id, config)
    }

    /// Registers components in iteration order
    pub fn add_components<Id: Into<String>>(
        &self,
        components: impl IntoIterator<Item = (Id, ComponentConfig)>,
    ) -> Result<(), ConfigError> {
        for (id, config) in components {
            self.add_component(id, config)?;
        }
        Ok(())
    }

    /// False for unknown ids and after disposal
    pub fn contains(&self, id: &str) -> bool {
        self.0
            .registry
            .read()
            .as_ref()
            .is_some_and(|registry| registry.contains(id))
    }

    /// Replaces the module loader used for subsequent resolutions
    pub fn set_loader(&self, loader: Arc<dyn ModuleLoader>) {
        *self.0.loader.write() = loader;
    }

    /// Resolves a single component, [Value::Missing] if it is not registered
    pub async fn get_component(&self, id: &str) -> Result<Value, ResolveError> {
        let mut resolved = self.0.get_components(vec![id.to_string()]).await?;
        Ok(resolved.pop().unwrap_or_default())
    }

    /// Resolves several components at once.
    ///
    /// The result has one entry per requested id, in request order. Unregistered ids resolve
    /// to [Value::Missing] without failing the others.
    pub async fn get_components<Id: Into<String>>(
        &self,
        ids: impl IntoIterator<Item = Id>,
    ) -> Result<Vec<Value>, ResolveError> {
        let ids = ids.into_iter().map(Into::into).collect();
        self.0.get_components(ids).await
    }

    /// Disposes every cached singleton and releases all definitions.
    ///
    /// The container can't be used afterwards.
    pub fn dispose(&self) {
        let Some(registry) = self.0.registry.write().take() else {
            tracing::warn!("Container was already disposed");
            return;
        };

        let mut disposed = 0;
        for definition in registry.definitions() {
            let Some(mut cached) = definition.instance.try_lock() else {
                tracing::debug!("'{}' is in use, its request disposes it", definition.id());
                continue;
            };
            if let Some(instance) = cached.take() {
                instance.object().dispose();
                disposed += 1;
            }
        }

        tracing::debug!(
            "Disposed container with {} components and {disposed} singletons",
            registry.len()
        );
    }
}

impl ContainerInner {
    pub(crate) fn with_registry<R>(
        &self,
        f: impl FnOnce(&ComponentRegistry) -> R,
    ) -> Result<R, ResolveError> {
        let registry = self.registry.read();
        registry.as_ref().map(f).ok_or(ResolveError::Disposed)
    }

    fn loader(&self) -> Arc<dyn ModuleLoader> {
        Arc::clone(&self.loader.read())
    }

    pub(crate) async fn load(&self, modules: ModuleMap) -> Result<(), ResolveError> {
        load_modules(self.loader(), modules).await
    }

    /// Provides an instance according to the component's scope.
    ///
    /// Fails with [ResolveError::Disposed] if the container was disposed meanwhile.
    pub(crate) async fn create_instance(
        self: &Arc<Self>,
        definition: Arc<ComponentDefinition>,
    ) -> Result<Instance, ResolveError> {
        let instance = match definition.scope {
            Scope::Static => definition.creator()?.export().clone(),
            Scope::Singleton => self.singleton(&definition).await?,
            Scope::Transient => self.build(&definition).await?,
        };

        if self.with_registry(|_| ()).is_err() {
            // Dispose skips cells in use, whoever used one last releases its singleton
            if let Some(orphan) = definition.instance.lock().await.take() {
                tracing::debug!("Disposing '{}' created during dispose", definition.id());
                orphan.object().dispose();
            }
            return Err(ResolveError::Disposed);
        }
        Ok(instance)
    }

    async fn singleton(
        self: &Arc<Self>,
        definition: &Arc<ComponentDefinition>,
    ) -> Result<Instance, ResolveError> {
        // Held while building, so concurrent requests wait for the first instance
        let mut cached = definition.instance.lock().await;
        if let Some(instance) = cached.as_ref() {
            return Ok(instance.clone());
        }

        let instance = self.build(definition).await?;
        *cached = Some(instance.clone());
        Ok(instance)
    }
}
