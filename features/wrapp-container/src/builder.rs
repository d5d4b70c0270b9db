use std::sync::Arc;

use crate::{
    config::ComponentConfig, container::Container, errors::ConfigError, module::ModuleLoader,
};

/// Collects components before building a [Container]
///
/// The module loader is required up front, there is no default loader.
pub struct ContainerBuilder {
    loader: Arc<dyn ModuleLoader>,
    /// Registered in insertion order on build
    components: Vec<(String, ComponentConfig)>,
}

impl ContainerBuilder {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        ContainerBuilder {
            loader,
            components: Vec::new(),
        }
    }

    pub fn add_component(mut self, id: impl Into<String>, config: ComponentConfig) -> Self {
        self.components.push((id.into(), config));
        self
    }

    pub fn build(self) -> Result<Container, ConfigError> {
        let container = Container::new(self.loader);
        container.add_components(self.components)?;
        Ok(container)
    }
}
