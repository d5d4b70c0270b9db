use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use futures::lock::Mutex;

use crate::{
    anonymous::{self, Expansion},
    binding::BoundCreator,
    config::{ComponentConfig, Creator, Scope},
    errors::{BindError, ConfigError, ResolveError},
    module::Module,
    parser::{dependency_ids, Dependency},
    types::{Component, Instance},
};

/// A registered component, with its dependencies already parsed
pub struct ComponentDefinition {
    pub(crate) id: String,
    /// Config as registered, cloned by `$import`
    pub(crate) raw: ComponentConfig,
    pub(crate) scope: Scope,
    pub(crate) auto: bool,
    is_factory: bool,
    creator: Option<Creator>,
    bound: OnceLock<BoundCreator>,

    pub(crate) args: Vec<Dependency>,
    pub(crate) properties: BTreeMap<String, Dependency>,
    pub(crate) arg_deps: Vec<String>,
    pub(crate) prop_deps: Vec<String>,
    /// Anonymous components created for `$import`s of this component
    pub(crate) anonymous_deps: Vec<String>,
    setter_deps: OnceLock<Vec<String>>,

    /// Singleton cache, locked while the singleton is built
    pub(crate) instance: Mutex<Option<Instance>>,
}
impl Debug for ComponentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("arg_deps", &self.arg_deps)
            .field("prop_deps", &self.prop_deps)
            .field("anonymous_deps", &self.anonymous_deps)
            .field("bound", &self.bound.get().is_some())
            .finish()
    }
}

impl ComponentDefinition {
    fn new(id: String, raw: ComponentConfig, expansion: Expansion) -> Result<Self, ConfigError> {
        let Expansion {
            args,
            properties,
            children,
        } = expansion;

        let definition = ComponentDefinition {
            arg_deps: dependency_ids(&args),
            prop_deps: dependency_ids(properties.values()),
            anonymous_deps: children.into_iter().map(|child| child.id).collect(),
            args,
            properties,
            scope: raw.scope,
            auto: raw.auto,
            // Static components hand out their creator without invoking it
            is_factory: raw.is_factory && raw.scope != Scope::Static,
            creator: raw.creator.clone(),
            bound: OnceLock::new(),
            setter_deps: OnceLock::new(),
            instance: Mutex::new(None),
            raw,
            id,
        };

        // Inline creators and preloaded modules never need the loader
        match (&definition.creator, &definition.raw.module) {
            (Some(Creator::Direct(export)), _) => {
                definition.set_bound(BoundCreator::bind(&definition.id, export, definition.is_factory)?);
            }
            (Some(Creator::Member { .. }), Some(module)) => {
                definition.bind_from(module.name(), module)?;
            }
            _ => {}
        }

        Ok(definition)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the module the creator still waits for, if any
    pub fn pending_module(&self) -> Option<&str> {
        if self.bound.get().is_some() {
            return None;
        }
        match &self.creator {
            Some(Creator::Member { module, .. }) => Some(module),
            _ => None,
        }
    }

    /// Binds a member creator against its loaded module, no-op if already bound
    pub(crate) fn bind_from(&self, requested: &str, module: &Module) -> Result<(), BindError> {
        if self.bound.get().is_some() {
            return Ok(());
        }
        let Some(Creator::Member { member, .. }) = &self.creator else {
            return Ok(());
        };

        let export = module.export(member).ok_or_else(|| BindError::MissingExport {
            module: requested.to_string(),
            member: member.clone(),
        })?;
        self.set_bound(BoundCreator::bind(&self.id, export, self.is_factory)?);
        Ok(())
    }

    fn set_bound(&self, bound: BoundCreator) {
        // A concurrent load may have won the race, both bindings are equivalent
        let _ = self.bound.set(bound);
    }

    pub(crate) fn creator(&self) -> Result<&BoundCreator, ResolveError> {
        match (self.bound.get(), &self.creator) {
            (Some(bound), _) => Ok(bound),
            (None, None) => Err(ResolveError::NoCreator(self.id.clone())),
            (None, Some(_)) => Err(ResolveError::Unbound(self.id.clone())),
        }
    }

    /// Registered components this instance can take through a setter, but which are not
    /// declared as properties. Computed on first use and cached.
    pub(crate) fn setter_deps(&self, object: &dyn Component, registry: &ComponentRegistry) -> &[String] {
        self.setter_deps.get_or_init(|| {
            let discovered = object
                .setters()
                .iter()
                .filter(|key| !self.properties.contains_key(**key) && registry.contains(key))
                .map(|key| key.to_string())
                .collect::<Vec<_>>();
            tracing::debug!("Discovered setter dependencies of '{}': {discovered:?}", self.id);
            discovered
        })
    }
}

/// All component definitions by id
#[derive(Default)]
pub struct ComponentRegistry {
    definitions: HashMap<String, Arc<ComponentDefinition>>,
}

impl ComponentRegistry {
    /// Registers a component and every anonymous component its `$import`s produce.
    ///
    /// Registering an id twice keeps the first definition and only warns. Nothing is
    /// registered if the component or one of its anonymous components fails.
    pub fn add(&mut self, id: impl Into<String>, config: ComponentConfig) -> Result<(), ConfigError> {
        let id = id.into();
        if self.definitions.contains_key(&id) {
            tracing::warn!("'{id}' is already registered, keeping the existing definition");
            return Ok(());
        }

        let mut staged = Vec::new();
        self.stage(id, config, &mut staged)?;

        for definition in staged {
            tracing::debug!(
                "Registered '{}' ({}) with {} arg and {} property dependencies",
                definition.id,
                definition.scope,
                definition.arg_deps.len(),
                definition.prop_deps.len()
            );
            self.definitions
                .insert(definition.id.clone(), Arc::new(definition));
        }
        Ok(())
    }

    /// Builds the definition of `id` and of its anonymous components, children first
    fn stage(
        &self,
        id: String,
        config: ComponentConfig,
        staged: &mut Vec<ComponentDefinition>,
    ) -> Result<(), ConfigError> {
        let mut expansion = anonymous::expand(&id, &config, self)?;
        for child in &mut expansion.children {
            if self.definitions.contains_key(&child.id) {
                tracing::warn!("'{}' is already registered, keeping the existing definition", child.id);
                continue;
            }
            self.stage(child.id.clone(), std::mem::take(&mut child.config), staged)?;
        }

        staged.push(ComponentDefinition::new(id, config, expansion)?);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<ComponentDefinition>> {
        self.definitions.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ComponentDefinition>> {
        self.definitions.values()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::{import, import_with, reference},
        module::Export,
    };

    struct Noop;
    impl Component for Noop {}

    fn noop() -> ComponentConfig {
        ComponentConfig::class(Export::class(|_| Ok(Noop)))
    }

    #[test]
    fn duplicate_keeps_first_definition() {
        let mut registry = ComponentRegistry::default();
        registry.add("a", noop().singleton()).unwrap();
        registry.add("a", noop()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().scope, Scope::Singleton);
    }

    #[test]
    fn parses_dependencies_on_registration() {
        let mut registry = ComponentRegistry::default();
        registry
            .add(
                "service",
                noop()
                    .arg(reference("db"))
                    .arg("literal")
                    .arg(reference("cache"))
                    .property("logger", reference("logger"))
                    .property("name", "service"),
            )
            .unwrap();

        let service = registry.get("service").unwrap();
        assert_eq!(service.arg_deps, vec!["db", "cache"]);
        assert_eq!(service.prop_deps, vec!["logger"]);
        assert_eq!(service.args[1], Dependency::Literal(json!("literal")));
    }

    #[test]
    fn inline_creators_are_bound_immediately() {
        let mut registry = ComponentRegistry::default();
        registry.add("inline", noop()).unwrap();
        registry.add("member", ComponentConfig::member("lib", "Thing")).unwrap();

        assert!(registry.get("inline").unwrap().pending_module().is_none());
        assert_eq!(registry.get("member").unwrap().pending_module(), Some("lib"));
    }

    #[test]
    fn preloaded_module_binds_without_loader() {
        let module = Module::new("lib").with_export("Thing", Export::class(|_| Ok(Noop)));
        let mut registry = ComponentRegistry::default();
        registry
            .add("member", ComponentConfig::member("lib", "Thing").module(module.clone()))
            .unwrap();

        assert!(registry.get("member").unwrap().pending_module().is_none());

        let missing = registry.add("broken", ComponentConfig::member("lib", "Other").module(module));
        assert!(matches!(missing, Err(ConfigError::Bind(BindError::MissingExport { .. }))));
    }

    #[test]
    fn imports_register_anonymous_components() {
        let mut registry = ComponentRegistry::default();
        registry.add("base", noop().arg("default")).unwrap();
        registry
            .add(
                "owner",
                noop()
                    .arg(import("base"))
                    .property("child", import_with("base", json!({ "args": ["x"] }))),
            )
            .unwrap();

        let owner = registry.get("owner").unwrap();
        assert_eq!(owner.anonymous_deps.len(), 2);
        assert_eq!(registry.len(), 4);

        for anonymous in &owner.anonymous_deps {
            assert!(registry.contains(anonymous));
        }
        assert_eq!(owner.arg_deps, vec![owner.anonymous_deps[0].clone()]);
        assert_eq!(owner.prop_deps, vec![owner.anonymous_deps[1].clone()]);

        let child = registry.get(&owner.prop_deps[0]).unwrap();
        assert_eq!(child.args, vec![Dependency::Literal(json!("x"))]);
    }

    #[test]
    fn failed_registration_leaves_no_anonymous_components() {
        let mut registry = ComponentRegistry::default();
        registry.add("base", noop()).unwrap();

        let failed = registry.add(
            "owner",
            noop()
                .factory()
                .property("dep", import_with("base", json!({ "args": ["old"] }))),
        );
        assert!(matches!(failed, Err(ConfigError::Bind(BindError::ClassAsFactory { .. }))));
        assert_eq!(registry.len(), 1);

        registry
            .add(
                "owner",
                noop().property("dep", import_with("base", json!({ "args": ["new"] }))),
            )
            .unwrap();

        let owner = registry.get("owner").unwrap();
        let child = registry.get(&owner.prop_deps[0]).unwrap();
        assert_eq!(child.args, vec![Dependency::Literal(json!("new"))]);
    }

    #[test]
    fn static_components_ignore_the_factory_flag() {
        let mut registry = ComponentRegistry::default();

        registry
            .add("creator", noop().factory().scope(Scope::Static))
            .unwrap();

        assert!(registry.get("creator").unwrap().creator().is_ok());
    }

    #[test]
    fn import_of_unknown_component_fails() {
        let mut registry = ComponentRegistry::default();
        let result = registry.add("owner", noop().arg(import("nowhere")));

        assert!(matches!(
            result,
            Err(ConfigError::ImportMissing { ref owner, ref imported }) if owner == "owner" && imported == "nowhere"
        ));
        assert!(!registry.contains("owner"));
    }
}
