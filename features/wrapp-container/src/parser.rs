//! Classifies dependency configs and collects the backing modules a set of dependencies needs.

use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value as Json};

use crate::registry::{ComponentDefinition, ComponentRegistry};

pub const REF_KEY: &str = "$ref";
pub const IMPORT_KEY: &str = "$import";

/// What a raw argument or property value declares
#[derive(Debug, Clone, PartialEq)]
pub enum Declared<'a> {
    /// Passed on unchanged
    Literal(&'a Json),
    /// `{ "$ref": id }`
    Reference(&'a str),
    /// `{ "$import": id, ...overrides }`
    Import { id: &'a str, overrides: &'a Map<String, Json> },
}

pub fn classify(value: &Json) -> Declared<'_> {
    let Json::Object(map) = value else {
        return Declared::Literal(value);
    };

    if let Some(Json::String(id)) = map.get(REF_KEY) {
        return Declared::Reference(id);
    }
    if let Some(Json::String(id)) = map.get(IMPORT_KEY) {
        return Declared::Import { id, overrides: map };
    }

    Declared::Literal(value)
}

/// An argument or property after anonymous expansion, imports are references by now
#[derive(Debug, Clone, PartialEq)]
pub enum Dependency {
    Literal(Json),
    Reference(String),
}

impl Dependency {
    pub fn reference_id(&self) -> Option<&str> {
        match self {
            Dependency::Reference(id) => Some(id),
            Dependency::Literal(_) => None,
        }
    }
}

/// Ids of all references, in declaration order
pub fn dependency_ids<'a>(dependencies: impl IntoIterator<Item = &'a Dependency>) -> Vec<String> {
    dependencies
        .into_iter()
        .filter_map(Dependency::reference_id)
        .map(str::to_string)
        .collect()
}

/// Backing module name -> components waiting for it, in insertion order
#[derive(Default)]
pub struct ModuleMap {
    index: HashMap<String, usize>,
    entries: Vec<(String, Vec<Arc<ComponentDefinition>>)>,
}

impl ModuleMap {
    /// Records that `definition` waits for `module`.
    ///
    /// A component is only recorded once per module.
    pub fn add(&mut self, module: &str, definition: Arc<ComponentDefinition>) {
        let position = *self.index.entry(module.to_string()).or_insert_with(|| {
            self.entries.push((module.to_string(), Vec::new()));
            self.entries.len() - 1
        });

        let pending = &mut self.entries[position].1;
        if !pending.iter().any(|known| Arc::ptr_eq(known, &definition)) {
            pending.push(definition);
        }
    }

    /// Records the definition if its creator still waits for a module
    pub fn add_unbound(&mut self, definition: &Arc<ComponentDefinition>) {
        if let Some(module) = definition.pending_module() {
            self.add(module, Arc::clone(definition));
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, Vec<Arc<ComponentDefinition>>)> {
        self.entries
    }
}

/// Adds the modules the components behind `dependency_ids` still need to `modules`.
///
/// Ids without a registered component are skipped, resolving them later yields a warning.
pub fn dependent_modules<'m>(
    registry: &ComponentRegistry,
    modules: &'m mut ModuleMap,
    dependency_ids: &[String],
) -> &'m mut ModuleMap {
    for id in dependency_ids {
        if let Some(definition) = registry.get(id) {
            modules.add_unbound(&definition);
        }
    }
    modules
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::{import_with, reference, ComponentConfig},
        module::Export,
        types::Component,
    };

    struct Noop;
    impl Component for Noop {}

    #[test]
    fn classifies_values() {
        let reference = reference("db");
        let import = import_with("db", json!({ "args": [1] }));
        let literal = json!({ "host": "localhost" });

        assert_eq!(classify(&reference), Declared::Reference("db"));
        assert!(matches!(classify(&import), Declared::Import { id: "db", overrides } if overrides.contains_key("args")));
        assert_eq!(classify(&literal), Declared::Literal(&literal));
        assert_eq!(classify(&json!(42)), Declared::Literal(&json!(42)));
    }

    #[test]
    fn non_string_reference_is_literal() {
        let value = json!({ "$ref": 12 });

        assert_eq!(classify(&value), Declared::Literal(&value));
    }

    #[test]
    fn dependency_ids_keep_order_and_duplicates() {
        let dependencies = [
            Dependency::Reference("b".into()),
            Dependency::Literal(json!(1)),
            Dependency::Reference("a".into()),
            Dependency::Reference("b".into()),
        ];

        assert_eq!(dependency_ids(&dependencies), vec!["b", "a", "b"]);
    }

    #[test]
    fn groups_unbound_components_by_module() {
        let mut registry = ComponentRegistry::default();
        registry.add("a", ComponentConfig::member("shared", "A")).unwrap();
        registry.add("b", ComponentConfig::member("shared", "B")).unwrap();
        registry.add("c", ComponentConfig::member("other", "C")).unwrap();
        registry
            .add("inline", ComponentConfig::class(Export::class(|_| Ok(Noop))))
            .unwrap();

        let mut modules = ModuleMap::default();
        let ids = ["a", "inline", "b", "c", "a", "unknown"].map(String::from);
        dependent_modules(&registry, &mut modules, &ids);

        assert_eq!(modules.names(), vec!["shared", "other"]);
        let entries = modules.into_entries();
        assert_eq!(entries[0].1.len(), 2);
        assert_eq!(entries[1].1.len(), 1);
    }
}
