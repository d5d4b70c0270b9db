//! Turns `$import` dependencies into anonymous components.
//!
//! An import clones the imported component's raw config, applies the overrides given next to
//! `$import` and registers the result under a synthesized id. The owner then simply references
//! that id.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::{
    config::ComponentConfig,
    errors::ConfigError,
    parser::{classify, Declared, Dependency},
    registry::ComponentRegistry,
};

/// Reserved prefix of anonymous component ids
pub const ANONYMOUS_PREFIX: &str = "$anonymous$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Arg,
    Prop,
}
impl Role {
    fn marker(self) -> &'static str {
        match self {
            Role::Arg => "$arg.",
            Role::Prop => "$prop.",
        }
    }
}

/// Id of the anonymous component `owner` imports from `imported` at `position`.
///
/// The prefix is only added once, so nested imports don't stack it.
pub fn anonymous_id(owner: &str, role: Role, position: &str, imported: &str) -> String {
    let prefix = match owner.starts_with(ANONYMOUS_PREFIX) {
        true => "",
        false => ANONYMOUS_PREFIX,
    };
    format!("{prefix}{owner}{}{position}.{imported}", role.marker())
}

pub(crate) struct AnonymousComponent {
    pub id: String,
    pub config: ComponentConfig,
}

/// Arguments and properties of a config with every import replaced by a reference
pub(crate) struct Expansion {
    pub args: Vec<Dependency>,
    pub properties: BTreeMap<String, Dependency>,
    /// Not yet registered, in declaration order (args first)
    pub children: Vec<AnonymousComponent>,
}

pub(crate) fn expand(
    owner: &str,
    config: &ComponentConfig,
    registry: &ComponentRegistry,
) -> Result<Expansion, ConfigError> {
    let mut children = Vec::new();

    let args = config
        .args
        .iter()
        .enumerate()
        .map(|(index, value)| {
            expand_value(owner, Role::Arg, &index.to_string(), value, registry, &mut children)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let properties = config
        .properties
        .iter()
        .map(|(key, value)| {
            expand_value(owner, Role::Prop, key, value, registry, &mut children)
                .map(|dependency| (key.clone(), dependency))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    if !children.is_empty() {
        tracing::debug!("'{owner}' declares {} anonymous components", children.len());
    }

    Ok(Expansion {
        args,
        properties,
        children,
    })
}

fn expand_value(
    owner: &str,
    role: Role,
    position: &str,
    value: &Json,
    registry: &ComponentRegistry,
    children: &mut Vec<AnonymousComponent>,
) -> Result<Dependency, ConfigError> {
    match classify(value) {
        Declared::Literal(literal) => Ok(Dependency::Literal(literal.clone())),
        Declared::Reference(id) => Ok(Dependency::Reference(id.to_string())),
        Declared::Import { id, overrides } => {
            let imported = registry.get(id).ok_or_else(|| ConfigError::ImportMissing {
                owner: owner.to_string(),
                imported: id.to_string(),
            })?;

            let anonymous = anonymous_id(owner, role, position, id);
            let config = imported
                .raw
                .merged(&anonymous, &Json::Object(overrides.clone()))?;

            tracing::trace!("'{owner}' imports '{id}' as '{anonymous}'");
            children.push(AnonymousComponent {
                id: anonymous.clone(),
                config,
            });
            Ok(Dependency::Reference(anonymous))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::{import, import_with, reference, Scope},
        module::Export,
        types::Component,
    };

    struct Noop;
    impl Component for Noop {}

    #[test]
    fn anonymous_ids_are_prefixed_once() {
        let first = anonymous_id("owner", Role::Arg, "0", "base");
        let nested = anonymous_id(&first, Role::Prop, "sink", "writer");

        assert_eq!(first, "$anonymous$owner$arg.0.base");
        assert_eq!(nested, "$anonymous$owner$arg.0.base$prop.sink.writer");
    }

    #[test]
    fn same_import_at_different_positions_gets_distinct_ids() {
        let mut registry = ComponentRegistry::default();
        registry
            .add("base", ComponentConfig::class(Export::class(|_| Ok(Noop))))
            .unwrap();

        let config = ComponentConfig::default()
            .arg(import("base"))
            .arg(import("base"));
        let expansion = expand("owner", &config, &registry).unwrap();

        assert_ne!(expansion.children[0].id, expansion.children[1].id);
    }

    #[test]
    fn merges_overrides_onto_imported_config() {
        let mut registry = ComponentRegistry::default();
        registry
            .add(
                "base",
                ComponentConfig::member("lib", "Base")
                    .singleton()
                    .arg("a")
                    .property("level", 1),
            )
            .unwrap();

        let config = ComponentConfig::default()
            .arg(reference("other"))
            .property("dep", import_with("base", json!({ "args": ["x"], "scope": "transient" })));
        let expansion = expand("owner", &config, &registry).unwrap();

        assert_eq!(expansion.args, vec![Dependency::Reference("other".into())]);
        let child = &expansion.children[0];
        assert_eq!(
            expansion.properties["dep"],
            Dependency::Reference(child.id.clone())
        );
        assert_eq!(child.config.args, vec![json!("x")]);
        assert_eq!(child.config.scope, Scope::Transient);
        assert_eq!(child.config.properties["level"], json!(1));
    }
}
