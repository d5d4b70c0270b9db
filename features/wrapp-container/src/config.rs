use std::{collections::BTreeMap, fmt::Display};

use serde::Deserialize;
use serde_json::{json, Map, Value as Json};

use crate::{
    errors::ConfigError,
    module::{Export, Module},
    parser::{IMPORT_KEY, REF_KEY},
};

/// Lifecycle policy of a component's instances
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// New instance per request
    #[default]
    Transient,
    /// First instance is cached for the lifetime of the container
    Singleton,
    /// The creator itself is handed out, never invoked
    Static,
}
impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Scope::Transient => "transient",
            Scope::Singleton => "singleton",
            Scope::Static => "static",
        })
    }
}

/// How a component gets created
#[derive(Clone, Debug)]
pub enum Creator {
    /// Callable given inline
    Direct(Export),
    /// Member of a backing module, bound once the module is loaded
    Member { module: String, member: String },
}

impl Creator {
    pub fn member(module: impl Into<String>, member: impl Into<String>) -> Self {
        Creator::Member {
            module: module.into(),
            member: member.into(),
        }
    }

    /// Parses `<module>#<member>`
    pub fn parse(reference: &str) -> Result<Self, ConfigError> {
        match reference.split_once('#') {
            Some((module, member)) if !module.is_empty() && !member.is_empty() => {
                Ok(Creator::member(module, member))
            }
            _ => Err(ConfigError::InvalidCreator(reference.to_string())),
        }
    }
}

/// Raw config of a component, as given on registration
#[derive(Clone, Debug, Default)]
pub struct ComponentConfig {
    pub creator: Option<Creator>,
    /// Call the creator directly instead of constructing it
    pub is_factory: bool,
    pub scope: Scope,
    /// Creator arguments, literals or `$ref`/`$import` objects
    pub args: Vec<Json>,
    /// Injected after construction, literals or `$ref`/`$import` objects
    pub properties: BTreeMap<String, Json>,
    /// Also inject registered components matching the instance's setters
    pub auto: bool,
    /// Preloaded backing module, member creators bind against it without the loader
    pub module: Option<Module>,
}

impl ComponentConfig {
    pub fn new(creator: Creator) -> Self {
        ComponentConfig {
            creator: Some(creator),
            ..Default::default()
        }
    }

    /// Component constructed from an inline class
    pub fn class(export: Export) -> Self {
        Self::new(Creator::Direct(export))
    }

    /// Component created from a member of a backing module
    pub fn member(module: impl Into<String>, member: impl Into<String>) -> Self {
        Self::new(Creator::member(module, member))
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(Scope::Singleton)
    }

    pub fn factory(mut self) -> Self {
        self.is_factory = true;
        self
    }

    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    pub fn arg(mut self, arg: impl Into<Json>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = Json>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    /// Reads a config from JSON.
    ///
    /// ```json
    /// { "creator": "logging#Logger", "scope": "singleton", "args": ["info"],
    ///   "properties": { "sink": { "$ref": "stdout" } } }
    /// ```
    pub fn from_json(id: &str, config: &Json) -> Result<Self, ConfigError> {
        Self::default().merged(id, config)
    }

    /// Copy of this config with every field present in `overrides` replaced.
    ///
    /// Fields are replaced as a whole, `args` and `properties` are not merged element wise.
    /// Keys other than the config fields (e.g. `$import`) are ignored.
    pub fn merged(&self, id: &str, overrides: &Json) -> Result<Self, ConfigError> {
        let overrides =
            ConfigOverrides::deserialize(overrides).map_err(|e| ConfigError::InvalidConfig {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let mut merged = self.clone();
        if let Some(creator) = overrides.creator {
            merged.creator = Some(Creator::parse(&creator)?);
        }
        if let Some(is_factory) = overrides.is_factory {
            merged.is_factory = is_factory;
        }
        if let Some(scope) = overrides.scope {
            merged.scope = scope;
        }
        if let Some(args) = overrides.args {
            merged.args = args;
        }
        if let Some(properties) = overrides.properties {
            merged.properties = properties;
        }
        if let Some(auto) = overrides.auto {
            merged.auto = auto;
        }
        Ok(merged)
    }
}

/// Config fields as they appear in JSON and in `$import` overrides
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigOverrides {
    creator: Option<String>,
    is_factory: Option<bool>,
    scope: Option<Scope>,
    args: Option<Vec<Json>>,
    properties: Option<BTreeMap<String, Json>>,
    auto: Option<bool>,
}

/// `{ "$ref": id }`
pub fn reference(id: &str) -> Json {
    json!({ REF_KEY: id })
}

/// `{ "$import": id }`
pub fn import(id: &str) -> Json {
    json!({ IMPORT_KEY: id })
}

/// `{ "$import": id, ...overrides }`
pub fn import_with(id: &str, overrides: Json) -> Json {
    let mut import = match overrides {
        Json::Object(map) => map,
        _ => Map::new(),
    };
    import.insert(IMPORT_KEY.to_string(), Json::String(id.to_string()));
    Json::Object(import)
}
