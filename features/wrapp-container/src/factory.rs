use std::sync::Arc;

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};

use crate::{
    container::ContainerInner,
    errors::ResolveError,
    parser::{dependent_modules, Dependency, ModuleMap},
    registry::ComponentDefinition,
    types::{Args, Component, Fields, Instance, Value},
};

impl ContainerInner {
    /// Resolves every id into a fully injected value.
    ///
    /// The result matches `ids` positionally, duplicates included. Unregistered ids are only
    /// warned about and resolve to [Value::Missing].
    pub(crate) fn get_components(
        self: &Arc<Self>,
        ids: Vec<String>,
    ) -> BoxFuture<'static, Result<Vec<Value>, ResolveError>> {
        let this = Arc::clone(self);
        async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let (definitions, modules) = this.with_registry(|registry| {
                let mut modules = ModuleMap::default();
                let definitions = ids
                    .iter()
                    .map(|id| {
                        let definition = registry.get(id);
                        match &definition {
                            Some(definition) => {
                                modules.add_unbound(definition);
                                dependent_modules(registry, &mut modules, &definition.arg_deps);
                            }
                            None => tracing::warn!("Requested '{id}', but it is not registered"),
                        }
                        definition
                    })
                    .collect::<Vec<_>>();
                (definitions, modules)
            })?;

            this.load(modules).await?;

            // Start every pipeline, results are put back into their request position
            let mut slots = vec![Value::Missing; ids.len()];
            let mut pipelines = definitions
                .into_iter()
                .enumerate()
                .filter_map(|(index, definition)| {
                    let this = Arc::clone(&this);
                    definition.map(|definition| async move {
                        (index, this.create_instance(definition).await)
                    })
                })
                .collect::<FuturesUnordered<_>>();

            let pipeline_count = pipelines.len();
            while let Some((index, result)) = pipelines.next().await {
                slots[index] = Value::Instance(result?);
                tracing::trace!(
                    "Resolved '{}' [{} of {pipeline_count} left]",
                    ids[index],
                    pipelines.len()
                );
            }

            Ok(slots)
        }
        .boxed()
    }

    /// Constructs a new instance and injects its properties
    pub(crate) async fn build(
        self: &Arc<Self>,
        definition: &Arc<ComponentDefinition>,
    ) -> Result<Instance, ResolveError> {
        let creator = definition.creator()?;

        let resolved = self.get_components(definition.arg_deps.clone()).await?;
        let args = substitute(&definition.args, resolved);

        let mut object = creator
            .invoke(Args::new(args))
            .map_err(|error| ResolveError::CreatorFailed {
                id: definition.id.clone(),
                error: Arc::new(error),
            })?;

        let mut fields = Fields::new();
        self.inject(definition, object.as_mut(), &mut fields).await?;

        tracing::debug!("Created '{}'", definition.id);
        Ok(Instance::new(&definition.id, Arc::from(object), fields))
    }

    /// Injects declared properties and, for `auto` components, setter dependencies.
    ///
    /// Both sets of dependencies are loaded with one loader call and requested concurrently.
    async fn inject(
        self: &Arc<Self>,
        definition: &Arc<ComponentDefinition>,
        object: &mut dyn Component,
        fields: &mut Fields,
    ) -> Result<(), ResolveError> {
        let setter_deps = match definition.auto {
            true => {
                let object = &*object;
                self.with_registry(|registry| definition.setter_deps(object, registry).to_vec())?
            }
            false => Vec::new(),
        };
        if definition.properties.is_empty() && setter_deps.is_empty() {
            return Ok(());
        }

        let modules = self.with_registry(|registry| {
            let mut modules = ModuleMap::default();
            dependent_modules(registry, &mut modules, &definition.prop_deps);
            dependent_modules(registry, &mut modules, &setter_deps);
            modules
        })?;
        self.load(modules).await?;

        let (properties, setters) = futures::try_join!(
            self.get_components(definition.prop_deps.clone()),
            self.get_components(setter_deps.clone())
        )?;

        let declared = definition
            .properties
            .keys()
            .zip(substitute(definition.properties.values(), properties));
        for (key, value) in declared {
            set_property(object, fields, key, value);
        }
        for (key, value) in setter_deps.iter().zip(setters) {
            set_property(object, fields, key, value);
        }

        Ok(())
    }
}

/// Replaces every reference with the next resolved value, literals are kept as declared
fn substitute<'a>(
    declared: impl IntoIterator<Item = &'a Dependency>,
    resolved: Vec<Value>,
) -> Vec<Value> {
    let mut resolved = resolved.into_iter();
    declared
        .into_iter()
        .map(|dependency| match dependency {
            Dependency::Literal(literal) => Value::Literal(literal.clone()),
            Dependency::Reference(_) => resolved.next().unwrap_or_default(),
        })
        .collect()
}

/// Injects `value` under `key`.
///
/// Uses the component's setter if it has one for `key`, otherwise the value lands in the
/// instance's field slots.
pub fn set_property(object: &mut dyn Component, fields: &mut Fields, key: &str, value: Value) {
    if object.setters().iter().any(|setter| *setter == key) {
        tracing::trace!("Injecting '{key}' through {}", setter_name(key));
        object.set(key, value);
    } else {
        tracing::trace!("Injecting '{key}' as field");
        fields.insert(key.to_string(), value);
    }
}

/// `name` -> `setName`
pub fn setter_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Named {
        name: Option<String>,
    }
    impl Component for Named {
        fn setters(&self) -> &[&'static str] {
            &["name"]
        }

        fn set(&mut self, key: &str, value: Value) {
            if key == "name" {
                self.name = value.as_str().map(str::to_string);
            }
        }
    }

    #[test]
    fn setter_receives_value_and_field_stays_empty() {
        let mut named = Named::default();
        let mut fields = Fields::new();

        set_property(&mut named, &mut fields, "name", json!("db").into());

        assert_eq!(named.name.as_deref(), Some("db"));
        assert!(!fields.contains_key("name"));
    }

    #[test]
    fn without_setter_the_field_is_assigned() {
        let mut named = Named::default();
        let mut fields = Fields::new();

        set_property(&mut named, &mut fields, "port", json!(5432).into());

        assert!(named.name.is_none());
        assert_eq!(fields["port"].as_literal(), Some(&json!(5432)));
    }

    #[test]
    fn setter_names() {
        assert_eq!(setter_name("name"), "setName");
        assert_eq!(setter_name("dbPool"), "setDbPool");
        assert_eq!(setter_name(""), "set");
    }

    #[test]
    fn substitutes_references_in_order() {
        let declared = [
            Dependency::Reference("a".into()),
            Dependency::Literal(json!("x")),
            Dependency::Reference("b".into()),
        ];
        let resolved: Vec<Value> = vec![json!(1).into(), json!(2).into()];

        let values = substitute(&declared, resolved);

        assert_eq!(values[0].as_literal(), Some(&json!(1)));
        assert_eq!(values[1].as_str(), Some("x"));
        assert_eq!(values[2].as_literal(), Some(&json!(2)));
    }
}
