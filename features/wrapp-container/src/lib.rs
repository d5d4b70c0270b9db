//! Wrapp Container is a dependency injection container driven by plain data configs.
//!
//! Components are registered under string ids. Their arguments and properties are either
//! literals, `{"$ref": "<id>"}` references to other components, or `{"$import": "<id>"}`
//! imports, which copy another component's config under a new anonymous id.
//!
//! Creators live either inline in the config or as members of backing modules which are
//! fetched on demand through a [ModuleLoader]. All modules needed by a request are loaded with
//! a single loader call.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use wrapp_container::{
//!     reference, Component, ComponentConfig, Container, Export, MemoryLoader, Module,
//! };
//!
//! struct Pool {
//!     url: String,
//! }
//! impl Component for Pool {}
//!
//! struct Repo {
//!     pool: Arc<Pool>,
//! }
//! impl Component for Repo {}
//!
//! let db = Module::new("db").with_export(
//!     "Pool",
//!     Export::class(|args| {
//!         Ok(Pool {
//!             url: args.str(0).unwrap_or_default().to_string(),
//!         })
//!     }),
//! );
//! let container = Container::builder(Arc::new(MemoryLoader::new().with_module(db)))
//!     .add_component("pool", ComponentConfig::member("db", "Pool").singleton().arg("pg://"))
//!     .add_component(
//!         "repo",
//!         ComponentConfig::class(Export::class(|args| {
//!             let pool = args.instance::<Pool>(0).ok_or("pool missing")?;
//!             Ok(Repo { pool })
//!         }))
//!         .arg(reference("pool")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let repo = futures::executor::block_on(container.get_component("repo")).unwrap();
//! assert_eq!(repo.downcast::<Repo>().unwrap().pool.url, "pg://");
//! ```

pub mod anonymous;
pub mod binding;
pub mod builder;
pub mod config;
pub mod container;
pub mod errors;
pub mod factory;
pub mod module;
pub mod parser;
pub mod registry;
pub mod types;

pub use anonymous::ANONYMOUS_PREFIX;
pub use builder::ContainerBuilder;
pub use config::{import, import_with, reference, ComponentConfig, Creator, Scope};
pub use container::Container;
pub use errors::{BindError, ConfigError, ResolveError};
pub use factory::set_property;
pub use module::{Export, MemoryLoader, Module, ModuleLoader};
pub use types::{Args, Component, DynError, Instance, Value};
