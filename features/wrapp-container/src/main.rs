use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde_json::json;
use wrapp_container::{
    Component, ComponentConfig, Container, Export, MemoryLoader, Module, Value,
};

fn main() {
    let loader = Arc::new(MemoryLoader::new().with_module(logging()));
    let container = Container::new(loader.clone());

    // Imported components have to be registered first
    let configs = [
        (
            "sink",
            json!({ "creator": "logging#ConsoleSink", "scope": "singleton", "args": ["[app]"] }),
        ),
        (
            "logger",
            json!({
                "creator": "logging#Logger",
                "args": ["main"],
                "properties": { "sink": { "$ref": "sink" } }
            }),
        ),
        (
            "auditLogger",
            json!({
                "creator": "logging#Logger",
                "args": ["audit"],
                "properties": { "sink": { "$import": "sink", "args": ["[audit]"] } }
            }),
        ),
    ];
    for (id, config) in &configs {
        let config = ComponentConfig::from_json(id, config).unwrap();
        container.add_component(*id, config).unwrap();
    }

    println!("{:?}", container);

    let resolved =
        futures::executor::block_on(container.get_components(["logger", "auditLogger", "logger"]))
            .unwrap();
    for logger in resolved.iter().filter_map(Value::downcast::<Logger>) {
        logger.log("hello");
    }
    println!("loader calls: {:?}", loader.calls());

    container.dispose();
}

struct ConsoleSink {
    prefix: String,
    written: AtomicUsize,
}
impl Component for ConsoleSink {
    fn dispose(&self) {
        println!(
            "{} closed after {} lines",
            self.prefix,
            self.written.load(Ordering::Relaxed)
        );
    }
}

struct Logger {
    name: String,
    sink: Option<Arc<ConsoleSink>>,
}
impl Component for Logger {
    fn setters(&self) -> &[&'static str] {
        &["sink"]
    }

    fn set(&mut self, key: &str, value: Value) {
        if key == "sink" {
            self.sink = value.downcast();
        }
    }
}
impl Logger {
    fn log(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.written.fetch_add(1, Ordering::Relaxed);
            println!("{} {}: {message}", sink.prefix, self.name);
        }
    }
}

fn logging() -> Module {
    Module::new("logging")
        .with_export(
            "ConsoleSink",
            Export::class(|args| {
                Ok(ConsoleSink {
                    prefix: args.str(0).unwrap_or_default().to_string(),
                    written: AtomicUsize::new(0),
                })
            }),
        )
        .with_export(
            "Logger",
            Export::class(|args| {
                Ok(Logger {
                    name: args.str(0).unwrap_or_default().to_string(),
                    sink: None,
                })
            }),
        )
}
