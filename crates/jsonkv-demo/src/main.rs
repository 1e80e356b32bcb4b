use std::sync::Arc;

use anyhow::Context;
use jsonkv_store::{
    BlockingKvStore, DocumentService, FsDocumentService, InMemoryDocumentService, StoreConfig,
};
use tracing_subscriber::EnvFilter;

/// Directory for file-backed stores. Unset means an in-memory service.
const DIR_ENV: &str = "JSONKV_DIR";

/// Path to a TOML store config. Unset means defaults.
const CONFIG_ENV: &str = "JSONKV_CONFIG";

fn service_from_env() -> anyhow::Result<Arc<dyn DocumentService>> {
    match std::env::var_os(DIR_ENV) {
        Some(dir) => {
            let svc = FsDocumentService::open(&dir)
                .with_context(|| format!("opening {}", dir.to_string_lossy()))?;
            Ok(Arc::new(svc))
        }
        None => Ok(Arc::new(InMemoryDocumentService::new())),
    }
}

fn config_from_env() -> anyhow::Result<StoreConfig> {
    let Some(path) = std::env::var_os(CONFIG_ENV) else {
        return Ok(StoreConfig::default());
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.to_string_lossy()))?;
    let config = StoreConfig::from_toml_str(&text)
        .with_context(|| format!("parsing {}", path.to_string_lossy()))?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config_from_env()?;
    let store = BlockingKvStore::with_config("demo-store", service_from_env()?, config)?;
    println!("Created store {store}");

    store.set("foo", "test")?;
    println!("Set value 'test' for key 'foo'");
    println!("Got value {} for key 'foo'", store.get("foo", serde_json::Value::Null)?);

    store.set_item("bar", "another test")?;
    println!("Set value 'another test' for key 'bar'");
    println!("Got value {} for key 'bar'", store.get_item("bar")?);

    store.set_item("bar", "hello")?;
    println!("Updated key 'bar' to 'hello'");
    println!("Got value {} for key 'bar'", store.get_item("bar")?);

    let all = serde_json::Value::Object(store.dict()?);
    println!("Here's the whole thing: {all}");
    Ok(())
}
