use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use trailhead_agent::Engine;
use trailhead_core::catalog::{Catalog, CatalogError};
use trailhead_core::config::{AppConfig, ConfigError, LoadOptions};
use trailhead_core::errors::ApplicationError;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub engine: Arc<Engine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("engine setup failed: {0}")]
    Engine(#[from] ApplicationError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        data_dir = %config.catalog.data_dir.display(),
        "starting application bootstrap"
    );

    let catalog = Arc::new(Catalog::load(&config.catalog)?);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        order_count = catalog.orders().len(),
        product_count = catalog.products().len(),
        "catalog data loaded"
    );

    let engine = Arc::new(Engine::from_config(&config, Arc::clone(&catalog))?);
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        tool_count = engine.registry().len(),
        model_override = engine.selector().has_override(),
        model_replies = engine.replies().uses_model(),
        "engine ready"
    );

    Ok(Application { config, catalog, engine })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use trailhead_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    const ORDERS: &str = r##"[
        {"CustomerName": "Jo Park", "Email": "jo@example.com", "OrderNumber": "#W001",
         "ProductsOrdered": ["SOBP001"], "Status": "delivered", "TrackingNumber": "TRK100"}
    ]"##;
    const PRODUCTS: &str = r#"[
        {"ProductName": "Summit Backpack 45L", "SKU": "SOBP001", "Inventory": 4,
         "Description": "A rugged pack.", "Tags": ["Backpack", "Hiking"]}
    ]"#;

    fn options(dir: &TempDir) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                data_dir: Some(dir.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_wires_catalog_tools() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("CustomerOrders.json"), ORDERS).expect("write orders");
        fs::write(dir.path().join("ProductCatalog.json"), PRODUCTS).expect("write products");

        let app = bootstrap(options(&dir)).expect("bootstrap should succeed");

        assert_eq!(app.catalog.orders().len(), 1);
        assert_eq!(app.engine.registry().len(), 5);
        assert!(!app.engine.selector().has_override());
    }

    #[test]
    fn bootstrap_fails_fast_on_malformed_catalog() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("CustomerOrders.json"), "[{").expect("write orders");

        let result = bootstrap(options(&dir));

        assert!(matches!(result, Err(BootstrapError::Catalog(_))));
    }

    #[test]
    fn bootstrap_rejects_model_override_without_a_model() {
        let dir = TempDir::new().expect("temp dir");
        let mut options = options(&dir);
        options.overrides.model_override = Some(true);

        let message = bootstrap(options).err().expect("error").to_string();

        assert!(message.contains("selector.model_override"));
    }
}
