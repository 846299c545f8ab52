use async_trait::async_trait;
use metascan_core::{
    AssetAccess, AssetConnector, AssetId, CatalogQuery, ConnectionDescriptor, ConnectorFactory,
    DiscoveryError, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Resolves one asset to a live data connector, for the lifetime of one
/// discovery request. The connection document is fetched from the
/// catalog at most once and cached; repeated `connector()` calls reuse
/// it.
pub struct AssetResolver {
    asset: AssetId,
    catalog: Arc<dyn CatalogQuery>,
    connectors: Arc<dyn ConnectorFactory>,
    cached: Mutex<Option<ConnectionDescriptor>>,
}

impl AssetResolver {
    pub fn new(
        asset: AssetId,
        catalog: Arc<dyn CatalogQuery>,
        connectors: Arc<dyn ConnectorFactory>,
    ) -> Self {
        Self {
            asset,
            catalog,
            connectors,
            cached: Mutex::new(None),
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset
    }
}

#[async_trait]
impl AssetAccess for AssetResolver {
    async fn connection(&self) -> Result<ConnectionDescriptor> {
        if let Some(cached) = self.cached.lock().clone() {
            return Ok(cached);
        }
        let connection = self
            .catalog
            .connection_for_asset(self.asset)
            .await
            .map_err(|e| match e {
                // Catalog outages keep their kind; anything else means the
                // asset has no usable connection document.
                e @ DiscoveryError::PropertyServer { .. } => e,
                other => DiscoveryError::invalid_parameter(
                    "asset",
                    format!("no usable connection for asset {}: {}", self.asset, other),
                ),
            })?;
        if connection.connector_provider.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter(
                "asset",
                format!("connection for asset {} names no connector provider", self.asset),
            ));
        }
        debug!(asset = %self.asset, connection = %connection.display_name, "asset connection resolved");
        *self.cached.lock() = Some(connection.clone());
        Ok(connection)
    }

    async fn connector(&self) -> Result<Box<dyn AssetConnector>> {
        let connection = self.connection().await?;
        self.connectors
            .create(&connection)
            .map_err(|e| DiscoveryError::Connector {
                asset: self.asset,
                message: "connector instantiation failed".to_string(),
                source: Some(Box::new(e)),
            })
    }
}
