//! Connection lifecycle for one BigQuery dataset.

use bqorm_config::shared::{ConnectionConfig, ConnectionConfigWithoutSecrets};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::bail;
use crate::client::{ClientConfig, Connector};
use crate::error::{ErrorKind, OrmResult};
use crate::orm_error;
use crate::types::DatasetId;

/// The live client plus its connected flag.
struct ConnectionHandle<T> {
    client: T,
    connected: bool,
}

/// Owns the configuration and the lazily created warehouse client.
///
/// The client is created on first use and released by [`ConnectionDriver::disconnect`] or when
/// the driver is dropped. A driver is meant to be used by one caller at a time; independent
/// drivers can be held concurrently.
pub struct ConnectionDriver<C>
where
    C: Connector,
{
    config: ConnectionConfig,
    connector: C,
    handle: Option<ConnectionHandle<C::Client>>,
}

impl<C> ConnectionDriver<C>
where
    C: Connector,
{
    pub fn new(config: ConnectionConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            handle: None,
        }
    }

    /// Creates the warehouse client.
    ///
    /// Validates the configuration first, so a missing project or dataset fails with
    /// [`ErrorKind::ConfigError`] before anything is contacted. A failing connector leaves the
    /// driver disconnected and the error is returned to the caller.
    pub async fn connect(&mut self) -> OrmResult<()> {
        self.config.validate()?;
        let client_config = ClientConfig::from_connection_config(&self.config)?;

        match self.connector.connect(&client_config).await {
            Ok(client) => {
                info!(
                    project_id = %client_config.project_id,
                    dataset_id = self.dataset_id().unwrap_or_default(),
                    "connected to warehouse"
                );

                self.handle = Some(ConnectionHandle {
                    client,
                    connected: true,
                });

                Ok(())
            }
            Err(err) => {
                error!(
                    project_id = %client_config.project_id,
                    error = %err,
                    "failed to connect to warehouse"
                );

                self.handle = None;

                if err.kind() == ErrorKind::ConnectionError
                    || err.kind() == ErrorKind::AuthenticationError
                {
                    return Err(err);
                }

                Err(orm_error!(
                    ErrorKind::ConnectionError,
                    "Failed to connect to warehouse",
                    err.to_string(),
                    source: err
                ))
            }
        }
    }

    /// Returns the client, connecting first when necessary.
    pub async fn get_connection(&mut self) -> OrmResult<&C::Client> {
        if !self.is_connected() {
            self.connect().await?;
        }

        match &self.handle {
            Some(handle) if handle.connected => Ok(&handle.client),
            _ => bail!(
                ErrorKind::ConnectionError,
                "Connection unavailable after connecting"
            ),
        }
    }

    /// Marks the driver disconnected and drops the client. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if handle.connected {
                handle.connected = false;
                debug!(
                    dataset_id = self.dataset_id().unwrap_or_default(),
                    "disconnected from warehouse"
                );
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| handle.connected)
    }

    /// Drivers are always available; kept for callers probing optional backends.
    pub fn enabled(&self) -> bool {
        true
    }

    /// Returns the merged configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns one configuration value by key.
    ///
    /// Keys are accepted in snake case or in the camel case of the configuration file
    /// (`maximumBytesBilled`). The inline key is never exposed; asking for it, or for an unknown
    /// key, fails with [`ErrorKind::ConfigError`].
    pub fn config_value(&self, key: &str) -> OrmResult<Value> {
        let config = ConnectionConfigWithoutSecrets::from(self.config.clone());

        let value = match key {
            "project_id" | "projectId" => serde_json::to_value(config.project_id)?,
            "dataset_id" | "data_set" | "dataSet" => serde_json::to_value(config.dataset_id)?,
            "key_file_path" | "keyFilePath" => serde_json::to_value(config.key_file_path)?,
            "request_timeout" | "requestTimeout" => Value::from(config.request_timeout),
            "retries" => Value::from(config.retries),
            "location" => serde_json::to_value(config.location)?,
            "maximum_bytes_billed" | "maximumBytesBilled" => {
                Value::from(config.maximum_bytes_billed)
            }
            "key_file" | "keyFile" => bail!(
                ErrorKind::ConfigError,
                "Configuration value is secret",
                format!("`{key}` cannot be read back from the driver")
            ),
            _ => bail!(
                ErrorKind::ConfigError,
                "Unknown configuration key",
                format!("`{key}` is not a connection setting")
            ),
        };

        Ok(value)
    }

    /// Returns the dataset tables live in.
    pub fn dataset_id(&self) -> Option<&str> {
        self.config.dataset_id.as_deref()
    }

    /// Returns the dataset id, failing with [`ErrorKind::ConfigError`] when it is unset.
    pub fn require_dataset_id(&self) -> OrmResult<DatasetId> {
        self.config
            .dataset_id
            .clone()
            .filter(|dataset_id| !dataset_id.is_empty())
            .ok_or_else(|| {
                orm_error!(
                    ErrorKind::ConfigError,
                    "Missing required configuration",
                    "`dataset_id` must be set"
                )
            })
    }

    pub fn maximum_bytes_billed(&self) -> u64 {
        self.config.maximum_bytes_billed
    }
}

impl<C> Drop for ConnectionDriver<C>
where
    C: Connector,
{
    fn drop(&mut self) {
        if self.is_connected() {
            self.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::MemoryWarehouse;

    fn driver(warehouse: &MemoryWarehouse) -> ConnectionDriver<MemoryWarehouse> {
        ConnectionDriver::new(ConnectionConfig::new("project", "dataset"), warehouse.clone())
    }

    #[tokio::test]
    async fn get_connection_connects_lazily_once() {
        let warehouse = MemoryWarehouse::new();
        let mut driver = driver(&warehouse);

        assert!(!driver.is_connected());
        driver.get_connection().await.unwrap();
        driver.get_connection().await.unwrap();

        assert!(driver.is_connected());
        assert_eq!(warehouse.connect_count().await, 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let warehouse = MemoryWarehouse::new();
        let mut driver = driver(&warehouse);

        driver.connect().await.unwrap();
        driver.disconnect();
        driver.disconnect();

        assert!(!driver.is_connected());

        driver.get_connection().await.unwrap();
        assert_eq!(warehouse.connect_count().await, 2);
    }

    #[tokio::test]
    async fn missing_dataset_fails_before_connecting() {
        let warehouse = MemoryWarehouse::new();
        let mut config = ConnectionConfig::new("project", "dataset");
        config.dataset_id = None;
        let mut driver = ConnectionDriver::new(config, warehouse.clone());

        let err = driver.connect().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(warehouse.connect_count().await, 0);
    }

    #[tokio::test]
    async fn connector_failure_is_returned_and_leaves_driver_disconnected() {
        let warehouse = MemoryWarehouse::new();
        warehouse.fail_next_connect("credentials rejected").await;
        let mut driver = driver(&warehouse);

        let err = driver.connect().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    async fn client_config_omits_unset_optionals() {
        let warehouse = MemoryWarehouse::new();
        let mut config = ConnectionConfig::new("project", "dataset");
        config.location = Some(String::new());
        let mut driver = ConnectionDriver::new(config, warehouse.clone());

        driver.connect().await.unwrap();

        let client_config = warehouse.last_client_config().await.unwrap();
        assert_eq!(client_config.project_id, "project");
        assert_eq!(client_config.retries, 3);
        assert!(client_config.location.is_none());
        assert!(client_config.credential.is_none());
    }

    #[test]
    fn config_values_are_looked_up_by_key() {
        let driver = driver(&MemoryWarehouse::new());

        assert_eq!(driver.config_value("dataSet").unwrap(), json!("dataset"));
        assert_eq!(
            driver.config_value("maximum_bytes_billed").unwrap(),
            json!(1_000_000)
        );
        assert_eq!(driver.config_value("location").unwrap(), json!(null));
        assert_eq!(
            driver.config_value("nope").unwrap_err().kind(),
            ErrorKind::ConfigError
        );
        assert_eq!(
            driver.config_value("keyFile").unwrap_err().kind(),
            ErrorKind::ConfigError
        );
    }

    #[tokio::test]
    async fn dropping_a_connected_driver_releases_the_client() {
        let warehouse = MemoryWarehouse::new();
        {
            let mut driver = driver(&warehouse);
            driver.connect().await.unwrap();
            assert_eq!(warehouse.live_clients(), 1);
        }

        assert_eq!(warehouse.live_clients(), 0);
    }
}
