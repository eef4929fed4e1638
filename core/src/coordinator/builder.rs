//! Builder for Coordinator construction

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::stat::Stat;
use crate::template::RequestTemplate;
use crate::transport::{HttpClient, Throttled, Transport};

use super::executor::Coordinator;

/// Builder for [`Coordinator`] instances.
///
/// Validates the configuration and assembles the default transport chain
/// (the throttle wrapping a pooled [`HttpClient`]) when none is injected.
/// Anything fatal — an invalid workload shape, TLS setup failure, a
/// template that cannot be built — surfaces here, before any attempt is
/// admitted.
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: Option<Config>,
    template: Option<Arc<RequestTemplate>>,
    stats_tx: Option<mpsc::Sender<Stat>>,
    cancel: Option<CancellationToken>,
    transport: Option<Arc<dyn Transport>>,
}

impl CoordinatorBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run configuration (required).
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a prepared request template. Built from the config when absent.
    pub fn template(mut self, template: Arc<RequestTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    /// Set the collector's stats sender (required).
    pub fn stats_tx(mut self, stats_tx: mpsc::Sender<Stat>) -> Self {
        self.stats_tx = Some(stats_tx);
        self
    }

    /// Set the parent cancellation token. A fresh token is used when absent.
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Inject a transport, bypassing the default client chain. Used by
    /// tests to substitute mocks.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the coordinator.
    ///
    /// # Errors
    /// Returns an error when a required field is missing, the config fails
    /// validation, or the HTTP client cannot be constructed.
    pub fn build(self) -> Result<Coordinator> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("config is required".into()))?;
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        let stats_tx = self
            .stats_tx
            .ok_or_else(|| Error::Config("stats sender is required".into()))?;

        let template = match self.template {
            Some(template) => template,
            None => Arc::new(RequestTemplate::from_config(&config)?),
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(Throttled::new(config.max_rps, HttpClient::new(&config)?)),
        };

        let cancel = self.cancel.unwrap_or_default();

        Ok(Coordinator::new(
            config, template, transport, stats_tx, cancel,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn config() -> Config {
        Config::new(Url::parse("http://localhost:8080/").unwrap())
    }

    #[test]
    fn missing_config_is_rejected() {
        let (stats_tx, _stats_rx) = mpsc::channel(1);
        let result = CoordinatorBuilder::new().stats_tx(stats_tx).build();
        assert!(result.is_err());
    }

    #[test]
    fn missing_stats_sender_is_rejected() {
        let result = CoordinatorBuilder::new().config(config()).build();
        assert!(result.is_err());
    }

    #[test]
    fn invalid_workload_is_rejected() {
        let (stats_tx, _stats_rx) = mpsc::channel(1);
        let mut cfg = config();
        cfg.amount = 0;
        let result = CoordinatorBuilder::new()
            .config(cfg)
            .stats_tx(stats_tx)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn complete_builder_succeeds() {
        let (stats_tx, _stats_rx) = mpsc::channel(1);
        let result = CoordinatorBuilder::new()
            .config(config())
            .stats_tx(stats_tx)
            .build();
        assert!(result.is_ok());
    }
}
