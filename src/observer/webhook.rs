use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::WebhookObserverConfig;
use crate::error::{AdEventError, Result};

use super::{AdEventObserver, AdEventOutcome};

pub(super) struct WebhookObserver {
    name: String,
    config: WebhookObserverConfig,
    client: Client,
}

impl WebhookObserver {
    pub(super) fn new(name: Option<String>, config: WebhookObserverConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build webhook client");
        Self {
            name: name.unwrap_or_else(|| "webhook".to_string()),
            config,
            client,
        }
    }

    fn resolved_endpoint(&self) -> String {
        let endpoint = self.config.endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if self.config.https {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        }
    }
}

impl AdEventObserver for WebhookObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, outcome: &AdEventOutcome) -> Result<()> {
        let resolved = self.resolved_endpoint();
        let mut request = self.client.post(&resolved);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        request
            .json(outcome)
            .send()
            .map_err(|err| AdEventError::Storage(err.to_string()))?
            .error_for_status()
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        Ok(())
    }
}
