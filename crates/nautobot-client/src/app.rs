//! App namespaces
//!
//! Nautobot groups its REST collections by app (`dcim`, `ipam`, ...).
//! Installed Nautobot apps live under `plugins/<name>` and are reached
//! through [`PluginsApp`].

use crate::client::NautobotClient;
use crate::endpoint::{Endpoint, JobsEndpoint};
use crate::error::Result;
use crate::query::Request;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;

/// One app of the REST API
#[derive(Debug, Clone)]
pub struct App {
    client: NautobotClient,
    name: String,
    choices: Arc<OnceCell<Value>>,
}

impl App {
    /// App namespace `name` on `client`
    pub fn new(client: NautobotClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            choices: Arc::new(OnceCell::new()),
        }
    }

    /// Namespace name as it appears in URLs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection `name` of this app (`ip_addresses` addresses `ip-addresses`)
    pub fn endpoint(&self, name: &str) -> Endpoint {
        Endpoint::new(self.client.clone(), &self.name, name)
    }

    /// The `jobs` collection with its `run` action
    pub fn jobs(&self) -> JobsEndpoint {
        JobsEndpoint::new(self.endpoint("jobs"))
    }

    fn request(&self, path: &str) -> Request {
        self.client
            .request(&format!("{}/{}/{}/", self.client.base_url(), self.name, path))
            .threading(false)
    }

    /// Raw `_choices` response of the app, fetched once
    ///
    /// Only served by Nautobot 2.7 and older; prefer [`Endpoint::choices`].
    pub async fn choices(&self) -> Result<Value> {
        warn!(
            "App::choices() reads the deprecated {}/_choices/ endpoint; \
             use Endpoint::choices() instead",
            self.name
        );
        self.choices
            .get_or_try_init(|| async { self.request("_choices").get().await })
            .await
            .cloned()
    }

    /// Raw `custom-fields` response of the app
    pub async fn custom_fields(&self) -> Result<Value> {
        self.request("custom-fields").get().await
    }

    /// Raw `custom-field-choices` response of the app
    pub async fn custom_field_choices(&self) -> Result<Value> {
        self.request("custom-field-choices").get().await
    }

    /// Raw `config` response of the app (user table preferences and the like)
    pub async fn config(&self) -> Result<Value> {
        self.request("config").get().await
    }
}

/// Namespace of installed Nautobot apps
#[derive(Debug, Clone)]
pub struct PluginsApp {
    client: NautobotClient,
}

impl PluginsApp {
    /// Namespace for installed plugins
    pub fn new(client: NautobotClient) -> Self {
        Self { client }
    }

    /// App mounted at `plugins/<name>`; underscores become dashes
    pub fn app(&self, name: &str) -> App {
        App::new(self.client.clone(), &format!("plugins/{}", name.replace('_', "-")))
    }

    /// Raw list of installed plugins
    pub async fn installed_plugins(&self) -> Result<Value> {
        self.client
            .request(&format!("{}/plugins/installed-plugins", self.client.base_url()))
            .threading(false)
            .get()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mock::MockTransport;
    use serde_json::json;

    fn client(mock: &MockTransport) -> NautobotClient {
        NautobotClient::with_transport(
            ClientConfig::new("http://nb.local", None).threading(true),
            Arc::new(mock.clone()),
        )
    }

    #[tokio::test]
    async fn test_choices_memoized() {
        let mock = MockTransport::json(json!({"device:status": [{"value": "active"}]}));
        let dcim = client(&mock).dcim();

        let first = dcim.choices().await.unwrap();
        let second = dcim.choices().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.last_request().unwrap().url, "http://nb.local/api/dcim/_choices/");
    }

    #[tokio::test]
    async fn test_raw_app_resources() {
        let mock = MockTransport::json(json!({"tables": {}}));
        let extras = client(&mock).extras();

        extras.custom_fields().await.unwrap();
        assert_eq!(mock.last_request().unwrap().url, "http://nb.local/api/extras/custom-fields/");
        extras.custom_field_choices().await.unwrap();
        assert_eq!(
            mock.last_request().unwrap().url,
            "http://nb.local/api/extras/custom-field-choices/"
        );
        client(&mock).users().config().await.unwrap();
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.url, "http://nb.local/api/users/config/");
        assert_eq!(sent.param("limit"), None);
    }

    #[tokio::test]
    async fn test_plugins() {
        let mock = MockTransport::json(json!([{"name": "golden_config"}]));
        let plugins = client(&mock).plugins();

        assert_eq!(plugins.app("golden_config").name(), "plugins/golden-config");
        let installed = plugins.installed_plugins().await.unwrap();
        assert_eq!(installed[0]["name"], "golden_config");
        assert_eq!(
            mock.last_request().unwrap().url,
            "http://nb.local/api/plugins/installed-plugins/"
        );
    }

    #[test]
    fn test_endpoint_models_resolved_per_app() {
        let mock = MockTransport::json(json!({}));
        let client = client(&mock);
        assert_eq!(client.dcim().endpoint("device_types").model().name, "DeviceTypes");
        assert_eq!(client.ipam().endpoint("prefixes").model().name, "Prefixes");
        assert_eq!(client.plugins().app("x").endpoint("prefixes").model().name, "Record");
        assert_eq!(client.extras().jobs().endpoint().url(), "http://nb.local/api/extras/jobs");
    }
}
