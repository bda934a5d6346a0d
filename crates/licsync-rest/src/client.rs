//! HTTP client for the resource inventory API

use crate::error_body::map_status;
use crate::resource::{ArmPage, ArmResource};
use licsync_core::{
    ConfigError, Credential, HostReference, HostRegistration, HostRegistry, Inventory,
    InventoryError, LicsyncConfig, PropertyPatch, ServerFilter, ServerLicenseRecord,
    ServerLocator, SessionContext,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};

const USER_AGENT: &str = concat!("licsync/", env!("CARGO_PKG_VERSION"));

/// Inventory and host registry backed by the REST API
#[derive(Debug, Clone)]
pub struct RestInventory {
    client: reqwest::Client,
    config: LicsyncConfig,
}

impl RestInventory {
    /// Create client
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the HTTP client cannot be built
    pub fn new(config: LicsyncConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Create with an existing client
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: LicsyncConfig) -> Self {
        Self { client, config }
    }

    /// Read the target subscription once with the session's credential
    ///
    /// A rejected or expired token fails here instead of failing every
    /// record of the run.
    ///
    /// # Errors
    /// Returns the mapped [`InventoryError`]; `Unauthorized` and
    /// `Forbidden` mean the credential cannot be used
    pub async fn verify_access(&self, session: &SessionContext) -> Result<(), InventoryError> {
        let url = format!("{}/subscriptions/{}", self.base(), session.subscription_id());
        let builder = self
            .request(session, Method::GET, &url)
            .query(&[("api-version", self.config.subscription_api_version.as_str())]);
        self.send(builder, session.subscription_id()).await?;
        tracing::debug!(subscription = session.subscription_id(), "Access verified");
        Ok(())
    }

    fn base(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn servers_url(&self, session: &SessionContext, filter: &ServerFilter) -> String {
        match &filter.resource_group {
            Some(rg) => format!(
                "{}/subscriptions/{}/resourceGroups/{rg}/providers/{}",
                self.base(),
                session.subscription_id(),
                self.config.server_resource_type
            ),
            None => format!(
                "{}/subscriptions/{}/providers/{}",
                self.base(),
                session.subscription_id(),
                self.config.server_resource_type
            ),
        }
    }

    fn server_url(&self, session: &SessionContext, locator: &ServerLocator) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.base(),
            session.subscription_id(),
            locator.resource_group,
            self.config.server_resource_type,
            locator.name
        )
    }

    fn resource_url(&self, resource_id: &str) -> String {
        format!("{}/{}", self.base(), resource_id.trim_start_matches('/'))
    }

    fn host_url(&self, session: &SessionContext, reference: &HostReference) -> String {
        let subscription = reference
            .subscription
            .as_deref()
            .unwrap_or_else(|| session.subscription_id());
        format!(
            "{}/subscriptions/{subscription}/resourceGroups/{}/providers/{}/{}",
            self.base(),
            reference.resource_group,
            self.config.host_resource_type,
            reference.name
        )
    }

    fn request(&self, session: &SessionContext, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match session.credential() {
            Credential::Bearer(token) => builder.bearer_auth(token),
            Credential::Anonymous => builder,
        }
    }

    /// Send and return the decoded body; `None` for empty 2xx bodies
    async fn send(
        &self,
        builder: RequestBuilder,
        target: &str,
    ) -> Result<Option<Value>, InventoryError> {
        let response = builder
            .send()
            .await
            .map_err(|e| InventoryError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InventoryError::Transport(e.to_string()))?;

        tracing::debug!(target_resource = target, status = status.as_u16(), "Inventory call completed");

        if !status.is_success() {
            return Err(map_status(status.as_u16(), &body, target));
        }
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| InventoryError::Decode(format!("{target}: {e}")))
    }

    async fn fetch_resource(
        &self,
        session: &SessionContext,
        url: &str,
        api_version: &str,
        target: &str,
    ) -> Result<ArmResource, InventoryError> {
        let builder = self
            .request(session, Method::GET, url)
            .query(&[("api-version", api_version)]);
        let body = self
            .send(builder, target)
            .await?
            .ok_or_else(|| InventoryError::Decode(format!("{target}: empty response")))?;
        serde_json::from_value(body).map_err(|e| InventoryError::Decode(format!("{target}: {e}")))
    }
}

#[async_trait::async_trait]
impl Inventory for RestInventory {
    async fn list_servers(
        &self,
        session: &SessionContext,
        filter: &ServerFilter,
    ) -> Result<Vec<ServerLicenseRecord>, InventoryError> {
        let first = self.servers_url(session, filter);
        let mut builder = self
            .request(session, Method::GET, &first)
            .query(&[("api-version", self.config.server_api_version.as_str())]);
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            let page: ArmPage = match self.send(builder, "server listing").await? {
                Some(body) => serde_json::from_value(body)
                    .map_err(|e| InventoryError::Decode(format!("server listing: {e}")))?,
                None => ArmPage::default(),
            };
            pages += 1;
            for resource in page.value {
                records.push(resource.into_server()?);
            }
            match page.next_link.filter(|link| !link.is_empty()) {
                // nextLink already carries every query parameter
                Some(next) => builder = self.request(session, Method::GET, &next),
                None => break,
            }
        }

        tracing::info!(records = records.len(), pages, "Listed server records");
        Ok(records)
    }

    async fn get_server(
        &self,
        session: &SessionContext,
        locator: &ServerLocator,
    ) -> Result<ServerLicenseRecord, InventoryError> {
        let url = self.server_url(session, locator);
        self.fetch_resource(
            session,
            &url,
            &self.config.server_api_version,
            &locator.to_string(),
        )
        .await?
        .into_server()
    }

    async fn update_properties(
        &self,
        session: &SessionContext,
        resource_id: &str,
        patch: &PropertyPatch,
    ) -> Result<ServerLicenseRecord, InventoryError> {
        let url = self.resource_url(resource_id);
        let builder = self
            .request(session, Method::PATCH, &url)
            .query(&[("api-version", self.config.server_api_version.as_str())])
            .json(&json!({ "properties": patch.properties() }));

        match self.send(builder, resource_id).await? {
            Some(body) => serde_json::from_value::<ArmResource>(body)
                .map_err(|e| InventoryError::Decode(format!("{resource_id}: {e}")))?
                .into_server(),
            // Accepted without a body: read the record back
            None => self
                .fetch_resource(session, &url, &self.config.server_api_version, resource_id)
                .await?
                .into_server(),
        }
    }

    async fn delete_server(
        &self,
        session: &SessionContext,
        resource_id: &str,
    ) -> Result<(), InventoryError> {
        let url = self.resource_url(resource_id);
        let builder = self
            .request(session, Method::DELETE, &url)
            .query(&[("api-version", self.config.server_api_version.as_str())]);
        self.send(builder, resource_id).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl HostRegistry for RestInventory {
    async fn lookup(
        &self,
        session: &SessionContext,
        reference: &HostReference,
    ) -> Result<HostRegistration, InventoryError> {
        let url = self.host_url(session, reference);
        self.fetch_resource(
            session,
            &url,
            &self.config.host_api_version,
            &reference.to_string(),
        )
        .await?
        .into_host()
    }
}
