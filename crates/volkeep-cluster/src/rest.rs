//! REST implementation of [`ClusterApi`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};
use volkeep_core::{AccessPolicy, VolumeInstance};

use crate::error::{ClusterError, Result};
use crate::response::{parse_access_policy, parse_envelope, parse_volume_list};
use crate::ClusterApi;

/// Settings for [`RestClusterClient`].
#[derive(Debug, Clone, Default)]
pub struct RestClientConfig {
    /// Entity alarms are raised against; empty raises them cluster-wide.
    pub alarm_entity: String,
    /// Accept self-signed server certificates.
    pub accept_invalid_certs: bool,
    /// Basic auth user.
    pub user: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
}

/// Client for the cluster's REST API.
///
/// The client holds no endpoint of its own: every call names the base URL
/// (`https://node:port`) it targets, so failover stays with the caller.
#[derive(Debug, Clone)]
pub struct RestClusterClient {
    client: reqwest::Client,
    config: RestClientConfig,
}

impl RestClusterClient {
    /// Create a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: RestClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ClusterError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn get(&self, endpoint: &str, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{endpoint}{path}");
        debug!(url = %url, "Calling cluster REST API");

        let mut request = self.client.get(&url).query(query);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClusterError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::Transport(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ClusterError::Transport(format!("{url}: {e}")))
    }

    async fn command(
        &self,
        call: &str,
        endpoint: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<()> {
        let body = self.get(endpoint, path, query).await?;
        parse_envelope(call, &body)?;
        Ok(())
    }
}

/// Query parameters for a volume create call.
///
/// # Errors
///
/// Returns `ClusterError::InvalidRequest` if the volume carries no group
/// properties.
pub fn create_query(volume: &VolumeInstance) -> Result<Vec<(&'static str, String)>> {
    let props = volume.properties.as_ref().ok_or_else(|| {
        ClusterError::InvalidRequest(format!("volume {} has no creation properties", volume.name))
    })?;

    let mut query = vec![
        ("name", volume.name.clone()),
        ("path", volume.mount_path.clone()),
        ("user", props.owner.clone()),
        ("group", props.group.clone()),
        ("ae", props.ae.clone()),
        ("aetype", props.ae_type.code().to_string()),
        ("topology", props.topology.clone()),
    ];
    if props.schedule > 0 {
        query.push(("schedule", props.schedule.to_string()));
    }
    query.push(("minreplication", props.min_replication.to_string()));
    query.push(("replication", props.replication.to_string()));
    query.push(("replicationtype", props.replication_type.to_string()));
    if let Some(policy) = &props.access_policy {
        query.push(("readAce", policy.read.clone()));
        query.push(("writeAce", policy.write.clone()));
    }

    Ok(query)
}

#[async_trait]
impl ClusterApi for RestClusterClient {
    async fn list_volumes(&self, endpoint: &str) -> Result<Vec<VolumeInstance>> {
        let body = self.get(endpoint, "/rest/volume/list", &[]).await?;
        parse_volume_list(&body)
    }

    async fn create_volume(&self, endpoint: &str, volume: &VolumeInstance) -> Result<()> {
        let query = create_query(volume)?;
        self.command("volume create", endpoint, "/rest/volume/create", &query)
            .await?;
        info!(volume = %volume.name, path = %volume.mount_path, "Created volume");
        Ok(())
    }

    async fn remove_volume(&self, endpoint: &str, name: &str) -> Result<()> {
        self.command(
            "volume remove",
            endpoint,
            "/rest/volume/remove",
            &[("name", name.to_string())],
        )
        .await?;
        info!(volume = %name, "Removed volume");
        Ok(())
    }

    async fn set_volume_access_policy(
        &self,
        endpoint: &str,
        name: &str,
        policy: &AccessPolicy,
    ) -> Result<()> {
        self.command(
            "volume modify",
            endpoint,
            "/rest/volume/modify",
            &[
                ("name", name.to_string()),
                ("readAce", policy.read.clone()),
                ("writeAce", policy.write.clone()),
            ],
        )
        .await?;
        info!(volume = %name, read_ace = %policy.read, write_ace = %policy.write, "Set volume access policy");
        Ok(())
    }

    async fn get_volume_access_policy(
        &self,
        endpoint: &str,
        name: &str,
    ) -> Result<Option<AccessPolicy>> {
        let body = self
            .get(endpoint, "/rest/volume/info", &[("name", name.to_string())])
            .await?;
        parse_access_policy(&body)
    }

    async fn raise_alarm(&self, endpoint: &str, key: &str, description: &str) -> Result<()> {
        error!(alarm = %key, description = %description, "Raising cluster alarm");
        self.command(
            "alarm raise",
            endpoint,
            "/rest/alarm/raise",
            &[
                ("alarm", key.to_string()),
                ("entity", self.config.alarm_entity.clone()),
                ("description", description.to_string()),
            ],
        )
        .await
    }
}
