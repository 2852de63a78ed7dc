use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::{AccessProvisioner, HotspotUser, RouterError};

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = ".id")]
    id: String,
}

#[derive(Debug, Serialize)]
struct UserBody<'a> {
    name: &'a str,
    password: &'a str,
    profile: &'a str,
    #[serde(rename = "limit-uptime")]
    limit_uptime: &'a str,
    #[serde(rename = "mac-address", skip_serializing_if = "Option::is_none")]
    mac_address: Option<&'a str>,
    comment: &'static str,
}

/// RouterOS v7 REST API (`/rest/ip/hotspot/...`) with basic auth.
#[derive(Debug, Clone)]
pub struct MikrotikClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    profile: String,
}

impl MikrotikClient {
    pub fn new(client: Client, base_url: &str, user: &str, password: &str, profile: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            profile: profile.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/ip/hotspot/{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, RouterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RouterError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn find(&self, menu: &str, key: &str, value: &str) -> Result<Vec<Entry>, RouterError> {
        let response = self
            .client
            .get(self.url(menu))
            .basic_auth(&self.user, Some(&self.password))
            .query(&[(key, value)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete(&self, menu: &str, id: &str) -> Result<(), RouterError> {
        let response = self
            .client
            .delete(self.url(&format!("{}/{}", menu, id)))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AccessProvisioner for MikrotikClient {
    fn name(&self) -> &'static str {
        "mikrotik"
    }

    async fn create_user(&self, user: &HotspotUser) -> Result<(), RouterError> {
        let body = UserBody {
            name: &user.username,
            password: &user.password,
            profile: &self.profile,
            limit_uptime: &user.uptime_limit,
            mac_address: user.mac_address.as_deref(),
            comment: "FASTNET",
        };

        let existing = self.find("user", "name", &user.username).await?;
        let request = match existing.first() {
            Some(entry) => self.client.patch(self.url(&format!("user/{}", entry.id))),
            None => self.client.put(self.url("user")),
        };

        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        tracing::info!("Hotspot user {} provisioned ({})", user.username, user.uptime_limit);
        Ok(())
    }

    async fn remove_user(&self, username: &str) -> Result<(), RouterError> {
        for entry in self.find("user", "name", username).await? {
            self.delete("user", &entry.id).await?;
        }
        Ok(())
    }

    async fn disconnect(&self, mac_address: &str) -> Result<(), RouterError> {
        for menu in ["ip-binding", "active"] {
            for entry in self.find(menu, "mac-address", mac_address).await? {
                self.delete(menu, &entry.id).await?;
            }
        }
        Ok(())
    }
}
