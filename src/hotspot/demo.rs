use async_trait::async_trait;

use super::{AccessProvisioner, HotspotUser, RouterError};

/// Stand-in router for demo deployments: accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoRouter;

#[async_trait]
impl AccessProvisioner for DemoRouter {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn create_user(&self, user: &HotspotUser) -> Result<(), RouterError> {
        tracing::info!(
            "[demo] hotspot user {} ({}) for {}",
            user.username,
            user.uptime_limit,
            user.mac_address.as_deref().unwrap_or("any device")
        );
        Ok(())
    }

    async fn remove_user(&self, username: &str) -> Result<(), RouterError> {
        tracing::info!("[demo] removing hotspot user {}", username);
        Ok(())
    }

    async fn disconnect(&self, mac_address: &str) -> Result<(), RouterError> {
        tracing::info!("[demo] disconnecting {}", mac_address);
        Ok(())
    }
}
