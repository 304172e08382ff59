//! Health tracking for the serving process
//!
//! The readiness flag backs the platform's ping check and is only raised by
//! [`HealthRegistry::mark_model_loaded`]. Component statuses back `/healthz`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last request failed server-side
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

/// Component names for health tracking
pub mod components {
    pub const MODEL: &str = "model";
    pub const INVOCATIONS: &str = "invocations";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Server-side failures since the last success
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>, consecutive_failures: u32) -> Self {
        Self {
            status,
            message,
            consecutive_failures,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None, 0)
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    fn from_components(components: HashMap<String, ComponentHealth>) -> Self {
        let status = components
            .values()
            .map(|c| c.status)
            .max_by_key(|s| match s {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy);
        Self { status, components }
    }
}

/// Body of a failed `/ping`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared registry of component health and readiness
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Record the loaded transform and start accepting traffic
    pub async fn mark_model_loaded(&self, kind: &str, n_features: usize) {
        let health = ComponentHealth::new(
            ComponentStatus::Healthy,
            Some(format!("{} transform over {} feature(s)", kind, n_features)),
            0,
        );
        self.components
            .write()
            .await
            .insert(components::MODEL.to_string(), health);
        self.set_ready(true).await;
    }

    /// Degrade the invocations component after a server-side failure
    pub async fn record_invocation_failure(&self, message: impl Into<String>) {
        let mut components = self.components.write().await;
        let failures = components
            .get(components::INVOCATIONS)
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
            .saturating_add(1);
        components.insert(
            components::INVOCATIONS.to_string(),
            ComponentHealth::new(ComponentStatus::Degraded, Some(message.into()), failures),
        );
    }

    /// Restore the invocations component once a request succeeds
    pub async fn record_invocation_success(&self) {
        let degraded = self
            .components
            .read()
            .await
            .get(components::INVOCATIONS)
            .is_some_and(|c| c.status != ComponentStatus::Healthy);
        if degraded {
            self.components
                .write()
                .await
                .insert(components::INVOCATIONS.to_string(), ComponentHealth::healthy());
        }
    }

    pub async fn health(&self) -> HealthResponse {
        HealthResponse::from_components(self.components.read().await.clone())
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if !*self.ready.read().await {
            return ReadinessResponse {
                ready: false,
                reason: Some("Model not yet loaded".to_string()),
            };
        }

        if self.health().await.status.is_operational() {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        }
    }
}
