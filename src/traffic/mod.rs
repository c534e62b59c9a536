// Traffic module - Counters polled from the core and their collaborators

mod report;

pub use report::TrafficReporter;

use crate::config::TrafficReportConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Bytes moved through one inbound or outbound since the previous poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Traffic {
    pub is_inbound: bool,
    pub is_outbound: bool,
    pub tag: String,
    pub up: i64,
    pub down: i64,
}

/// Bytes moved by one client since the previous poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientTraffic {
    pub id: i64,
    pub inbound_id: i64,
    pub enable: bool,
    pub email: String,
    pub up: i64,
    pub down: i64,
    pub expiry_time: i64,
    pub total: i64,
    pub reset: i64,
    pub last_online: i64,
}

/// One poll's worth of counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficDelta {
    pub inbounds: Vec<Traffic>,
    pub clients: Vec<ClientTraffic>,
}

impl TrafficDelta {
    pub fn new(inbounds: Vec<Traffic>, clients: Vec<ClientTraffic>) -> Self {
        Self { inbounds, clients }
    }

    /// E-mails of clients that moved any bytes in this delta
    pub fn online_clients(&self) -> Vec<String> {
        self.clients
            .iter()
            .filter(|c| c.up.saturating_add(c.down) > 0)
            .map(|c| c.email.clone())
            .collect()
    }
}

/// Reads counters from the core's control API
#[async_trait]
pub trait TrafficSource: Send + Sync {
    async fn fetch(&self, api_port: u16) -> Result<TrafficDelta>;
}

/// Persists a delta and reports whether the core must be restarted
/// (for example because a client just hit its traffic limit)
#[async_trait]
pub trait TrafficAccumulator: Send + Sync {
    async fn add_traffic(&self, delta: &TrafficDelta) -> Result<bool>;
}

/// Where the external traffic report goes, read on every cycle
#[async_trait]
pub trait ReportSettings: Send + Sync {
    async fn report_enabled(&self) -> Result<bool>;
    async fn report_url(&self) -> Result<String>;
}

#[async_trait]
impl ReportSettings for TrafficReportConfig {
    async fn report_enabled(&self) -> Result<bool> {
        Ok(self.enabled)
    }

    async fn report_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }
}
