//! Cached set of discoverable sources and the extra addresses that widen discovery.

use crate::control_service::SharedControlService;
use crate::error::{ControlError, ControlResult};
use crate::shared::Shared;
use crate::source::Source;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 8;

#[derive(Default)]
struct CatalogState {
    sources: Vec<Source>,
    extra_ips: Vec<String>,
}

#[derive(Clone)]
pub struct SourceCatalog {
    service: SharedControlService,
    liveness: CancellationToken,
    state: Shared<CatalogState>,
}

impl SourceCatalog {
    pub fn new(service: SharedControlService, liveness: CancellationToken) -> Self {
        Self {
            service,
            liveness,
            state: Shared::new(CatalogState::default()),
        }
    }

    /// Last known snapshot. Never touches the network.
    pub fn list(&self) -> Vec<Source> {
        self.state.with(|state| state.sources.clone())
    }

    /// Passive read of the remote list; cheap and safe to repeat every cycle.
    pub async fn poll(&self) -> ControlResult<usize> {
        let list = self.service.list_sources().await?;
        self.replace(list.sources)
    }

    /// Bounded active scan on the remote side. Only ever called on explicit
    /// operator request.
    pub async fn refresh(&self, timeout_secs: u64) -> ControlResult<Vec<Source>> {
        tracing::info!("refreshing sources, timeout {}s", timeout_secs);
        let list = self.service.refresh_sources(timeout_secs).await.map_err(|err| {
            tracing::warn!("source refresh failed: {}", err);
            err
        })?;
        self.replace(list.sources.clone())?;
        Ok(list.sources)
    }

    fn replace(&self, sources: Vec<Source>) -> ControlResult<usize> {
        if self.liveness.is_cancelled() {
            return Err(ControlError::TornDown);
        }
        let count = sources.len();
        self.state.with(|state| state.sources = sources);
        tracing::debug!("source catalog replaced, {} sources", count);
        Ok(count)
    }

    pub fn extra_ips(&self) -> Vec<String> {
        self.state.with(|state| state.extra_ips.clone())
    }

    pub async fn load_extra_ips(&self) -> ControlResult<Vec<String>> {
        let list = self.service.extra_ips().await?;
        self.replace_extra_ips(list.ips)
    }

    pub async fn add_extra_ip(&self, ip: &str) -> ControlResult<Vec<String>> {
        let ip = validate_ipv4(ip)?;
        let list = self.service.add_extra_ip(&ip).await?;
        self.replace_extra_ips(list.ips)
    }

    pub async fn remove_extra_ip(&self, ip: &str) -> ControlResult<Vec<String>> {
        let list = self.service.remove_extra_ip(ip.trim()).await?;
        self.replace_extra_ips(list.ips)
    }

    pub async fn set_extra_ips(&self, ips: &[String]) -> ControlResult<Vec<String>> {
        let ips = ips
            .iter()
            .map(|ip| validate_ipv4(ip))
            .collect::<ControlResult<Vec<_>>>()?;
        let list = self.service.set_extra_ips(ips).await?;
        self.replace_extra_ips(list.ips)
    }

    fn replace_extra_ips(&self, ips: Vec<String>) -> ControlResult<Vec<String>> {
        if self.liveness.is_cancelled() {
            return Err(ControlError::TornDown);
        }
        self.state.with(|state| state.extra_ips = ips.clone());
        Ok(ips)
    }
}

fn validate_ipv4(ip: &str) -> ControlResult<String> {
    let ip = ip.trim();
    if ip.is_empty() {
        return Err(ControlError::validation("IP address is required"));
    }
    ip.parse::<Ipv4Addr>()
        .map(|addr| addr.to_string())
        .map_err(|_| ControlError::validation("Invalid IP address format"))
}
