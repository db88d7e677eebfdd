//! Server configuration.

use curve_sync_protocol::{BranchTable, GhostDenylist};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration for the record server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the server listens on.
    pub bind_addr: SocketAddr,
    /// Public base URL reported by `GET /api/config`.
    pub public_base_url: String,
    /// Address reported as `ip` by `GET /api/config`.
    ///
    /// When unset, the bind address is reported unless it is unspecified,
    /// in which case `localhost` is.
    pub advertised_ip: Option<String>,
    /// Branch normalizer used by branch deletion.
    pub branches: BranchTable,
    /// Ghost records removed by the startup cleaner.
    pub ghosts: GhostDenylist,
    /// Whether to run the ghost cleaner when the server is created.
    pub clean_on_startup: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            public_base_url: "http://x3dmanagement.com".into(),
            advertised_ip: None,
            branches: BranchTable::default(),
            ghosts: GhostDenylist::default(),
            clean_on_startup: true,
        }
    }

    /// Sets the public base URL.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    /// Sets the advertised address.
    pub fn with_advertised_ip(mut self, ip: impl Into<String>) -> Self {
        self.advertised_ip = Some(ip.into());
        self
    }

    /// Sets the branch normalizer.
    pub fn with_branches(mut self, branches: BranchTable) -> Self {
        self.branches = branches;
        self
    }

    /// Sets the ghost denylist.
    pub fn with_ghosts(mut self, ghosts: GhostDenylist) -> Self {
        self.ghosts = ghosts;
        self
    }

    /// Enables or disables the startup cleaner.
    pub fn with_clean_on_startup(mut self, enabled: bool) -> Self {
        self.clean_on_startup = enabled;
        self
    }

    /// Address reported to clients.
    pub fn reported_ip(&self) -> String {
        match &self.advertised_ip {
            Some(ip) => ip.clone(),
            None if self.bind_addr.ip().is_unspecified() => "localhost".into(),
            None => self.bind_addr.ip().to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 3000)))
    }
}
