use std::net::{Ipv4Addr, SocketAddr};

use matryoshka_vfs::ContainerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Blocks read ahead of a slow client before the reader waits.
pub const DEFAULT_READ_AHEAD: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub read_ahead: usize,
    /// Settings for the served container. The server never creates a
    /// container, whatever `create_if_missing` says.
    pub container: ContainerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            read_ahead: DEFAULT_READ_AHEAD,
            container: ContainerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        if config.read_ahead == 0 {
            return Err(ServerError::Config("read_ahead must be positive".into()));
        }
        if config.container.copy_buffer_size == 0 {
            return Err(ServerError::Config(
                "container.copy_buffer_size must be positive".into(),
            ));
        }
        Ok(config)
    }
}
