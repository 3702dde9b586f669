use std::path::Path;
use std::sync::Arc;

use matryoshka_vfs::{Container, FileStorage, Storage};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::AppState;
use crate::router::build_router;

/// Read-only HTTP server over one loaded container.
pub struct MatryoshkaServer<S: Storage = FileStorage> {
    config: ServerConfig,
    container: Arc<Container<S>>,
}

impl MatryoshkaServer<FileStorage> {
    /// Load the container at `path`. A missing file is an error.
    pub fn open(path: impl AsRef<Path>, config: ServerConfig) -> ServerResult<Self> {
        let mut container_config = config.container.clone();
        container_config.create_if_missing = false;
        let container = Container::load_with(path, container_config)?;
        Ok(Self::with_container(config, container))
    }
}

impl<S: Storage + 'static> MatryoshkaServer<S> {
    pub fn with_container(config: ServerConfig, container: Container<S>) -> Self {
        Self {
            config,
            container: Arc::new(container),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn container(&self) -> &Container<S> {
        &self.container
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            container: Arc::clone(&self.container),
            read_ahead: self.config.read_ahead,
        })
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            container = %self.container.location(),
            "matryoshka server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("matryoshka server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matryoshka_vfs::ErrorKind;

    #[test]
    fn open_missing_container_fails_without_creating_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.mtr");
        let err = MatryoshkaServer::open(&path, ServerConfig::default()).err().unwrap();
        assert!(matches!(
            err,
            crate::ServerError::Container(ref e) if e.kind() == ErrorKind::NotFound
        ));
        assert!(!path.exists());
    }

    #[test]
    fn open_existing_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.mtr");
        drop(Container::load(&path).unwrap());

        let server = MatryoshkaServer::open(&path, ServerConfig::default()).unwrap();
        assert!(server.container().is_open());
        assert_eq!(server.config().read_ahead, 4);
        let _router = server.router();
    }
}
