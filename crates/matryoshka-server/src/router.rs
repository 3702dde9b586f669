use axum::Router;
use matryoshka_vfs::Storage;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the router. Every path is an inner path of the container.
pub fn build_router<S: Storage + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .fallback(handler::serve_entry::<S>)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
