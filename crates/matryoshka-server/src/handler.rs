use std::io;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, SERVER};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures::stream;
use matryoshka_vfs::{Container, EntryHandle, ErrorKind, Storage};
use tokio::sync::mpsc;

const SERVER_NAME: &str = "Matryoshka";

/// Shared state of the HTTP front end.
pub struct AppState<S: Storage> {
    pub container: Arc<Container<S>>,
    /// Blocks buffered between the reading thread and the response body.
    pub read_ahead: usize,
}

impl<S: Storage> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            container: Arc::clone(&self.container),
            read_ahead: self.read_ahead,
        }
    }
}

/// Serve the entry named by the request path.
///
/// `GET` streams the entry's bytes, `HEAD` answers with the headers alone.
/// Paths that name no entry get 404, other methods 501.
pub async fn serve_entry<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::NOT_IMPLEMENTED, [(SERVER, SERVER_NAME)]).into_response();
    }

    let container = &state.container;
    let found = container
        .open(uri.path())
        .and_then(|handle| Ok((handle, container.get_size(handle)?)));
    let (handle, size) = match found {
        Ok(found) => found,
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::InvalidArgument) => {
            tracing::debug!(path = uri.path(), error = %err, "no such entry");
            return (StatusCode::NOT_FOUND, [(SERVER, SERVER_NAME)]).into_response();
        }
        Err(err) => {
            tracing::warn!(path = uri.path(), error = %err, "lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, [(SERVER, SERVER_NAME)]).into_response();
        }
    };

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        tracing::debug!(path = uri.path(), bytes = size, "streaming entry");
        stream_entry(state, handle)
    };
    let headers = [
        (SERVER, HeaderValue::from_static(SERVER_NAME)),
        (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
        (CONTENT_LENGTH, HeaderValue::from(size)),
    ];
    (StatusCode::OK, headers, body).into_response()
}

/// Read the entry on a blocking thread and hand its blocks to the body.
///
/// A chunk failing its CRC ends the body with an error, which aborts the
/// response instead of completing it with bad bytes.
fn stream_entry<S: Storage + 'static>(state: AppState<S>, handle: EntryHandle) -> Body {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(state.read_ahead.max(1));
    let block = state.container.config().copy_buffer_size.max(1);

    tokio::task::spawn_blocking(move || {
        let container = state.container;
        let mut reader = match container.reader(handle) {
            Ok(reader) => reader,
            Err(err) => {
                let _ = tx.blocking_send(Err(io::Error::other(err)));
                return;
            }
        };
        let mut buf = vec![0u8; block];
        loop {
            match reader.read_block(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        tracing::debug!(%handle, "client went away");
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(%handle, error = %err, "entry read failed mid-stream");
                    let _ = tx.blocking_send(Err(io::Error::other(err)));
                    break;
                }
            }
        }
    });

    Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
