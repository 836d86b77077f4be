//! HTTP side of the dev server.
//!
//! Serves `/node_modules` from the dependency directory and everything else
//! from the intermediate, source, and static directories, first match wins.
//! HTML responses get the live-reload client injected; the client listens on
//! a Server-Sent Events stream and reloads the page on each `reload` event.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::Stream;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::{broadcast, oneshot};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ProjectDirs;
use crate::error::{BuildError, BuildResult};

pub const RELOAD_CLIENT_PATH: &str = "/__reload/client.js";
pub const RELOAD_EVENTS_PATH: &str = "/__reload/events";

const RELOAD_CLIENT: &str = r#"(function () {
  var source = new EventSource('/__reload/events');
  source.addEventListener('reload', function () {
    window.location.reload();
  });
})();
"#;

/// State shared by the reload handlers.
#[derive(Clone)]
struct ReloadState {
    reload: broadcast::Sender<()>,
}

async fn reload_client() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        RELOAD_CLIENT,
    )
}

async fn reload_events(
    State(state): State<ReloadState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.reload.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(()) => {
                    let event = Event::default().event("reload").data("reload");
                    return Some((Ok(event), rx));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Insert the reload client tag before `</body>`, or append it when there is none.
pub fn inject_client_tag(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, RELOAD_CLIENT_PATH);
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], tag, &html[pos..]),
        None => format!("{}{}", html, tag),
    }
}

async fn inject_reload_client(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to buffer HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = inject_client_tag(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    Response::from_parts(parts, Body::from(html))
}

/// Build the router with all routes.
pub fn build_router(dirs: &ProjectDirs, reload: broadcast::Sender<()>) -> Router {
    let static_files = ServeDir::new(&dirs.temp)
        .fallback(ServeDir::new(&dirs.src).fallback(ServeDir::new(&dirs.public)));

    Router::new()
        .route(RELOAD_CLIENT_PATH, get(reload_client))
        .route(RELOAD_EVENTS_PATH, get(reload_events))
        .nest_service("/node_modules", ServeDir::new(&dirs.node_modules))
        .fallback_service(static_files)
        .layer(middleware::map_response(inject_reload_client))
        .layer(TraceLayer::new_for_http())
        .with_state(ReloadState { reload })
}

/// Start the HTTP server on the specified port.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    dirs: &ProjectDirs,
    port: u16,
    reload: broadcast::Sender<()>,
) -> BuildResult<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(dirs, reload);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BuildError::server(format!("cannot bind {}: {}", addr, e)))?;
    let bound_addr = listener.local_addr().map_err(BuildError::server)?;

    info!("Dev server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Dev server shutting down");
            })
            .await
        {
            tracing::error!("Dev server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
