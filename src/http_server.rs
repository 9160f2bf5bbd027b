use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use log::{info, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::presence::Scanner;

/// Serves `/api/health` and `/api/count` until the token is cancelled
pub async fn serve(port: u16, scanner: Arc<Scanner>, cancel: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let request_cancel = cancel.clone();
    let make_svc = make_service_fn(move |_conn| {
        let scanner = scanner.clone();
        let cancel = request_cancel.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| route(req, scanner.clone(), cancel.clone())))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Unable to bind HTTP server on {}", addr))?
        .serve(make_svc);

    info!("🌐 Server listening on {}", addr);

    server
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            info!("Shutting down server...");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

pub async fn route(
    req: Request<Body>,
    scanner: Arc<Scanner>,
    cancel: CancellationToken,
) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/api/health") => match scanner.check_health().await {
            Ok(()) => json_response(StatusCode::OK, json!({ "ok": true })),
            Err(e) => {
                warn!("Health check failed: {}", e);
                json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({ "ok": false, "error": e.to_string() }))
            }
        },
        (&Method::GET, "/api/count") => match scanner.scan(&cancel).await {
            Ok(summary) => match serde_json::to_value(&summary) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(e) => json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() })),
            },
            Err(e) => {
                warn!("Count failed: {}", e);
                json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
            }
        },
        (_, "/api/health") | (_, "/api/count") => {
            json_response(StatusCode::METHOD_NOT_ALLOWED, json!({ "error": "method not allowed" }))
        }
        _ => json_response(StatusCode::NOT_FOUND, json!({ "error": "not found" })),
    };

    Ok(response)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}
