// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use hyper::service::service_fn;
use hyper::{http, Method, Response, StatusCode};
use serde_json::json;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::alert_processor::AlertProcessor;
use crate::config;
use crate::http_utils::{log_and_create_http_response, Body, HttpRequest, HttpResponse};
use crate::tracer::Tracer;

const WEBHOOK_ENDPOINT_PATH: &str = "/webhook/alert-receiver";
const HEALTH_ENDPOINT_PATH: &str = "/health";
const INFO_ENDPOINT_PATH: &str = "/info";

/// HTTP agent that owns the webhook listener.
///
/// The processor and tracer are injected so tests can run the full agent
/// against mocks without a live exporter.
pub struct ReceiverAgent {
    pub config: Arc<config::Config>,
    pub alert_processor: Arc<dyn AlertProcessor + Send + Sync>,
    pub tracer: Arc<dyn Tracer + Send + Sync>,
}

impl ReceiverAgent {
    pub async fn start_agent(&self) -> Result<(), Box<dyn std::error::Error>> {
        let now = Instant::now();

        // setup our hyper http server, where the endpoint_handler handles incoming requests
        let alert_processor = self.alert_processor.clone();
        let tracer = self.tracer.clone();
        let endpoint_config = self.config.clone();

        let service = service_fn(move |req| {
            // called for each http request
            let alert_processor = alert_processor.clone();
            let tracer = tracer.clone();
            let endpoint_config = endpoint_config.clone();

            ReceiverAgent::endpoint_handler(
                endpoint_config,
                req.map(Body::Incoming),
                alert_processor,
                tracer,
            )
        });

        // Webhook senders live outside this host, so bind all interfaces.
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.receiver_port));
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        debug!(
            "Alert receiver agent started: listening on port {}",
            self.config.receiver_port
        );
        debug!(
            "Time taken to start the alert receiver agent: {} ms",
            now.elapsed().as_millis()
        );

        Self::serve_tcp(listener, service).await
    }

    async fn serve_tcp<S>(
        listener: tokio::net::TcpListener,
        service: S,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        S: hyper::service::Service<
                hyper::Request<hyper::body::Incoming>,
                Response = HttpResponse,
            > + Clone
            + Send
            + 'static,
        S::Future: Send,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = tokio::task::JoinSet::new();

        loop {
            let conn = tokio::select! {
                con_res = listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Server error: {e}");
                        return Err(e.into());
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => match finished {
                    Err(e) if e.is_panic() => {
                        // Don't kill server on panic - log and continue
                        error!("Connection handler panicked: {:?}", e);
                        continue;
                    },
                    Ok(()) | Err(_) => continue,
                },
            };
            let conn = hyper_util::rt::TokioIo::new(conn);
            let server = server.clone();
            let service = service.clone();
            joinset.spawn(async move {
                if let Err(e) = server.serve_connection(conn, service).await {
                    error!("Connection error: {e}");
                }
            });
        }
    }

    async fn endpoint_handler(
        config: Arc<config::Config>,
        req: HttpRequest,
        alert_processor: Arc<dyn AlertProcessor + Send + Sync>,
        tracer: Arc<dyn Tracer + Send + Sync>,
    ) -> http::Result<HttpResponse> {
        match (req.method(), req.uri().path()) {
            (&Method::POST | &Method::PUT, WEBHOOK_ENDPOINT_PATH) => {
                match alert_processor.process_alert(config, req, tracer).await {
                    Ok(res) => Ok(res),
                    Err(err) => log_and_create_http_response(
                        &format!("Error processing alert notification: {err}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    ),
                }
            }
            (_, HEALTH_ENDPOINT_PATH) => Response::builder()
                .status(StatusCode::OK)
                .body(Body::from("OK")),
            (_, INFO_ENDPOINT_PATH) => match Self::info_handler(config.receiver_port) {
                Ok(res) => Ok(res),
                Err(err) => log_and_create_http_response(
                    &format!("Info endpoint error: {err}"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ),
            },
            _ => {
                let mut not_found = Response::default();
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                Ok(not_found)
            }
        }
    }

    fn info_handler(receiver_port: u16) -> http::Result<HttpResponse> {
        let response_json = json!(
            {
                "endpoints": [
                    WEBHOOK_ENDPOINT_PATH,
                    HEALTH_ENDPOINT_PATH,
                    INFO_ENDPOINT_PATH
                ],
                "config": {
                    "receiver_port": receiver_port
                }
            }
        );
        Response::builder()
            .status(200)
            .body(Body::from(response_json.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use hyper::{Method, Request, StatusCode};

    use super::*;
    use crate::alert_processor::WebhookAlertProcessor;
    use crate::config::Config;
    use crate::tracer::NoopTracer;

    fn create_test_config() -> Arc<Config> {
        Arc::new(Config {
            receiver_port: 8080,
            max_request_content_length: 10 * 1024 * 1024,
            identity: crate::config::ServiceIdentity {
                service: "alerts-to-traces".to_string(),
                namespace: "monitoring".to_string(),
                version: "0.0.0".to_string(),
            },
        })
    }

    async fn dispatch(req: HttpRequest) -> HttpResponse {
        ReceiverAgent::endpoint_handler(
            create_test_config(),
            req,
            Arc::new(WebhookAlertProcessor {}),
            Arc::new(NoopTracer),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint_any_method() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = dispatch(req).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_info_endpoint_lists_routes() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/info")
            .body(Body::empty())
            .unwrap();

        let response = dispatch(req).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/webhook/unknown")
            .body(Body::empty())
            .unwrap();

        let response = dispatch(req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_rejects_get() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/webhook/alert-receiver")
            .body(Body::empty())
            .unwrap();

        let response = dispatch(req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
