// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
    Resource,
};

use alert_trace_agent::{
    agent::ReceiverAgent,
    alert_processor::WebhookAlertProcessor,
    config,
    tracer::OtelTracer,
};

/// Instrumentation scope reported for spans produced by this binary.
const TRACER_SCOPE_NAME: &str = "alerts-to-traces";

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    debug!("Starting alerts-to-traces receiver");

    let env_filter = format!("h2=off,hyper=off,tonic=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config::Config::new() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Error creating config on alert receiver startup: {e}");
            return;
        }
    };

    // W3C trace context is the propagation format across the board.
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::builder()
        .with_service_name(config.identity.service.clone())
        .with_attributes([
            KeyValue::new("service.namespace", config.identity.namespace.clone()),
            KeyValue::new("service.version", config.identity.version.clone()),
        ])
        .build();

    let provider_builder = SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_resource(resource);

    let provider = match env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => {
            let exporter = match opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
            {
                Ok(exporter) => exporter,
                Err(e) => {
                    error!("Error creating OTLP span exporter on alert receiver startup: {e}");
                    return;
                }
            };
            provider_builder.with_batch_exporter(exporter).build()
        }
        Err(_) => {
            info!("OTEL_EXPORTER_OTLP_ENDPOINT not set, spans will not be exported");
            provider_builder.build()
        }
    };

    global::set_tracer_provider(provider.clone());

    let tracer = Arc::new(OtelTracer::new(global::tracer(TRACER_SCOPE_NAME)));
    let alert_processor = Arc::new(WebhookAlertProcessor {});

    let receiver_agent = Box::new(ReceiverAgent {
        config: Arc::clone(&config),
        alert_processor,
        tracer,
    });

    info!(
        "Alert receiver listening on port {}",
        config.receiver_port
    );

    tokio::spawn(async move {
        let res = receiver_agent.start_agent().await;
        if let Err(e) = res {
            error!("Error when starting the alert receiver agent: {e:?}");
        }
    });

    #[allow(clippy::expect_used)]
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install shutdown signal handler");

    info!("Shutdown signal received, flushing remaining spans");
    if let Err(e) = provider.shutdown() {
        error!("Error shutting down the tracer provider: {e}");
    }
}
