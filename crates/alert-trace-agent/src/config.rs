// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;

const DEFAULT_RECEIVER_PORT: u16 = 8080;
const DEFAULT_SERVICE_NAME: &str = "alerts-to-traces";
const DEFAULT_SERVICE_NAMESPACE: &str = "monitoring";

/// Identity strings reported for every span produced by this process.
///
/// Turned into the OpenTelemetry `Resource` by the binary; read-only after
/// startup.
#[derive(Debug, Clone)]
pub struct ServiceIdentity {
    pub service: String,
    pub namespace: String,
    pub version: String,
}

impl ServiceIdentity {
    fn from_env() -> Self {
        ServiceIdentity {
            service: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
            namespace: env::var("OTEL_SERVICE_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAMESPACE.to_string()),
            version: env::var("OTEL_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    /// Port the webhook receiver listens on.
    pub receiver_port: u16,
    pub max_request_content_length: usize,
    pub identity: ServiceIdentity,
}

impl Config {
    pub fn new() -> Result<Config, Box<dyn std::error::Error>> {
        let receiver_port = match env::var("PORT") {
            Ok(port) => port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("Invalid PORT value `{port}`"))?,
            Err(_) => DEFAULT_RECEIVER_PORT,
        };

        Ok(Config {
            receiver_port,
            max_request_content_length: 10 * 1024 * 1024, // 10MB in Bytes
            identity: ServiceIdentity::from_env(),
        })
    }
}
