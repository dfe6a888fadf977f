// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use http_body_util::Full;
use hyper::body::{Body as HyperBody, Bytes, Frame, Incoming, SizeHint};
use hyper::{
    header,
    http::{self, HeaderMap},
    Response, StatusCode,
};
use serde_json::json;
use tracing::{debug, error};

/// Header carrying the comma-separated chain of forwarding proxies. Only
/// the first entry (the original sender) is of interest.
const X_FORWARDED_FOR_KEY: &str = "x-forwarded-for";

/// Request/response body used across the agent.
///
/// Inbound requests arrive as streaming `hyper` bodies, responses and test
/// requests are built from full buffers; this enum lets both flow through
/// the same handler signatures.
pub enum Body {
    Incoming(Incoming),
    Full(Full<Bytes>),
}

impl Body {
    #[must_use]
    pub fn empty() -> Self {
        Body::Full(Full::new(Bytes::new()))
    }

    #[must_use]
    pub fn from<T: Into<Bytes>>(body: T) -> Self {
        Body::Full(Full::new(body.into()))
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl HyperBody for Body {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Body::Incoming(body) => Pin::new(body).poll_frame(cx),
            Body::Full(body) => Pin::new(body)
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(|never| match never {}))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Body::Incoming(body) => body.is_end_stream(),
            Body::Full(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Body::Incoming(body) => body.size_hint(),
            Body::Full(body) => body.size_hint(),
        }
    }
}

pub type HttpRequest = hyper::Request<Body>;
pub type HttpResponse = hyper::Response<Body>;

/// Does two things:
/// 1. Logs the given message. A success status code (within 200-299) will cause a debug log to be
///    written, otherwise error will be written.
/// 2. Returns the given message in the body of JSON response with the given status code.
///
/// Response body format:
/// {
///     "message": message
/// }
pub fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<HttpResponse> {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    let body = json!({ "message": message }).to_string();
    Response::builder().status(status).body(Body::from(body))
}

/// Like [`log_and_create_http_response`], but also sets the given
/// propagation headers (`traceparent` + B3 set) on the response.
///
/// Every webhook response goes through here so the caller always receives a
/// `traceparent` header, whatever happened internally.
pub fn log_and_create_propagated_http_response(
    message: &str,
    status: StatusCode,
    propagation_headers: &HashMap<String, String>,
) -> http::Result<HttpResponse> {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    let body = json!({ "message": message }).to_string();
    let mut builder = Response::builder().status(status);
    for (key, value) in propagation_headers {
        builder = builder.header(key, value);
    }
    builder.body(Body::from(body))
}

/// Takes a request's header map, and verifies that the "content-length" and/or "Transfer-Encoding" header
/// is present, valid, and less than the given max_content_length.
///
/// Will return None if no issues are found. Otherwise logs an error (with the given prefix) and
/// returns and HTTP Response with the appropriate error status code.
pub fn verify_request_content_length(
    header_map: &HeaderMap,
    max_content_length: usize,
    error_message_prefix: &str,
) -> Option<http::Result<HttpResponse>> {
    let content_length_header = match header_map.get(header::CONTENT_LENGTH) {
        Some(res) => res,
        None => {
            if let Some(transfer_encoding_header) = header_map.get(header::TRANSFER_ENCODING) {
                debug!(
                    "Transfer-Encoding header is present: {:?}",
                    transfer_encoding_header
                );
                return None;
            }
            return Some(log_and_create_http_response(
                &format!(
                    "{error_message_prefix}: Missing Content-Length and Transfer-Encoding header"
                ),
                StatusCode::LENGTH_REQUIRED,
            ));
        }
    };
    let header_as_string = match content_length_header.to_str() {
        Ok(res) => res,
        Err(_) => {
            return Some(log_and_create_http_response(
                &format!("{error_message_prefix}: Invalid Content-Length header"),
                StatusCode::BAD_REQUEST,
            ));
        }
    };
    let content_length = match header_as_string.parse::<usize>() {
        Ok(res) => res,
        Err(_) => {
            return Some(log_and_create_http_response(
                &format!("{error_message_prefix}: Invalid Content-Length header"),
                StatusCode::BAD_REQUEST,
            ));
        }
    };
    if content_length > max_content_length {
        return Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Payload too large"),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }
    None
}

/// Converts a hyper `HeaderMap` to a plain `HashMap<String, String>`.
///
/// Header names are already lowercase in hyper; non-UTF-8 header values are
/// carried as empty strings rather than failing the request.
#[must_use]
pub fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                v.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// Returns the originating address of a forwarded request: the first
/// comma-separated entry of `x-forwarded-for`, or an empty string when the
/// header is absent.
#[must_use]
pub fn forwarded_source(headers: &HashMap<String, String>) -> String {
    headers
        .get(X_FORWARDED_FOR_KEY)
        .and_then(|value| value.split(',').next())
        .unwrap_or_default()
        .trim()
        .to_string()
}
