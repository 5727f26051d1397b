// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Reqwest-based network sender for mbrpc.
//!
//! `ReqwestHttpSend` is the default `HttpSend` used by both the signing and the
//! direct transport. Bring your own `reqwest::Client` to control timeouts, TLS
//! and connection pooling.
//!
//! ## Example
//!
//! ```no_run
//! use mbrpc_http_send_reqwest::ReqwestHttpSend;
//! use std::time::Duration;
//!
//! # fn example() -> anyhow::Result<()> {
//! let client = reqwest::Client::builder()
//!     .timeout(Duration::from_secs(30))
//!     .build()?;
//! let sender = ReqwestHttpSend::new(client);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use mbrpc_core::{Body, Error, HttpSend, Result};
use reqwest::Client;

/// Reqwest-based implementation of the `HttpSend` trait.
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Body>) -> Result<http::Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let body = body.to_bytes().map_err(|e| {
            Error::body_read("failed to read request body for sending").with_source(e)
        })?;

        let req = self
            .client
            .request(parts.method, parts.uri.to_string())
            .version(parts.version)
            .headers(parts.headers)
            .body(body)
            .build()
            .map_err(|e| Error::request_invalid("failed to build http request").with_source(e))?;

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::transport_failed("failed to send http request").with_source(e))?;
        debug!("received response with status {}", resp.status());

        let mut builder = http::Response::builder()
            .status(resp.status())
            .version(resp.version());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(resp.headers().clone());
        }

        let bs = resp.bytes().await.map_err(|e| {
            Error::transport_failed("failed to read http response body").with_source(e)
        })?;
        Ok(builder.body(bs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbrpc_core::ErrorKind;

    #[tokio::test]
    async fn test_connection_refused_is_transport_failed() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let sender = ReqwestHttpSend::default();
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri("http://127.0.0.1:1/")
            .body(Body::from("{}"))?;

        let err = sender.http_send(req).await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::TransportFailed);
        Ok(())
    }
}
