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

use crate::classify::Provider;
use crate::transport::RpcTransport;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request, Uri};
use log::debug;
use mbrpc_core::{Body, Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const NO_PARAMS: [(); 0] = [];

#[derive(Serialize)]
struct RequestEnvelope<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    result: serde_json::Value,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 client over an [`RpcTransport`].
///
/// Clones share the transport and the request id counter.
#[derive(Debug, Clone)]
pub struct RpcClient {
    endpoint: Uri,
    transport: Arc<dyn RpcTransport>,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a new client that posts to `endpoint` through `transport`.
    pub fn new(endpoint: Uri, transport: impl RpcTransport) -> Self {
        Self {
            endpoint,
            transport: Arc::new(transport),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Endpoint this client talks to.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Kind of endpoint behind this client.
    pub fn provider(&self) -> Provider {
        self.transport.provider()
    }

    /// Call `method` with `params` and decode its result.
    pub async fn request<R, P>(&self, method: &str, params: P) -> Result<R>
    where
        R: DeserializeOwned,
        P: Serialize + Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(&RequestEnvelope {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| Error::request_invalid("failed to encode json-rpc request").with_source(e))?;

        let mut req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Body::from(payload))?;

        debug!("calling {method} with id {id}");
        let resp = self.transport.send(&mut req).await?;
        let status = resp.status();
        let body = resp.into_body().into_bytes().map_err(|e| {
            Error::decode_failed(format!("failed to read response of {method}")).with_source(e)
        })?;

        if !status.is_success() {
            return Err(Error::rpc_failed(format!(
                "{method} failed with http status {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        let envelope: ResponseEnvelope = serde_json::from_slice(&body).map_err(|e| {
            Error::unexpected(format!("failed to parse json-rpc response of {method}"))
                .with_source(e)
        })?;
        if let Some(err) = envelope.error {
            return Err(Error::rpc_failed(format!(
                "{method} failed with code {}: {}",
                err.code, err.message
            )));
        }

        serde_json::from_value(envelope.result).map_err(|e| {
            Error::unexpected(format!("failed to decode result of {method}")).with_source(e)
        })
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<u64> {
        let v: String = self.request("eth_chainId", NO_PARAMS).await?;
        parse_quantity(&v)
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64> {
        let v: String = self.request("eth_blockNumber", NO_PARAMS).await?;
        parse_quantity(&v)
    }
}

/// Parse a hex encoded JSON-RPC quantity such as `0x1b4`.
pub fn parse_quantity(v: &str) -> Result<u64> {
    let digits = v
        .strip_prefix("0x")
        .ok_or_else(|| Error::unexpected(format!("quantity {v} is not 0x prefixed")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::unexpected(format!("invalid quantity {v}")).with_source(e))
}
