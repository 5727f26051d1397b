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

use crate::classify::{classify, Provider};
use crate::client::RpcClient;
use crate::transport::{DirectTransport, SigningTransport};
use http::Uri;
use log::debug;
use mbrpc_core::{Context, Error, HttpSend, OsEnv, ProvideCredential, Result};
use mbrpc_file_read_tokio::TokioFileRead;
use mbrpc_http_send_reqwest::ReqwestHttpSend;
use mbrpc_managed_blockchain::{Config, Credential, RequestSigner};
use std::sync::Arc;

/// Pre-built settings for a Managed Blockchain client.
#[derive(Debug, Clone)]
pub struct ManagedConfig {
    region: String,
    provider: Arc<dyn ProvideCredential<Credential = Credential>>,
    sender: Option<Arc<dyn HttpSend>>,
}

impl ManagedConfig {
    /// Create a config for `region` that loads credentials from `provider`.
    pub fn new(
        region: impl Into<String>,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        Self {
            region: region.into(),
            provider: Arc::new(provider),
            sender: None,
        }
    }

    /// Use `sender` instead of a default reqwest client.
    pub fn with_sender(mut self, sender: impl HttpSend) -> Self {
        self.sender = Some(Arc::new(sender));
        self
    }
}

fn creation_error(err: Error) -> Error {
    Error::creation_failed("failed to create client").with_source(err)
}

fn parse_endpoint(endpoint: &str) -> Result<Uri> {
    let uri: Uri = endpoint.parse()?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(Error::request_invalid(format!(
            "endpoint {endpoint} must be an absolute url"
        )));
    }
    Ok(uri)
}

fn default_sender() -> Result<Arc<dyn HttpSend>> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| Error::unexpected("failed to build http client").with_source(e))?;
    Ok(Arc::new(ReqwestHttpSend::new(client)))
}

fn default_context() -> Context {
    Context::new().with_file_read(TokioFileRead).with_env(OsEnv)
}

/// Create a client for `endpoint`, signing requests when it is a Managed
/// Blockchain endpoint.
///
/// `config` is only used for managed endpoints; without it the settings are
/// loaded from the environment as [`create_managed_client`] does.
pub async fn create_client(endpoint: &str, config: Option<ManagedConfig>) -> Result<RpcClient> {
    let provider = classify(endpoint);
    debug!("creating {provider} client for {endpoint}");

    match (provider, config) {
        (Provider::Managed, Some(config)) => create_managed_client_from_config(endpoint, config),
        (Provider::Managed, None) => create_managed_client(endpoint).await,
        (Provider::Regular, _) => create_regular_client(endpoint),
    }
}

/// Create a managed client, loading region and credentials from the
/// environment and the shared AWS config files.
pub async fn create_managed_client(endpoint: &str) -> Result<RpcClient> {
    create_managed_client_with_context(endpoint, default_context()).await
}

/// Same as [`create_managed_client`] but reads env and files through `ctx`.
pub async fn create_managed_client_with_context(
    endpoint: &str,
    ctx: Context,
) -> Result<RpcClient> {
    let config = Config::default()
        .from_env(&ctx)
        .from_profile(&ctx)
        .await
        .map_err(creation_error)?;
    let region = config.region().map_err(creation_error)?.to_string();
    let uri = parse_endpoint(endpoint).map_err(creation_error)?;
    let sender = default_sender().map_err(creation_error)?;

    let transport = SigningTransport::from_shared(
        ctx,
        region,
        Arc::new(config.credential_provider()),
        Arc::new(RequestSigner::new()),
        sender,
    );
    Ok(RpcClient::new(uri, transport))
}

/// Create a managed client from pre-built settings.
pub fn create_managed_client_from_config(
    endpoint: &str,
    config: ManagedConfig,
) -> Result<RpcClient> {
    let uri = parse_endpoint(endpoint).map_err(creation_error)?;
    let sender = match config.sender {
        Some(sender) => sender,
        None => default_sender().map_err(creation_error)?,
    };

    let transport = SigningTransport::from_shared(
        default_context(),
        config.region,
        config.provider,
        Arc::new(RequestSigner::new()),
        sender,
    );
    Ok(RpcClient::new(uri, transport))
}

/// Create a client that sends requests without signing.
pub fn create_regular_client(endpoint: &str) -> Result<RpcClient> {
    let uri = parse_endpoint(endpoint).map_err(creation_error)?;
    let client = reqwest::Client::builder().build().map_err(|e| {
        creation_error(Error::unexpected("failed to build http client").with_source(e))
    })?;

    Ok(RpcClient::new(
        uri,
        DirectTransport::new(ReqwestHttpSend::new(client)),
    ))
}
