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
use crate::hasher::BodyHasher;
use crate::normalize::{is_compressed, normalize_response, ResponseBody};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response};
use log::debug;
use mbrpc_core::time::now;
use mbrpc_core::utils::RedactHeaders;
use mbrpc_core::{
    Body, Context, Error, HttpSend, ProvideCredential, Result, SignRequest, SigningCredential,
    SigningParams,
};
use mbrpc_managed_blockchain::{SERVICE_NAME, X_AMZ_CONTENT_SHA_256};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// RpcTransport executes one HTTP request on behalf of an [`RpcClient`](crate::RpcClient).
///
/// A [`CancellationToken`] placed in the request extensions aborts the call.
#[async_trait]
pub trait RpcTransport: Debug + Send + Sync + 'static {
    /// Execute `req` and return the response.
    ///
    /// The request is borrowed mutably since a transport may update its
    /// headers after the exchange.
    async fn send(&self, req: &mut Request<Body>) -> Result<Response<ResponseBody>>;

    /// Kind of endpoint this transport talks to.
    fn provider(&self) -> Provider;
}

/// Copy method, uri, version, headers and body of `req` into a new request.
///
/// Extensions are not copied. `Body` clones share their bytes, so this is
/// cheap even for large payloads.
pub fn clone_request(req: &Request<Body>) -> Request<Body> {
    let mut cloned = Request::new(req.body().clone());
    *cloned.method_mut() = req.method().clone();
    *cloned.uri_mut() = req.uri().clone();
    *cloned.version_mut() = req.version();
    *cloned.headers_mut() = req.headers().clone();
    cloned
}

/// Overwrite the `Content-Type` header of `req`.
pub fn set_request_content_type<T>(req: &mut Request<T>, value: HeaderValue) {
    req.headers_mut().insert(CONTENT_TYPE, value);
}

/// Run `fut` unless `token` fires first.
async fn until_cancelled<F: Future>(
    token: Option<&CancellationToken>,
    fut: F,
) -> Option<F::Output> {
    match token {
        None => Some(fut.await),
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            out = fut => Some(out),
        },
    }
}

fn cancellation_token(req: &Request<Body>) -> Option<CancellationToken> {
    req.extensions().get::<CancellationToken>().cloned()
}

/// SigningTransport signs every request with SigV4 for Managed Blockchain.
///
/// Each call fetches fresh credentials, hashes the body, signs a copy of the
/// request and sends it. A response tagged `Content-Type: gzip` is decoded
/// and the caller's request is switched to `Content-Type: application/json`.
///
/// Nothing is cached between calls, so a single transport can be shared
/// across tasks.
#[derive(Debug)]
pub struct SigningTransport<K: SigningCredential> {
    ctx: Context,
    region: String,
    provider: Arc<dyn ProvideCredential<Credential = K>>,
    signer: Arc<dyn SignRequest<Credential = K>>,
    sender: Arc<dyn HttpSend>,
    hasher: BodyHasher,
}

impl<K: SigningCredential> Clone for SigningTransport<K> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            region: self.region.clone(),
            provider: self.provider.clone(),
            signer: self.signer.clone(),
            sender: self.sender.clone(),
            hasher: self.hasher,
        }
    }
}

impl<K: SigningCredential> SigningTransport<K> {
    /// Create a new signing transport.
    pub fn new(
        ctx: Context,
        region: impl Into<String>,
        provider: impl ProvideCredential<Credential = K>,
        signer: impl SignRequest<Credential = K>,
        sender: impl HttpSend,
    ) -> Self {
        Self::from_shared(
            ctx,
            region,
            Arc::new(provider),
            Arc::new(signer),
            Arc::new(sender),
        )
    }

    /// Create a new signing transport from already shared components.
    pub fn from_shared(
        ctx: Context,
        region: impl Into<String>,
        provider: Arc<dyn ProvideCredential<Credential = K>>,
        signer: Arc<dyn SignRequest<Credential = K>>,
        sender: Arc<dyn HttpSend>,
    ) -> Self {
        Self {
            ctx,
            region: region.into(),
            provider,
            signer,
            sender,
            hasher: BodyHasher::default(),
        }
    }

    /// Replace the body hasher, mostly to change the hash ceiling.
    pub fn with_hasher(mut self, hasher: BodyHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Region used in the signing scope.
    pub fn region(&self) -> &str {
        &self.region
    }

    async fn load_credential(&self, cancel: Option<&CancellationToken>) -> Result<K> {
        let credential = until_cancelled(cancel, self.provider.provide_credential(&self.ctx))
            .await
            .ok_or_else(|| Error::credential_unavailable("failed to get credentials: cancelled"))?
            .map_err(|e| Error::credential_unavailable("failed to get credentials").with_source(e))?
            .ok_or_else(|| {
                Error::credential_unavailable("failed to get credentials: no credential found")
            })?;

        if !credential.is_valid() {
            return Err(Error::credential_unavailable(
                "failed to get credentials: credential is expired or incomplete",
            ));
        }
        Ok(credential)
    }
}

#[async_trait]
impl<K: SigningCredential> RpcTransport for SigningTransport<K> {
    async fn send(&self, req: &mut Request<Body>) -> Result<Response<ResponseBody>> {
        let cancel = cancellation_token(req);

        let credential = self.load_credential(cancel.as_ref()).await?;
        debug!("loaded credential for {} {}", req.method(), req.uri());

        let signed = clone_request(req);

        let payload_hash = self.hasher.hash(req).map_err(|e| {
            Error::body_read("failed to hash request for v4 signature").with_source(e)
        })?;
        debug!("request payload hash: {payload_hash}");

        let (mut parts, body) = signed.into_parts();
        parts
            .headers
            .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::from_str(&payload_hash)?);
        self.signer
            .sign_request(
                &self.ctx,
                &mut parts,
                &credential,
                SigningParams {
                    payload_hash: &payload_hash,
                    service: SERVICE_NAME,
                    region: &self.region,
                    time: now(),
                },
            )
            .await
            .map_err(|e| Error::signing_failed("failed v4 sign request").with_source(e))?;
        let signed = Request::from_parts(parts, body);
        debug!(
            "signed request: {} {} {:?}",
            signed.method(),
            signed.uri(),
            RedactHeaders(signed.headers())
        );

        let resp = until_cancelled(cancel.as_ref(), self.sender.http_send(signed))
            .await
            .ok_or_else(|| {
                Error::transport_failed("failed to perform Managed Blockchain request: cancelled")
            })?
            .map_err(|e| {
                Error::transport_failed("failed to perform Managed Blockchain request")
                    .with_source(e)
            })?;
        debug!("got response: {}", resp.status());

        let compressed = is_compressed(resp.headers());
        let resp = normalize_response(resp)?;
        if compressed {
            set_request_content_type(req, HeaderValue::from_static("application/json"));
        }

        Ok(resp)
    }

    fn provider(&self) -> Provider {
        Provider::Managed
    }
}

/// DirectTransport sends requests as they are, for endpoints that need no signing.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    sender: Arc<dyn HttpSend>,
}

impl DirectTransport {
    /// Create a new direct transport over `sender`.
    pub fn new(sender: impl HttpSend) -> Self {
        Self {
            sender: Arc::new(sender),
        }
    }
}

#[async_trait]
impl RpcTransport for DirectTransport {
    async fn send(&self, req: &mut Request<Body>) -> Result<Response<ResponseBody>> {
        let cancel = cancellation_token(req);

        let resp = until_cancelled(cancel.as_ref(), self.sender.http_send(clone_request(req)))
            .await
            .ok_or_else(|| Error::transport_failed("failed to perform request: cancelled"))?
            .map_err(|e| Error::transport_failed("failed to perform request").with_source(e))?;
        debug!("got response: {}", resp.status());

        Ok(resp.map(ResponseBody::plain))
    }

    fn provider(&self) -> Provider {
        Provider::Regular
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::tests::compress;
    use bytes::Bytes;
    use http::Method;
    use mbrpc_core::hash::{hex_sha256, EMPTY_SHA256};
    use mbrpc_core::ErrorKind;
    use mbrpc_managed_blockchain::{Credential, RequestSigner, StaticCredentialProvider};
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use std::sync::Mutex;

    /// Records the requests it sees and answers with a canned response.
    #[derive(Debug, Default, Clone)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Request<Bytes>>>>,
        content_type: Option<&'static str>,
        body: Bytes,
    }

    #[async_trait]
    impl HttpSend for Recorder {
        async fn http_send(&self, req: Request<Body>) -> Result<Response<Bytes>> {
            let (parts, body) = req.into_parts();
            let body = body.to_bytes()?;
            self.seen
                .lock()
                .expect("lock poisoned")
                .push(Request::from_parts(parts, body));

            let mut builder = Response::builder().status(200);
            if let Some(ct) = self.content_type {
                builder = builder.header(CONTENT_TYPE, ct);
            }
            Ok(builder.body(self.body.clone())?)
        }
    }

    #[derive(Debug)]
    struct NoCredential;

    #[async_trait]
    impl ProvideCredential for NoCredential {
        type Credential = Credential;

        async fn provide_credential(&self, _: &Context) -> Result<Option<Credential>> {
            Ok(None)
        }
    }

    fn transport(sender: Recorder) -> SigningTransport<Credential> {
        SigningTransport::new(
            Context::new(),
            "us-east-1",
            StaticCredentialProvider::new("access_key_id", "secret_access_key"),
            RequestSigner::new(),
            sender,
        )
    }

    fn rpc_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("https://nd-123.ethereum.managedblockchain.us-east-1.amazonaws.com/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request must build")
    }

    #[test]
    fn test_clone_request_is_independent() {
        let mut req = rpc_request("{}");
        let mut cloned = clone_request(&req);
        cloned
            .headers_mut()
            .insert("authorization", HeaderValue::from_static("signed"));
        req.extensions_mut().insert(CancellationToken::new());

        assert_eq!(cloned.method(), req.method());
        assert_eq!(cloned.uri(), req.uri());
        assert!(req.headers().get("authorization").is_none());
        assert!(cloned.extensions().get::<CancellationToken>().is_none());
    }

    #[tokio::test]
    async fn test_signs_with_payload_hash() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let sender = Recorder::default();
        let body = r#"{"jsonrpc":"2.0","method":"eth_chainId","params":[],"id":1}"#;
        let mut req = rpc_request(body);

        let resp = transport(sender.clone()).send(&mut req).await?;
        assert_eq!(resp.status(), 200);

        let seen = sender.seen.lock().expect("lock poisoned");
        assert_eq!(seen.len(), 1);
        let signed = &seen[0];
        assert_eq!(
            signed.headers()[X_AMZ_CONTENT_SHA_256],
            hex_sha256(body.as_bytes()).as_str()
        );
        let auth = signed.headers()["authorization"].to_str()?;
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=access_key_id/"));
        assert!(auth.contains("/us-east-1/managedblockchain/aws4_request"));
        assert_eq!(signed.body(), &Bytes::from_static(body.as_bytes()));

        // Only the signed copy carries the signature.
        assert!(req.headers().get("authorization").is_none());
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_credential_skips_network() {
        let sender = Recorder::default();
        let transport = SigningTransport::new(
            Context::new(),
            "us-east-1",
            NoCredential,
            RequestSigner::new(),
            sender.clone(),
        );

        let err = transport
            .send(&mut rpc_request("{}"))
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
        assert!(sender.seen.lock().expect("lock poisoned").is_empty());
    }

    #[tokio::test]
    async fn test_compressed_response() -> anyhow::Result<()> {
        let payload = br#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#;
        let sender = Recorder {
            content_type: Some("gzip"),
            body: compress(payload),
            ..Default::default()
        };
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("https://nd-123.ethereum.managedblockchain.us-east-1.amazonaws.com/")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("{}"))?;

        let resp = transport(sender).send(&mut req).await?;

        let mut out = Vec::new();
        resp.into_body().read_to_end(&mut out)?;
        assert_eq!(out, payload.to_vec());
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_compressed_response() {
        let sender = Recorder {
            content_type: Some("gzip"),
            body: Bytes::from_static(b"definitely not base64 gzip"),
            ..Default::default()
        };
        let mut req = rpc_request("{}");
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let err = transport(sender)
            .send(&mut req)
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);
        assert_eq!(req.headers()[CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn test_empty_body_hash() -> anyhow::Result<()> {
        let sender = Recorder::default();
        let mut req = Request::builder()
            .method(Method::GET)
            .uri("https://nd-123.ethereum.managedblockchain.us-east-1.amazonaws.com/")
            .body(Body::Empty)?;

        transport(sender.clone()).send(&mut req).await?;

        let seen = sender.seen.lock().expect("lock poisoned");
        assert_eq!(seen[0].headers()[X_AMZ_CONTENT_SHA_256], EMPTY_SHA256);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let sender = Recorder::default();
        let token = CancellationToken::new();
        token.cancel();

        let mut req = rpc_request("{}");
        req.extensions_mut().insert(token);

        let err = transport(sender.clone())
            .send(&mut req)
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
        assert!(sender.seen.lock().expect("lock poisoned").is_empty());
    }

    #[tokio::test]
    async fn test_direct_transport_passthrough() -> anyhow::Result<()> {
        let raw = compress(b"left alone");
        let sender = Recorder {
            content_type: Some("gzip"),
            body: raw.clone(),
            ..Default::default()
        };
        let transport = DirectTransport::new(sender.clone());
        assert_eq!(transport.provider(), Provider::Regular);

        let mut req = rpc_request("{}");
        let resp = transport.send(&mut req).await?;
        assert_eq!(resp.into_body().into_bytes()?, raw);

        let seen = sender.seen.lock().expect("lock poisoned");
        assert!(seen[0].headers().get("authorization").is_none());
        Ok(())
    }
}
