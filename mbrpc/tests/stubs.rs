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

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::request::Parts;
use http::{HeaderValue, Request, Response};
use mbrpc::managed_blockchain::Credential;
use mbrpc::{
    Body, Context, Error, HttpSend, ProvideCredential, Result, SignRequest, SigningParams,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FIXED_AUTHORIZATION: &str = "AWS4-HMAC-SHA256 Credential=stub";

/// Hands out the same credential every time.
#[derive(Debug, Default)]
pub struct StubProvider {
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[async_trait]
impl ProvideCredential for StubProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Credential>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::credential_unavailable("instance metadata unreachable"));
        }
        Ok(Some(Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            session_token: None,
            expires_in: None,
        }))
    }
}

/// Adds a fixed authorization header and records the parameters it was given.
#[derive(Debug, Default, Clone)]
pub struct StubSigner {
    pub fail: bool,
    pub calls: Arc<Mutex<Vec<(String, String, String)>>>,
}

#[async_trait]
impl SignRequest for StubSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        _: &Self::Credential,
        params: SigningParams<'_>,
    ) -> Result<()> {
        if self.fail {
            return Err(Error::signing_failed("signer rejected request"));
        }
        self.calls.lock().expect("lock poisoned").push((
            params.payload_hash.to_string(),
            params.service.to_string(),
            params.region.to_string(),
        ));
        req.headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static(FIXED_AUTHORIZATION),
        );
        Ok(())
    }
}

/// What the stub sender does with a request.
#[derive(Debug, Clone, Default)]
pub enum Reply {
    /// Answer 200 with the request headers and an empty body.
    #[default]
    Echo,
    /// Answer 200 with the given content type and body.
    Fixed(&'static str, Bytes),
    /// Never answer.
    Hang,
}

/// Records every request it receives.
#[derive(Debug, Default, Clone)]
pub struct StubSender {
    pub reply: Reply,
    pub seen: Arc<Mutex<Vec<Request<Bytes>>>>,
    pub count: Arc<AtomicUsize>,
}

impl StubSender {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Request<Bytes> {
        let seen = self.seen.lock().expect("lock poisoned");
        let last = seen.last().expect("at least one request");
        let mut req = Request::new(last.body().clone());
        *req.method_mut() = last.method().clone();
        *req.uri_mut() = last.uri().clone();
        *req.headers_mut() = last.headers().clone();
        req
    }
}

#[async_trait]
impl HttpSend for StubSender {
    async fn http_send(&self, req: Request<Body>) -> Result<Response<Bytes>> {
        self.count.fetch_add(1, Ordering::SeqCst);
        let (parts, body) = req.into_parts();
        let body = body.to_bytes()?;
        let headers = parts.headers.clone();
        self.seen
            .lock()
            .expect("lock poisoned")
            .push(Request::from_parts(parts, body));

        match &self.reply {
            Reply::Echo => {
                let mut resp = Response::new(Bytes::new());
                *resp.headers_mut() = headers;
                Ok(resp)
            }
            Reply::Fixed(content_type, body) => Ok(Response::builder()
                .status(200)
                .header(http::header::CONTENT_TYPE, *content_type)
                .body(body.clone())?),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Encode `payload` the way Managed Blockchain does for `Content-Type: gzip`.
pub fn compress(payload: &[u8]) -> Bytes {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(payload).expect("write to vec must succeed");
    let gz = enc.finish().expect("finish gzip must succeed");
    Bytes::from(STANDARD.encode(gz))
}
