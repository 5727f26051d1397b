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

use crate::stubs::*;
use anyhow::Result;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request};
use mbrpc::hash::{hex_sha256, EMPTY_SHA256};
use mbrpc::managed_blockchain::{Credential, X_AMZ_CONTENT_SHA_256};
use mbrpc::{
    Body, Context, ErrorKind, ManagedConfig, ReplayBody, RpcClient, RpcTransport,
    SigningTransport,
};
use pretty_assertions::assert_eq;
use std::io::{self, Cursor, Read};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ENDPOINT: &str = "https://nd-abc.ethereum.managedblockchain.us-east-1.amazonaws.com/";

fn transport(
    provider: StubProvider,
    signer: StubSigner,
    sender: StubSender,
) -> SigningTransport<Credential> {
    SigningTransport::new(Context::new(), "us-east-1", provider, signer, sender)
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(ENDPOINT)
        .header(CONTENT_TYPE, "text/plain")
        .body(body.into())
        .expect("request must build")
}

/// A body that can only be read through fresh replays.
#[derive(Debug)]
struct Payload(&'static [u8]);

impl ReplayBody for Payload {
    fn replay(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.0)))
    }
}

#[tokio::test]
async fn test_echo_get_without_body() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let sender = StubSender::new(Reply::Echo);
    let signer = StubSigner::default();
    let t = transport(StubProvider::default(), signer.clone(), sender.clone());

    let mut req = Request::builder()
        .method(Method::GET)
        .uri(ENDPOINT)
        .body(Body::Empty)?;
    let resp = t.send(&mut req).await?;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[AUTHORIZATION], FIXED_AUTHORIZATION);
    assert_eq!(resp.headers()[X_AMZ_CONTENT_SHA_256], EMPTY_SHA256);

    let seen = sender.last();
    assert_eq!(seen.headers()[AUTHORIZATION], FIXED_AUTHORIZATION);
    assert_eq!(seen.headers()[X_AMZ_CONTENT_SHA_256], EMPTY_SHA256);

    let calls = signer.calls.lock().expect("lock poisoned");
    assert_eq!(
        calls[0],
        (
            EMPTY_SHA256.to_string(),
            "managedblockchain".to_string(),
            "us-east-1".to_string()
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_credential_failure_sends_nothing() {
    let sender = StubSender::new(Reply::Echo);
    let signer = StubSigner::default();
    let t = transport(
        StubProvider {
            fail: true,
            ..Default::default()
        },
        signer.clone(),
        sender.clone(),
    );

    let err = t.send(&mut post("{}")).await.expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
    assert!(err.is_unsent());
    assert_eq!(sender.calls(), 0);
    assert!(signer.calls.lock().expect("lock poisoned").is_empty());
}

#[tokio::test]
async fn test_signing_failure_sends_nothing() {
    let sender = StubSender::new(Reply::Echo);
    let t = transport(
        StubProvider::default(),
        StubSigner {
            fail: true,
            ..Default::default()
        },
        sender.clone(),
    );

    let err = t.send(&mut post("{}")).await.expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::SigningFailed);
    assert_eq!(sender.calls(), 0);
}

#[tokio::test]
async fn test_original_body_survives_send() -> Result<()> {
    let sender = StubSender::new(Reply::Echo);
    let t = transport(StubProvider::default(), StubSigner::default(), sender.clone());

    let payload: &'static [u8] =
        br#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":7}"#;
    let mut req = post(Body::replayable(Payload(payload)));
    t.send(&mut req).await?;

    let mut left = Vec::new();
    req.body()
        .replay()?
        .expect("body present")
        .read_to_end(&mut left)?;
    assert_eq!(left, payload.to_vec());

    let seen = sender.last();
    assert_eq!(seen.body(), &Bytes::from_static(payload));
    assert_eq!(seen.headers()[X_AMZ_CONTENT_SHA_256], hex_sha256(payload).as_str());

    // Sending the same request again works and signs it afresh.
    t.send(&mut req).await?;
    assert_eq!(sender.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_gzip_response_is_decoded() -> Result<()> {
    let payload = br#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#;
    let sender = StubSender::new(Reply::Fixed("gzip", compress(payload)));
    let t = transport(StubProvider::default(), StubSigner::default(), sender);

    let mut req = post("{}");
    let resp = t.send(&mut req).await?;

    let mut out = Vec::new();
    resp.into_body().read_to_end(&mut out)?;
    assert_eq!(out, payload.to_vec());
    assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
    Ok(())
}

#[tokio::test]
async fn test_application_gzip_passes_through() -> Result<()> {
    let raw = compress(b"still compressed");
    let sender = StubSender::new(Reply::Fixed("application/gzip", raw.clone()));
    let t = transport(StubProvider::default(), StubSigner::default(), sender);

    let mut req = post("{}");
    let resp = t.send(&mut req).await?;

    assert_eq!(resp.headers()[CONTENT_TYPE], "application/gzip");
    assert_eq!(resp.into_body().into_bytes()?, raw);
    assert_eq!(req.headers()[CONTENT_TYPE], "text/plain");
    Ok(())
}

#[tokio::test]
async fn test_cancel_during_credential_retrieval() {
    let sender = StubSender::new(Reply::Echo);
    let t = transport(
        StubProvider {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        },
        StubSigner::default(),
        sender.clone(),
    );

    let token = CancellationToken::new();
    let mut req = post("{}");
    req.extensions_mut().insert(token.clone());

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let err = t.send(&mut req).await.expect_err("must fail");
    cancel.await.expect("cancel task must finish");

    assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
    assert_eq!(sender.calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_send() {
    let sender = StubSender::new(Reply::Hang);
    let t = transport(StubProvider::default(), StubSigner::default(), sender.clone());

    let token = CancellationToken::new();
    let mut req = post("{}");
    req.extensions_mut().insert(token.clone());

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let err = t.send(&mut req).await.expect_err("must fail");
    cancel.await.expect("cancel task must finish");

    assert_eq!(err.kind(), ErrorKind::TransportFailed);
    assert!(err.is_retryable());
    assert_eq!(sender.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_sends() -> Result<()> {
    let sender = StubSender::new(Reply::Echo);
    let signer = StubSigner::default();
    let t = transport(StubProvider::default(), signer.clone(), sender.clone());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let t = t.clone();
        tasks.push(tokio::spawn(async move {
            let mut req = post(format!("{{\"id\":{i}}}"));
            t.send(&mut req).await.map(|resp| resp.status())
        }));
    }
    for task in tasks {
        assert_eq!(task.await??, 200);
    }

    assert_eq!(sender.calls(), 16);
    let mut hashes: Vec<_> = signer
        .calls
        .lock()
        .expect("lock poisoned")
        .iter()
        .map(|(hash, _, _)| hash.clone())
        .collect();
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), 16);
    Ok(())
}

#[tokio::test]
async fn test_rpc_client_over_gzip() -> Result<()> {
    let sender = StubSender::new(Reply::Fixed(
        "gzip",
        compress(br#"{"jsonrpc":"2.0","id":1,"result":"0xaa36a7"}"#),
    ));
    let config =
        ManagedConfig::new("us-east-1", StubProvider::default()).with_sender(sender.clone());
    let client: RpcClient = mbrpc::create_client(ENDPOINT, Some(config)).await?;

    assert_eq!(client.chain_id().await?, 11155111);

    let seen = sender.last();
    assert_eq!(seen.method(), Method::POST);
    assert!(seen.headers()[AUTHORIZATION]
        .to_str()?
        .starts_with("AWS4-HMAC-SHA256 Credential=access_key_id/"));
    Ok(())
}
