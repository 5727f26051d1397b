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

//! Signed JSON-RPC transport for AWS Managed Blockchain Ethereum endpoints.
//!
//! Managed Blockchain only accepts requests signed with AWS Signature Version 4
//! and may reply with a base64 wrapped gzip body tagged `Content-Type: gzip`.
//! This crate provides a [`SigningTransport`] that takes care of both, and an
//! [`RpcClient`] that speaks JSON-RPC 2.0 over it.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> mbrpc::Result<()> {
//! let client = mbrpc::create_client(
//!     "https://nd-xxx.ethereum.managedblockchain.us-east-1.amazonaws.com",
//!     None,
//! )
//! .await?;
//!
//! let block = client.block_number().await?;
//! println!("latest block: {block}");
//! # Ok(())
//! # }
//! ```
//!
//! Regular endpoints go through the same entry point and are called without
//! signing.

#![warn(missing_docs)]

pub use mbrpc_core::*;

/// Managed Blockchain credentials, config and SigV4 signer.
pub mod managed_blockchain {
    pub use mbrpc_managed_blockchain::*;
}

mod hasher;
pub use hasher::{BodyHasher, DEFAULT_MAX_HASHED_BODY_SIZE};

mod normalize;
pub use normalize::{is_compressed, normalize_response, ResponseBody, COMPRESSED_CONTENT_TYPE};

mod classify;
pub use classify::{classify, Provider, MANAGED_ENDPOINT_MARKER};

mod transport;
pub use transport::{
    clone_request, set_request_content_type, DirectTransport, RpcTransport, SigningTransport,
};

mod client;
pub use client::{parse_quantity, RpcClient};

mod factory;
pub use factory::{
    create_client, create_managed_client, create_managed_client_from_config,
    create_managed_client_with_context, create_regular_client, ManagedConfig,
};
