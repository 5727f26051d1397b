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

//! Amazon Managed Blockchain request signing.
//!
//! This crate signs JSON-RPC requests bound for Managed Blockchain Ethereum
//! endpoints with AWS Signature Version 4 over the `managedblockchain` service.
//!
//! ```no_run
//! use mbrpc_core::{Context, OsEnv, ProvideCredential};
//! use mbrpc_file_read_tokio::TokioFileRead;
//! use mbrpc_managed_blockchain::Config;
//!
//! # async fn example() -> mbrpc_core::Result<()> {
//! let ctx = Context::new().with_file_read(TokioFileRead).with_env(OsEnv);
//! let config = Config::default().from_env(&ctx).from_profile(&ctx).await?;
//! let provider = config.credential_provider();
//! let credential = provider.provide_credential(&ctx).await?;
//! println!("region: {}, found credential: {}", config.region()?, credential.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod constants;
pub use constants::{SERVICE_NAME, X_AMZ_CONTENT_SHA_256};

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod sign_request;
pub use sign_request::RequestSigner;

mod provide_credential;
pub use provide_credential::*;
