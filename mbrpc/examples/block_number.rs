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

//! Print chain id and latest block of a JSON-RPC endpoint.
//!
//! ```shell
//! AWS_REGION=us-east-1 cargo run --example block_number -- \
//!     https://nd-xxx.ethereum.managedblockchain.us-east-1.amazonaws.com
//! ```
//!
//! Credentials are taken from the usual AWS environment variables or the
//! shared config files. Non managed endpoints are called without signing.

use anyhow::{anyhow, Result};
use mbrpc::create_client;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let endpoint = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: block_number <endpoint>"))?;

    let client = create_client(&endpoint, None).await?;
    println!("provider: {}", client.provider());
    println!("chain id: {}", client.chain_id().await?);
    println!("block:    {}", client.block_number().await?);

    Ok(())
}
