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

//! Content hashing for request bodies.

use log::debug;
use mbrpc_core::hash::hex_sha256;
use mbrpc_core::{Body, Error, Result};
use std::io::Read;

/// Default ceiling on the number of body bytes fed into the content hash.
///
/// Bodies longer than this are hashed over their first
/// `DEFAULT_MAX_HASHED_BODY_SIZE` bytes only.
pub const DEFAULT_MAX_HASHED_BODY_SIZE: usize = 1 << 20;

/// BodyHasher computes the SHA-256 content hash used as a SigV4 input.
///
/// The hash is taken over an independent replay of the body, so the request
/// stays sendable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct BodyHasher {
    limit: usize,
}

impl Default for BodyHasher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HASHED_BODY_SIZE)
    }
}

impl BodyHasher {
    /// Create a hasher that reads at most `limit` bytes of the body.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// The configured hash ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Return the lowercase hex SHA-256 of the request body.
    ///
    /// A request without a body hashes like an empty one.
    pub fn hash(&self, req: &http::Request<Body>) -> Result<String> {
        let reader = req.body().replay().map_err(|e| {
            Error::body_read("failed to obtain a copy of the request body").with_source(e)
        })?;

        let Some(reader) = reader else {
            return Ok(hex_sha256(b""));
        };

        let mut buf = Vec::new();
        reader
            .take(self.limit as u64)
            .read_to_end(&mut buf)
            .map_err(|e| Error::body_read("failed to read the request body").with_source(e))?;

        debug!("hashed {} bytes of request body", buf.len());
        Ok(hex_sha256(&buf))
    }
}
