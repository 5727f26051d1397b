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

use mbrpc_core::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Marker that identifies a Managed Blockchain Ethereum endpoint.
pub const MANAGED_ENDPOINT_MARKER: &str = "ethereum.managedblockchain";

/// Kind of JSON-RPC endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Managed Blockchain endpoint, every request must be SigV4 signed.
    Managed,
    /// Any other JSON-RPC endpoint.
    Regular,
}

impl Provider {
    /// Tag used in logs and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Managed => "aws",
            Provider::Regular => "regular",
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Provider::Managed),
            "regular" => Ok(Provider::Regular),
            v => Err(Error::config_invalid(format!("unknown provider: {v}"))),
        }
    }
}

/// Classify an endpoint URL.
///
/// Any URL containing [`MANAGED_ENDPOINT_MARKER`], ignoring case, is
/// [`Provider::Managed`].
pub fn classify(url: &str) -> Provider {
    if url.to_lowercase().contains(MANAGED_ENDPOINT_MARKER) {
        Provider::Managed
    } else {
        Provider::Regular
    }
}
