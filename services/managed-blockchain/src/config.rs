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

use ini::Ini;
use log::debug;
use mbrpc_core::{Context, Error, Result};
use std::io;

use crate::constants::*;
use crate::provide_credential::{
    DefaultCredentialProvider, EnvCredentialProvider, ProfileCredentialProvider,
    ProvideCredentialChain, StaticCredentialProvider,
};

/// Config for Managed Blockchain endpoints.
#[derive(Clone, Debug)]
pub struct Config {
    /// `config_file` will be load from:
    ///
    /// - env value: [`AWS_CONFIG_FILE`]
    /// - default to: `~/.aws/config`
    pub config_file: String,
    /// `shared_credentials_file` will be loaded from:
    ///
    /// - env value: [`AWS_SHARED_CREDENTIALS_FILE`]
    /// - default to: `~/.aws/credentials`
    pub shared_credentials_file: String,
    /// `profile` will be loaded from:
    ///
    /// - env value: [`AWS_PROFILE`]
    /// - default to: `default`
    pub profile: String,
    /// `region` will be loaded from:
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_REGION`], then [`AWS_DEFAULT_REGION`]
    /// - profile config: `region`
    pub region: Option<String>,
    /// Static access key id, takes precedence over every other source.
    pub access_key_id: Option<String>,
    /// Static secret access key, used together with `access_key_id`.
    pub secret_access_key: Option<String>,
    /// Static session token, used together with `access_key_id`.
    pub session_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: "~/.aws/config".to_string(),
            shared_credentials_file: "~/.aws/credentials".to_string(),
            profile: "default".to_string(),
            region: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }
}

impl Config {
    /// Load config from env.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        let envs = ctx.env_vars();

        if let Some(v) = envs.get(AWS_CONFIG_FILE) {
            self.config_file = v.to_string();
        }
        if let Some(v) = envs.get(AWS_SHARED_CREDENTIALS_FILE) {
            self.shared_credentials_file = v.to_string();
        }
        if let Some(v) = envs.get(AWS_PROFILE) {
            self.profile = v.to_string();
        }
        if self.region.is_none() {
            self.region = envs
                .get(AWS_REGION)
                .or_else(|| envs.get(AWS_DEFAULT_REGION))
                .filter(|v| !v.is_empty())
                .cloned();
        }

        self
    }

    /// Load config from the `config_file` profile section.
    ///
    /// Only fills fields that are still unset. A missing file is skipped since
    /// most hosts don't have one; a file that can't be read or parsed is an
    /// error.
    pub async fn from_profile(mut self, ctx: &Context) -> Result<Self> {
        if self.region.is_none() {
            self.region = self.load_profile_region(ctx).await?;
        }

        Ok(self)
    }

    async fn load_profile_region(&self, ctx: &Context) -> Result<Option<String>> {
        let Some(path) = ctx.expand_home_dir(&self.config_file) else {
            debug!("failed to expand homedir for path: {}", self.config_file);
            return Ok(None);
        };

        let content = match ctx.file_read_as_string(&path).await {
            Ok(content) => content,
            Err(err) if is_not_found(&err) => {
                debug!("config file {path} not found, skipping");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let conf = Ini::load_from_str(&content).map_err(|e| {
            Error::config_invalid(format!("failed to parse config file {path}")).with_source(e)
        })?;

        let section = match self.profile.as_str() {
            "default" => "default".to_string(),
            x => format!("profile {x}"),
        };

        Ok(conf
            .section(Some(section.as_str()))
            .and_then(|props| props.get("region"))
            .map(|v| v.to_string()))
    }

    /// Require a region, failing with a config error otherwise.
    pub fn region(&self) -> Result<&str> {
        self.region.as_deref().ok_or_else(|| {
            Error::config_invalid("region is required, set AWS_REGION or a profile region")
        })
    }

    /// Build the credential provider chain described by this config.
    ///
    /// Resolution order:
    ///
    /// 1. Static keys from this config
    /// 2. Environment variables
    /// 3. Shared profile files for `profile`
    pub fn credential_provider(&self) -> DefaultCredentialProvider {
        let mut chain = ProvideCredentialChain::new();

        if let (Some(ak), Some(sk)) = (&self.access_key_id, &self.secret_access_key) {
            let mut provider = StaticCredentialProvider::new(ak, sk);
            if let Some(token) = &self.session_token {
                provider = provider.with_session_token(token);
            }
            chain = chain.push(provider);
        }

        let chain = chain.push(EnvCredentialProvider::new()).push(
            ProfileCredentialProvider::new()
                .with_profile(&self.profile)
                .with_config_file(&self.config_file)
                .with_credentials_file(&self.shared_credentials_file),
        );

        DefaultCredentialProvider::with_chain(chain)
    }
}

fn is_not_found(err: &Error) -> bool {
    std::error::Error::source(err)
        .and_then(|e| e.downcast_ref::<io::Error>())
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}
