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

use bytes::Bytes;
use std::fmt::Debug;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::sync::Arc;

/// ReplayBody is a body source that can hand out a fresh reader every time.
///
/// Signing reads the body once to hash it and once more to send it, so a
/// source must return independent readers that all yield the same bytes.
pub trait ReplayBody: Debug + Send + Sync + 'static {
    /// Open a new reader positioned at the start of the body.
    fn replay(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Body of an outbound request.
///
/// Cloning a `Body` never copies payload bytes.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// In-memory body.
    Bytes(Bytes),
    /// Body backed by a replayable source.
    Replay(Arc<dyn ReplayBody>),
}

impl Body {
    /// Build a body from a replayable source.
    pub fn replayable(source: impl ReplayBody) -> Self {
        Body::Replay(Arc::new(source))
    }

    /// Returns true if the request carries no body.
    pub fn is_none(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Open an independent reader over the body.
    ///
    /// Returns `Ok(None)` for [`Body::Empty`]. The body itself is left untouched
    /// and can be replayed again afterwards.
    pub fn replay(&self) -> io::Result<Option<Box<dyn Read + Send>>> {
        match self {
            Body::Empty => Ok(None),
            Body::Bytes(bs) => Ok(Some(Box::new(Cursor::new(bs.clone())))),
            Body::Replay(source) => source.replay().map(Some),
        }
    }

    /// Read a full copy of the body into memory.
    pub fn to_bytes(&self) -> io::Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(bs) => Ok(bs.clone()),
            Body::Replay(source) => {
                let mut buf = Vec::new();
                source.replay()?.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl From<Bytes> for Body {
    fn from(bs: Bytes) -> Self {
        Body::Bytes(bs)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bs: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bs))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(Bytes::from(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Broken;

    impl ReplayBody for Broken {
        fn replay(&self) -> io::Result<Box<dyn Read + Send>> {
            Err(io::Error::new(io::ErrorKind::Other, "source closed"))
        }
    }

    #[test]
    fn test_replay_does_not_consume() -> anyhow::Result<()> {
        let body = Body::from("hello");

        let mut first = String::new();
        body.replay()?.expect("body present").read_to_string(&mut first)?;
        let mut second = String::new();
        body.replay()?.expect("body present").read_to_string(&mut second)?;

        assert_eq!(first, "hello");
        assert_eq!(first, second);
        assert_eq!(body.to_bytes()?, Bytes::from_static(b"hello"));
        Ok(())
    }

    #[test]
    fn test_empty_body() -> anyhow::Result<()> {
        let body = Body::from(());
        assert!(body.is_none());
        assert!(body.replay()?.is_none());
        assert!(body.to_bytes()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_broken_replay() {
        let body = Body::replayable(Broken);
        assert!(body.replay().is_err());
        assert!(body.to_bytes().is_err());
    }
}
