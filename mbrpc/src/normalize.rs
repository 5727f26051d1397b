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

//! Unwrapping of base64 wrapped gzip responses.
//!
//! Managed Blockchain may answer with the literal header `Content-Type: gzip`
//! and a body that is base64 text over a gzip stream. Only that exact header
//! value is recognised; `application/gzip` and parameterised variants pass
//! through untouched.

use base64::engine::general_purpose::STANDARD;
use base64::engine::GeneralPurpose;
use base64::read::DecoderReader;
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use log::debug;
use mbrpc_core::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::io::{self, Cursor, Read};

/// Content type that marks a base64 wrapped gzip body.
pub const COMPRESSED_CONTENT_TYPE: &str = "gzip";

type GzipOverBase64 =
    MultiGzDecoder<DecoderReader<'static, GeneralPurpose, SkipLineBreaks<Cursor<Bytes>>>>;

/// Drops `\r` and `\n` so line wrapped base64 can be decoded.
pub struct SkipLineBreaks<R>(R);

impl<R: Read> Read for SkipLineBreaks<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.0.read(buf)?;
            if n == 0 {
                return Ok(0);
            }

            let mut kept = 0;
            for i in 0..n {
                if buf[i] != b'\r' && buf[i] != b'\n' {
                    buf[kept] = buf[i];
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Body of a response returned by an [`RpcTransport`](crate::RpcTransport).
///
/// Reading a `Decoded` body decompresses on demand. Dropping the body
/// releases the decoder.
pub enum ResponseBody {
    /// Bytes exactly as received.
    Plain(Cursor<Bytes>),
    /// Lazily decoded base64 + gzip stream.
    Decoded(Box<GzipOverBase64>),
}

impl ResponseBody {
    /// Wrap raw bytes without any decoding.
    pub fn plain(bs: Bytes) -> Self {
        ResponseBody::Plain(Cursor::new(bs))
    }

    /// Build a decoding reader over a base64 wrapped gzip payload.
    ///
    /// Line breaks in the base64 text are ignored and concatenated gzip
    /// members are read back to back. The first gzip header is checked here;
    /// the rest of the stream is only decompressed as it is read.
    pub fn decode(bs: Bytes) -> Result<Self> {
        let decoder = MultiGzDecoder::new(DecoderReader::new(
            SkipLineBreaks(Cursor::new(bs)),
            &STANDARD,
        ));
        if decoder.header().is_none() {
            return Err(Error::decode_failed(
                "failed to decode gzip content-type response: invalid base64 or gzip header",
            ));
        }

        Ok(ResponseBody::Decoded(Box::new(decoder)))
    }

    /// Returns true if the body is being decoded.
    pub fn is_decoded(&self) -> bool {
        matches!(self, ResponseBody::Decoded(_))
    }

    /// Read the remaining body into memory.
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            ResponseBody::Plain(cursor) => {
                let pos = cursor.position() as usize;
                let bs = cursor.into_inner();
                Ok(bs.slice(pos.min(bs.len())..))
            }
            ResponseBody::Decoded(mut decoder) => {
                let mut buf = Vec::new();
                decoder.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ResponseBody::Plain(cursor) => cursor.read(buf),
            ResponseBody::Decoded(decoder) => decoder.read(buf),
        }
    }
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Plain(cursor) => f
                .debug_struct("Plain")
                .field("len", &cursor.get_ref().len())
                .finish(),
            ResponseBody::Decoded(_) => f.write_str("Decoded"),
        }
    }
}

/// Returns true if `Content-Type` is exactly `gzip`.
pub fn is_compressed(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes() == COMPRESSED_CONTENT_TYPE.as_bytes())
}

/// Replace a compressed response body with its decoding reader.
///
/// Responses without the exact `gzip` marker are passed through as
/// [`ResponseBody::Plain`]. Status and headers are never changed.
pub fn normalize_response(resp: http::Response<Bytes>) -> Result<http::Response<ResponseBody>> {
    let (parts, body) = resp.into_parts();

    let body = if is_compressed(&parts.headers) {
        debug!("decoding compressed response of {} bytes", body.len());
        ResponseBody::decode(body)?
    } else {
        ResponseBody::plain(body)
    };

    Ok(http::Response::from_parts(parts, body))
}
