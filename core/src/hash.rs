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

//! Hash related utils.

use crate::Error;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;

/// Base64 encode
pub fn base64_encode(content: &[u8]) -> String {
    BASE64_STANDARD.encode(content)
}

/// Base64 decode
pub fn base64_decode(content: &str) -> crate::Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(content.trim())
        .map_err(|e| Error::unexpected("base64 decode failed").with_source(e))
}

/// HMAC with SHA256 hash.
pub fn hmac_sha256(key: &[u8], content: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut h = Hmac::<Sha256>::new_from_slice(key).unwrap();
    h.update(content);

    h.finalize().into_bytes().to_vec()
}

/// Base64 encoded HMAC with SHA256 hash.
pub fn base64_hmac_sha256(key: &[u8], content: &[u8]) -> String {
    base64_encode(&hmac_sha256(key, content))
}

/// Base64 encoded MD5 digest.
///
/// This is the format the storage service expects in `Content-MD5` and
/// `x-ms-blob-content-md5`.
pub fn base64_md5(content: &[u8]) -> String {
    base64_encode(&md5::compute(content).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_md5() {
        assert_eq!(base64_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
        assert_eq!(base64_md5(b"hello world!"), "/D/5joxqDTCH1RXARz+Gdw==");
    }

    #[test]
    fn test_base64_hmac_sha256_matches_raw() {
        let key = b"key";
        let content = b"The quick brown fox jumps over the lazy dog";

        assert_eq!(
            base64_hmac_sha256(key, content),
            base64_encode(&hmac_sha256(key, content))
        );
        assert_eq!(
            base64_hmac_sha256(key, content),
            "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
    }

    #[test]
    fn test_base64_decode_trims_whitespace() {
        assert_eq!(base64_decode(" a2V5\n").unwrap(), b"key");
        assert!(base64_decode("not base64!").is_err());
    }
}
