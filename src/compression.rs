// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
use std::borrow::Cow;

use md5::{Digest as Md5Digest, Md5};
use sha2::{Digest as Sha2Digest, Sha256};

const ZSTD_LEVEL: i32 = 6;

/// Reduces a user key to a fixed-length byte image before it is bit-encoded
/// into the ZDD. Modeled as a tagged enum rather than a trait object: there
/// are exactly four variants and dispatch is cold relative to the ZDD work
/// it feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Md5,
    Sha256,
    Zstd,
}

impl Compression {
    /// Compresses `bytes`. Borrows when no transformation is needed.
    pub fn compress<'a>(&self, bytes: &'a [u8]) -> Cow<'a, [u8]> {
        match self {
            Compression::None => Cow::Borrowed(bytes),
            Compression::Md5 => Cow::Owned(Md5::digest(bytes).to_vec()),
            Compression::Sha256 => Cow::Owned(Sha256::digest(bytes).to_vec()),
            Compression::Zstd => Cow::Owned(
                zstd::stream::encode_all(bytes, ZSTD_LEVEL)
                    .expect("zstd compression of an in-memory buffer cannot fail"),
            ),
        }
    }

    /// Upper bound on the compressed length of an `input_len`-byte key,
    /// used to size the ZDD's key-bit variable range.
    pub fn compressed_len(&self, input_len: usize) -> usize {
        match self {
            Compression::None => input_len,
            Compression::Md5 => 16,
            Compression::Sha256 => 32,
            // Mirrors ZSTD_COMPRESSBOUND's shape without pulling in zstd-safe
            // for a single constant: worst case is the input plus a small
            // fixed frame overhead.
            Compression::Zstd => input_len + (input_len >> 8) + 64,
        }
    }
}
