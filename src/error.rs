// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
use thiserror::Error;

/// Construction-time failures reported by the public API.
///
/// Steady-state `Storage`/`ShardedStorage` operations never fail: absent
/// keys and empty keys are silent no-ops (see the crate's module docs), and
/// a corrupted BDD runtime is a bug, reported via panic rather than this
/// type. `Error` only covers mistakes a caller can make before a `Storage`
/// exists.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "key_byte_len {key_byte_len} would need {needed} ZDD variables, which overflows the variable id space"
    )]
    VariableSpaceExhausted { key_byte_len: u32, needed: u64 },
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Error::VariableSpaceExhausted { key_byte_len: a, needed: b },
                Error::VariableSpaceExhausted { key_byte_len: c, needed: d },
            ) => a == c && b == d,
        }
    }
}
