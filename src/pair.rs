// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

/// A key and the LSM level it currently resides on, as yielded by `Iterator`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLevelPair {
    pub key: Vec<u8>,
    pub level: u32,
}

impl KeyLevelPair {
    pub fn new(key: Vec<u8>, level: u32) -> Self {
        Self { key, level }
    }
}

impl From<KeyLevelPair> for (Vec<u8>, u32) {
    fn from(pair: KeyLevelPair) -> Self {
        (pair.key, pair.level)
    }
}
