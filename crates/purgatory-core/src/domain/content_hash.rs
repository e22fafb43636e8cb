//! ContentHash - 外部ストア上のペイロードを指すキー
//!
//! 40 桁の 16 進（SHA-1）だけを受け付け、小文字に正規化して保持します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SHA-1 を 16 進で表したときの文字数
pub const CONTENT_HASH_LEN: usize = 40;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContentHashError {
    #[error("content hash must be {CONTENT_HASH_LEN} hex characters, got {0}")]
    Length(usize),

    #[error("content hash contains non-hex character {0:?}")]
    NonHex(char),
}

/// ファイル本体の content-addressed キー。
///
/// 同じペイロードが 1 つのキーになるよう常に小文字で持つ
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub fn parse(s: &str) -> Result<Self, ContentHashError> {
        let s = s.trim();
        if s.len() != CONTENT_HASH_LEN {
            return Err(ContentHashError::Length(s.len()));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ContentHashError::NonHex(c));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// オブジェクト配置の 2 段 fan-out（`ab/cd`）
    pub fn fan_out(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ContentHash {
    type Err = ContentHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ContentHashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
