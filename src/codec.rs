use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, ErrorKind, Result};

/// 将字节序列编码为 base64 文本
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// 将 base64 文本解码为字节序列
pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::new(ErrorKind::BadFormat, format!("invalid base64 feature: {e}")))
}

/// 特征向量的两种表示形式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureData {
    /// 已经过文本编码
    Encoded(String),
    /// 原始字节
    Raw(Vec<u8>),
}

/// 读取特征时希望得到的表示形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureEncoding {
    Encoded,
    Raw,
}

impl FeatureData {
    pub fn encoding(&self) -> FeatureEncoding {
        match self {
            Self::Encoded(_) => FeatureEncoding::Encoded,
            Self::Raw(_) => FeatureEncoding::Raw,
        }
    }

    /// 转换为文本编码形式
    pub fn into_encoded(self) -> String {
        match self {
            Self::Encoded(text) => text,
            Self::Raw(bytes) => encode(&bytes),
        }
    }

    /// 转换为原始字节
    pub fn into_raw(self) -> Result<Vec<u8>> {
        match self {
            Self::Encoded(text) => decode(&text),
            Self::Raw(bytes) => Ok(bytes),
        }
    }

    /// 按照指定形式转换
    pub fn convert(self, encoding: FeatureEncoding) -> Result<Self> {
        Ok(match encoding {
            FeatureEncoding::Encoded => Self::Encoded(self.into_encoded()),
            FeatureEncoding::Raw => Self::Raw(self.into_raw()?),
        })
    }
}
