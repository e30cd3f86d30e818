use std::fmt;

/// 领域错误类型，集合是封闭的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 分配 ID 失败
    NameErr,
    /// 写入失败
    InsertError,
    /// 记录不存在
    NotFound,
    /// 清空时集合不存在
    InvalidCollection,
    /// 无法连接存储
    Connection,
    /// 未分类的内部错误
    Internal,
    /// 请求校验失败，对外的错误码同样是 `INTERNAL`
    Validation,
    /// 存储层的其他异常
    Db,
    /// 鉴权失败
    Auth,
    /// 分类器输入格式错误
    BadFormat,
    /// 训练集为空
    NoTrainingData,
}

impl ErrorKind {
    /// 对外暴露的错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameErr => "NAME_ERR",
            Self::InsertError => "INSERT_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidCollection => "INVALID_COLLECTION",
            Self::Connection => "CONNECTION",
            Self::Internal | Self::Validation => "INTERNAL",
            Self::Db => "DB",
            Self::Auth => "AUTH",
            Self::BadFormat => "BAD_FMT",
            Self::NoTrainingData => "NO_DATA",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 仓库、编解码器与分类器共用的错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn db(err: sqlx::Error) -> Self {
        Self::new(ErrorKind::Db, err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
