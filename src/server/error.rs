use std::any::Any;

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::OriginalUri;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use log::error;

use super::types::{ErrorEntry, ErrorOptions, ErrorResponse};
use crate::error::{Error, ErrorKind};

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// 错误类型到 HTTP 状态码的映射，未列出的类型一律为 400
pub fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Db | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// 多个错误时取第一个错误的状态码，但 500 优先
pub fn http_status(errors: &[Error]) -> StatusCode {
    let mut status = None;
    for err in errors {
        let err_status = status_of(err.kind);
        if status.is_none() || err_status == StatusCode::INTERNAL_SERVER_ERROR {
            status = Some(err_status);
        }
    }
    status.unwrap_or(StatusCode::BAD_REQUEST)
}

/// API 错误类型
#[derive(Debug)]
pub struct AppError(pub Vec<Error>);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(vec![err])
    }
}

impl From<Vec<Error>> for AppError {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        http_status(&self.0)
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status().as_u16(),
            errors: self
                .0
                .iter()
                .map(|err| ErrorEntry {
                    message: err.message.clone(),
                    options: Some(ErrorOptions { code: err.kind.code().to_string() }),
                })
                .collect(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("服务端错误: {:?}", self.0);
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// 没有匹配路由时的响应
pub async fn not_found_handler(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    Error::not_found(format!("{method} not supported for {uri}")).into()
}

/// handler 发生 panic 时的响应，详细信息只记录在服务端
pub fn panic_handler(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    error!("handler panic: {detail}");
    AppError::from(Error::internal("Internal Server Error")).into_response()
}

/// 非 JSON 的错误响应中保留的最大正文长度
const PLAIN_ERROR_LIMIT: usize = 64 * 1024;

/// 纯文本错误响应使用的错误类型
fn kind_of_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::UNAUTHORIZED => ErrorKind::Auth,
        s if s.is_server_error() => ErrorKind::Internal,
        _ => ErrorKind::BadFormat,
    }
}

/// 将框架或中间件产生的纯文本错误改写为统一的错误结构，状态码保持不变
pub async fn structured_error(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let message = match to_bytes(body, PLAIN_ERROR_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("Unknown Error").to_string()
    } else {
        message
    };
    let body = ErrorResponse {
        status: status.as_u16(),
        errors: vec![ErrorEntry {
            message,
            options: Some(ErrorOptions { code: kind_of_status(status).code().to_string() }),
        }],
    };

    parts.headers.remove(CONTENT_TYPE);
    parts.headers.remove(CONTENT_LENGTH);
    let mut response = Json(body).into_response();
    response.headers_mut().extend(parts.headers);
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ErrorKind::NotFound, 404)]
    #[case(ErrorKind::Auth, 401)]
    #[case(ErrorKind::Db, 500)]
    #[case(ErrorKind::Internal, 500)]
    #[case(ErrorKind::Validation, 400)]
    #[case(ErrorKind::NameErr, 400)]
    #[case(ErrorKind::InsertError, 400)]
    #[case(ErrorKind::InvalidCollection, 400)]
    #[case(ErrorKind::Connection, 400)]
    #[case(ErrorKind::BadFormat, 400)]
    #[case(ErrorKind::NoTrainingData, 400)]
    fn kind_to_status(#[case] kind: ErrorKind, #[case] status: u16) {
        assert_eq!(status_of(kind).as_u16(), status);
    }

    #[test]
    fn first_status_wins() {
        let errors =
            vec![Error::not_found("a"), Error::new(ErrorKind::Auth, "b"), Error::validation("c")];
        assert_eq!(http_status(&errors), StatusCode::NOT_FOUND);
    }

    #[test]
    fn server_error_dominates() {
        let errors = vec![Error::validation("a"), Error::not_found("b"), Error::internal("c")];
        assert_eq!(http_status(&errors), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_is_bad_request() {
        assert_eq!(http_status(&[]), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn panic_detail_stays_on_server() {
        let response = panic_handler(Box::new("db password=hunter2"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["message"], "Internal Server Error");
        assert_eq!(json["errors"][0]["options"]["code"], "INTERNAL");
        assert!(!String::from_utf8_lossy(&body).contains("hunter2"));
    }

    #[tokio::test]
    async fn plain_text_error_is_rewritten() {
        let response = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let response = structured_error(response).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 413,
                "errors": [{ "message": "length limit exceeded", "options": { "code": "BAD_FMT" } }],
            })
        );
    }

    #[tokio::test]
    async fn success_and_json_errors_pass_through() {
        let ok = structured_error((StatusCode::OK, "fine").into_response()).await;
        let body = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"fine");

        let err = structured_error(AppError::from(Error::not_found("No Data Found")).into_response()).await;
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(err.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["message"], "No Data Found");
    }

    #[test]
    fn body_shape() {
        let body = AppError(vec![Error::not_found("No Data Found")]).to_body();
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 404,
                "errors": [{ "message": "No Data Found", "options": { "code": "NOT_FOUND" } }],
            })
        );
    }
}
