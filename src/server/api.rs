use std::panic::resume_unwind;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum_auth::AuthBearer;
use log::debug;
use tokio::task::spawn_blocking;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::codec::{self, FeatureData, FeatureEncoding};
use crate::error::{Error, ErrorKind};
use crate::metrics;

type Bearer = std::result::Result<
    AuthBearer,
    <AuthBearer as FromRequestParts<Arc<AppState>>>::Rejection,
>;
type IdPath = std::result::Result<Path<String>, PathRejection>;
type LabelParams = std::result::Result<Query<LabelQuery>, QueryRejection>;

/// 取出路径中的 ID，提取失败或为空时返回校验错误
fn path_id(path: IdPath) -> crate::Result<String> {
    match path {
        Ok(Path(id)) if !id.trim().is_empty() => Ok(id),
        Ok(_) => Err(Error::validation("Invalid Request: empty id")),
        Err(e) => Err(Error::validation(format!("Invalid Request: {}", e.body_text()))),
    }
}

/// 解析查询参数中的 k，不填时使用默认值
fn query_k(query: LabelParams, default: usize) -> crate::Result<usize> {
    let Query(query) =
        query.map_err(|e| Error::validation(format!("Invalid Request: {}", e.body_text())))?;
    match query.k.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(k) => match k.parse::<usize>() {
            Ok(k) if k > 0 => Ok(k),
            _ => Err(Error::validation(format!("Invalid Request: bad k `{k}`"))),
        },
    }
}

/// 配置了 token 时校验请求携带的 token
fn check_token(state: &AppState, auth: &Bearer) -> crate::Result<()> {
    let Some(expected) = state.config.token.as_deref() else {
        return Ok(());
    };
    match auth {
        Ok(AuthBearer(token)) if token == expected => Ok(()),
        Ok(_) => Err(Error::new(ErrorKind::Auth, "invalid token")),
        Err(_) => Err(Error::new(ErrorKind::Auth, "missing bearer token")),
    }
}

/// 从请求体中取出 base64 编码的特征，支持纯文本与 JSON 字符串两种形式
fn parse_feature_body(headers: &HeaderMap, body: &[u8]) -> crate::Result<String> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let text = if is_json {
        serde_json::from_slice::<String>(body)
            .map_err(|e| Error::validation(format!("Invalid Request: {e}")))?
    } else {
        String::from_utf8(body.to_vec())
            .map_err(|e| Error::validation(format!("Invalid Request: {e}")))?
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(Error::validation("Invalid Request: empty feature"));
    }
    codec::decode(text).map_err(|e| Error::validation(e.message))?;
    Ok(text.to_string())
}

/// 提交一个未标注的特征向量
#[utoipa::path(
    post,
    path = "/images",
    request_body(content = String, content_type = "text/plain"),
    responses(
        (status = 200, body = AddFeatureResponse),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse),
    )
)]
pub async fn add_feature_handler(
    State(state): State<Arc<AppState>>,
    auth: Bearer,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AddFeatureResponse>> {
    check_token(&state, &auth)?;
    let feature = parse_feature_body(&headers, &body)?;
    let id = state.repo.add(FeatureData::Encoded(feature), None).await?;
    debug!("新增特征 {id}");
    Ok(Json(AddFeatureResponse { id }))
}

/// 读取一个特征
#[utoipa::path(
    get,
    path = "/images/{id}",
    params(("id" = String, Path, description = "特征 ID")),
    responses(
        (status = 200, body = FeatureResponse),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn get_feature_handler(
    State(state): State<Arc<AppState>>,
    path: IdPath,
) -> Result<Json<FeatureResponse>> {
    let id = path_id(path)?;
    let stored = state.repo.get(&id, FeatureEncoding::Encoded).await?;
    Ok(Json(FeatureResponse { features: stored.features.into_encoded(), label: stored.label }))
}

/// 对已提交的特征进行分类
#[utoipa::path(
    get,
    path = "/labels/{id}",
    params(("id" = String, Path, description = "待分类的特征 ID"), LabelQuery),
    responses(
        (status = 200, body = LabelResponse),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn label_handler(
    State(state): State<Arc<AppState>>,
    path: IdPath,
    query: LabelParams,
) -> Result<Json<LabelResponse>> {
    let (id, k) = match (path_id(path), query_k(query, state.config.k)) {
        (Ok(id), Ok(k)) => (id, k),
        (id, k) => return Err(id.err().into_iter().chain(k.err()).collect::<Vec<_>>().into()),
    };

    let stored = state.repo.get(&id, FeatureEncoding::Raw).await?;
    let query = stored.features.into_raw()?;
    let snapshot = state.snapshot.current().await;

    let start = Instant::now();
    let classification = spawn_blocking({
        let classifier = state.classifier.clone();
        let snapshot = snapshot.clone();
        move || classifier.classify(&query, &snapshot.records, k)
    })
    .await
    .map_err(|e| match e.try_into_panic() {
        // 交给外层的 panic 处理
        Ok(panic) => resume_unwind(panic),
        Err(e) => Error::internal(e.to_string()),
    })??;
    metrics::observe_classify_duration(start.elapsed().as_secs_f64());

    let matched = snapshot
        .records
        .get(classification.index)
        .ok_or_else(|| Error::internal("classifier returned an index outside the training set"))?;
    debug!("{id} => {} ({})", classification.label, matched.id);

    Ok(Json(LabelResponse { id: matched.id.clone(), label: classification.label }))
}

/// 重新读取训练集快照
#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, body = RefreshResponse),
        (status = 401, body = ErrorResponse),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    auth: Bearer,
) -> Result<Json<RefreshResponse>> {
    check_token(&state, &auth)?;
    let snapshot = state.refresh().await?;
    Ok(Json(RefreshResponse { version: snapshot.version, count: snapshot.len() }))
}
