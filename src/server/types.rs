use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// 提交特征后的响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddFeatureResponse {
    /// 新分配的特征 ID
    pub id: String,
}

/// 读取特征的响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeatureResponse {
    /// base64 编码的特征向量
    pub features: String,
    /// 标签，未标注的特征为 null
    pub label: Option<String>,
}

/// 分类请求的查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LabelQuery {
    /// 近邻数量，不填则使用服务端默认值
    pub k: Option<String>,
}

/// 分类结果
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LabelResponse {
    /// 最近的训练样本 ID
    pub id: String,
    /// 预测的标签
    pub label: String,
}

/// 刷新训练集快照后的响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    /// 快照版本号
    pub version: u64,
    /// 训练样本数量
    pub count: usize,
}

/// 错误码
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorOptions {
    pub code: String,
}

/// 单个错误
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEntry {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ErrorOptions>,
}

/// 所有非 2xx 响应的结构
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: u16,
    pub errors: Vec<ErrorEntry>,
}
