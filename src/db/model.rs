use serde::Serialize;

/// 特征记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeatureRecord {
    /// 记录 ID，格式为 `<前缀>_<序号>`
    pub id: String,
    /// base64 编码后的特征向量
    pub feature: String,
    /// 标签，只有训练数据才有
    pub label: Option<String>,
}

impl FeatureRecord {
    /// 是否为训练数据
    pub fn is_training(&self) -> bool {
        self.label.is_some()
    }
}
