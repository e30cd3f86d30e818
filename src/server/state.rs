use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use super::snapshot::{SnapshotCell, TrainingSnapshot};
use crate::error::Result;
use crate::knn::{Classifier, KnnClassifier};
use crate::metrics;
use crate::repository::FeatureRepository;

/// 默认近邻数量
pub const DEFAULT_K: usize = 3;

/// 网关配置
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 路由前缀，如 `/knn`
    pub base: String,
    /// 默认近邻数量
    pub k: usize,
    /// 写操作的鉴权 token，为空则不鉴权
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { base: "/knn".to_string(), k: DEFAULT_K, token: None }
    }
}

impl GatewayConfig {
    /// 规范化后的路由前缀：以 `/` 开头、不以 `/` 结尾，根路径为空串
    pub fn normalized_base(&self) -> String {
        let base = self.base.trim().trim_matches('/');
        if base.is_empty() { String::new() } else { format!("/{base}") }
    }
}

/// 应用状态
pub struct AppState {
    /// 特征仓库
    pub repo: FeatureRepository,
    /// 分类器
    pub classifier: Arc<dyn Classifier>,
    /// 网关配置
    pub config: GatewayConfig,
    /// 训练集快照，只在启动和显式刷新时更新
    pub snapshot: SnapshotCell,
    /// 刷新时从读取训练集到替换快照的整个过程持有
    refresh_lock: Mutex<()>,
}

impl AppState {
    /// 创建应用状态，并从仓库中读取训练集快照
    pub async fn new(repo: FeatureRepository, config: GatewayConfig) -> Result<Arc<Self>> {
        Self::with_classifier(repo, config, Arc::new(KnnClassifier)).await
    }

    pub async fn with_classifier(
        repo: FeatureRepository,
        config: GatewayConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Arc<Self>> {
        let records = repo.list_labeled().await?;
        info!("训练集快照: {} 条", records.len());
        metrics::set_training_size(records.len());
        Ok(Arc::new(AppState {
            repo,
            classifier,
            config,
            snapshot: SnapshotCell::new(records),
            refresh_lock: Mutex::new(()),
        }))
    }

    /// 重新读取训练集并替换快照
    pub async fn refresh(&self) -> Result<Arc<TrainingSnapshot>> {
        let _guard = self.refresh_lock.lock().await;
        let records = self.repo.list_labeled().await?;
        let snapshot = self.snapshot.replace(records).await;
        metrics::set_training_size(snapshot.len());
        info!("训练集快照已刷新: 版本 {}，{} 条", snapshot.version, snapshot.len());
        Ok(snapshot)
    }
}
