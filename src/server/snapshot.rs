use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::FeatureRecord;

/// 训练集快照，创建后只读
#[derive(Debug)]
pub struct TrainingSnapshot {
    pub version: u64,
    pub records: Vec<FeatureRecord>,
}

impl TrainingSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 可整体替换的快照引用
///
/// 读取方拿到的是某一版本的 `Arc`，替换不会影响正在使用旧版本的请求
pub struct SnapshotCell {
    current: RwLock<Arc<TrainingSnapshot>>,
}

impl SnapshotCell {
    pub fn new(records: Vec<FeatureRecord>) -> Self {
        Self { current: RwLock::new(Arc::new(TrainingSnapshot { version: 1, records })) }
    }

    pub async fn current(&self) -> Arc<TrainingSnapshot> {
        self.current.read().await.clone()
    }

    /// 用新的训练集替换当前快照，返回新快照
    pub async fn replace(&self, records: Vec<FeatureRecord>) -> Arc<TrainingSnapshot> {
        let mut lock = self.current.write().await;
        let snapshot = Arc::new(TrainingSnapshot { version: lock.version + 1, records });
        *lock = snapshot.clone();
        snapshot
    }
}
