use std::path::PathBuf;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::codec::{FeatureData, FeatureEncoding};
use crate::db::{self, Database, FeatureRecord, crud};
use crate::error::{Error, ErrorKind, Result};

/// 默认的 ID 前缀
pub const DEFAULT_ID_PREFIX: &str = "tiHs_K3Y";

/// ID 分配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdAllocation {
    /// 读取当前记录数量再加一，读取与写入之间不加锁
    ///
    /// 并发添加时两个请求可能拿到同一个 ID，后写入的一方会以 `INSERT_ERROR` 失败
    #[default]
    EstimatedCount,
    /// 由仓库持有的自增序列，首次使用时以记录数量为起点
    Sequence,
}

/// 按 ID 读取到的特征
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFeature {
    pub features: FeatureData,
    pub label: Option<String>,
}

pub struct FeatureRepositoryBuilder {
    path: PathBuf,
    prefix: String,
    ids: IdAllocation,
    wal: bool,
}

impl FeatureRepositoryBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prefix: DEFAULT_ID_PREFIX.to_string(),
            ids: IdAllocation::default(),
            wal: true,
        }
    }

    /// 设置 ID 前缀
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// 设置 ID 分配策略
    pub fn id_allocation(mut self, ids: IdAllocation) -> Self {
        self.ids = ids;
        self
    }

    /// 是否启用 WAL 模式
    pub fn wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub async fn open(self) -> Result<FeatureRepository> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::new(ErrorKind::Connection, e.to_string()))?;
        }
        let db = db::init_db(&self.path, self.wal)
            .await
            .map_err(|e| Error::new(ErrorKind::Connection, e.to_string()))?;
        Ok(FeatureRepository { db, prefix: self.prefix, ids: self.ids, sequence: Mutex::new(None) })
    }
}

/// 特征仓库
pub struct FeatureRepository {
    db: Database,
    prefix: String,
    ids: IdAllocation,
    /// `IdAllocation::Sequence` 模式下最后一次分配的序号
    sequence: Mutex<Option<u64>>,
}

impl FeatureRepository {
    pub fn builder(path: impl Into<PathBuf>) -> FeatureRepositoryBuilder {
        FeatureRepositoryBuilder::new(path)
    }

    pub fn id_allocation(&self) -> IdAllocation {
        self.ids
    }

    /// 当前记录数量
    pub async fn count(&self) -> Result<u64> {
        let count = crud::count_features(&self.db).await.map_err(Error::db)?;
        Ok(count as u64)
    }

    /// 分配一个新的 ID，但不写入任何记录
    pub async fn allocate_id(&self) -> Result<String> {
        let n = match self.ids {
            IdAllocation::EstimatedCount => self.count_for_id().await?,
            IdAllocation::Sequence => {
                let mut sequence = self.sequence.lock().await;
                let last = match *sequence {
                    Some(last) => last,
                    None => self.count_for_id().await?,
                };
                *sequence = Some(last + 1);
                last
            }
        };
        Ok(format!("{}_{}", self.prefix, n + 1))
    }

    async fn count_for_id(&self) -> Result<u64> {
        self.count().await.map_err(|e| Error::new(ErrorKind::NameErr, e.message))
    }

    /// 添加一条特征记录，返回新分配的 ID
    ///
    /// 原始字节会先编码为文本再保存，已编码的文本原样保存
    pub async fn add(&self, feature: FeatureData, label: Option<String>) -> Result<String> {
        let id = self.allocate_id().await?;
        let record = FeatureRecord { id, feature: feature.into_encoded(), label };
        self.insert(&record).await?;
        Ok(record.id)
    }

    /// 写入一条已分配 ID 的记录
    pub async fn insert(&self, record: &FeatureRecord) -> Result<()> {
        let insert_error = |e: sqlx::Error| Error::new(ErrorKind::InsertError, e.to_string());
        crud::create_collection(&self.db).await.map_err(insert_error)?;
        crud::add_feature(&self.db, record).await.map_err(insert_error)?;
        debug!("写入特征 {}", record.id);
        Ok(())
    }

    /// 按 ID 读取特征
    pub async fn get(&self, id: &str, encoding: FeatureEncoding) -> Result<StoredFeature> {
        let record = match crud::collection_exists(&self.db).await.map_err(Error::db)? {
            true => crud::get_feature(&self.db, id).await.map_err(Error::db)?,
            false => None,
        };
        let record = record.ok_or_else(|| Error::not_found("No Data Found"))?;
        let features = FeatureData::Encoded(record.feature).convert(encoding)?;
        Ok(StoredFeature { features, label: record.label })
    }

    /// 获取所有训练数据
    pub async fn list_labeled(&self) -> Result<Vec<FeatureRecord>> {
        if !crud::collection_exists(&self.db).await.map_err(Error::db)? {
            return Ok(vec![]);
        }
        crud::get_labeled_features(&self.db).await.map_err(Error::db)
    }

    /// 删除所有记录
    pub async fn clear(&self) -> Result<String> {
        if !crud::collection_exists(&self.db).await.map_err(Error::db)? {
            return Err(Error::new(
                ErrorKind::InvalidCollection,
                "No collection found named features",
            ));
        }
        let deleted = crud::delete_features_all(&self.db).await.map_err(Error::db)?;
        info!("已删除 {} 条特征记录", deleted);
        Ok("Data has been cleared.".to_string())
    }

    /// 关闭数据库连接，可重复调用
    pub async fn close(&self) {
        self.db.close().await;
    }
}
