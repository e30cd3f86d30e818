use std::collections::HashMap;

use crate::codec;
use crate::db::FeatureRecord;
use crate::error::{Error, ErrorKind, Result};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// 预测的标签
    pub label: String,
    /// 训练集中与预测标签对应的最近一条记录的下标
    pub index: usize,
}

/// 分类器
pub trait Classifier: Send + Sync {
    fn classify(&self, query: &[u8], training: &[FeatureRecord], k: usize)
    -> Result<Classification>;
}

/// 基于欧氏距离的 k 近邻分类器
#[derive(Debug, Default, Clone, Copy)]
pub struct KnnClassifier;

/// 平方欧氏距离
pub fn distance_squared(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x.abs_diff(y) as u64;
            d * d
        })
        .sum()
}

impl Classifier for KnnClassifier {
    fn classify(
        &self,
        query: &[u8],
        training: &[FeatureRecord],
        k: usize,
    ) -> Result<Classification> {
        if k == 0 {
            return Err(Error::new(ErrorKind::BadFormat, "k must be positive"));
        }
        if training.is_empty() {
            return Err(Error::new(ErrorKind::NoTrainingData, "no training data available"));
        }

        let mut neighbors = Vec::with_capacity(training.len());
        for (index, record) in training.iter().enumerate() {
            let feature = codec::decode(&record.feature)?;
            if feature.len() != query.len() {
                return Err(Error::new(
                    ErrorKind::BadFormat,
                    format!(
                        "feature length mismatch: query has {} bytes, {} has {}",
                        query.len(),
                        record.id,
                        feature.len()
                    ),
                ));
            }
            neighbors.push((distance_squared(query, &feature), index));
        }
        // 稳定排序，距离相同时保持训练集顺序
        neighbors.sort_by_key(|&(distance, _)| distance);
        neighbors.truncate(k);

        // 标签 => (票数, 最近邻居的名次)
        let mut votes: HashMap<&str, (usize, usize)> = HashMap::new();
        for (rank, &(_, index)) in neighbors.iter().enumerate() {
            let Some(label) = training[index].label.as_deref() else {
                continue;
            };
            votes.entry(label).or_insert((0, rank)).0 += 1;
        }

        let (_, (_, rank)) = votes
            .into_iter()
            .max_by(|(_, (va, ra)), (_, (vb, rb))| va.cmp(vb).then(rb.cmp(ra)))
            .ok_or_else(|| Error::new(ErrorKind::NoTrainingData, "no labeled neighbors"))?;
        let index = neighbors[rank].1;
        let label = training[index].label.clone().unwrap_or_default();

        Ok(Classification { label, index })
    }
}
