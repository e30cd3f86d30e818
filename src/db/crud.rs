use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::FeatureRecord;

/// 检查特征表是否存在
pub async fn collection_exists(executor: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'features'
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// 创建特征表
pub async fn create_collection<'c, E>(executor: E) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS features (
            id      TEXT PRIMARY KEY NOT NULL,
            feature TEXT NOT NULL,
            label   TEXT
        )
        "#,
    )
    .execute(executor)
    .await?;

    Ok(())
}

/// 统计特征数量，表不存在时视为 0
pub async fn count_features(executor: &SqlitePool) -> Result<i64> {
    if !collection_exists(executor).await? {
        return Ok(0);
    }
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM features"#).fetch_one(executor).await
}

/// 添加特征记录
pub async fn add_feature<'c, E>(executor: E, record: &FeatureRecord) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO features (id, feature, label)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.feature)
    .bind(&record.label)
    .execute(executor)
    .await?;

    Ok(())
}

/// 根据 ID 获取特征记录
pub async fn get_feature(executor: &SqlitePool, id: &str) -> Result<Option<FeatureRecord>> {
    sqlx::query_as::<_, FeatureRecord>(
        r#"
        SELECT id, feature, label FROM features WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// 获取所有带标签的特征记录，按写入顺序排列
pub async fn get_labeled_features(executor: &SqlitePool) -> Result<Vec<FeatureRecord>> {
    sqlx::query_as::<_, FeatureRecord>(
        r#"
        SELECT id, feature, label FROM features
        WHERE label IS NOT NULL
        ORDER BY rowid ASC
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 删除所有特征记录
pub async fn delete_features_all(executor: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(r#"DELETE FROM features"#).execute(executor).await?;
    Ok(result.rows_affected())
}
