use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::repository::{DEFAULT_ID_PREFIX, FeatureRepositoryBuilder, IdAllocation};

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "knn", "knn-ws").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

/// 解析近邻数量，必须至少为 1
pub fn parse_k(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("k must be at least 1".to_string()),
        Ok(k) => Ok(k),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(Parser, Debug, Clone)]
pub struct RepositoryOptions {
    /// 特征 ID 前缀
    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_ID_PREFIX)]
    pub id_prefix: String,
    /// 使用仓库内部的自增序列分配 ID，保证并发添加时 ID 不重复
    #[arg(long)]
    pub strict_ids: bool,
}

impl RepositoryOptions {
    /// 根据选项创建仓库构造器
    pub fn builder(&self, data_dir: &DataDir) -> FeatureRepositoryBuilder {
        let ids =
            if self.strict_ids { IdAllocation::Sequence } else { IdAllocation::EstimatedCount };
        FeatureRepositoryBuilder::new(data_dir.database())
            .prefix(self.id_prefix.clone())
            .id_allocation(ids)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "knn-ws", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 数据目录
    #[arg(short, long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 分类服务
    Server(ServerCommand),
    /// 清空数据库并导入 MNIST 训练集
    Load(LoadCommand),
    /// 清空数据库中的所有特征
    Clear(ClearCommand),
    /// 对数据库中的一个特征进行分类
    Label(LabelCommand),
}

#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("features.db")
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
