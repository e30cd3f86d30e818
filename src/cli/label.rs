use std::convert::Infallible;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::codec::FeatureEncoding;
use crate::config::{Opts, RepositoryOptions, parse_k};
use crate::knn::{Classifier, KnnClassifier};
use crate::server::DEFAULT_K;

#[derive(Parser, Debug, Clone)]
pub struct LabelCommand {
    #[command(flatten)]
    pub repo: RepositoryOptions,
    /// 待分类的特征 ID
    pub id: String,
    /// 近邻数量
    #[arg(short, value_name = "K", default_value_t = DEFAULT_K, value_parser = parse_k)]
    pub k: usize,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for LabelCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let repo = self.repo.builder(&opts.data_dir).open().await?;
        let query = repo.get(&self.id, FeatureEncoding::Raw).await?.features.into_raw()?;
        let training = repo.list_labeled().await?;
        repo.close().await;

        let result = block_in_place(|| KnnClassifier.classify(&query, &training, self.k))?;
        let matched = training.get(result.index).context("分类结果下标越界")?;

        match self.output_format {
            OutputFormat::Json => {
                let value = json!({ "id": matched.id, "label": result.label });
                println!("{}", serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Table => println!("{}\t{}", result.label, matched.id),
        }
        Ok(())
    }
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            _ => Ok(Self::Table),
        }
    }
}
