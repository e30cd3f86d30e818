use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use indicatif::ProgressBar;
use log::{error, info};
use prometheus::{BasicAuthentication, labels};
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::cli::{SubCommandExtend, load_corpus, pb_style};
use crate::config::{Opts, RepositoryOptions, parse_k};
use crate::mnist;
use crate::server::{self, AppState, DEFAULT_K, GatewayConfig};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub repo: RepositoryOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:2345")]
    pub addr: String,
    /// 路由前缀
    #[arg(long, default_value = "/knn")]
    pub base: String,
    /// 默认近邻数量
    #[arg(short, value_name = "K", default_value_t = DEFAULT_K, value_parser = parse_k)]
    pub k: usize,
    /// 启动前清空数据库并导入该目录下的 MNIST 训练集
    #[arg(long, value_name = "DIR")]
    pub mnist_dir: Option<PathBuf>,
    /// 写操作的鉴权 token，不填则不鉴权
    #[arg(long)]
    pub token: Option<String>,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let repo = self.repo.builder(&opts.data_dir).open().await?;

        if let Some(dir) = &self.mnist_dir {
            let data = mnist::load_dir(dir)?;
            let pb = ProgressBar::new(data.len() as u64).with_style(pb_style());
            load_corpus(&repo, data, &pb).await?;
            pb.finish_with_message("训练集导入完成");
        }

        let config = GatewayConfig { base: self.base.clone(), k: self.k, token: self.token.clone() };

        // 创建应用状态，同时读取训练集快照
        let state = AppState::new(repo, config).await?;

        // 创建应用
        let app = server::create_app(state.clone());

        if let Some(url) = self.prometheus_push.clone() {
            let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
            let auth = match &self.prometheus_auth {
                Some(s) => {
                    let (username, password) =
                        s.split_once(':').context("prometheus 认证信息格式应为 username:password")?;
                    Some((username.to_string(), password.to_string()))
                }
                None => None,
            };
            tokio::spawn(async move {
                loop {
                    let metric_families = prometheus::gather();
                    let url = url.clone();
                    let instance = instance.clone();
                    let auth = auth.clone();
                    let r = spawn_blocking(move || {
                        prometheus::push_metrics(
                            "knn-ws",
                            labels! {
                                "instance".to_string() => instance.clone(),
                            },
                            &url,
                            metric_families,
                            auth.map(|(username, password)| BasicAuthentication {
                                username,
                                password,
                            }),
                        )
                    })
                    .await;
                    match r {
                        Ok(Err(e)) => error!("推送指标失败: {e}"),
                        Err(e) => error!("推送指标失败: {e}"),
                        Ok(Ok(())) => {}
                    }
                    sleep(Duration::from_secs(30)).await;
                }
            });
        }

        // 启动服务器
        info!("服务器启动：http://{}{}", &self.addr, state.config.normalized_base());
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("正在关闭服务器");
            })
            .await?;

        state.repo.close().await;
        Ok(())
    }
}
