use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::check_region;

#[derive(Parser, Debug)]
#[command(name = "trending-sync", version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, default_value = "None,trending_sync=info", env = "RUST_LOG", global = true)]
    pub log_level: String,

    /// 配置文件夹，默认为系统配置目录下的 trending-sync
    #[arg(short, long, env = "TRENDING_SYNC_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 抓取各地区的音乐榜单，生成快照与报告页面
    Generate(GenerateArgs),
    /// 使用快照更新 YouTube 播放列表
    Update(UpdateArgs),
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// YouTube Data API v3 developer key
    #[arg(env = "YT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// 优先使用缓存的抓取结果，没有缓存时抓取并写入缓存
    #[arg(long)]
    pub cache: bool,

    /// 从 snapshot_url 下载上一次发布的快照作为基线
    #[arg(long)]
    pub remote_snapshot: bool,

    /// 只查询这些地区，例如 US,CA，默认查询平台支持的全部地区
    #[arg(long, value_delimiter = ',', value_parser = check_region)]
    pub regions: Option<Vec<String>>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Google Cloud Console 下载的 client_secrets.json
    pub client_secret: PathBuf,

    /// 快照文件，默认为配置中的 snapshot_path
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 不删除播放列表中已有的视频
    #[arg(long)]
    pub no_clear: bool,

    /// 忽略保存的凭据，重新登录
    #[arg(long)]
    pub relogin: bool,
}
