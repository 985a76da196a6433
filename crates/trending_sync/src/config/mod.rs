use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

mod args;

pub use args::{Args, Command, GenerateArgs, UpdateArgs};

const CONFIG_FILE: &str = "config.toml";
const TOKEN_FILE: &str = "token_youtube_v3.json";

pub fn default_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir().context("no config path found")?.join("trending-sync"))
}

fn default_playlist_id() -> String {
    "PLQeIlACGt47P3nQEVGWmaU3669iw6q7mQ".to_owned()
}

fn default_threshold() -> u32 {
    crate::ranking::DEFAULT_THRESHOLD
}

fn default_top_n() -> usize {
    10
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("safe/data.json")
}

fn default_public_snapshot_path() -> PathBuf {
    PathBuf::from("docs/data.json")
}

fn default_newly_added_path() -> PathBuf {
    PathBuf::from("docs/data-newly-added.json")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("safe/collection.json")
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_entry_template() -> String {
    "{{index}}. <a href=\"{{{url}}}\" target=\"_blank\">{{title}}</a>\n@ {{metric}}\n".to_owned()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/youtube".to_owned()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_playlist_id")]
    pub playlist_id: String,
    /// 固定查询的地区，为空时查询平台支持的全部地区
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    /// 至少出现在多少个地区的榜单中才会被收录
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_threshold")]
    pub points_threshold: u32,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_public_snapshot_path")]
    pub public_snapshot_path: PathBuf,
    #[serde(default = "default_newly_added_path")]
    pub newly_added_path: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// 存放自定义页面模板的文件夹，其中的同名文件会覆盖内置模板
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// 已发布快照的地址，配合 --remote-snapshot 使用
    #[serde(default)]
    pub snapshot_url: Option<String>,
    /// OAuth 凭据的保存位置，默认位于配置文件夹下
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    #[serde(default = "default_entry_template")]
    pub entry_template: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playlist_id: default_playlist_id(),
            regions: None,
            threshold: default_threshold(),
            points_threshold: default_threshold(),
            top_n: default_top_n(),
            snapshot_path: default_snapshot_path(),
            public_snapshot_path: default_public_snapshot_path(),
            newly_added_path: default_newly_added_path(),
            cache_path: default_cache_path(),
            docs_dir: default_docs_dir(),
            template_dir: None,
            snapshot_url: None,
            token_path: None,
            entry_template: default_entry_template(),
            scopes: default_scopes(),
        }
    }
}

/// 地区代码必须是两个大写字母，例如 US，配置文件与命令行共用
pub fn check_region(region: &str) -> std::result::Result<String, String> {
    if region.len() == 2 && region.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(region.to_owned())
    } else {
        Err(format!("region '{region}' is not a two letter uppercase code"))
    }
}

impl Config {
    /// 读取配置文件，文件不存在时使用默认配置。读取后总会写回，补全缺失的字段
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        info!("loading config from {}", path.display());
        let config = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("config file not found, using default config");
                Self::default()
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        config.save(config_dir)?;
        config
            .check()
            .with_context(|| format!("config at {} is invalid", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir)?;
        std::fs::write(config_dir.join(CONFIG_FILE), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn token_path(&self, config_dir: &Path) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| config_dir.join(TOKEN_FILE))
    }

    pub fn check(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.playlist_id.is_empty() {
            errors.push("playlist_id is not set".to_owned());
        }
        if let Some(regions) = &self.regions {
            if regions.is_empty() {
                errors.push("regions is set but empty, remove it to query all regions".to_owned());
            }
            errors.extend(regions.iter().filter_map(|r| check_region(r).err()));
        }
        if self.threshold == 0 {
            errors.push("threshold must be greater than 0".to_owned());
        }
        if self.points_threshold == 0 {
            errors.push("points_threshold must be greater than 0".to_owned());
        }
        if self.top_n == 0 {
            errors.push("top_n must be greater than 0".to_owned());
        }
        if self.entry_template.trim().is_empty() {
            errors.push("entry_template is empty".to_owned());
        } else if let Err(e) = handlebars::Handlebars::new().render_template(&self.entry_template, &()) {
            errors.push(format!("entry_template is invalid: {e}"));
        }
        if self
            .snapshot_url
            .as_deref()
            .is_some_and(|url| !url.starts_with("https://") && !url.starts_with("http://"))
        {
            errors.push("snapshot_url must be an http(s) url".to_owned());
        }
        if self.scopes.is_empty() {
            errors.push("scopes must not be empty".to_owned());
        }
        if !errors.is_empty() {
            bail!(
                errors
                    .into_iter()
                    .map(|e| format!("- {}", e))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
        }
        Ok(())
    }
}
