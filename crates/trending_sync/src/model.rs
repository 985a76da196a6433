use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 某次抓取时视频的快照，以 video_id 作为唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub view_count: u64,
    pub title: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

/// 快照文件中的一行，序列化为 `[view_count, title, video_id]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry(pub u64, pub String, pub String);

impl SnapshotEntry {
    pub fn view_count(&self) -> u64 {
        self.0
    }

    pub fn title(&self) -> &str {
        &self.1
    }

    pub fn video_id(&self) -> &str {
        &self.2
    }
}

impl From<&VideoRecord> for SnapshotEntry {
    fn from(record: &VideoRecord) -> Self {
        SnapshotEntry(record.view_count, record.title.clone(), record.video_id.clone())
    }
}

/// 上一次发布的快照，既是 update 的默认输入，也是计算播放增速的基线
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// 从本地文件读取，快照时间取文件的修改时间
    pub fn load(path: &Path) -> Result<Self> {
        let entries = crate::utils::load_json(path)?;
        let taken_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Self { entries, taken_at })
    }

    /// 从发布地址下载，快照时间取 Last-Modified 响应头
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self> {
        let res = client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("failed to fetch snapshot from {url}"))?;
        let taken_at = res
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let entries = res
            .json::<Vec<SnapshotEntry>>()
            .await
            .with_context(|| format!("snapshot at {url} is not a list of [views, title, id]"))?;
        Ok(Self { entries, taken_at })
    }

    pub fn view_counts(&self) -> HashMap<&str, u64> {
        self.entries.iter().map(|e| (e.video_id(), e.view_count())).collect()
    }

    pub fn video_ids(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.video_id()).collect()
    }
}
