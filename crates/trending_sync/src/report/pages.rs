use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use handlebars::Handlebars;
use serde_json::json;

use crate::model::{VideoRecord, playlist_url, watch_url};
use crate::ranking::{PointsEntry, RatioEntry};
use crate::report::format::{millify, timestamp};
use crate::report::template::{MarkdownTemplate, WriteMode};

const ENTRY_TEMPLATE_KEY: &str = "entry";

/// 编译进二进制的页面模板，template_dir 中的同名文件优先
const BUILTIN_TEMPLATES: [(&str, &str); 7] = [
    ("index.md", include_str!("../../templates/index.md")),
    ("points-meter.md", include_str!("../../templates/points-meter.md")),
    ("playlist.md", include_str!("../../templates/playlist.md")),
    ("likes.md", include_str!("../../templates/likes.md")),
    ("comments.md", include_str!("../../templates/comments.md")),
    ("ratio.md", include_str!("../../templates/ratio.md")),
    ("newly-added.md", include_str!("../../templates/newly-added.md")),
];

/// 生成报告所需的全部排名结果
pub struct ReportData<'a> {
    pub ranked: &'a [VideoRecord],
    pub points: &'a [PointsEntry],
    pub likes: &'a [VideoRecord],
    pub comments: &'a [VideoRecord],
    /// 播放增速榜及其基线快照的时间，没有可用的快照时为 None
    pub ratio: Option<(&'a [RatioEntry], DateTime<Utc>)>,
    /// 没有上一次快照时为 None
    pub newly_added: Option<&'a [VideoRecord]>,
    pub top_n: usize,
    pub playlist_id: &'a str,
    pub generated_at: DateTime<Local>,
}

pub struct PageBuilder {
    handlebars: Handlebars<'static>,
    template_dir: Option<PathBuf>,
}

impl PageBuilder {
    pub fn new(entry_template: &str, template_dir: Option<PathBuf>) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string(ENTRY_TEMPLATE_KEY, entry_template)
            .context("invalid entry template")?;
        Ok(Self {
            handlebars,
            template_dir,
        })
    }

    fn template(&self, name: &str) -> Result<MarkdownTemplate> {
        if let Some(path) = self.template_dir.as_ref().map(|dir| dir.join(name)).filter(|p| p.is_file()) {
            debug!("using template override {}", path.display());
            return MarkdownTemplate::from_file(&path);
        }
        BUILTIN_TEMPLATES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, text)| MarkdownTemplate::new(*text))
            .with_context(|| format!("no template named {name}"))
    }

    fn entry(&self, index: usize, video_id: &str, title: &str, metric: &str) -> Result<String> {
        Ok(self.handlebars.render(
            ENTRY_TEMPLATE_KEY,
            &json!({
                "index": index,
                "video_id": video_id,
                "title": title,
                "url": watch_url(video_id),
                "metric": metric,
            }),
        )?)
    }

    fn record_entries<F>(&self, records: &[VideoRecord], metric: F) -> Result<Vec<String>>
    where
        F: Fn(&VideoRecord) -> String,
    {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| self.entry(i + 1, &r.video_id, &r.title, &metric(r)))
            .collect()
    }

    fn points_entries(&self, points: &[PointsEntry]) -> Result<Vec<String>> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let metric = format!("{} points ({:.1}%)", p.count, p.percentage);
                self.entry(i + 1, &p.video_id, &p.title, &metric)
            })
            .collect()
    }

    /// 构建所有页面，只修改内存中的模板，写盘由 save_pages 负责
    pub fn build(&self, data: &ReportData<'_>) -> Result<Vec<(&'static str, MarkdownTemplate)>> {
        let generated_at = timestamp(&data.generated_at);
        let playlist_link = format!("[:material-youtube: Playlist]({})", playlist_url(data.playlist_id));
        let views = |r: &VideoRecord| format!("{} views", millify(r.view_count, 1));
        let mut pages = Vec::new();

        let mut index = self.template("index.md")?;
        index.set("timestamp", &generated_at, WriteMode::Replace)?;
        index.set("playlist_link", &playlist_link, WriteMode::Replace)?;
        index.set("top_n", data.top_n.to_string(), WriteMode::Replace)?;
        let top = &data.points[..data.top_n.min(data.points.len())];
        index.extend("top", self.points_entries(top)?)?;
        index.extend("level2", self.record_entries(data.ranked, views)?)?;
        pages.push(("index.md", index));

        let mut points = self.template("points-meter.md")?;
        points.set("timestamp", &generated_at, WriteMode::Replace)?;
        points.extend("points", self.points_entries(data.points)?)?;
        pages.push(("points-meter.md", points));

        let mut playlist = self.template("playlist.md")?;
        playlist.set("timestamp", &generated_at, WriteMode::Replace)?;
        playlist.set("playlist_link", &playlist_link, WriteMode::Replace)?;
        playlist.extend("playlist", self.record_entries(data.ranked, views)?)?;
        pages.push(("playlist.md", playlist));

        let mut likes = self.template("likes.md")?;
        likes.set("timestamp", &generated_at, WriteMode::Replace)?;
        likes.extend(
            "likes",
            self.record_entries(data.likes, |r| format!("{} likes", millify(r.likes, 1)))?,
        )?;
        pages.push(("likes.md", likes));

        let mut comments = self.template("comments.md")?;
        comments.set("timestamp", &generated_at, WriteMode::Replace)?;
        comments.extend(
            "comments",
            self.record_entries(data.comments, |r| format!("{} comments", millify(r.comments, 1)))?,
        )?;
        pages.push(("comments.md", comments));

        if let Some((entries, snapshot_time)) = data.ratio {
            let mut ratio = self.template("ratio.md")?;
            ratio.set("timestamp", &generated_at, WriteMode::Replace)?;
            ratio.set(
                "snapshot_time",
                timestamp(&snapshot_time.with_timezone(&Local)),
                WriteMode::Replace,
            )?;
            let lines = entries
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    let metric = format!("{:.2} s/view (+{} views)", e.seconds_per_view, millify(e.delta, 1));
                    self.entry(i + 1, &e.record.video_id, &e.record.title, &metric)
                })
                .collect::<Result<Vec<_>>>()?;
            ratio.extend("ratio", lines)?;
            pages.push(("ratio.md", ratio));
        }

        if let Some(newly_added) = data.newly_added {
            let mut page = self.template("newly-added.md")?;
            page.set("timestamp", &generated_at, WriteMode::Replace)?;
            page.extend("newly_added", self.record_entries(newly_added, views)?)?;
            pages.push(("newly-added.md", page));
        }
        Ok(pages)
    }
}

pub fn save_pages(docs_dir: &Path, pages: &[(&str, MarkdownTemplate)]) -> Result<()> {
    for (name, page) in pages {
        page.save(&docs_dir.join(name))
            .with_context(|| format!("failed to save page {name}"))?;
    }
    Ok(())
}
