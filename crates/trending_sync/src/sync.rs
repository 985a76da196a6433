use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::is_quota_exhausted;
use crate::model::SnapshotEntry;
use crate::utils::{dump_json, load_json, remove_if_exists};
use crate::youtube::{Cost, PlaylistItem};

/// 远端播放列表的读写接口，youtube::Playlist 是唯一的线上实现
pub trait PlaylistRemote {
    async fn list_items(&self) -> Result<Vec<PlaylistItem>>;

    async fn insert(&self, video_id: &str) -> Result<()>;

    async fn delete(&self, item_id: &str) -> Result<()>;
}

/// video_id 到该视频在播放列表中所有条目 id 的映射，保留列表中的先后顺序
#[derive(Debug, Default)]
pub struct PlaylistMembership {
    items: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl PlaylistMembership {
    pub fn from_items(items: impl IntoIterator<Item = PlaylistItem>) -> Self {
        let mut membership = Self::default();
        for item in items {
            let ids = membership.items.entry(item.video_id.clone()).or_insert_with(|| {
                membership.order.push(item.video_id.clone());
                Vec::new()
            });
            ids.push(item.id);
        }
        membership
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.items.contains_key(video_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id).map(|items| (id.as_str(), items.as_slice())))
    }

    /// 不同视频的数量
    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub removed: usize,
    pub added: usize,
    /// 已经在列表中因而不需要添加的目标数量
    pub skipped: usize,
    /// 因失败而没有添加的目标，按输入顺序排列，会被写回输入文件供下次重试
    pub not_added: Vec<SnapshotEntry>,
    /// 本次发出的写请求消耗的配额
    pub cost: u64,
    /// 是否有写请求失败，失败后本次运行不会再发出任何写请求
    pub latched: bool,
}

struct Synchronizer<'a, R: PlaylistRemote> {
    remote: &'a R,
    report: SyncReport,
}

impl<R: PlaylistRemote> Synchronizer<'_, R> {
    fn latch(&mut self, action: &str, e: anyhow::Error) {
        if is_quota_exhausted(&e) {
            warn!("daily quota exhausted while {}, no further changes will be made in this run", action);
        } else {
            warn!("failed {}: {:#}, no further changes will be made in this run", action, e);
        }
        self.report.latched = true;
    }

    /// 删除不在目标中的视频，以及目标视频除第一条以外的重复条目
    async fn clear(&mut self, membership: &PlaylistMembership, targets: &HashSet<&str>) {
        let removals = membership
            .iter()
            .flat_map(|(video_id, item_ids)| {
                let keep = usize::from(targets.contains(video_id));
                item_ids[keep..].iter().map(move |item_id| (video_id, item_id))
            })
            .collect::<Vec<_>>();
        let total = removals.len();
        info!("removing {} playlist items", total);
        for (i, (video_id, item_id)) in removals.into_iter().enumerate() {
            info!("[{:>3}/{:>3}] removing {} ({})", i + 1, total, video_id, item_id);
            self.report.cost += Cost::Write.units();
            match self.remote.delete(item_id).await {
                Ok(()) => self.report.removed += 1,
                Err(e) => {
                    self.latch(&format!("removing {video_id}"), e);
                    return;
                }
            }
        }
    }

    async fn add(&mut self, membership: &PlaylistMembership, targets: &[SnapshotEntry]) {
        let mut present = HashSet::new();
        // 已经记入 not_added 的视频，重复的目标只记一次
        let mut pending = HashSet::new();
        let total = targets.len();
        for (i, entry) in targets.iter().enumerate() {
            let video_id = entry.video_id();
            if membership.contains(video_id) || present.contains(video_id) {
                self.report.skipped += 1;
                continue;
            }
            if self.report.latched {
                if pending.insert(video_id) {
                    self.report.not_added.push(entry.clone());
                }
                continue;
            }
            info!("[{:>3}/{:>3}] adding {} ({})", i + 1, total, video_id, entry.title());
            self.report.cost += Cost::Write.units();
            match self.remote.insert(video_id).await {
                Ok(()) => {
                    self.report.added += 1;
                    present.insert(video_id);
                }
                Err(e) => {
                    self.latch(&format!("adding {video_id}"), e);
                    pending.insert(video_id);
                    self.report.not_added.push(entry.clone());
                }
            }
        }
    }
}

/// 将远端播放列表与目标列表对齐。
///
/// 远端列表只在开始时读取一次，读取失败会直接返回错误；
/// 写请求的失败不会返回错误，而是反映在 SyncReport 中
pub async fn sync_playlist<R: PlaylistRemote>(remote: &R, targets: &[SnapshotEntry], clear: bool) -> Result<SyncReport> {
    let items = remote.list_items().await.context("failed to load remote playlist")?;
    let membership = PlaylistMembership::from_items(items);
    info!("remote playlist contains {} distinct videos", membership.len());
    let mut synchronizer = Synchronizer {
        remote,
        report: SyncReport::default(),
    };
    if clear {
        let target_ids = targets.iter().map(SnapshotEntry::video_id).collect::<HashSet<_>>();
        synchronizer.clear(&membership, &target_ids).await;
    } else {
        info!("skip clearing playlist");
    }
    synchronizer.add(&membership, targets).await;
    Ok(synchronizer.report)
}

pub fn load_targets(path: &Path) -> Result<Vec<SnapshotEntry>> {
    load_json(path).with_context(|| format!("failed to load sync input {}", path.display()))
}

/// 有未添加的视频时写回输入文件，全部完成时删除输入文件
pub fn persist_retry_state(path: &Path, report: &SyncReport) -> Result<()> {
    if report.not_added.is_empty() {
        remove_if_exists(path)
    } else {
        dump_json(path, &report.not_added, false)
    }
}
