use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_stream::try_stream;
use futures::{Stream, TryStreamExt, pin_mut};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::VideoRecord;
use crate::ranking::{RegionOccurrenceCounter, upsert_record};
use crate::utils::{dump_json, load_json};
use crate::youtube::{ListResponse, Region, VideoItem};

/// 提供地区列表与榜单分页的数据源，YoutubeClient 是唯一的线上实现
pub trait ChartSource {
    async fn regions(&self) -> Result<Vec<Region>>;

    async fn chart_page(&self, region: &str, page_token: Option<&str>) -> Result<ListResponse<VideoItem>>;
}

/// 逐页返回某个地区的音乐榜单，直到没有 nextPageToken 为止，任何一页失败都会终止整个流
pub fn chart_stream<'a, S: ChartSource>(source: &'a S, region: &'a str) -> impl Stream<Item = Result<Vec<VideoItem>>> + 'a {
    try_stream! {
        let mut page_token: Option<String> = None;
        loop {
            let page = source.chart_page(region, page_token.as_deref()).await?;
            yield page.items;
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
    }
}

/// 一次完整抓取的结果，可以序列化下来供 --cache 复用
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TrendingCollection {
    pub records: HashMap<String, VideoRecord>,
    pub counts: RegionOccurrenceCounter,
    /// 本次实际查询的地区，其数量就是地区得分的分母
    pub regions: Vec<String>,
    /// 本次抓取消耗的配额
    pub cost: u64,
}

impl TrendingCollection {
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path).context("failed to load cached trending collection")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        dump_json(path, self, false)
    }

    /// 合并某个地区某一页的结果，seen 记录该地区已经计数过的视频，保证每个地区只计一次
    fn absorb_page(&mut self, items: Vec<VideoItem>, seen: &mut HashSet<String>) {
        for item in items {
            let record = VideoRecord::from(item);
            if seen.insert(record.video_id.clone()) {
                *self.counts.entry(record.video_id.clone()).or_default() += 1;
            }
            upsert_record(&mut self.records, record);
        }
    }
}

/// 依次抓取所有地区的音乐榜单，regions 为 None 时查询平台支持的全部地区
pub async fn collect_trending<S: ChartSource>(source: &S, regions: Option<Vec<String>>) -> Result<TrendingCollection> {
    let mut collection = TrendingCollection::default();
    let regions = match regions {
        Some(regions) => regions,
        None => {
            info!("querying available regions");
            let regions = source.regions().await.context("failed to query region catalog")?;
            collection.cost += 1;
            debug!("available regions: {}", regions.iter().map(|r| format!("{} ({})", r.id, r.name)).join(", "));
            regions.into_iter().map(|r| r.id).collect()
        }
    };
    let total = regions.len();
    info!("total {} regions to query", total);
    for (i, region) in regions.iter().enumerate() {
        info!("[{:>3}/{:>3}] fetching trending music ({})", i + 1, total, region);
        let mut seen = HashSet::new();
        let pages = chart_stream(source, region);
        pin_mut!(pages);
        while let Some(items) = pages
            .try_next()
            .await
            .with_context(|| format!("collection aborted at region {region}"))?
        {
            collection.cost += 1;
            collection.absorb_page(items, &mut seen);
        }
    }
    collection.regions = regions;
    info!(
        "fetched {} unique videos from {} regions, cost = {}",
        collection.records.len(),
        total,
        collection.cost
    );
    Ok(collection)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use anyhow::bail;
    use serde_json::json;

    use super::*;

    pub(crate) fn video(id: &str, views: u64, title: &str) -> VideoItem {
        serde_json::from_value(json!({
            "id": id,
            "snippet": {"title": title},
            "statistics": {"viewCount": views.to_string()}
        }))
        .unwrap()
    }

    /// 每个地区由若干页组成，page token 就是页码
    #[derive(Default)]
    pub(crate) struct FakeChart {
        pub pages: HashMap<String, Vec<Vec<(&'static str, u64, &'static str)>>>,
        pub fail_on: Option<(&'static str, usize)>,
        pub calls: Cell<usize>,
    }

    impl FakeChart {
        pub(crate) fn region(mut self, code: &str, pages: Vec<Vec<(&'static str, u64, &'static str)>>) -> Self {
            self.pages.insert(code.to_owned(), pages);
            self
        }
    }

    impl ChartSource for FakeChart {
        async fn regions(&self) -> Result<Vec<Region>> {
            let mut regions = self
                .pages
                .keys()
                .map(|id| Region {
                    id: id.clone(),
                    name: id.clone(),
                })
                .collect::<Vec<_>>();
            regions.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(regions)
        }

        async fn chart_page(&self, region: &str, page_token: Option<&str>) -> Result<ListResponse<VideoItem>> {
            self.calls.set(self.calls.get() + 1);
            let index = page_token.map(|t| t.parse::<usize>().unwrap()).unwrap_or_default();
            if self.fail_on.is_some_and(|(r, i)| r == region && i == index) {
                bail!("quota exhausted");
            }
            let pages = self.pages.get(region).cloned().unwrap_or_default();
            let items = pages
                .get(index)
                .map(|page| page.iter().map(|(id, views, title)| video(id, *views, title)).collect())
                .unwrap_or_default();
            Ok(ListResponse {
                items,
                next_page_token: (index + 1 < pages.len()).then(|| (index + 1).to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_counts_distinct_regions_across_pages() {
        let source = FakeChart::default()
            .region("US", vec![vec![("v1", 10, "A"), ("v2", 5, "B")], vec![("v1", 11, "A"), ("v3", 1, "C")]])
            .region("CA", vec![vec![("v1", 12, "A")], vec![("v3", 2, "C")]])
            .region("GB", vec![vec![("v4", 7, "D")]]);
        let collection = collect_trending(&source, None).await.unwrap();
        assert_eq!(collection.counts["v1"], 2);
        assert_eq!(collection.counts["v2"], 1);
        assert_eq!(collection.counts["v3"], 2);
        assert_eq!(collection.counts["v4"], 1);
        assert!(collection.counts.values().all(|c| *c >= 1));
        assert_eq!(collection.regions, vec!["CA", "GB", "US"]);
        // 1 次地区查询 + 5 页榜单
        assert_eq!(collection.cost, 6);
        assert_eq!(source.calls.get(), 5);
    }

    #[tokio::test]
    async fn test_explicit_regions_skip_catalog() {
        let source = FakeChart::default()
            .region("US", vec![vec![("v1", 10, "A"), ("v2", 5, "B")]])
            .region("CA", vec![vec![("v1", 20, "A")]]);
        let collection = collect_trending(&source, Some(vec!["US".to_owned(), "CA".to_owned()]))
            .await
            .unwrap();
        assert_eq!(collection.cost, 2);
        // CA 在 US 之后抓取，覆盖 v1 的播放数
        assert_eq!(collection.records["v1"].view_count, 20);
        assert_eq!(collection.regions, vec!["US", "CA"]);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_collection() {
        let source = FakeChart {
            fail_on: Some(("US", 1)),
            ..Default::default()
        }
        .region("CA", vec![vec![("v1", 10, "A")]])
        .region("US", vec![vec![("v1", 10, "A")], vec![("v2", 1, "B")]]);
        let err = collect_trending(&source, Some(vec!["US".to_owned(), "CA".to_owned()]))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("region US"));
        // US 第二页失败后不再请求 CA
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.json");
        let mut collection = TrendingCollection::default();
        collection.absorb_page(vec![video("v1", 3, "A")], &mut HashSet::new());
        collection.regions = vec!["US".to_owned()];
        collection.cost = 2;
        collection.save(&path).unwrap();
        let loaded = TrendingCollection::load(&path).unwrap();
        assert_eq!(loaded.records, collection.records);
        assert_eq!(loaded.counts, collection.counts);
        assert_eq!(loaded.cost, 2);
    }
}
