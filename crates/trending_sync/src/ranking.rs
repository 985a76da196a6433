use std::collections::{HashMap, HashSet};

use float_ord::FloatOrd;
use itertools::Itertools;

use crate::model::VideoRecord;

/// video_id 到出现该视频的地区数量的映射
pub type RegionOccurrenceCounter = HashMap<String, u32>;

/// 出现在至少两个地区才会被视为流行
pub const DEFAULT_THRESHOLD: u32 = 2;

/// 合并同一个视频在不同地区的结果：后抓取的地区覆盖先前的数据（last-writer-wins），返回被覆盖的旧值
pub fn upsert_record(records: &mut HashMap<String, VideoRecord>, latest: VideoRecord) -> Option<VideoRecord> {
    records.insert(latest.video_id.clone(), latest)
}

fn occurrences(counts: &RegionOccurrenceCounter, video_id: &str) -> u32 {
    counts.get(video_id).copied().unwrap_or_default()
}

/// 过滤掉出现次数小于 threshold 的视频，按 (view_count, title, video_id) 整体降序
pub fn rank_by_views(
    records: &HashMap<String, VideoRecord>,
    counts: &RegionOccurrenceCounter,
    threshold: u32,
) -> Vec<VideoRecord> {
    records
        .values()
        .filter(|r| occurrences(counts, &r.video_id) >= threshold)
        .cloned()
        .sorted_by(|a, b| (b.view_count, &b.title, &b.video_id).cmp(&(a.view_count, &a.title, &a.video_id)))
        .collect()
}

/// 按 (likes, video_id) 降序
pub fn rank_by_likes(ranked: &[VideoRecord]) -> Vec<VideoRecord> {
    ranked
        .iter()
        .cloned()
        .sorted_by(|a, b| (b.likes, &b.video_id).cmp(&(a.likes, &a.video_id)))
        .collect()
}

/// 按 (comments, video_id) 降序
pub fn rank_by_comments(ranked: &[VideoRecord]) -> Vec<VideoRecord> {
    ranked
        .iter()
        .cloned()
        .sorted_by(|a, b| (b.comments, &b.video_id).cmp(&(a.comments, &a.video_id)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointsEntry {
    pub video_id: String,
    pub title: String,
    pub count: u32,
    /// count 占全部地区数量的百分比
    pub percentage: f64,
}

/// 地区得分榜，regions_total 必须来自本次运行获取到的地区列表
pub fn rank_by_points(
    records: &HashMap<String, VideoRecord>,
    counts: &RegionOccurrenceCounter,
    regions_total: usize,
    min_count: u32,
) -> Vec<PointsEntry> {
    counts
        .iter()
        .filter(|(_, count)| **count >= min_count)
        .sorted_by(|(a_id, a), (b_id, b)| (*b, *b_id).cmp(&(*a, *a_id)))
        .map(|(video_id, count)| PointsEntry {
            video_id: video_id.clone(),
            title: records
                .get(video_id)
                .map(|r| r.title.clone())
                .unwrap_or_default(),
            count: *count,
            percentage: if regions_total == 0 {
                0.0
            } else {
                *count as f64 / regions_total as f64 * 100.0
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioEntry {
    pub record: VideoRecord,
    pub delta: u64,
    /// 平均每获得一次播放所需的秒数，越小增长越快
    pub seconds_per_view: f64,
}

/// 相对上一次快照的播放增速榜，按 seconds_per_view 升序，相同时按 video_id 升序。
/// 不在快照中的视频没有基线，播放数没有增长（或减少）的视频比值无意义，两者都会被排除
pub fn rank_by_ratio(ranked: &[VideoRecord], previous: &HashMap<&str, u64>, elapsed_seconds: f64) -> Vec<RatioEntry> {
    let elapsed_seconds = elapsed_seconds.max(0.0);
    ranked
        .iter()
        .filter_map(|record| {
            let previous_views = *previous.get(record.video_id.as_str())?;
            let delta = record.view_count.checked_sub(previous_views).filter(|d| *d > 0)?;
            Some(RatioEntry {
                record: record.clone(),
                delta,
                seconds_per_view: elapsed_seconds / delta as f64,
            })
        })
        .sorted_by_key(|e| (FloatOrd(e.seconds_per_view), e.record.video_id.clone()))
        .collect()
}

/// 本次榜单中上一次快照里没有的视频，保持原有顺序
pub fn newly_added(ranked: &[VideoRecord], previous_ids: &HashSet<&str>) -> Vec<VideoRecord> {
    ranked
        .iter()
        .filter(|r| !previous_ids.contains(r.video_id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, views: u64, title: &str) -> VideoRecord {
        VideoRecord {
            video_id: id.to_owned(),
            view_count: views,
            title: title.to_owned(),
            likes: 0,
            comments: 0,
        }
    }

    fn build(regions: &[(&str, Vec<VideoRecord>)]) -> (HashMap<String, VideoRecord>, RegionOccurrenceCounter) {
        let mut records = HashMap::new();
        let mut counts = RegionOccurrenceCounter::new();
        for (_, videos) in regions {
            for video in videos {
                *counts.entry(video.video_id.clone()).or_default() += 1;
                upsert_record(&mut records, video.clone());
            }
        }
        (records, counts)
    }

    #[test]
    fn test_concrete_scenario() {
        let (records, counts) = build(&[
            ("US", vec![record("v1", 1_000_000, "A"), record("v2", 500_000, "B")]),
            ("CA", vec![record("v1", 1_000_000, "A")]),
        ]);
        let ranked = rank_by_views(&records, &counts, 2);
        assert_eq!(ranked, vec![record("v1", 1_000_000, "A")]);
        let points = rank_by_points(&records, &counts, 2, 2);
        assert_eq!(points[0].video_id, "v1");
        assert_eq!(points[0].count, 2);
        assert_eq!(points[0].percentage, 100.0);
    }

    #[test]
    fn test_threshold_filter() {
        let (records, counts) = build(&[
            ("US", vec![record("a", 1, "a"), record("b", 2, "b"), record("c", 3, "c")]),
            ("CA", vec![record("b", 2, "b"), record("c", 3, "c")]),
            ("GB", vec![record("c", 3, "c")]),
        ]);
        for (threshold, expected) in [(0, vec!["c", "b", "a"]), (1, vec!["c", "b", "a"]), (2, vec!["c", "b"]), (3, vec!["c"]), (4, vec![])] {
            let ids = rank_by_views(&records, &counts, threshold)
                .into_iter()
                .map(|r| r.video_id)
                .collect::<Vec<_>>();
            assert_eq!(ids, expected, "threshold {threshold}");
        }
    }

    #[test]
    fn test_full_tuple_tie_break() {
        let (records, counts) = build(&[
            ("US", vec![record("x", 10, "Alpha"), record("y", 10, "Beta"), record("z", 10, "Beta"), record("w", 11, "Aaa")]),
            ("CA", vec![record("x", 10, "Alpha"), record("y", 10, "Beta"), record("z", 10, "Beta"), record("w", 11, "Aaa")]),
        ]);
        let ids = rank_by_views(&records, &counts, 2)
            .into_iter()
            .map(|r| r.video_id)
            .collect::<Vec<_>>();
        // 播放数相同时标题大的在前，标题也相同时 video_id 大的在前
        assert_eq!(ids, vec!["w", "z", "y", "x"]);
    }

    #[test]
    fn test_last_writer_wins() {
        let mut records = HashMap::new();
        assert!(upsert_record(&mut records, record("v1", 100, "old")).is_none());
        let replaced = upsert_record(&mut records, record("v1", 150, "new")).unwrap();
        assert_eq!(replaced.view_count, 100);
        assert_eq!(records["v1"], record("v1", 150, "new"));
    }

    #[test]
    fn test_likes_and_comments() {
        let mut a = record("a", 1, "a");
        a.likes = 5;
        a.comments = 1;
        let mut b = record("b", 2, "b");
        b.likes = 5;
        b.comments = 9;
        let mut c = record("c", 3, "c");
        c.likes = 7;
        let ranked = vec![c.clone(), b.clone(), a.clone()];
        assert_eq!(rank_by_likes(&ranked), vec![c.clone(), b.clone(), a.clone()]);
        assert_eq!(rank_by_comments(&ranked), vec![b, a, c]);
    }

    #[test]
    fn test_points_use_live_region_total() {
        let (records, counts) = build(&[
            ("US", vec![record("a", 1, "a"), record("b", 1, "b")]),
            ("CA", vec![record("a", 1, "a"), record("b", 1, "b")]),
            ("GB", vec![record("a", 1, "a")]),
            ("DE", vec![record("c", 1, "c")]),
        ]);
        let points = rank_by_points(&records, &counts, 4, 2);
        assert_eq!(points.len(), 2);
        assert_eq!((points[0].video_id.as_str(), points[0].count), ("a", 3));
        assert_eq!(points[0].percentage, 75.0);
        assert_eq!((points[1].video_id.as_str(), points[1].count), ("b", 2));
        assert_eq!(points[1].title, "b");
        assert!(rank_by_points(&records, &counts, 0, 1).iter().all(|p| p.percentage == 0.0));
    }

    #[test]
    fn test_ratio_excludes_missing_and_flat() {
        let ranked = vec![
            record("fast", 2_000, "fast"),
            record("slow", 1_100, "slow"),
            record("flat", 500, "flat"),
            record("shrunk", 90, "shrunk"),
            record("new", 10_000, "new"),
        ];
        let previous = HashMap::from([("fast", 1_000), ("slow", 1_000), ("flat", 500), ("shrunk", 100)]);
        let ratio = rank_by_ratio(&ranked, &previous, 3_600.0);
        let ids = ratio.iter().map(|e| e.record.video_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["fast", "slow"]);
        assert_eq!(ratio[0].delta, 1_000);
        assert_eq!(ratio[0].seconds_per_view, 3.6);
        assert_eq!(ratio[1].seconds_per_view, 36.0);
    }

    #[test]
    fn test_newly_added() {
        let ranked = vec![record("a", 3, "a"), record("b", 2, "b"), record("c", 1, "c")];
        let previous = HashSet::from(["b"]);
        let ids = newly_added(&ranked, &previous)
            .into_iter()
            .map(|r| r.video_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
