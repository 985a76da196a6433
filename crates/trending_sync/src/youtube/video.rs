use serde::{Deserialize, Deserializer};

use crate::model::VideoRecord;

const UNKNOWN_TITLE: &str = "Unknown Title";

/// videos.list 返回的单个视频，仅保留用到的字段
#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoSnippet {
    pub title: Option<String>,
}

/// 统计数据在接口中以字符串形式返回，作者可以隐藏点赞数，评论关闭时也没有评论数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default, deserialize_with = "count_from_str")]
    pub view_count: Option<u64>,
    #[serde(default, deserialize_with = "count_from_str")]
    pub like_count: Option<u64>,
    #[serde(default, deserialize_with = "count_from_str")]
    pub comment_count: Option<u64>,
}

fn count_from_str<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Option::<Raw>::deserialize(deserializer)?
        .map(|raw| match raw {
            Raw::Text(s) => s.parse::<u64>().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(n),
        })
        .transpose()
}

impl From<VideoItem> for VideoRecord {
    fn from(item: VideoItem) -> Self {
        VideoRecord {
            video_id: item.id,
            view_count: item.statistics.view_count.unwrap_or_default(),
            title: item.snippet.title.unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
            likes: item.statistics.like_count.unwrap_or_default(),
            comments: item.statistics.comment_count.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_video_item() {
        let item: VideoItem = serde_json::from_value(json!({
            "kind": "youtube#video",
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "publishedAt": "2009-10-25T06:57:33Z",
                "title": "Never Gonna Give You Up",
                "channelTitle": "Rick Astley"
            },
            "statistics": {
                "viewCount": "1500000000",
                "likeCount": "17000000",
                "commentCount": "2300000"
            }
        }))
        .unwrap();
        let record = VideoRecord::from(item);
        assert_eq!(record.video_id, "dQw4w9WgXcQ");
        assert_eq!(record.view_count, 1_500_000_000);
        assert_eq!(record.likes, 17_000_000);
        assert_eq!(record.comments, 2_300_000);
        assert_eq!(record.title, "Never Gonna Give You Up");
    }

    #[test]
    fn test_missing_statistics_default_to_zero() {
        let item: VideoItem = serde_json::from_value(json!({
            "id": "abc",
            "statistics": {"viewCount": "42"}
        }))
        .unwrap();
        let record = VideoRecord::from(item);
        assert_eq!(record.view_count, 42);
        assert_eq!(record.likes, 0);
        assert_eq!(record.comments, 0);
        assert_eq!(record.title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_malformed_count_is_rejected() {
        let res = serde_json::from_value::<VideoItem>(json!({
            "id": "abc",
            "statistics": {"viewCount": "many"}
        }));
        assert!(res.is_err());
    }
}
