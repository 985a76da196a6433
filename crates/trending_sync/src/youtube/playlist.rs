use anyhow::{Context, Result, bail};
use async_stream::try_stream;
use futures::{Stream, TryStreamExt};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::sync::PlaylistRemote;
use crate::youtube::{Cost, ListResponse, MAX_RESULTS, ResponseExt, YoutubeClient};

pub struct Playlist<'a> {
    client: &'a YoutubeClient,
    playlist_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub title: String,
    pub privacy_status: String,
}

impl<'de> Deserialize<'de> for PlaylistInfo {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct PlaylistRaw {
            snippet: Snippet,
            #[serde(default)]
            status: Status,
        }
        #[derive(Deserialize)]
        struct Snippet {
            title: String,
        }
        #[derive(Deserialize, Default)]
        #[serde(rename_all = "camelCase")]
        struct Status {
            privacy_status: Option<String>,
        }
        let raw = PlaylistRaw::deserialize(deserializer)?;
        Ok(PlaylistInfo {
            title: raw.snippet.title,
            privacy_status: raw.status.privacy_status.unwrap_or_else(|| "unknown".to_owned()),
        })
    }
}

/// 播放列表中的一项，同一个视频可以在列表中出现多次，每次的 id 都不同
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub id: String,
    pub video_id: String,
}

impl<'de> Deserialize<'de> for PlaylistItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct PlaylistItemRaw {
            id: String,
            content_details: ContentDetails,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ContentDetails {
            video_id: String,
        }
        let raw = PlaylistItemRaw::deserialize(deserializer)?;
        Ok(PlaylistItem {
            id: raw.id,
            video_id: raw.content_details.video_id,
        })
    }
}

impl<'a> Playlist<'a> {
    pub fn new(client: &'a YoutubeClient, playlist_id: impl Into<String>) -> Self {
        Self {
            client,
            playlist_id: playlist_id.into(),
        }
    }

    /// 获取播放列表的标题与可见性，cost = 1。
    /// 这是授权后的第一个请求，同时用来检查凭据是否可用
    pub async fn get_info(&self) -> Result<PlaylistInfo> {
        let res = self
            .client
            .request(Method::GET, "playlists", Cost::List)
            .query(&[("part", "snippet,status"), ("id", self.playlist_id.as_str())])
            .send()
            .await?
            .validated_json()
            .await
            .with_context(|| format!("failed to get info of playlist {}", self.playlist_id))?;
        let Some(info) = ListResponse::<PlaylistInfo>::from_value(res, "playlists.list")?
            .items
            .into_iter()
            .next()
        else {
            bail!("playlist {} does not exist or is not accessible", self.playlist_id);
        };
        Ok(info)
    }

    async fn get_items(&self, page_token: Option<&str>) -> Result<ListResponse<PlaylistItem>> {
        let max_results = MAX_RESULTS.to_string();
        let mut req = self.client.request(Method::GET, "playlistItems", Cost::List).query(&[
            ("part", "id,contentDetails"),
            ("playlistId", self.playlist_id.as_str()),
            ("maxResults", max_results.as_str()),
        ]);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        let res = req
            .send()
            .await?
            .validated_json()
            .await
            .with_context(|| format!("failed to list items of playlist {}", self.playlist_id))?;
        ListResponse::from_value(res, "playlistItems.list")
    }

    /// 逐页返回播放列表中的条目，每页 cost = 1
    pub fn item_stream(&self) -> impl Stream<Item = Result<Vec<PlaylistItem>>> + '_ {
        try_stream! {
            let mut page_token: Option<String> = None;
            loop {
                let page = self.get_items(page_token.as_deref()).await?;
                yield page.items;
                match page.next_page_token {
                    Some(token) if !token.is_empty() => page_token = Some(token),
                    _ => break,
                }
            }
        }
    }

    /// 向播放列表末尾添加视频，cost = 50
    pub async fn insert_video(&self, video_id: &str) -> Result<()> {
        self.client
            .request(Method::POST, "playlistItems", Cost::Write)
            .query(&[("part", "snippet")])
            .json(&json!({
                "snippet": {
                    "playlistId": self.playlist_id,
                    "resourceId": {
                        "kind": "youtube#video",
                        "videoId": video_id,
                    }
                }
            }))
            .send()
            .await?
            .validated_json()
            .await
            .with_context(|| format!("failed to add video {} to playlist {}", video_id, self.playlist_id))?;
        Ok(())
    }

    /// 按条目 id 删除，cost = 50
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.client
            .request(Method::DELETE, "playlistItems", Cost::Write)
            .query(&[("id", item_id)])
            .send()
            .await?
            .validated_json()
            .await
            .with_context(|| format!("failed to delete item {} from playlist {}", item_id, self.playlist_id))?;
        Ok(())
    }
}

impl PlaylistRemote for Playlist<'_> {
    async fn list_items(&self) -> Result<Vec<PlaylistItem>> {
        let mut items = Vec::new();
        let pages = self.item_stream();
        futures::pin_mut!(pages);
        while let Some(page) = pages.try_next().await? {
            items.extend(page);
        }
        Ok(items)
    }

    async fn insert(&self, video_id: &str) -> Result<()> {
        self.insert_video(video_id).await
    }

    async fn delete(&self, item_id: &str) -> Result<()> {
        self.delete_item(item_id).await
    }
}
