use anyhow::{Context, Result};
use reqwest::Method;

use crate::collector::ChartSource;
use crate::youtube::{Cost, ListResponse, MAX_RESULTS, Region, ResponseExt, VideoItem, YoutubeClient};

/// YouTube 的 Music 分类
pub const MUSIC_CATEGORY_ID: &str = "10";

impl YoutubeClient {
    /// 获取某个地区 mostPopular 榜单的一页，cost = 1
    pub async fn most_popular_music(&self, region: &str, page_token: Option<&str>) -> Result<ListResponse<VideoItem>> {
        let max_results = MAX_RESULTS.to_string();
        let mut req = self.request(Method::GET, "videos", Cost::List).query(&[
            ("part", "id,snippet,statistics"),
            ("chart", "mostPopular"),
            ("videoCategoryId", MUSIC_CATEGORY_ID),
            ("maxResults", max_results.as_str()),
            ("regionCode", region),
        ]);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        let res = req
            .send()
            .await
            .with_context(|| format!("failed to request trending chart of region {region}"))?
            .validated_json()
            .await
            .with_context(|| format!("trending chart of region {region} failed"))?;
        ListResponse::from_value(res, "videos.list")
    }
}

impl ChartSource for YoutubeClient {
    async fn regions(&self) -> Result<Vec<Region>> {
        self.get_regions().await
    }

    async fn chart_page(&self, region: &str, page_token: Option<&str>) -> Result<ListResponse<VideoItem>> {
        self.most_popular_music(region, page_token).await
    }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, TryStreamExt};

    use super::*;
    use crate::collector::chart_stream;
    use crate::youtube::Auth;

    #[ignore = "only for manual test, need YT_API_KEY and network access"]
    #[tokio::test]
    async fn test_most_popular_music() {
        let key = std::env::var("YT_API_KEY").unwrap();
        let client = YoutubeClient::new(Auth::ApiKey(key));
        let pages = chart_stream(&client, "US")
            .take(2)
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert!(pages.iter().all(|page| page.len() <= MAX_RESULTS as usize));
        assert!(client.cost() >= 1);
    }
}
