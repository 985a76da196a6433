use anyhow::Result;
use reqwest::Method;
use serde::Deserialize;

use crate::youtube::{Cost, ListResponse, ResponseExt, YoutubeClient};

/// 平台支持的内容地区，id 为两位的地区代码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub name: String,
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RegionRaw {
            id: String,
            snippet: RegionSnippet,
        }
        #[derive(Deserialize)]
        struct RegionSnippet {
            name: String,
        }
        let raw = RegionRaw::deserialize(deserializer)?;
        Ok(Region {
            id: raw.id,
            name: raw.snippet.name,
        })
    }
}

impl YoutubeClient {
    /// 获取所有支持的地区，cost = 1
    pub async fn get_regions(&self) -> Result<Vec<Region>> {
        let res = self
            .request(Method::GET, "i18nRegions", Cost::List)
            .query(&[("part", "snippet")])
            .send()
            .await?
            .validated_json()
            .await?;
        Ok(ListResponse::<Region>::from_value(res, "i18nRegions.list")?.items)
    }
}
