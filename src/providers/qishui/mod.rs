//! 汽水音乐适配器。
//!
//! 移动端分享出来的都是 `v.douyin.com` / `qishui.douyin.com` 短链，
//! 展开后落在 `music.douyin.com/qishui/share/track` 页面。数据嵌在
//! 页面的 `window._ROUTER_DATA` 脚本里，形状随版本漂移，所以和
//! Apple Music 一样按优先级排一组提取策略。只支持单曲。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{MusicWallError, Result},
    link::{Platform, ResolvedLink},
    model::TrackRecord,
    providers::{
        BROWSER_USER_AGENT, PlatformAdapter, ensure_https, find_object_with_keys, og_meta,
        str_field,
    },
};

/// 页面抓取的超时。
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

static ROUTER_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)window\._ROUTER_DATA\s*=\s*(\{.*?\})\s*</script>")
        .expect("_ROUTER_DATA 正则必然合法")
});

/// 汽水音乐的适配器实现。
#[derive(Debug, Clone)]
pub struct QishuiAdapter {
    http_client: Client,
}

impl QishuiAdapter {
    /// 创建适配器。
    pub fn new() -> Result<Self> {
        let http_client = Client::builder().user_agent(BROWSER_USER_AGENT).build()?;
        Ok(Self { http_client })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .http_client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MusicWallError::UpstreamUnavailable(format!(
                "汽水音乐页面返回 {status}"
            )));
        }
        Ok(text)
    }

    /// 按优先级依次尝试各提取策略。
    fn extract(html: &str) -> Option<TrackFields> {
        if let Some(fields) = extract_from_router_data(html) {
            debug!("[Qishui] 策略 '_ROUTER_DATA' 提取成功");
            return Some(fields);
        }
        debug!("[Qishui] 策略 '_ROUTER_DATA' 未命中，退回 OpenGraph");
        extract_from_og_meta(html)
    }
}

/// 从页面提取出来的单曲字段。
#[derive(Debug, Default)]
struct TrackFields {
    name: String,
    artist_name: String,
    album_name: String,
    picture_url: String,
}

/// 策略一：`window._ROUTER_DATA` 内嵌 JSON。
///
/// 目标对象带 `trackName` 键，在整棵树里按键找，不依赖固定路径；
/// 字段拼写在不同版本里见过驼峰和下划线两种，都试。
fn extract_from_router_data(html: &str) -> Option<TrackFields> {
    let caps = ROUTER_DATA_RE.captures(html)?;
    let doc = serde_json::from_str::<Value>(&caps[1]).ok()?;
    let track = find_object_with_keys(&doc, &["trackName"])
        .or_else(|| find_object_with_keys(&doc, &["track_name"]))?;

    let name = str_field(track, &["trackName", "track_name"])?;
    Some(TrackFields {
        name,
        artist_name: str_field(track, &["artistName", "artist_name", "author"]).unwrap_or_default(),
        album_name: str_field(track, &["albumName", "album_name"]).unwrap_or_default(),
        picture_url: str_field(track, &["coverUrl", "coverURL", "cover_url"])
            .map(|u| ensure_https(&u))
            .unwrap_or_default(),
    })
}

/// 策略二：OpenGraph 标签兜底，标题形如「歌名 - 歌手」。
fn extract_from_og_meta(html: &str) -> Option<TrackFields> {
    let title = og_meta(html, "title")?;
    let (name, artist_name) = match title.split_once(" - ") {
        Some((n, a)) => (n.trim().to_string(), a.trim().to_string()),
        None => (title, String::new()),
    };
    Some(TrackFields {
        name,
        artist_name,
        album_name: String::new(),
        picture_url: og_meta(html, "image").map(|u| ensure_https(&u)).unwrap_or_default(),
    })
}

#[async_trait]
impl PlatformAdapter for QishuiAdapter {
    fn platform(&self) -> Platform {
        Platform::Qishui
    }

    async fn fetch_track(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let html = self.fetch_page(&link.url).await?;
        let fields = Self::extract(&html).ok_or_else(|| {
            MusicWallError::upstream_format("汽水音乐页面结构不符合任何已知形状，可能已改版", &html)
        })?;
        Ok(TrackRecord {
            name: fields.name,
            artist_name: fields.artist_name,
            album_name: fields.album_name,
            picture_url: fields.picture_url,
            platform_track_id: Some(link.content_id.clone()),
            original_link: Some(link.url.clone()),
        })
    }
}
