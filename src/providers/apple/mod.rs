//! Apple Music 适配器。
//!
//! 没有免费的公开 API，数据从分享页面的内嵌 JSON 里抓。页面用的
//! 数据键随上游改版变过好几次，所以提取不是一条固定路径，而是一组
//! 按优先级排列的策略：任何一个策略解析失败或取不到完整形状，就
//! 落到下一个，全部落空才算提取失败。这是对"抓来的结构不归我们
//! 管"这一事实的正面回应，不是待清理的权宜之计。

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

static LD_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script[^>]*type="application/ld\+json"[^>]*>(.*?)</script>"#)
        .expect("ld+json 正则必然合法")
});

static SERVER_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script[^>]*id="serialized-server-data"[^>]*>(.*?)</script>"#)
        .expect("server data 正则必然合法")
});

static OG_TITLE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?) - (.*?)的(?:专辑|歌曲|单曲)$").expect("标题拆分正则必然合法")
});

/// 从页面里提取出来的中间形状，交由单曲/专辑路径各自落成记录。
#[derive(Debug, Default)]
struct PageData {
    name: String,
    artist_name: String,
    album_name: String,
    picture_url: String,
}

/// Apple Music 的适配器实现。
#[derive(Debug, Clone)]
pub struct AppleMusicAdapter {
    http_client: Client,
}

impl AppleMusicAdapter {
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
                "Apple Music 页面返回 {status}"
            )));
        }
        Ok(text)
    }

    /// 按优先级依次尝试各提取策略。
    fn extract(html: &str) -> Option<PageData> {
        let strategies: [(&str, fn(&str) -> Option<PageData>); 3] = [
            ("ld+json", extract_from_ld_json),
            ("serialized-server-data", extract_from_server_data),
            ("og-meta", extract_from_og_meta),
        ];
        for (label, strategy) in strategies {
            if let Some(data) = strategy(html) {
                debug!("[Apple] 策略 '{label}' 提取成功");
                return Some(data);
            }
            debug!("[Apple] 策略 '{label}' 未命中，尝试下一个");
        }
        None
    }

    async fn scrape(&self, link: &ResolvedLink) -> Result<PageData> {
        let html = self.fetch_page(&link.url).await?;
        Self::extract(&html).ok_or_else(|| {
            MusicWallError::upstream_format(
                "Apple Music 页面结构不符合任何已知形状，可能已改版",
                &html,
            )
        })
    }
}

#[async_trait]
impl PlatformAdapter for AppleMusicAdapter {
    fn platform(&self) -> Platform {
        Platform::AppleMusic
    }

    async fn fetch_track(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let data = self.scrape(link).await?;
        Ok(TrackRecord {
            album_name: if data.album_name.is_empty() {
                data.name.clone()
            } else {
                data.album_name.clone()
            },
            name: data.name,
            artist_name: data.artist_name,
            picture_url: data.picture_url,
            platform_track_id: Some(link.content_id.clone()),
            original_link: Some(link.url.clone()),
        })
    }

    async fn fetch_album(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let data = self.scrape(link).await?;
        Ok(TrackRecord {
            album_name: if data.album_name.is_empty() {
                data.name.clone()
            } else {
                data.album_name.clone()
            },
            name: data.name,
            artist_name: data.artist_name,
            picture_url: data.picture_url,
            platform_track_id: None,
            original_link: Some(link.url.clone()),
        })
    }

}

/// 策略一：schema.org 的 `application/ld+json` 脚本块。
fn extract_from_ld_json(html: &str) -> Option<PageData> {
    for caps in LD_JSON_RE.captures_iter(html) {
        let Ok(doc) = serde_json::from_str::<Value>(caps[1].trim()) else {
            continue;
        };
        let candidates: Vec<&Value> = match &doc {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in candidates {
            let Some(name) = str_field(value, &["name"]) else {
                continue;
            };
            let artist_name = value
                .get("byArtist")
                .and_then(artist_name_from_value)
                .unwrap_or_default();
            let is_album = value.get("@type").and_then(Value::as_str) == Some("MusicAlbum");
            let album_name = str_field(value.get("inAlbum").unwrap_or(&Value::Null), &["name"])
                .unwrap_or_else(|| if is_album { name.clone() } else { String::new() });
            let picture_url = image_from_value(value).unwrap_or_default();
            return Some(PageData {
                name,
                artist_name,
                album_name,
                picture_url: ensure_https(&picture_url),
            });
        }
    }
    None
}

fn artist_name_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let names: Vec<String> =
                items.iter().filter_map(|v| str_field(v, &["name"])).collect();
            (!names.is_empty()).then(|| names.join(" / "))
        }
        other => str_field(other, &["name"]),
    }
}

fn image_from_value(value: &Value) -> Option<String> {
    match value.get("image") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(obj) => str_field(obj, &["url"]),
        None => None,
    }
}

/// 策略二：`serialized-server-data` 脚本块，形状深且随版本漂移，
/// 按键集合在整棵树里找目标对象。
fn extract_from_server_data(html: &str) -> Option<PageData> {
    let caps = SERVER_DATA_RE.captures(html)?;
    let doc = serde_json::from_str::<Value>(caps[1].trim()).ok()?;
    let item = find_object_with_keys(&doc, &["title", "artistName"])?;

    let name = str_field(item, &["title"])?;
    let artist_name = str_field(item, &["artistName"]).unwrap_or_default();
    let album_name = str_field(item, &["albumName", "collectionName"]).unwrap_or_default();
    let picture_url = find_object_with_keys(item, &["url", "width", "height"])
        .and_then(|artwork| str_field(artwork, &["url"]))
        .map(|template| fill_artwork_template(&template))
        .unwrap_or_default();

    Some(PageData {
        name,
        artist_name,
        album_name,
        picture_url: ensure_https(&picture_url),
    })
}

/// 策略三：OpenGraph 标签兜底。标题形如「晴天 - 周杰伦的歌曲」，
/// 拆不开就整个当歌名用，总好过空手而归。
fn extract_from_og_meta(html: &str) -> Option<PageData> {
    let mut title = og_meta(html, "title")?;
    if let Some(stripped) = title.strip_suffix(" - Apple Music") {
        title = stripped.to_string();
    }
    let picture_url = og_meta(html, "image").map(|u| ensure_https(&u)).unwrap_or_default();

    if let Some(caps) = OG_TITLE_SPLIT_RE.captures(&title) {
        return Some(PageData {
            name: caps[1].to_string(),
            artist_name: caps[2].to_string(),
            album_name: String::new(),
            picture_url,
        });
    }
    Some(PageData {
        name: title,
        artist_name: String::new(),
        album_name: String::new(),
        picture_url,
    })
}

/// Apple 的封面 URL 是带 `{w}x{h}` 占位符的模板，填成固定尺寸。
fn fill_artwork_template(template: &str) -> String {
    template
        .replace("{w}", "600")
        .replace("{h}", "600")
        .replace("{f}", "jpg")
        .replace("{c}", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ld_json_strategy_album_page() {
        let html = r#"<script type="application/ld+json">
        {
            "@type": "MusicAlbum",
            "name": "叶惠美",
            "byArtist": { "name": "周杰伦" },
            "image": "http://is1-ssl.mzstatic.com/image/thumb/cover.jpg"
        }
        </script>"#;
        let data = AppleMusicAdapter::extract(html).unwrap();
        assert_eq!(data.name, "叶惠美");
        assert_eq!(data.artist_name, "周杰伦");
        assert_eq!(data.album_name, "叶惠美");
        assert!(data.picture_url.starts_with("https://"));
    }

    #[test]
    fn test_broken_ld_json_falls_through_to_server_data() {
        let html = r#"
        <script type="application/ld+json">{ 这不是合法 JSON }</script>
        <script type="application/json" id="serialized-server-data">
        [{ "data": { "sections": [{ "items": [{
            "title": "晴天",
            "artistName": "周杰伦",
            "albumName": "叶惠美",
            "artwork": { "dictionary": { "url": "https://img/{w}x{h}bb.{f}", "width": 3000, "height": 3000 } }
        }] }] } }]
        </script>"#;
        let data = AppleMusicAdapter::extract(html).unwrap();
        assert_eq!(data.name, "晴天");
        assert_eq!(data.artist_name, "周杰伦");
        assert_eq!(data.album_name, "叶惠美");
        assert_eq!(data.picture_url, "https://img/600x600bb.jpg");
    }

    #[test]
    fn test_og_meta_is_last_resort() {
        let html = r#"<meta property="og:title" content="晴天 - 周杰伦的歌曲 - Apple Music"/>
        <meta property="og:image" content="http://img/cover.jpg"/>"#;
        let data = AppleMusicAdapter::extract(html).unwrap();
        assert_eq!(data.name, "晴天");
        assert_eq!(data.artist_name, "周杰伦");
        assert_eq!(data.picture_url, "https://img/cover.jpg");
    }

    #[test]
    fn test_extract_fails_when_no_strategy_matches() {
        assert!(AppleMusicAdapter::extract("<html><body>空页面</body></html>").is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_album_over_network() {
        let adapter = AppleMusicAdapter::new().unwrap();
        let link = crate::link::classify("https://music.apple.com/cn/album/1440857781").unwrap();
        let record = adapter.fetch_album(&link).await.unwrap();
        assert!(!record.album_name.is_empty());
        println!("✅ 获取专辑成功: {}", record.album_name);
    }
}
