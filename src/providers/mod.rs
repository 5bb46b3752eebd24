//! 平台适配器模块
//!
//! 该模块定义了各音乐平台适配器需要实现的通用接口，以及抓取型
//! 适配器共用的页面提取工具。

use async_trait::async_trait;
use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::{MusicWallError, Result},
    link::{ContentType, Platform, ResolvedLink},
    model::TrackRecord,
};

pub mod apple;
pub mod netease;
pub mod qishui;
pub mod spotify;

/// 桌面浏览器 User-Agent。
///
/// 多个上游会拒绝非浏览器客户端，或只给它们降级的内容。
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// 定义了所有音乐平台适配器需要实现的通用接口。
///
/// 每个适配器负责从自己的平台拉取原始数据（JSON API 或页面抓取），
/// 并映射成统一的 [`TrackRecord`]。各平台上游的脆弱格式由适配器
/// 自行兜底，不外泄到编排层。
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// 返回适配器对应的平台。
    fn platform(&self) -> Platform;

    /// 获取单曲的元数据。
    async fn fetch_track(&self, link: &ResolvedLink) -> Result<TrackRecord>;

    /// 获取专辑的代表曲目。
    ///
    /// 专辑导入的语义是"导入这张专辑的主打（第一首）曲目"，
    /// 所以返回单条记录而不是整张专辑的曲目列表。
    async fn fetch_album(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let _ = link;
        Err(MusicWallError::UnsupportedContentType {
            platform: self.platform(),
            content_type: ContentType::Album,
        })
    }

    /// 获取歌单的全部曲目。
    ///
    /// 只有支持批量导入的平台会覆写；默认返回明确的"不支持"错误，
    /// 而不是含糊的通用失败。
    async fn fetch_playlist(&self, link: &ResolvedLink) -> Result<Vec<TrackRecord>> {
        let _ = link;
        Err(MusicWallError::UnsupportedContentType {
            platform: self.platform(),
            content_type: ContentType::Playlist,
        })
    }
}

/// 将上游返回的图片链接统一升级为 `https://`。
pub(crate) fn ensure_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// 把多位艺术家的名字拼成一个展示串。
pub(crate) fn join_artist_names<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}

// ==========================================================
//  抓取型适配器共用的页面提取工具
// ==========================================================

static OG_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]+property="og:([a-z:_]+)"[^>]+content="([^"]*)""#)
        .expect("og meta 正则必然合法")
});

/// 从页面 HTML 中提取一个 OpenGraph 属性的值。
pub(crate) fn og_meta(html: &str, property: &str) -> Option<String> {
    OG_META_RE
        .captures_iter(html)
        .find(|caps| &caps[1] == property)
        .map(|caps| html_unescape(&caps[2]))
        .filter(|v| !v.is_empty())
}

/// 还原 HTML 属性值里最常见的几个实体。
pub(crate) fn html_unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// 在一棵任意形状的 JSON 里寻找第一个同时带有指定键的对象。
///
/// 抓下来的页面数据层级深且会随上游改版移动位置，按键集合找对象
/// 比按固定路径取值耐改得多。深度优先，命中即返回。
pub(crate) fn find_object_with_keys<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if keys.iter().all(|k| map.contains_key(*k)) {
                return Some(value);
            }
            map.values().find_map(|v| find_object_with_keys(v, keys))
        }
        Value::Array(items) => items.iter().find_map(|v| find_object_with_keys(v, keys)),
        _ => None,
    }
}

/// 依次尝试对象上的多个候选键，返回第一个非空字符串值。
///
/// 同一个字段在上游不同版本里出现过不同的拼写。
pub(crate) fn str_field(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|k| value.get(*k))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ensure_https_upgrades_bare_http() {
        assert_eq!(
            ensure_https("http://p1.music.126.net/cover.jpg"),
            "https://p1.music.126.net/cover.jpg"
        );
        assert_eq!(
            ensure_https("https://p1.music.126.net/cover.jpg"),
            "https://p1.music.126.net/cover.jpg"
        );
    }

    #[test]
    fn test_join_artist_names_skips_blanks() {
        assert_eq!(join_artist_names(["周杰伦", "", " 方文山 "]), "周杰伦 / 方文山");
    }

    #[test]
    fn test_og_meta_extraction() {
        let html = r#"<head>
            <meta property="og:title" content="明天见 - 小蓝背心"/>
            <meta property="og:image" content="https://img.example.com/a.jpg"/>
        </head>"#;
        assert_eq!(og_meta(html, "title").as_deref(), Some("明天见 - 小蓝背心"));
        assert_eq!(
            og_meta(html, "image").as_deref(),
            Some("https://img.example.com/a.jpg")
        );
        assert!(og_meta(html, "description").is_none());
    }

    #[test]
    fn test_find_object_with_keys_walks_nested_shapes() {
        let doc = json!({
            "loaderData": {
                "track_page": {
                    "audioWithLyricsOption": {
                        "trackName": "歌名",
                        "artistName": "歌手"
                    }
                }
            }
        });
        let found = find_object_with_keys(&doc, &["trackName", "artistName"]).unwrap();
        assert_eq!(found["trackName"], "歌名");
        assert!(find_object_with_keys(&doc, &["没有这个键"]).is_none());
    }

    #[test]
    fn test_str_field_tries_spelling_variants() {
        let obj = json!({ "coverURL": "https://img/c.jpg" });
        assert_eq!(
            str_field(&obj, &["coverUrl", "coverURL", "cover_url"]).as_deref(),
            Some("https://img/c.jpg")
        );
    }
}
