//! 分享链接的规整与识别。
//!
//! 用户粘贴进来的往往不是一条干净的 URL，而是一整段分享文案：
//! 前后夹着宣传语、全角标点、`@用户名` 之类的噪音，链接本身还可能是
//! 平台的短链。本模块负责把这样的输入收敛成一个
//! `(平台, 内容类型, 内容 ID)` 三元组，供后续的平台适配器分发使用。

use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, Url, redirect};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::debug;

use crate::error::Result;

/// 从分享文案中捞取 URL 的通用模式。
///
/// 排除空白与常见的中英文标点，分享文案里 URL 经常紧贴着全角符号。
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s，。！？、；：“”‘’（）《》【】…<>"']+"#)
        .expect("URL 正则必然合法")
});

/// 短链解析请求的超时时间。
const SHORT_LINK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// 已知的短链域名。命中后需要先展开再分类。
const SHORTENER_HOSTS: [&str; 4] = [
    "163cn.tv",
    "spotify.link",
    "v.douyin.com",
    "qishui.douyin.com",
];

/// 支持导入的音乐平台。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Platform {
    /// 网易云音乐
    #[strum(to_string = "网易云音乐")]
    Netease,
    /// Spotify
    #[strum(to_string = "Spotify")]
    Spotify,
    /// Apple Music
    #[strum(to_string = "Apple Music")]
    AppleMusic,
    /// 汽水音乐
    #[strum(to_string = "汽水音乐")]
    Qishui,
}

/// 链接指向的内容类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ContentType {
    /// 单曲
    #[strum(to_string = "单曲")]
    Track,
    /// 专辑
    #[strum(to_string = "专辑")]
    Album,
    /// 歌单
    #[strum(to_string = "歌单")]
    Playlist,
}

/// 链接识别的结果。
///
/// 短暂存在于一次导入请求内：由本模块创建，立刻被编排器消费，不落库。
/// `url` 保留展开短链后的规范链接，抓取型适配器要回到这个页面取数据。
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    /// 所属平台。
    pub platform: Platform,
    /// 内容类型。
    pub content_type: ContentType,
    /// 平台内的内容 ID。
    pub content_id: String,
    /// 规范化后的完整链接。
    pub url: String,
}

/// 从一段分享文案中提取第一个 URL。
///
/// 找不到任何 URL 时返回修剪后的原始输入，调用方仍可尝试把它当作 ID。
pub fn extract_url(raw_text: &str) -> String {
    if let Some(m) = URL_RE.find(raw_text) {
        // 分享文案的 URL 后面常粘着半角标点，一并剥掉。
        return m.as_str().trim_end_matches([',', '.', ';', ':', '!', '?', ')']).to_string();
    }
    raw_text.trim().to_string()
}

/// 判断主机名是否属于已知短链域名。
pub(crate) fn is_shortener_host(host: &str) -> bool {
    SHORTENER_HOSTS
        .iter()
        .any(|s| host == *s || host.ends_with(&format!(".{s}")))
}

/// 构造一个禁用重定向跟随的 HTTP 客户端，专用于短链展开。
pub(crate) fn short_link_client() -> Result<Client> {
    Ok(Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(SHORT_LINK_TIMEOUT)
        .build()?)
}

/// 展开平台短链。
///
/// 读取的是重定向响应的 `Location` 头，而不是最终渲染出来的页面。
/// 短链落地页往往被前端脚本改写，`Location` 才是唯一可信的跳转目标。
/// 没有 `Location` 头或请求失败时原样返回输入，后续分类仍可尝试。
///
/// 传入的 `client` 必须已禁用重定向跟随（见 [`short_link_client`]）。
pub async fn resolve_short_link(client: &Client, url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };
    if !is_shortener_host(host) {
        return url.to_string();
    }

    match client.get(url).send().await {
        Ok(resp) => match resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            Some(location) => {
                debug!("[Link] 短链 {url} 展开为 {location}");
                location.to_string()
            }
            None => url.to_string(),
        },
        Err(e) => {
            debug!("[Link] 短链 {url} 展开失败，按原样处理: {e}");
            url.to_string()
        }
    }
}

/// 将 URL 分类为 `(平台, 内容类型, 内容 ID)`。
///
/// 平台按主机名子串匹配，从最具体的开始；每个平台内部按优先级尝试
/// 路径式、查询参数式、哈希片段式的 ID 模式。全部落空返回 `None`，
/// 调用方应把它当作"链接无法识别"的用户错误，而不是致命故障。
pub fn classify(url: &str) -> Option<ResolvedLink> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    let (platform, content_type, content_id) = if host.contains("spotify") {
        classify_spotify(url)?
    } else if host.contains("music.apple.com") {
        classify_apple(url)?
    } else if host.contains("douyin.com") {
        classify_qishui(url)?
    } else if host.contains("music.163.com") || host.contains("163cn.tv") {
        classify_netease(url)?
    } else {
        return None;
    };

    Some(ResolvedLink {
        platform,
        content_type,
        content_id,
        url: url.to_string(),
    })
}

static NETEASE_PLAYLIST_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    // 歌单链接必须先于通用分类识别，它走的是批量取详情的路径。
    [
        r"playlist\?id=(\d+)",
        r"/playlist/(\d+)",
        r"playlist\.id=(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("歌单正则必然合法"))
    .collect()
});

static NETEASE_TRACK_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"song\?id=(\d+)", r"/song/(\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("单曲正则必然合法"))
        .collect()
});

static NETEASE_ALBUM_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"album\?id=(\d+)", r"/album/(\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("专辑正则必然合法"))
        .collect()
});

/// 最后兜底的通用 `id=` 扫描。
static GENERIC_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=(\d+)").expect("id 正则必然合法"));

fn first_capture(res: &[Regex], url: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.captures(url))
        .map(|c| c[1].to_string())
}

fn classify_netease(url: &str) -> Option<(Platform, ContentType, String)> {
    if let Some(id) = first_capture(&NETEASE_PLAYLIST_RES, url) {
        return Some((Platform::Netease, ContentType::Playlist, id));
    }
    if let Some(id) = first_capture(&NETEASE_TRACK_RES, url) {
        return Some((Platform::Netease, ContentType::Track, id));
    }
    if let Some(id) = first_capture(&NETEASE_ALBUM_RES, url) {
        return Some((Platform::Netease, ContentType::Album, id));
    }
    // 各种移动端分享变体最终都会带一个 id 参数。
    GENERIC_ID_RE
        .captures(url)
        .map(|c| (Platform::Netease, ContentType::Track, c[1].to_string()))
}

static SPOTIFY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(track|album|playlist)/([A-Za-z0-9]+)").expect("Spotify 正则必然合法")
});

fn classify_spotify(url: &str) -> Option<(Platform, ContentType, String)> {
    let caps = SPOTIFY_RE.captures(url)?;
    let content_type = match &caps[1] {
        "track" => ContentType::Track,
        "album" => ContentType::Album,
        _ => ContentType::Playlist,
    };
    Some((Platform::Spotify, content_type, caps[2].to_string()))
}

static APPLE_TRACK_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]i=(\d+)").expect("Apple 单曲正则必然合法"));
static APPLE_SONG_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/song/(?:[^/]+/)?(\d+)").expect("Apple 歌曲路径正则必然合法"));
static APPLE_ALBUM_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/album/(?:[^/]+/)?(\d+)").expect("Apple 专辑正则必然合法"));

fn classify_apple(url: &str) -> Option<(Platform, ContentType, String)> {
    // 专辑页带 `?i=` 参数时指向其中一首单曲。
    if let Some(caps) = APPLE_TRACK_PARAM_RE.captures(url) {
        return Some((Platform::AppleMusic, ContentType::Track, caps[1].to_string()));
    }
    if let Some(caps) = APPLE_SONG_PATH_RE.captures(url) {
        return Some((Platform::AppleMusic, ContentType::Track, caps[1].to_string()));
    }
    APPLE_ALBUM_PATH_RE
        .captures(url)
        .map(|caps| (Platform::AppleMusic, ContentType::Album, caps[1].to_string()))
}

static QISHUI_TRACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"track_id=(\d+)").expect("汽水正则必然合法"));

fn classify_qishui(url: &str) -> Option<(Platform, ContentType, String)> {
    QISHUI_TRACK_RE
        .captures(url)
        .map(|caps| (Platform::Qishui, ContentType::Track, caps[1].to_string()))
}
