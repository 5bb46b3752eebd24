//! 歌词解析模块。
//!
//! 从网易云的歌词接口取原始 LRC 文本，剥掉每行开头的时间戳，再按
//! 规则滤掉词曲、制作、声部这类署名行，产出一行一句的纯歌词。
//! 墙上展示的是歌词片段，署名行混进去会非常扎眼。
//!
//! 约定：返回 `None` 表示"没有歌词可用"（上游无词或请求失败），
//! 与空串严格区分——空串意味着"有歌词但内容为空"，它不该出现。

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, REFERER, USER_AGENT},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    config::NeteaseSettings,
    error::{MusicWallError, Result},
    providers::{BROWSER_USER_AGENT, netease::models::AlbumResult},
};

/// 歌词与专辑查询的超时。
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// 行首的时间戳标记，可能连续出现多个（一句词对多个时间点）。
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[\d{1,2}:\d{2}(?:[.:]\d{1,3})?\]\s*)+").expect("时间戳正则必然合法")
});

/// LRC 元数据标签行，如 `[ti:歌名]`、`[ar:歌手]`。
static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[a-zA-Z]{1,8}:[^\]]*\]$").expect("标签正则必然合法"));

/// 中文署名行：已知职能关键词后跟冒号。
static CJK_CREDIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "^(?:作词|作詞|作曲|编曲|編曲|制作|製作|制作人|監製|监制|出品|企划|企劃|统筹|統籌\
         |录音|錄音|混音|母带|母帶|缩混|吉他|贝斯|貝斯|鼓|键盘|鍵盤|弦乐|弦樂|和声|和聲\
         |封面|设计|設計|发行|發行|原唱|伴奏|配唱|词|曲)\\s*[:：]",
    )
    .expect("署名正则必然合法")
});

/// 西文署名行：1–25 个字符的名字或别名后跟冒号，
/// 对付 "enno:" 这种临时标注声部的写法。
static LATIN_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9 .\-'/]{0,24}[:：]").expect("西文署名正则必然合法")
});

/// 短中文声部标签：男声、女声、合唱之类。
static CJK_ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^(?:男|女|合|男声|男聲|女声|女聲|合唱|独唱|獨唱|领唱|領唱|和音|说唱|說唱)\\s*[:：]")
        .expect("声部正则必然合法")
});

/// 专辑的第一首曲目。
#[derive(Debug, Clone)]
pub struct AlbumTrack {
    /// 歌曲 ID。
    pub id: String,
    /// 歌曲名。
    pub name: String,
}

/// 歌词响应的顶层结构。
#[derive(Debug, Deserialize)]
struct LyricResponse {
    code: i64,
    lrc: Option<LyricBody>,
    #[serde(default)]
    nolyric: bool,
}

/// 单一歌词内容。
#[derive(Debug, Deserialize)]
struct LyricBody {
    lyric: Option<String>,
}

/// 歌词解析器。内部持有自己的 HTTP 客户端与 API 基地址。
#[derive(Debug, Clone)]
pub struct LyricsResolver {
    http_client: Client,
    api_base: String,
}

impl LyricsResolver {
    /// 根据网易云配置创建解析器。
    pub fn new(settings: &NeteaseSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static("https://music.163.com"));
        let http_client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http_client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// 获取一首歌清洗后的歌词。
    ///
    /// 上游没有歌词、或请求失败时返回 `None`；歌词失败从不打断导入，
    /// 失败原因只进日志。
    pub async fn fetch_lyrics(&self, track_id: &str) -> Option<String> {
        match self.try_fetch_lyrics(track_id).await {
            Ok(lyrics) => lyrics,
            Err(e) => {
                warn!("[Lyrics] 获取歌曲 {track_id} 的歌词失败: {e}");
                None
            }
        }
    }

    async fn try_fetch_lyrics(&self, track_id: &str) -> Result<Option<String>> {
        let response = self
            .http_client
            .get(format!("{}/api/song/lyric", self.api_base))
            .query(&[("id", track_id), ("lv", "-1"), ("kv", "-1"), ("tv", "-1")])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MusicWallError::UpstreamUnavailable(format!(
                "网易云歌词接口返回 {status}"
            )));
        }
        let payload: LyricResponse = serde_json::from_str(&text)
            .map_err(|e| MusicWallError::upstream_format(format!("网易云歌词响应无法解析: {e}"), &text))?;

        if payload.code != 200 || payload.nolyric {
            return Ok(None);
        }
        let raw = match payload.lrc.and_then(|l| l.lyric).filter(|l| !l.trim().is_empty()) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let cleaned = clean_lyric_text(&raw);
        Ok((!cleaned.is_empty()).then_some(cleaned))
    }

    /// 获取一张专辑的第一首曲目。
    ///
    /// 专辑导入和历史条目的歌词回填都从这里拿主打曲目的 ID。
    /// 专辑没有曲目或请求失败时返回 `None`。
    pub async fn first_track_of_album(&self, album_id: &str) -> Option<AlbumTrack> {
        match self.try_first_track(album_id).await {
            Ok(track) => track,
            Err(e) => {
                warn!("[Lyrics] 获取专辑 {album_id} 的曲目失败: {e}");
                None
            }
        }
    }

    async fn try_first_track(&self, album_id: &str) -> Result<Option<AlbumTrack>> {
        let response = self
            .http_client
            .get(format!("{}/api/v1/album/{album_id}", self.api_base))
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MusicWallError::UpstreamUnavailable(format!(
                "网易云专辑接口返回 {status}"
            )));
        }
        let payload: AlbumResult = serde_json::from_str(&text)
            .map_err(|e| MusicWallError::upstream_format(format!("网易云专辑响应无法解析: {e}"), &text))?;
        if payload.code != 200 {
            return Ok(None);
        }

        let first = if payload.songs.is_empty() {
            payload.album.and_then(|a| a.songs.into_iter().next())
        } else {
            payload.songs.into_iter().next()
        };
        Ok(first.map(|song| AlbumTrack {
            id: song.id.to_string(),
            name: song.name,
        }))
    }
}

/// 把原始 LRC 清洗成一行一句的纯歌词。
///
/// 逐行：剥掉行首时间戳 → 丢掉空行和 `[ti:]` 类标签行 → 丢掉署名行。
pub fn clean_lyric_text(raw: &str) -> String {
    raw.lines()
        .map(|line| TIMESTAMP_RE.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .filter(|line| !META_TAG_RE.is_match(line))
        .filter(|line| !is_credit_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 该行是否是词曲/制作/声部之类的署名行。
fn is_credit_line(line: &str) -> bool {
    CJK_CREDIT_RE.is_match(line) || CJK_ROLE_RE.is_match(line) || LATIN_LABEL_RE.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_timestamp_and_keep_lyric_line() {
        assert_eq!(clean_lyric_text("[00:15.00]我曾经跨过山和大海"), "我曾经跨过山和大海");
    }

    #[test]
    fn test_credit_line_removed_with_its_timestamp() {
        let raw = "[00:12.34]作词：张三\n[00:15.00]我曾经跨过山和大海";
        assert_eq!(clean_lyric_text(raw), "我曾经跨过山和大海");
    }

    #[test]
    fn test_various_credit_forms_are_filtered() {
        let raw = "\
[00:00.00]作曲 : 李四
[00:01.00]编曲：王五
[00:02.00]enno: some ad hoc vocal label
[00:03.00]女声：啦啦啦
[00:04.00]混音: 赵六
[00:05.00]多想在平庸的生活拥抱你";
        assert_eq!(clean_lyric_text(raw), "多想在平庸的生活拥抱你");
    }

    #[test]
    fn test_repeated_timestamps_on_one_line() {
        assert_eq!(clean_lyric_text("[00:10.00][01:20.50]副歌再来一遍"), "副歌再来一遍");
    }

    #[test]
    fn test_meta_tag_lines_dropped() {
        let raw = "[ti:晴天]\n[ar:周杰伦]\n[00:31.00]故事的小黄花";
        assert_eq!(clean_lyric_text(raw), "故事的小黄花");
    }

    #[test]
    fn test_lyric_lines_with_inner_colon_survive() {
        // 冒号出现在行中而非西文署名开头时不应误杀。
        let line = "[00:40.00]她说：不如我们明天见";
        assert_eq!(clean_lyric_text(line), "她说：不如我们明天见");
    }

    #[test]
    fn test_no_lyric_field_yields_none_not_empty() {
        let payload: LyricResponse =
            serde_json::from_str(r#"{ "code": 200, "nolyric": true }"#).unwrap();
        assert!(payload.nolyric);
        let payload: LyricResponse =
            serde_json::from_str(r#"{ "code": 200, "lrc": { "lyric": null } }"#).unwrap();
        assert!(payload.lrc.unwrap().lyric.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_lyrics_over_network() {
        let resolver = LyricsResolver::new(&crate::config::NeteaseSettings {
            api_base: "https://music.163.com".into(),
            cookie: None,
        })
        .unwrap();
        let lyrics = resolver.fetch_lyrics("186016").await;
        let lyrics = lyrics.expect("晴天应当有歌词");
        assert!(lyrics.contains("故事的小黄花"));
        assert!(!lyrics.contains("作词"));
        println!("✅ 歌词共 {} 行", lyrics.lines().count());
    }
}
