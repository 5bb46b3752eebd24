//! 网易云音乐适配器。
//!
//! 走的是旧版 Web JSON API（`/api/song/detail`、`/api/v1/album/:id`、
//! `/api/v6/playlist/detail`、`/api/v3/song/detail`），带浏览器 UA
//! 即可访问，不需要加密参数。歌单导入先取完整的曲目 ID 列表，再
//! 分块批量取详情，最后按歌单顺序拼回去。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{
    Client,
    header::{COOKIE, HeaderMap, HeaderValue, REFERER, USER_AGENT},
};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{
    config::NeteaseSettings,
    error::{MusicWallError, Result},
    link::{Platform, ResolvedLink},
    model::TrackRecord,
    providers::{BROWSER_USER_AGENT, PlatformAdapter, ensure_https, join_artist_names},
};

pub mod models;

/// 单曲查询的超时。
const SINGLE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// 歌单、专辑这类批量拉取的超时。上游冷启动时延迟能到好几秒。
const BATCH_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// 批量取详情时每块的 ID 数上限，避免把请求撑爆。
const DETAIL_CHUNK_SIZE: usize = 50;
/// 同时在途的详情块数。
const CHUNK_CONCURRENCY: usize = 4;

/// 网易云音乐的适配器实现。
#[derive(Debug, Clone)]
pub struct NeteaseAdapter {
    http_client: Client,
    api_base: String,
}

impl NeteaseAdapter {
    /// 根据配置创建适配器。
    pub fn new(settings: &NeteaseSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static("https://music.163.com"));
        if let Some(cookie) = &settings.cookie {
            let value = cookie.parse::<HeaderValue>().map_err(|e| {
                MusicWallError::Internal(format!("无法解析网易云 Cookie 配置: {e}"))
            })?;
            headers.insert(COOKIE, value);
        }

        let http_client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http_client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// 发送请求并在非 2xx 时直接报不可用，成功时返回响应体文本。
    async fn fetch_text(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MusicWallError::UpstreamUnavailable(format!(
                "网易云接口返回 {status}"
            )));
        }
        Ok(text)
    }

    /// 解析响应体；失败时附带截断的原文片段，方便诊断上游改版。
    fn parse_payload<R: DeserializeOwned>(&self, text: &str) -> Result<R> {
        serde_json::from_str::<R>(text)
            .map_err(|e| MusicWallError::upstream_format(format!("网易云返回了无法解析的数据: {e}"), text))
    }

    /// 按 ID 批量获取歌曲详情，输入顺序不保证保留。
    async fn song_detail(&self, ids: &[i64]) -> Result<Vec<models::Song>> {
        let c_param = serde_json::to_string(
            &ids.iter().map(|id| serde_json::json!({ "id": id })).collect::<Vec<_>>(),
        )?;
        let text = self
            .fetch_text(
                self.http_client
                    .post(format!("{}/api/v3/song/detail", self.api_base))
                    .form(&[("c", c_param)])
                    .timeout(BATCH_FETCH_TIMEOUT),
            )
            .await?;
        let result: models::SongDetailResult = self.parse_payload(&text)?;
        if result.code != 200 {
            return Err(MusicWallError::upstream_format(
                format!("网易云歌曲详情接口返回 code {}", result.code),
                &text,
            ));
        }
        Ok(result.songs)
    }

    /// 获取专辑详情（含曲目列表）。
    async fn album_detail(&self, album_id: &str) -> Result<(models::NeteaseAlbum, Vec<models::Song>)> {
        let text = self
            .fetch_text(
                self.http_client
                    .get(format!("{}/api/v1/album/{album_id}", self.api_base))
                    .timeout(BATCH_FETCH_TIMEOUT),
            )
            .await?;
        let result: models::AlbumResult = self.parse_payload(&text)?;
        if result.code != 200 {
            return Err(MusicWallError::upstream_format(
                format!("网易云专辑接口返回 code {}", result.code),
                &text,
            ));
        }
        let album = result.album.ok_or_else(|| {
            MusicWallError::upstream_format("网易云专辑响应缺少 album 字段", &text)
        })?;
        // 曲目列表的位置随接口版本漂移，两处都看。
        let songs = if result.songs.is_empty() {
            album.songs.clone()
        } else {
            result.songs
        };
        Ok((album, songs))
    }

    fn song_to_record(song: &models::Song, original_link: Option<String>) -> TrackRecord {
        TrackRecord {
            name: song.name.clone(),
            artist_name: join_artist_names(song.artists.iter().map(|a| a.name.as_str())),
            album_name: song.album.as_ref().map(|a| a.name.clone()).unwrap_or_default(),
            picture_url: song
                .album
                .as_ref()
                .and_then(|a| a.pic_url.as_deref())
                .map(ensure_https)
                .unwrap_or_default(),
            platform_track_id: Some(song.id.to_string()),
            original_link,
        }
    }

    /// 把各详情块的结果收进一张按 ID 索引的表。
    ///
    /// 失败的块只损失自己那一段曲目，不拖垮整个歌单导入。
    fn collect_chunk_results(
        chunk_results: Vec<(usize, Result<Vec<models::Song>>)>,
    ) -> HashMap<i64, models::Song> {
        let mut by_id = HashMap::new();
        for (chunk_index, result) in chunk_results {
            match result {
                Ok(songs) => {
                    for song in songs {
                        by_id.insert(song.id, song);
                    }
                }
                Err(e) => {
                    warn!("[Netease] 歌单详情第 {} 块拉取失败，跳过该块: {e}", chunk_index + 1);
                }
            }
        }
        by_id
    }

    /// 按歌单原始顺序把详情拼回去，缺详情的 ID 直接丢弃。
    fn join_in_order(ordered_ids: &[i64], mut by_id: HashMap<i64, models::Song>) -> Vec<TrackRecord> {
        ordered_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|song| {
                let song_link = format!("https://music.163.com/song?id={}", song.id);
                Self::song_to_record(&song, Some(song_link))
            })
            .collect()
    }
}

#[async_trait]
impl PlatformAdapter for NeteaseAdapter {
    fn platform(&self) -> Platform {
        Platform::Netease
    }

    async fn fetch_track(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let text = self
            .fetch_text(
                self.http_client
                    .get(format!("{}/api/song/detail", self.api_base))
                    .query(&[("ids", format!("[{}]", link.content_id))])
                    .timeout(SINGLE_FETCH_TIMEOUT),
            )
            .await?;
        let result: models::SongDetailResult = self.parse_payload(&text)?;
        if result.code != 200 || result.songs.is_empty() {
            return Err(MusicWallError::upstream_format(
                format!("网易云没有返回 ID 为 {} 的歌曲", link.content_id),
                &text,
            ));
        }
        Ok(Self::song_to_record(&result.songs[0], Some(link.url.clone())))
    }

    /// 专辑导入取主打曲目：专辑元数据加第一首歌的 ID。
    ///
    /// 歌词解析会顺着这个 ID 把主打歌词一并取下来。
    async fn fetch_album(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let (album, songs) = self.album_detail(&link.content_id).await?;
        let first = songs.first();

        let artist_name = if album.artists.is_empty() {
            first
                .map(|s| join_artist_names(s.artists.iter().map(|a| a.name.as_str())))
                .unwrap_or_default()
        } else {
            join_artist_names(album.artists.iter().map(|a| a.name.as_str()))
        };

        Ok(TrackRecord {
            name: first.map(|s| s.name.clone()).unwrap_or_else(|| album.name.clone()),
            artist_name,
            album_name: album.name.clone(),
            picture_url: album.pic_url.as_deref().map(ensure_https).unwrap_or_default(),
            platform_track_id: first.map(|s| s.id.to_string()),
            original_link: Some(link.url.clone()),
        })
    }

    async fn fetch_playlist(&self, link: &ResolvedLink) -> Result<Vec<TrackRecord>> {
        let text = self
            .fetch_text(
                self.http_client
                    .get(format!("{}/api/v6/playlist/detail", self.api_base))
                    .query(&[("id", link.content_id.as_str()), ("n", "100000")])
                    .timeout(BATCH_FETCH_TIMEOUT),
            )
            .await?;
        let result: models::PlaylistResult = self.parse_payload(&text)?;
        if result.code != 200 {
            return Err(MusicWallError::upstream_format(
                format!("网易云歌单接口返回 code {}", result.code),
                &text,
            ));
        }
        let playlist = result.playlist.ok_or_else(|| {
            MusicWallError::upstream_format("网易云歌单响应缺少 playlist 字段", &text)
        })?;

        let ordered_ids: Vec<i64> = playlist.track_ids.iter().map(|t| t.id).collect();
        info!(
            "[Netease] 歌单 '{}' 共 {} 首，分 {} 块拉取详情",
            playlist.name,
            ordered_ids.len(),
            ordered_ids.len().div_ceil(DETAIL_CHUNK_SIZE),
        );

        let chunks: Vec<(usize, Vec<i64>)> = ordered_ids
            .chunks(DETAIL_CHUNK_SIZE)
            .enumerate()
            .map(|(index, chunk)| (index, chunk.to_vec()))
            .collect();
        let chunk_results: Vec<(usize, Result<Vec<models::Song>>)> =
            stream::iter(chunks.into_iter().map(
                |(index, chunk)| async move { (index, self.song_detail(&chunk).await) },
            ))
            .buffer_unordered(CHUNK_CONCURRENCY)
            .collect()
            .await;

        let by_id = Self::collect_chunk_results(chunk_results);
        Ok(Self::join_in_order(&ordered_ids, by_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ContentType, classify};

    fn song(id: i64, name: &str) -> models::Song {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "ar": [{ "name": "测试歌手" }],
            "al": { "name": "测试专辑", "picUrl": "http://p1.music.126.net/c.jpg" },
        }))
        .unwrap()
    }

    #[test]
    fn test_song_models_accept_both_key_spellings() {
        let old_style: models::Song = serde_json::from_value(serde_json::json!({
            "id": 186016,
            "name": "晴天",
            "artists": [{ "name": "周杰伦" }],
            "album": { "name": "叶惠美", "picUrl": "http://p1.music.126.net/yhm.jpg" },
        }))
        .unwrap();
        assert_eq!(old_style.artists[0].name, "周杰伦");
        assert_eq!(old_style.album.as_ref().unwrap().name, "叶惠美");

        let new_style = song(186016, "晴天");
        assert_eq!(new_style.artists[0].name, "测试歌手");
    }

    #[test]
    fn test_song_to_record_normalizes_picture_scheme() {
        let record = NeteaseAdapter::song_to_record(&song(1, "歌"), None);
        assert!(record.picture_url.starts_with("https://"));
        assert_eq!(record.platform_track_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_failed_chunk_drops_only_its_own_tracks() {
        // 三块各 2 首，第 2 块失败，应剩下第 1、3 块的 4 首。
        let ordered: Vec<i64> = vec![1, 2, 3, 4, 5, 6];
        let chunk_results = vec![
            (0, Ok(vec![song(1, "一"), song(2, "二")])),
            (
                1,
                Err(MusicWallError::UpstreamUnavailable("模拟超时".into())),
            ),
            (2, Ok(vec![song(5, "五"), song(6, "六")])),
        ];
        let by_id = NeteaseAdapter::collect_chunk_results(chunk_results);
        let records = NeteaseAdapter::join_in_order(&ordered, by_id);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].name, "一");
        assert_eq!(records[3].name, "六");
    }

    #[test]
    fn test_join_preserves_playlist_order() {
        let ordered: Vec<i64> = vec![3, 1, 2];
        let mut by_id = HashMap::new();
        for s in [song(1, "一"), song(2, "二"), song(3, "三")] {
            by_id.insert(s.id, s);
        }
        let records = NeteaseAdapter::join_in_order(&ordered, by_id);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["三", "一", "二"]);
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_track_over_network() {
        let adapter = NeteaseAdapter::new(&crate::config::NeteaseSettings {
            api_base: "https://music.163.com".into(),
            cookie: None,
        })
        .unwrap();
        let link = classify("https://music.163.com/song?id=186016").unwrap();
        assert_eq!(link.content_type, ContentType::Track);
        let record = adapter.fetch_track(&link).await.unwrap();
        assert_eq!(record.name, "晴天");
        println!("✅ 获取单曲成功: {} - {}", record.name, record.artist_name);
    }
}
