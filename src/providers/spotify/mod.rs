//! Spotify 适配器。
//!
//! 唯一一个有正式令牌制 API 的平台。访问令牌用客户端凭据换取，
//! 缓存在进程内存里，带着过期时间；只在临近过期时才重新认证，
//! 避免每次调用都跑一遍认证。

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use reqwest::{Client, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    config::SpotifySettings,
    error::{MusicWallError, Result},
    link::{Platform, ResolvedLink},
    model::TrackRecord,
    providers::{BROWSER_USER_AGENT, PlatformAdapter, ensure_https, join_artist_names},
};

pub mod models;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com";

/// 单项查询的超时。
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// 临近过期的安全余量。令牌在这个余量内就当作已过期，提前换新。
const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

/// 进程内缓存的访问令牌。
#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// 在指定时刻（算上安全余量）是否仍然可用。
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(TOKEN_SAFETY_MARGIN_SECS) < self.expires_at
    }
}

/// Spotify 的适配器实现。
pub struct SpotifyAdapter {
    http_client: Client,
    settings: SpotifySettings,
    /// 令牌缓存。锁住整个刷新过程，并发刷新最坏也只是多认证一次，
    /// 绝不会把已判定过期的令牌发出去。
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyAdapter {
    /// 根据客户端凭据创建适配器。
    pub fn new(settings: SpotifySettings) -> Result<Self> {
        let http_client = Client::builder().user_agent(BROWSER_USER_AGENT).build()?;
        Ok(Self {
            http_client,
            settings,
            token: Mutex::new(None),
        })
    }

    /// 取一个可用的访问令牌，必要时重新认证。
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.is_valid_at(Utc::now())
        {
            return Ok(cached.value.clone());
        }

        info!("[Spotify] 访问令牌缺失或将要过期，重新认证");
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.settings.client_id, self.settings.client_secret
        ));
        let response = self
            .http_client
            .post(TOKEN_URL)
            .header(AUTHORIZATION, format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MusicWallError::UpstreamUnavailable(format!(
                "Spotify 认证接口返回 {status}"
            )));
        }
        let token: models::TokenResponse = serde_json::from_str(&text)
            .map_err(|e| MusicWallError::upstream_format(format!("Spotify 令牌响应无法解析: {e}"), &text))?;

        let cached = CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        };
        let value = cached.value.clone();
        *guard = Some(cached);
        Ok(value)
    }

    /// 带令牌请求一个 API 路径并解析响应。
    async fn get_api<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let token = self.access_token().await?;
        let response = self
            .http_client
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MusicWallError::UpstreamUnavailable(format!(
                "Spotify 接口 {path} 返回 {status}"
            )));
        }
        serde_json::from_str::<R>(&text)
            .map_err(|e| MusicWallError::upstream_format(format!("Spotify 返回了无法解析的数据: {e}"), &text))
    }

    fn first_image(images: &[models::Image]) -> String {
        images.first().map(|i| ensure_https(&i.url)).unwrap_or_default()
    }
}

#[async_trait]
impl PlatformAdapter for SpotifyAdapter {
    fn platform(&self) -> Platform {
        Platform::Spotify
    }

    async fn fetch_track(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let track: models::Track = self.get_api(&format!("/v1/tracks/{}", link.content_id)).await?;
        if track.name.is_empty() {
            return Err(MusicWallError::upstream_format(
                format!("Spotify 没有返回 ID 为 {} 的歌曲", link.content_id),
                "",
            ));
        }
        let album = track.album.unwrap_or_default();
        Ok(TrackRecord {
            name: track.name,
            artist_name: join_artist_names(track.artists.iter().map(|a| a.name.as_str())),
            album_name: album.name.clone(),
            picture_url: Self::first_image(&album.images),
            platform_track_id: Some(link.content_id.clone()),
            original_link: Some(link.url.clone()),
        })
    }

    async fn fetch_album(&self, link: &ResolvedLink) -> Result<TrackRecord> {
        let album: models::Album = self.get_api(&format!("/v1/albums/{}", link.content_id)).await?;
        if album.name.is_empty() {
            return Err(MusicWallError::upstream_format(
                format!("Spotify 没有返回 ID 为 {} 的专辑", link.content_id),
                "",
            ));
        }
        let first = album.tracks.as_ref().and_then(|t| t.items.first());
        Ok(TrackRecord {
            name: first.map(|t| t.name.clone()).unwrap_or_else(|| album.name.clone()),
            artist_name: join_artist_names(album.artists.iter().map(|a| a.name.as_str())),
            album_name: album.name.clone(),
            picture_url: Self::first_image(&album.images),
            platform_track_id: first.map(|t| t.id.clone()).filter(|id| !id.is_empty()),
            original_link: Some(link.url.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_expiry_margin() {
        let now = Utc::now();
        let fresh = CachedToken {
            value: "t".into(),
            expires_at: now + chrono::Duration::seconds(3600),
        };
        assert!(fresh.is_valid_at(now));

        // 还剩 30 秒，小于 60 秒安全余量，应视为过期。
        let nearly_expired = CachedToken {
            value: "t".into(),
            expires_at: now + chrono::Duration::seconds(30),
        };
        assert!(!nearly_expired.is_valid_at(now));
    }

    #[test]
    fn test_track_model_maps_to_record_shape() {
        let track: models::Track = serde_json::from_str(
            r#"{
                "name": "Viva La Vida",
                "artists": [{ "name": "Coldplay" }],
                "album": {
                    "name": "Viva la Vida or Death and All His Friends",
                    "images": [{ "url": "http://i.scdn.co/image/abc" }]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(track.name, "Viva La Vida");
        assert_eq!(
            SpotifyAdapter::first_image(&track.album.unwrap().images),
            "https://i.scdn.co/image/abc"
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_track_over_network() {
        let settings = crate::config::Settings::from_env()
            .spotify
            .expect("需要配置 Spotify 凭据");
        let adapter = SpotifyAdapter::new(settings).unwrap();
        let link = crate::link::classify("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
            .unwrap();
        let record = adapter.fetch_track(&link).await.unwrap();
        assert!(!record.name.is_empty());
        println!("✅ 获取单曲成功: {} - {}", record.name, record.artist_name);
    }
}
