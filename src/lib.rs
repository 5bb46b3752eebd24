#![warn(missing_docs)]

//! # Music Wall RS
//!
//! 一个把流媒体分享链接变成"专辑墙"素材的 Rust 库：解析各平台的
//! 分享链接，拉取歌曲/专辑/歌单的元数据与歌词，归一成统一的记录
//! 形状落库，并在读取侧聚合出收录次数最高的专辑榜单。
//!
//! ## 主要功能
//!
//! - **链接识别**: 从分享文案里提取 URL，展开短链，识别平台与内容类型。
//! - **多平台导入**: 网易云音乐（单曲/专辑/歌单）、Spotify（单曲/专辑）、
//!   Apple Music（单曲/专辑，页面抓取）、汽水音乐（单曲，页面抓取）。
//! - **歌词清洗**: 剥时间戳、滤署名行，产出一行一句的纯歌词。
//! - **聚合榜单**: 专辑/艺术家名做简繁折叠后分组计数，空艺术家的组
//!   会被并进同专辑的非空组。
//!
//! ## 导入一条分享链接
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use music_wall_rs::{MusicWall, store::{MemoryStore, StaticIdentity}};
//!
//! async {
//!     let store = Arc::new(MemoryStore::new());
//!     let identity = Arc::new(StaticIdentity::new("user-1"));
//!     let wall = MusicWall::from_env(store, identity).unwrap();
//!
//!     let raw = "分享小蓝背心的单曲《明天见》: https://music.163.com/song?id=2116402049";
//!     match wall.resolve_and_import(raw, "my-wall").await {
//!         Ok(outcome) => println!("导入成功 {} 首。", outcome.imported_count),
//!         Err(e) => eprintln!("导入失败: {e}"),
//!     }
//!
//!     let top = wall.aggregate_top_albums(10).await.unwrap();
//!     println!("榜单共 {} 组。", top.len());
//! };
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod import;
pub mod link;
pub mod lyrics;
pub mod model;
pub mod normalizer;
pub mod providers;
pub mod store;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{info, warn};

pub use crate::{
    error::{MusicWallError, Result},
    import::ImportOutcome,
    link::{ContentType, Platform, ResolvedLink},
    model::{AggregateRecord, TrackRecord},
};

use crate::{
    config::Settings,
    link::{classify, extract_url, resolve_short_link},
    lyrics::LyricsResolver,
    model::{NewTrack, TrackFilter, TrackPatch},
    providers::{
        PlatformAdapter, apple::AppleMusicAdapter, netease::NeteaseAdapter,
        qishui::QishuiAdapter, spotify::SpotifyAdapter,
    },
    store::{Identity, TrackStore},
};

/// 批量导入时同时在途的歌词请求数。
const LYRIC_CONCURRENCY: usize = 4;

// ==========================================================
//  顶层 API
// ==========================================================

/// 顶层导入客户端，封装了所有平台适配器和协作方，
/// 为调用方（页面层）提供统一、简单的接口。
///
/// 这是与本库交互的主要入口点。
pub struct MusicWall {
    adapters: Vec<Box<dyn PlatformAdapter>>,
    lyrics: LyricsResolver,
    store: Arc<dyn TrackStore>,
    identity: Arc<dyn Identity>,
    short_link_client: Client,
}

impl MusicWall {
    /// 按环境变量配置创建实例（见 [`config::Settings::from_env`]）。
    pub fn from_env(store: Arc<dyn TrackStore>, identity: Arc<dyn Identity>) -> Result<Self> {
        Self::with_settings(Settings::from_env(), store, identity)
    }

    /// 按给定配置创建实例，注册所有配置齐全的平台适配器。
    pub fn with_settings(
        settings: Settings,
        store: Arc<dyn TrackStore>,
        identity: Arc<dyn Identity>,
    ) -> Result<Self> {
        let mut adapters: Vec<Box<dyn PlatformAdapter>> = vec![
            Box::new(NeteaseAdapter::new(&settings.netease)?),
            Box::new(AppleMusicAdapter::new()?),
            Box::new(QishuiAdapter::new()?),
        ];
        if let Some(spotify) = settings.spotify.clone() {
            adapters.push(Box::new(SpotifyAdapter::new(spotify)?));
        }

        Ok(Self {
            adapters,
            lyrics: LyricsResolver::new(&settings.netease)?,
            store,
            identity,
            short_link_client: link::short_link_client()?,
        })
    }

    fn adapter_for(&self, platform: Platform) -> Result<&dyn PlatformAdapter> {
        self.adapters
            .iter()
            .find(|a| a.platform() == platform)
            .map(|a| a.as_ref())
            .ok_or_else(|| MusicWallError::NotConfigured(platform.to_string()))
    }

    /// 解析一段分享文案或链接并把得到的曲目导入指定分类。
    ///
    /// 链接识别失败、内容类型不受支持是硬失败；批量导入（歌单）里
    /// 单条曲目的失败只计入部分成功，不会让整批失败。单曲/专辑这类
    /// 单项导入的失败原样上抛。
    pub async fn resolve_and_import(
        &self,
        raw_input: &str,
        category_id: &str,
    ) -> Result<ImportOutcome> {
        let url = extract_url(raw_input);
        let url = resolve_short_link(&self.short_link_client, &url).await;
        let resolved = classify(&url)
            .ok_or_else(|| MusicWallError::UnrecognizedLink(error::truncate_snippet(raw_input)))?;
        info!(
            "[Import] 识别为 {} 的{}，ID {}",
            resolved.platform, resolved.content_type, resolved.content_id,
        );

        let adapter = self.adapter_for(resolved.platform)?;
        let records = match resolved.content_type {
            ContentType::Track => vec![adapter.fetch_track(&resolved).await?],
            ContentType::Album => vec![adapter.fetch_album(&resolved).await?],
            ContentType::Playlist => adapter.fetch_playlist(&resolved).await?,
        };
        let is_batch = resolved.content_type == ContentType::Playlist;

        // 歌词按曲目并发取，失败不阻塞导入。词源目前只有网易云。
        let lyrics_list: Vec<Option<String>> = stream::iter(records.iter().map(|record| {
            let resolver = &self.lyrics;
            let platform = resolved.platform;
            async move {
                match (platform, &record.platform_track_id) {
                    (Platform::Netease, Some(id)) => resolver.fetch_lyrics(id).await,
                    _ => None,
                }
            }
        }))
        .buffered(LYRIC_CONCURRENCY)
        .collect()
        .await;

        let user_id = self.identity.current_user_id();
        let mut outcome = ImportOutcome::default();
        let mut failed = 0usize;
        for (record, lyrics) in records.into_iter().zip(lyrics_list) {
            let name = record.name.clone();
            let new_track = NewTrack {
                record,
                lyrics,
                platform: resolved.platform,
                category_id: category_id.to_string(),
                user_id: user_id.clone(),
            };
            match import::create_with_retry(self.store.as_ref(), new_track).await {
                Ok(stored) => outcome.track_ids.push(stored.id),
                Err(e) if is_batch => {
                    failed += 1;
                    warn!("[Import] 曲目 '{name}' 落库失败，跳过: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        outcome.imported_count = outcome.track_ids.len();
        if failed > 0 {
            info!(
                "[Import] 本次导入成功 {} 首，失败 {failed} 首",
                outcome.imported_count,
            );
        }
        Ok(outcome)
    }

    /// 给缺歌词的历史条目回填歌词，返回补上的条数。
    ///
    /// 只处理网易云来源的条目；没有曲目 ID 的条目会重新识别它的
    /// 原始链接，专辑链接则取专辑第一首。单条失败跳过，不中断。
    pub async fn backfill_lyrics(&self, category_id: Option<&str>) -> Result<u64> {
        let tracks = self
            .store
            .find_many(TrackFilter {
                category_id: category_id.map(str::to_string),
                platform: Some(Platform::Netease),
                missing_lyrics: Some(true),
                ..Default::default()
            })
            .await?;
        info!("[Backfill] 共 {} 条缺歌词的条目待处理", tracks.len());

        let mut patched = 0u64;
        for track in tracks {
            let track_id = match &track.record.platform_track_id {
                Some(id) => Some(id.clone()),
                None => match track.record.original_link.as_deref().and_then(classify) {
                    Some(l) if l.content_type == ContentType::Track => Some(l.content_id),
                    Some(l) if l.content_type == ContentType::Album => self
                        .lyrics
                        .first_track_of_album(&l.content_id)
                        .await
                        .map(|t| t.id),
                    _ => None,
                },
            };
            let Some(track_id) = track_id else {
                continue;
            };
            if let Some(lyrics) = self.lyrics.fetch_lyrics(&track_id).await {
                patched += self
                    .store
                    .update_many(
                        TrackFilter {
                            id: Some(track.id),
                            ..Default::default()
                        },
                        TrackPatch { lyrics: Some(lyrics) },
                    )
                    .await?;
            }
        }
        info!("[Backfill] 本次补上 {patched} 条歌词");
        Ok(patched)
    }

    /// 计算收录次数最多的专辑榜单（见 [`aggregate::aggregate_top_albums`]）。
    pub async fn aggregate_top_albums(&self, limit: usize) -> Result<Vec<AggregateRecord>> {
        aggregate::aggregate_top_albums(self.store.as_ref(), limit).await
    }
}
