//! 存储、身份与图片存储协作方的接口。
//!
//! 这些能力都由外部系统提供，这里只定义本库消费的接口形状。
//! 存储实现必须把"暂时连不上"（可重试）与"操作本身失败"
//! （不可重试）区分成不同的错误类别，重试策略依赖这个区分。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::Result,
    model::{NewTrack, ReviewStats, StoredTrack, TrackFilter, TrackPatch},
};

/// 歌曲条目的存储接口。条目以不透明字符串 ID 为键。
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// 写入一条新条目，返回落库后的完整条目（含分配的 ID）。
    async fn create(&self, track: NewTrack) -> Result<StoredTrack>;

    /// 按过滤条件批量更新，返回受影响的条数。
    async fn update_many(&self, filter: TrackFilter, patch: TrackPatch) -> Result<u64>;

    /// 按过滤条件查询全部匹配条目。
    async fn find_many(&self, filter: TrackFilter) -> Result<Vec<StoredTrack>>;

    /// 按过滤条件查询第一条匹配条目。
    async fn find_first(&self, filter: TrackFilter) -> Result<Option<StoredTrack>>;

    /// 按原始专辑名/艺术家名查询评价统计。
    ///
    /// 键是精确字符串：归一化键只用于分组，从不用来查库。
    async fn review_stats(&self, album_name: &str, artist_name: &str)
    -> Result<Option<ReviewStats>>;
}

/// 已认证用户的身份查询。
pub trait Identity: Send + Sync {
    /// 当前用户 ID，未登录时为 `None`。
    fn current_user_id(&self) -> Option<String>;
}

/// 二进制图片存储，导出海报的渲染层会用到。
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 保存一段字节，返回可公开访问的 URL。
    async fn save(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String>;
}

/// 固定身份的实现，方便测试和单用户场景。
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    /// 创建一个始终返回指定用户 ID 的身份实现。
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// 创建一个匿名身份。
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// `TrackStore` 的内存实现，供测试与本地开发使用。
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tracks: Vec<StoredTrack>,
    reviews: HashMap<(String, String), ReviewStats>,
    next_id: u64,
}

impl MemoryStore {
    /// 创建一个空的内存存储。
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一条评价统计，键是原始专辑名/艺术家名。
    pub async fn put_review_stats(&self, album_name: &str, artist_name: &str, stats: ReviewStats) {
        let mut inner = self.inner.write().await;
        inner
            .reviews
            .insert((album_name.to_string(), artist_name.to_string()), stats);
    }
}

fn matches(filter: &TrackFilter, track: &StoredTrack) -> bool {
    if let Some(id) = &filter.id
        && &track.id != id
    {
        return false;
    }
    if let Some(category_id) = &filter.category_id
        && &track.category_id != category_id
    {
        return false;
    }
    if let Some(album_name) = &filter.album_name
        && &track.record.album_name != album_name
    {
        return false;
    }
    if let Some(artist_name) = &filter.artist_name
        && &track.record.artist_name != artist_name
    {
        return false;
    }
    if let Some(platform) = filter.platform
        && track.platform != platform
    {
        return false;
    }
    if let Some(missing) = filter.missing_lyrics
        && track.lyrics.is_none() != missing
    {
        return false;
    }
    true
}

#[async_trait]
impl TrackStore for MemoryStore {
    async fn create(&self, track: NewTrack) -> Result<StoredTrack> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let stored = StoredTrack {
            id: format!("t{}", inner.next_id),
            record: track.record,
            lyrics: track.lyrics,
            platform: track.platform,
            category_id: track.category_id,
            user_id: track.user_id,
        };
        inner.tracks.push(stored.clone());
        Ok(stored)
    }

    async fn update_many(&self, filter: TrackFilter, patch: TrackPatch) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut updated = 0;
        for track in inner.tracks.iter_mut() {
            if matches(&filter, track) {
                if let Some(lyrics) = &patch.lyrics {
                    track.lyrics = Some(lyrics.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn find_many(&self, filter: TrackFilter) -> Result<Vec<StoredTrack>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tracks
            .iter()
            .filter(|t| matches(&filter, t))
            .cloned()
            .collect())
    }

    async fn find_first(&self, filter: TrackFilter) -> Result<Option<StoredTrack>> {
        let inner = self.inner.read().await;
        Ok(inner.tracks.iter().find(|t| matches(&filter, t)).cloned())
    }

    async fn review_stats(
        &self,
        album_name: &str,
        artist_name: &str,
    ) -> Result<Option<ReviewStats>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .get(&(album_name.to_string(), artist_name.to_string()))
            .copied())
    }
}
