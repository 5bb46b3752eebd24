//! 歌曲记录模型：适配器的统一产出形状，以及与存储协作方交换的结构。

use serde::{Deserialize, Serialize};

use crate::link::Platform;

/// 所有平台适配器的统一产出形状。
///
/// 每次适配器调用都会新建一份，创建后不再修改；在交给存储之前
/// 一直归发起调用的一方所有。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    /// 歌曲名。
    pub name: String,
    /// 艺术家名。多位艺术家拼成一个展示串，例如 "A / B"。
    pub artist_name: String,
    /// 专辑名。
    pub album_name: String,
    /// 封面图片 URL，统一升级为 `https://`。
    pub picture_url: String,
    /// 歌曲在其平台内的 ID。抓取型平台可能拿不到，允许为空。
    pub platform_track_id: Option<String>,
    /// 产生这条记录的原始链接。
    pub original_link: Option<String>,
}

/// 待写入存储的完整条目：适配器产出的元数据，加上歌词与归属信息。
///
/// 元数据和歌词在同一次写入中落库，读者不会看到二者不一致的中间态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrack {
    /// 歌曲元数据。
    pub record: TrackRecord,
    /// 歌词文本。`None` 表示没有歌词可用，区别于空串。
    pub lyrics: Option<String>,
    /// 记录来源平台。
    pub platform: Platform,
    /// 所属分类（墙）的 ID。
    pub category_id: String,
    /// 导入者的用户 ID。
    pub user_id: Option<String>,
}

/// 存储返回的已落库条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTrack {
    /// 存储分配的不透明 ID。
    pub id: String,
    /// 歌曲元数据。
    pub record: TrackRecord,
    /// 歌词文本。
    pub lyrics: Option<String>,
    /// 记录来源平台。
    pub platform: Platform,
    /// 所属分类的 ID。
    pub category_id: String,
    /// 导入者的用户 ID。
    pub user_id: Option<String>,
}

/// 存储查询的过滤条件。所有字段按与逻辑组合，`None` 表示不限。
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    /// 按条目 ID 精确匹配。
    pub id: Option<String>,
    /// 按分类 ID 精确匹配。
    pub category_id: Option<String>,
    /// 按专辑名精确匹配（原始字符串，不做归一化）。
    pub album_name: Option<String>,
    /// 按艺术家名精确匹配（原始字符串，不做归一化）。
    pub artist_name: Option<String>,
    /// 按来源平台匹配。
    pub platform: Option<Platform>,
    /// `Some(true)` 时只要缺歌词的条目。
    pub missing_lyrics: Option<bool>,
}

/// 存储更新的补丁。`None` 字段保持原值。
#[derive(Debug, Clone, Default)]
pub struct TrackPatch {
    /// 覆盖歌词字段。
    pub lyrics: Option<String>,
}
