//! 此模块定义了用于反序列化网易云音乐 Web API 响应的数据结构。
//!
//! 旧版 `/api/` 接口与 `/api/v3/` 接口对同一字段用了不同的键名
//! （`artists`/`ar`、`album`/`al`），这里用 `alias` 同时兼容两套。

use serde::Deserialize;

/// 单曲详情与批量详情接口的顶层响应。
#[derive(Debug, Deserialize)]
pub struct SongDetailResult {
    /// API 返回码，`200` 表示成功。
    pub code: i64,
    /// 歌曲对象列表。
    #[serde(default)]
    pub songs: Vec<Song>,
}

/// 代表一首歌曲。
#[derive(Debug, Clone, Deserialize)]
pub struct Song {
    /// 歌曲 ID。
    pub id: i64,
    /// 歌曲名。
    #[serde(default)]
    pub name: String,
    /// 演唱者列表。
    #[serde(alias = "ar", default)]
    pub artists: Vec<ArtistRef>,
    /// 所属专辑。
    #[serde(alias = "al")]
    pub album: Option<AlbumRef>,
}

/// 歌曲上挂的艺术家引用。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistRef {
    /// 艺术家姓名。
    #[serde(default)]
    pub name: String,
}

/// 歌曲上挂的专辑引用。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumRef {
    /// 专辑名。
    #[serde(default)]
    pub name: String,
    /// 专辑封面图 URL。
    #[serde(rename = "picUrl")]
    pub pic_url: Option<String>,
}

/// 专辑详情接口 (`/api/v1/album/:id`) 的顶层响应。
#[derive(Debug, Deserialize)]
pub struct AlbumResult {
    /// API 返回码，`200` 表示成功。
    pub code: i64,
    /// 专辑详情。
    pub album: Option<NeteaseAlbum>,
    /// 专辑曲目列表（有时在这里，有时在 `album.songs` 里）。
    #[serde(default)]
    pub songs: Vec<Song>,
}

/// 一张专辑的详细信息。
#[derive(Debug, Clone, Deserialize)]
pub struct NeteaseAlbum {
    /// 专辑名。
    #[serde(default)]
    pub name: String,
    /// 专辑封面图 URL。
    #[serde(rename = "picUrl")]
    pub pic_url: Option<String>,
    /// 专辑艺术家列表。
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// 专辑曲目列表。
    #[serde(default)]
    pub songs: Vec<Song>,
}

/// 歌单详情接口 (`/api/v6/playlist/detail`) 的顶层响应。
#[derive(Debug, Deserialize)]
pub struct PlaylistResult {
    /// API 返回码，`200` 表示成功。
    pub code: i64,
    /// 歌单详情。
    pub playlist: Option<PlaylistDetail>,
}

/// 歌单详情。
#[derive(Debug, Deserialize)]
pub struct PlaylistDetail {
    /// 歌单名。
    #[serde(default)]
    pub name: String,
    /// 歌单内全部曲目的 ID 列表，顺序即歌单顺序。
    #[serde(rename = "trackIds", default)]
    pub track_ids: Vec<TrackIdRef>,
}

/// 歌单曲目 ID 引用。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackIdRef {
    /// 歌曲 ID。
    pub id: i64,
}
