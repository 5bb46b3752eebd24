//! 此模块定义了用于反序列化 Spotify Web API 响应的数据结构。

use serde::Deserialize;

/// 客户端凭据接口 (`/api/token`) 的响应。
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// 访问令牌。
    pub access_token: String,
    /// 有效期，单位秒。
    pub expires_in: i64,
}

/// 单曲接口 (`/v1/tracks/:id`) 的响应。
#[derive(Debug, Deserialize)]
pub struct Track {
    /// 歌曲名。
    #[serde(default)]
    pub name: String,
    /// 演唱者列表。
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// 所属专辑。
    pub album: Option<AlbumRef>,
}

/// 艺术家引用。
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
    /// 封面图列表，尺寸从大到小。
    #[serde(default)]
    pub images: Vec<Image>,
}

/// 封面图。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Image {
    /// 图片 URL。
    #[serde(default)]
    pub url: String,
}

/// 专辑接口 (`/v1/albums/:id`) 的响应。
#[derive(Debug, Deserialize)]
pub struct Album {
    /// 专辑名。
    #[serde(default)]
    pub name: String,
    /// 专辑艺术家列表。
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// 封面图列表。
    #[serde(default)]
    pub images: Vec<Image>,
    /// 专辑曲目。
    pub tracks: Option<AlbumTracks>,
}

/// 专辑曲目分页容器。
#[derive(Debug, Deserialize)]
pub struct AlbumTracks {
    /// 当前页的曲目。
    #[serde(default)]
    pub items: Vec<AlbumTrackItem>,
}

/// 专辑内的一首曲目（简化形状，不带专辑字段）。
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumTrackItem {
    /// 歌曲 ID。
    #[serde(default)]
    pub id: String,
    /// 歌曲名。
    #[serde(default)]
    pub name: String,
}
