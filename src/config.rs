//! 读取环境变量中的平台配置。
//!
//! 所有配置都来自进程环境，库本身不读写任何配置文件。某个平台缺少
//! 必需配置时，对应适配器不会注册，导入该平台的链接会得到明确的
//! "未配置" 错误，而不是一个看起来像网络故障的失败。

use std::env;

use tracing::info;

/// 网易云音乐 API 的默认基地址。
const DEFAULT_NETEASE_API_BASE: &str = "https://music.163.com";

/// 网易云音乐的配置项。
#[derive(Debug, Clone)]
pub struct NeteaseSettings {
    /// API 基地址。可以指向自建反代。
    pub api_base: String,
    /// 可选的会话 Cookie，部分接口带上后限流更宽松。
    pub cookie: Option<String>,
}

/// Spotify 的客户端凭据。
#[derive(Debug, Clone)]
pub struct SpotifySettings {
    /// Client ID。
    pub client_id: String,
    /// Client Secret。
    pub client_secret: String,
}

/// 整个库的运行配置。
#[derive(Debug, Clone)]
pub struct Settings {
    /// 网易云音乐配置。
    pub netease: NeteaseSettings,
    /// Spotify 凭据。缺失时 Spotify 适配器不可用。
    pub spotify: Option<SpotifySettings>,
}

impl Settings {
    /// 从环境变量加载配置。
    ///
    /// 读取的变量：
    /// - `MUSIC_WALL_NETEASE_API_BASE`（可选，默认官方地址）
    /// - `MUSIC_WALL_NETEASE_COOKIE`（可选）
    /// - `MUSIC_WALL_SPOTIFY_CLIENT_ID` / `MUSIC_WALL_SPOTIFY_CLIENT_SECRET`
    ///   （成对出现才启用 Spotify）
    pub fn from_env() -> Self {
        let netease = NeteaseSettings {
            api_base: env::var("MUSIC_WALL_NETEASE_API_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NETEASE_API_BASE.to_string()),
            cookie: env::var("MUSIC_WALL_NETEASE_COOKIE")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        };

        let spotify = match (
            env::var("MUSIC_WALL_SPOTIFY_CLIENT_ID"),
            env::var("MUSIC_WALL_SPOTIFY_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret))
                if !client_id.trim().is_empty() && !client_secret.trim().is_empty() =>
            {
                Some(SpotifySettings {
                    client_id,
                    client_secret,
                })
            }
            _ => {
                info!("[Config] 未提供 Spotify 凭据，对应平台将不可用。");
                None
            }
        };

        Self { netease, spotify }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
