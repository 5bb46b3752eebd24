//! 定义了整个 `music-wall` 库的错误类型 `MusicWallError`。

use thiserror::Error;

use crate::link::{ContentType, Platform};

/// 附带在 `UpstreamFormat` 错误里的原始响应片段的最大长度（字符数）。
const SNIPPET_MAX_CHARS: usize = 200;

/// `music-wall` 库的通用错误枚举。
#[derive(Error, Debug)]
pub enum MusicWallError {
    /// 链接没有匹配到任何已知平台或内容类型，用户需要检查链接本身。
    #[error("无法识别的分享链接: {0}")]
    UnrecognizedLink(String),

    /// 链接指向的内容类型在该平台上不受支持（例如不支持歌单导入的平台）。
    #[error("{platform} 暂不支持导入{content_type}")]
    UnsupportedContentType {
        /// 链接所属的平台。
        platform: Platform,
        /// 不受支持的内容类型。
        content_type: ContentType,
    },

    /// 上游返回了响应，但形状不符合任何已知的提取策略，多半是上游改版了。
    #[error("{message}")]
    UpstreamFormat {
        /// 面向使用者的简短说明。
        message: String,
        /// 原始响应的截断片段，仅用于诊断日志。
        snippet: String,
    },

    /// 上游服务不可达：超时、连接失败或非 2xx 状态码。
    #[error("上游服务不可用: {0}")]
    UpstreamUnavailable(String),

    /// 缺少某个平台所需的环境配置（区别于网络故障）。
    #[error("{0} 未配置，请检查环境变量")]
    NotConfigured(String),

    /// 存储暂时不可用，可以重试。
    #[error("存储暂时不可用: {0}")]
    StorageTransient(String),

    /// 存储操作失败且重试无益（约束冲突、数据损坏等）。
    #[error("存储操作失败: {0}")]
    StorageFatal(String),

    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// `MusicWallError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, MusicWallError>;

impl MusicWallError {
    /// 构造一个携带截断响应片段的 `UpstreamFormat` 错误。
    pub fn upstream_format(message: impl Into<String>, raw_body: &str) -> Self {
        Self::UpstreamFormat {
            message: message.into(),
            snippet: truncate_snippet(raw_body),
        }
    }

    /// 该错误是否属于可以重试的瞬时故障。
    ///
    /// 只有存储连接类故障参与重试；格式类错误重试也不会变好，立即上抛。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageTransient(_))
    }
}

impl From<reqwest::Error> for MusicWallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamUnavailable(format!("请求超时: {err}"))
        } else if err.is_connect() {
            Self::UpstreamUnavailable(format!("连接失败: {err}"))
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

/// 将原始响应体截断成适合放进错误信息的片段。
///
/// 按字符截断而不是按字节，避免把多字节字符切成半个。
pub(crate) fn truncate_snippet(raw: &str) -> String {
    let mut snippet: String = raw.chars().take(SNIPPET_MAX_CHARS).collect();
    if raw.chars().count() > SNIPPET_MAX_CHARS {
        snippet.push_str("...");
    }
    snippet
}
