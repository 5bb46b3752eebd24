//! 用于去重比较的文本归一化。
//!
//! 同一张专辑会以不同的大小写、首尾空白甚至简繁体被反复导入
//! （例如「神的游戏」与「神的遊戲」）。聚合统计前先把专辑名和
//! 艺术家名折叠到同一个规范形态，原始字符串仍然用于展示和存储，
//! 归一化结果只作比较键。

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use ferrous_opencc::OpenCC;
use ferrous_opencc::config::BuiltinConfig;
use tracing::error;

/// OpenCC 实例缓存。键是配置文件名，值是对应的转换器实例。
///
/// 字典加载不便宜，进程内同一配置只初始化一次。
static CONVERTER_CACHE: LazyLock<DashMap<String, Arc<OpenCC>>> = LazyLock::new(DashMap::new);

/// 根据指定的 OpenCC 配置转换文本。
///
/// 配置首次被请求时创建并缓存，之后直接复用。加载失败时记录错误
/// 日志并返回原始文本，绝不打断调用方。
fn convert(text: &str, config: BuiltinConfig) -> String {
    let cache_key = config.to_filename();

    if let Some(converter) = CONVERTER_CACHE.get(cache_key) {
        return converter.convert(text);
    }

    match CONVERTER_CACHE
        .entry(cache_key.to_string())
        .or_try_insert_with(|| {
            OpenCC::from_config(config).map(Arc::new).map_err(|e| {
                error!("使用配置 '{:?}' 初始化 OpenCC 时失败: {}", config, e);
                e
            })
        }) {
        Ok(converter_ref) => converter_ref.value().convert(text),
        Err(_) => text.to_string(),
    }
}

/// 归一化一段用于相等比较的文本：修剪 → 小写 → 繁体折叠为简体。
///
/// 纯函数：相同输入永远得到相同输出，不访问网络和存储，也是幂等的。
/// 简繁折叠失败时退化为仅修剪加小写，不会抛错。
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    convert(&lowered, BuiltinConfig::T2s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_is_idempotent() {
        for s in ["  Abc ", "神的遊戲", "Mixed 大小寫 TEXT", ""] {
            assert_eq!(normalize(&normalize(s)), normalize(s));
        }
    }

    #[test]
    fn test_normalize_folds_traditional_to_simplified() {
        assert_eq!(normalize("神的游戏"), normalize("神的遊戲"));
        assert_eq!(normalize("蘇打綠"), normalize("苏打绿"));
    }

    #[test]
    fn test_normalize_ignores_case_and_whitespace() {
        assert_eq!(normalize("  Abc "), normalize("abc"));
        assert_eq!(normalize("My Little Airport"), normalize("my little airport"));
    }

    #[test]
    fn test_normalize_keeps_simplified_unchanged() {
        assert_eq!(normalize("我去 2000 年"), "我去 2000 年");
    }
}
