//! 聚合读取侧的数据模型。

use serde::{Deserialize, Serialize};

/// 一张专辑的评价统计，由存储协作方按原始专辑/艺术家名查出。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReviewStats {
    /// 平均评分。
    pub average_rating: f64,
    /// 评价条数。
    pub review_count: u64,
}

/// 聚合后的一组专辑统计，用于公开展示的榜单。
///
/// 展示字段一律使用该组代表条目的原始字符串；归一化键只参与分组，
/// 从不出现在这里。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// 专辑名（原始字符串）。
    pub album_name: String,
    /// 艺术家名（原始字符串）。空艺术家组被吸收后这里总是非空的一侧。
    pub artist_name: String,
    /// 被收录的次数。
    pub pick_count: u64,
    /// 一张代表性的封面图 URL。
    pub cover_url: Option<String>,
    /// 评价统计，没有评价时为 `None`。
    pub review_stats: Option<ReviewStats>,
}
