//! 专辑榜单的聚合与合并。
//!
//! 对全量已存条目按归一化后的 `专辑名||艺术家名` 键分组计数。
//! 同一张专辑在不同导入里可能缺失艺术家，于是分两遍：第一遍
//! 严格按完整键分组，第二遍把空艺术家的组显式并进同专辑的
//! 非空组里。两遍算法让合并规则可复核，也不依赖哈希表的遍历
//! 顺序。每次读取都重新计算，没有持久化的聚合状态，所以整个
//! 过程必须是幂等的。

use std::collections::HashMap;

use futures::future;
use tracing::warn;

use crate::{
    error::Result,
    model::{AggregateRecord, StoredTrack, TrackFilter},
    normalizer::normalize,
    store::TrackStore,
};

/// 分组键里专辑与艺术家之间的分隔符。
const KEY_SEPARATOR: &str = "||";

/// 一个完成合并的分组。展示字段保留代表条目的原始字符串。
#[derive(Debug, Clone)]
pub(crate) struct AlbumGroup {
    /// 专辑名（原始字符串）。
    pub album_name: String,
    /// 艺术家名（原始字符串），可能为空。
    pub artist_name: String,
    /// 组内条目数。
    pub pick_count: u64,
}

/// 对条目分组合并，按计数降序取前 `limit` 组。纯函数。
pub(crate) fn group_top_albums(records: &[StoredTrack], limit: usize) -> Vec<AlbumGroup> {
    #[derive(Debug)]
    struct RawGroup {
        album_name: String,
        artist_name: String,
        norm_album: String,
        norm_artist: String,
        count: u64,
    }

    // 第一遍：严格按完整键分组。
    let mut groups: HashMap<String, RawGroup> = HashMap::new();
    for track in records {
        let album_name = track.record.album_name.trim();
        if album_name.is_empty() {
            continue;
        }
        let norm_album = normalize(album_name);
        let norm_artist = normalize(&track.record.artist_name);
        let key = format!("{norm_album}{KEY_SEPARATOR}{norm_artist}");
        groups
            .entry(key)
            .or_insert_with(|| RawGroup {
                album_name: album_name.to_string(),
                artist_name: track.record.artist_name.trim().to_string(),
                norm_album,
                norm_artist,
                count: 0,
            })
            .count += 1;
    }

    // 第二遍：把空艺术家的组并进同专辑的非空组。
    // 同专辑有多个非空组时，并进计数最大的那个（并列取名字最小的），
    // 结果与遍历顺序无关。
    let empty_keys: Vec<String> = groups
        .values()
        .filter(|g| g.norm_artist.is_empty())
        .map(|g| format!("{}{KEY_SEPARATOR}", g.norm_album))
        .collect();
    for empty_key in empty_keys {
        let Some(norm_album) = empty_key.strip_suffix(KEY_SEPARATOR) else {
            continue;
        };
        let target_key = groups
            .values()
            .filter(|g| g.norm_album == norm_album && !g.norm_artist.is_empty())
            .max_by(|a, b| {
                a.count
                    .cmp(&b.count)
                    .then_with(|| b.artist_name.cmp(&a.artist_name))
            })
            .map(|g| format!("{}{KEY_SEPARATOR}{}", g.norm_album, g.norm_artist));
        if let Some(target_key) = target_key
            && let Some(absorbed) = groups.remove(&empty_key)
        {
            if let Some(target) = groups.get_mut(&target_key) {
                target.count += absorbed.count;
            }
        }
    }

    let mut merged: Vec<AlbumGroup> = groups
        .into_values()
        .map(|g| AlbumGroup {
            album_name: g.album_name,
            artist_name: g.artist_name,
            pick_count: g.count,
        })
        .collect();
    // 计数并列时按专辑名、艺术家名排序，保证重复读取结果稳定。
    merged.sort_by(|a, b| {
        b.pick_count
            .cmp(&a.pick_count)
            .then_with(|| a.album_name.cmp(&b.album_name))
            .then_with(|| a.artist_name.cmp(&b.artist_name))
    });
    merged.truncate(limit);
    merged
}

/// 计算收录次数最多的专辑榜单。
///
/// 分组计数后，再用各组代表条目的**原始**专辑/艺术家名回查存储，
/// 取一张代表性封面和评价统计。存储按精确字符串做键，归一化键
/// 永远不参与查库。
pub async fn aggregate_top_albums(
    store: &dyn TrackStore,
    limit: usize,
) -> Result<Vec<AggregateRecord>> {
    let records = store.find_many(TrackFilter::default()).await?;
    let groups = group_top_albums(&records, limit);

    let enriched = future::join_all(groups.into_iter().map(|group| async move {
        let cover_url = match store
            .find_first(TrackFilter {
                album_name: Some(group.album_name.clone()),
                artist_name: (!group.artist_name.is_empty()).then(|| group.artist_name.clone()),
                ..Default::default()
            })
            .await
        {
            Ok(found) => found
                .map(|t| t.record.picture_url)
                .filter(|url| !url.is_empty()),
            Err(e) => {
                warn!("[Aggregate] 查询专辑 '{}' 的封面失败: {e}", group.album_name);
                None
            }
        };
        let review_stats = match store
            .review_stats(&group.album_name, &group.artist_name)
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                warn!("[Aggregate] 查询专辑 '{}' 的评价统计失败: {e}", group.album_name);
                None
            }
        };
        AggregateRecord {
            album_name: group.album_name,
            artist_name: group.artist_name,
            pick_count: group.pick_count,
            cover_url,
            review_stats,
        }
    }))
    .await;

    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Platform;
    use crate::model::{NewTrack, ReviewStats, TrackRecord};
    use crate::store::MemoryStore;

    fn stored(album: &str, artist: &str) -> StoredTrack {
        StoredTrack {
            id: String::new(),
            record: TrackRecord {
                name: "歌".into(),
                artist_name: artist.into(),
                album_name: album.into(),
                picture_url: String::new(),
                platform_track_id: None,
                original_link: None,
            },
            lyrics: None,
            platform: Platform::Netease,
            category_id: "c1".into(),
            user_id: None,
        }
    }

    #[test]
    fn test_empty_artist_group_absorbed_by_named_group() {
        // 空艺术家 3 条 + 有艺术家 2 条 → 合并成一组 5 条，代表是非空一侧。
        let mut records = vec![stored("X", ""), stored("X", ""), stored("X", "")];
        records.push(stored("X", "Y"));
        records.push(stored("X", "Y"));

        let groups = group_top_albums(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].album_name, "X");
        assert_eq!(groups[0].artist_name, "Y");
        assert_eq!(groups[0].pick_count, 5);
    }

    #[test]
    fn test_script_variants_group_together() {
        let records = vec![
            stored("神的游戏", "张悬"),
            stored("神的遊戲", "張懸"),
            stored("  神的游戏 ", "张悬"),
        ];
        let groups = group_top_albums(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].pick_count, 3);
        // 展示用的是首见的原始字符串，不是归一化结果。
        assert_eq!(groups[0].album_name, "神的游戏");
    }

    #[test]
    fn test_lone_empty_artist_group_survives() {
        let records = vec![stored("X", ""), stored("Z", "W")];
        let groups = group_top_albums(&records, 10);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_ranking_and_limit() {
        let records = vec![
            stored("A", "一"),
            stored("B", "二"),
            stored("B", "二"),
            stored("C", "三"),
            stored("C", "三"),
            stored("C", "三"),
        ];
        let groups = group_top_albums(&records, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].album_name, "C");
        assert_eq!(groups[1].album_name, "B");
    }

    #[test]
    fn test_blank_album_records_are_skipped() {
        let records = vec![stored("", "谁"), stored("  ", "谁")];
        assert!(group_top_albums(&records, 10).is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_enriches_with_original_strings() {
        let store = MemoryStore::new();
        for (album, artist, pic) in [
            ("神的游戏", "张悬", "https://img/cover.jpg"),
            ("神的遊戲", "張懸", "https://img/cover2.jpg"),
        ] {
            store
                .create(NewTrack {
                    record: TrackRecord {
                        name: "歌".into(),
                        artist_name: artist.into(),
                        album_name: album.into(),
                        picture_url: pic.into(),
                        platform_track_id: None,
                        original_link: None,
                    },
                    lyrics: None,
                    platform: Platform::Netease,
                    category_id: "c1".into(),
                    user_id: None,
                })
                .await
                .unwrap();
        }
        store
            .put_review_stats(
                "神的游戏",
                "张悬",
                ReviewStats {
                    average_rating: 4.5,
                    review_count: 2,
                },
            )
            .await;

        let result = aggregate_top_albums(&store, 10).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pick_count, 2);
        // 回查用的是代表条目的原始字符串，查得到预置的封面与评价。
        assert_eq!(result[0].cover_url.as_deref(), Some("https://img/cover.jpg"));
        assert_eq!(result[0].review_stats.unwrap().review_count, 2);
    }
}
