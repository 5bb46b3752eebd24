//! 导入管线的落库环节：有界重试与部分成功的记账。
//!
//! 存储偶发的连接抖动值得等一等再试；格式错误这类问题重试只会
//! 原样失败，所以重试策略严格只认瞬时错误。退避延迟算成纯函数，
//! 和传输层解耦，可以单独测。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::Result,
    model::{NewTrack, StoredTrack},
    store::TrackStore,
};

/// 存储写入的最大尝试次数（含第一次）。
pub(crate) const MAX_STORE_ATTEMPTS: u32 = 3;

/// 退避延迟的基数。
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// 一次导入的结果。
///
/// 批量导入里个别曲目失败不会让整批失败，这里报告的是实际
/// 成功落库的数量与它们的 ID。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// 成功导入的曲目数。
    pub imported_count: usize,
    /// 成功导入的曲目在存储里的 ID，按导入顺序。
    pub track_ids: Vec<String>,
}

/// 第 `attempt` 次失败后的退避延迟：`base * 2^attempt`。
///
/// attempt 从 0 计，依次为 500ms、1s、2s。
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.saturating_pow(attempt)
}

/// 写入一条曲目，瞬时存储错误按指数退避重试，其余错误立即上抛。
pub(crate) async fn create_with_retry(
    store: &dyn TrackStore,
    track: NewTrack,
) -> Result<StoredTrack> {
    let mut attempt: u32 = 0;
    loop {
        match store.create(track.clone()).await {
            Ok(stored) => return Ok(stored),
            Err(e) if e.is_transient() && attempt + 1 < MAX_STORE_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(
                    "[Import] 存储写入第 {} 次失败（瞬时），{}ms 后重试: {e}",
                    attempt + 1,
                    delay.as_millis(),
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::MusicWallError,
        link::Platform,
        model::{NewTrack, ReviewStats, TrackFilter, TrackPatch, TrackRecord},
    };

    /// 前 `fail_times` 次 `create` 返回指定错误的测试桩。
    struct FlakyStore {
        fail_times: u32,
        transient: bool,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(fail_times: u32, transient: bool) -> Self {
            Self {
                fail_times,
                transient,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TrackStore for FlakyStore {
        async fn create(&self, track: NewTrack) -> Result<StoredTrack> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                return Err(if self.transient {
                    MusicWallError::StorageTransient("连接被重置".into())
                } else {
                    MusicWallError::StorageFatal("唯一约束冲突".into())
                });
            }
            Ok(StoredTrack {
                id: format!("t{}", call + 1),
                record: track.record,
                lyrics: track.lyrics,
                platform: track.platform,
                category_id: track.category_id,
                user_id: track.user_id,
            })
        }

        async fn update_many(&self, _: TrackFilter, _: TrackPatch) -> Result<u64> {
            Ok(0)
        }

        async fn find_many(&self, _: TrackFilter) -> Result<Vec<StoredTrack>> {
            Ok(vec![])
        }

        async fn find_first(&self, _: TrackFilter) -> Result<Option<StoredTrack>> {
            Ok(None)
        }

        async fn review_stats(&self, _: &str, _: &str) -> Result<Option<ReviewStats>> {
            Ok(None)
        }
    }

    fn sample_track() -> NewTrack {
        NewTrack {
            record: TrackRecord {
                name: "歌".into(),
                ..Default::default()
            },
            lyrics: None,
            platform: Platform::Netease,
            category_id: "c1".into(),
            user_id: None,
        }
    }

    #[test]
    fn test_backoff_delays_double_each_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried_until_success() {
        let store = FlakyStore::new(2, true);
        let stored = create_with_retry(&store, sample_track()).await.unwrap();
        assert_eq!(stored.id, "t3");
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhaust_max_attempts() {
        let store = FlakyStore::new(10, true);
        let err = create_with_retry(&store, sample_track()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.calls.load(Ordering::SeqCst), MAX_STORE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let store = FlakyStore::new(10, false);
        let err = create_with_retry(&store, sample_track()).await.unwrap_err();
        assert!(matches!(err, MusicWallError::StorageFatal(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
