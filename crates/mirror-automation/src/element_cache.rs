//! 요소 좌표 LRU 캐시.
//!
//! `user:app:description` 키로 최근 성공 좌표와 성공/시도 횟수를 보관한다.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use mirror_core::models::element::Point;

/// 캐시 항목
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CachedElement {
    pub coordinates: Point,
    pub success_count: u32,
    pub total_count: u32,
}

impl CachedElement {
    /// 성공률 (시도가 없으면 0.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_count as f64
        }
    }
}

/// 요소 좌표 캐시
pub struct ElementCache {
    entries: Mutex<LruCache<String, CachedElement>>,
}

impl ElementCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(user_id: &str, app: &str, description: &str) -> String {
        format!("{user_id}:{app}:{description}")
    }

    /// 조회 (최근 사용으로 갱신)
    pub fn get(&self, user_id: &str, app: &str, description: &str) -> Option<CachedElement> {
        self.entries
            .lock()
            .get(&Self::key(user_id, app, description))
            .copied()
    }

    /// 실행 결과 반영
    ///
    /// 성공 시 좌표를 갱신하고, 없던 항목은 성공했을 때만 만든다.
    pub fn record(&self, user_id: &str, app: &str, description: &str, at: Point, success: bool) {
        let key = Self::key(user_id, app, description);
        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.total_count += 1;
                if success {
                    entry.success_count += 1;
                    entry.coordinates = at;
                }
                debug!(key = %key, rate = entry.success_rate(), "요소 캐시 갱신");
            }
            None if success => {
                entries.put(
                    key,
                    CachedElement {
                        coordinates: at,
                        success_count: 1,
                        total_count: 1,
                    },
                );
            }
            None => {}
        }
    }

    /// 저장된 통계로 항목 채우기 (기존 값 대체)
    pub fn restore(
        &self,
        user_id: &str,
        app: &str,
        description: &str,
        at: Point,
        success_count: u32,
        total_count: u32,
    ) {
        self.entries.lock().put(
            Self::key(user_id, app, description),
            CachedElement {
                coordinates: at,
                success_count,
                total_count,
            },
        );
    }

    /// 사용자 교육 좌표 저장 (기존 통계 초기화)
    pub fn learn(&self, user_id: &str, app: &str, description: &str, at: Point) {
        self.entries.lock().put(
            Self::key(user_id, app, description),
            CachedElement {
                coordinates: at,
                success_count: 1,
                total_count: 1,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
