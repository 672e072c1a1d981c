//! 사용자별 벡터 메모리 포트.
//!
//! 모든 연산은 `user_id`로 격리된다. 한 사용자의 기록은 다른 사용자 검색에 나타나지 않는다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::memory::{ElementMemory, MemoryHit, ScreenRecord, TeachingExample};

/// 텍스트 임베딩
///
/// 구현체: `HashingEmbedder` (mirror-storage)
pub trait Embedder: Send + Sync {
    /// L2 정규화된 임베딩 벡터
    fn embed(&self, text: &str) -> Vec<f32>;

    /// 벡터 차원
    fn dimension(&self) -> usize;
}

/// 사용자별 메모리 저장소
///
/// 구현체: `SqliteMemoryStore` (mirror-storage)
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 화면 기록 저장 → 기록 ID
    async fn store_screen(&self, user_id: &str, record: &ScreenRecord)
        -> Result<String, CoreError>;

    /// 질의와 유사한 기록 상위 `limit`개
    async fn remember(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryHit>, CoreError>;

    /// 요소 위치 저장 (user, app, key 기준 upsert)
    async fn store_ui_element(
        &self,
        user_id: &str,
        app: &str,
        element_key: &str,
        element: &ElementMemory,
    ) -> Result<(), CoreError>;

    /// 설명으로 요소 위치 조회
    async fn get_element_location(
        &self,
        user_id: &str,
        app: &str,
        description: &str,
    ) -> Result<Option<ElementMemory>, CoreError>;

    /// 교육 예제 기록
    async fn record_teaching_example(
        &self,
        user_id: &str,
        example: &TeachingExample,
    ) -> Result<(), CoreError>;

    /// 앱별 교육 예제 조회 (최신순)
    async fn teaching_examples(
        &self,
        user_id: &str,
        app: &str,
    ) -> Result<Vec<TeachingExample>, CoreError>;
}
