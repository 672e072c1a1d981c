//! 화면 기록 저장과 유사도 검색.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::memory::{MemoryHit, ScreenRecord};

use super::{parse_timestamp, SqliteMemoryStore};
use crate::vector::{cosine_similarity, decode_vector, encode_vector};

/// 기록 ID (사용자, 내용, 시각, 난수 기반 SHA-256 앞 16바이트 hex)
fn screen_id(user_id: &str, record: &ScreenRecord, created_at: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(record.app.as_bytes());
    hasher.update([0u8]);
    hasher.update(record.text_content.as_bytes());
    hasher.update([0u8]);
    hasher.update(created_at.as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.finalize()[..16]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl SqliteMemoryStore {
    /// 화면 기록 저장 → 기록 ID
    pub fn insert_screen(&self, user_id: &str, record: &ScreenRecord) -> Result<String, CoreError> {
        let created_at = Utc::now().to_rfc3339();
        let id = screen_id(user_id, record, &created_at);
        let embedding = encode_vector(&self.embedder.embed(&record.text_content));

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO screens
                (id, user_id, app, action, success, method, confidence, content,
                 device_id, frame_number, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                id,
                user_id,
                record.app,
                record.action,
                record.success,
                record.method.map(|m| m.as_str()),
                record.confidence,
                record.text_content,
                record.device_id,
                record.frame_number.map(|n| n as i64),
                embedding,
                created_at,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("화면 기록 저장 실패: {e}")))?;

        debug!(user_id, app = %record.app, action = %record.action, "화면 기록 저장: {id}");
        Ok(id)
    }

    /// 질의와 유사한 화면 기록 상위 `limit`개 (동점이면 최신 우선)
    pub fn search_screens(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryHit>, CoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(query);

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, content, app, action, success, created_at, embedding
                 FROM screens WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let mut hits: Vec<MemoryHit> = stmt
            .query_map([user_id], |row| {
                let created_at: String = row.get(5)?;
                let blob: Vec<u8> = row.get(6)?;
                Ok(MemoryHit {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    app: row.get(2)?,
                    action: row.get(3)?,
                    success: row.get(4)?,
                    timestamp: parse_timestamp(&created_at),
                    relevance: cosine_similarity(&query_vector, &decode_vector(&blob)),
                })
            })
            .map_err(|e| CoreError::Internal(format!("쿼리 실행 실패: {e}")))?
            .filter_map(|r| r.ok())
            .collect();

        // 정렬 안정성: 최신순 입력을 유지한 채 유사도 내림차순
        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        debug!(user_id, query, hits = hits.len(), "메모리 검색 완료");
        Ok(hits)
    }

    /// 사용자의 화면 기록 수
    pub fn screen_count(&self, user_id: &str) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM screens WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Internal(format!("화면 기록 수 조회 실패: {e}")))?;
        Ok(count as usize)
    }
}
