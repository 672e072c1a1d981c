//! 학습된 UI 요소 위치 저장/조회.

use rusqlite::OptionalExtension;
use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::element::{AccessibilityNode, Point};
use mirror_core::models::memory::ElementMemory;

use super::{parse_timestamp, SqliteMemoryStore};
use crate::vector::{cosine_similarity, decode_vector, encode_vector};

/// 조회 행 → (요소 키, 메모리, 임베딩)
type ElementRow = (String, ElementMemory, Vec<u8>);

fn row_to_element(row: &rusqlite::Row<'_>) -> rusqlite::Result<ElementRow> {
    let element_json: Option<String> = row.get(3)?;
    let element: Option<AccessibilityNode> =
        element_json.and_then(|json| serde_json::from_str(&json).ok());
    let last_seen: String = row.get(8)?;

    Ok((
        row.get(0)?,
        ElementMemory {
            coordinates: Point::new(row.get(1)?, row.get(2)?),
            element,
            success_rate: row.get(4)?,
            success_count: row.get(5)?,
            total_count: row.get(6)?,
            learned_from_user: row.get(7)?,
            last_seen: parse_timestamp(&last_seen),
        },
        row.get(9)?,
    ))
}

const ELEMENT_COLUMNS: &str = "element_key, x, y, element_json, success_rate, success_count,
     total_count, learned_from_user, last_seen, embedding";

impl SqliteMemoryStore {
    /// 요소 위치 upsert (user, app, key 기준)
    ///
    /// 한 번 사용자 교육으로 저장된 항목은 교육 표시를 유지한다.
    pub fn upsert_element(
        &self,
        user_id: &str,
        app: &str,
        element_key: &str,
        memory: &ElementMemory,
    ) -> Result<(), CoreError> {
        let element_json = memory
            .element
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let embedding = encode_vector(&self.embedder.embed(element_key));

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ui_elements
                (user_id, app, element_key, x, y, element_json, success_rate,
                 success_count, total_count, learned_from_user, last_seen, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(user_id, app, element_key) DO UPDATE SET
                x = excluded.x,
                y = excluded.y,
                element_json = excluded.element_json,
                success_rate = excluded.success_rate,
                success_count = excluded.success_count,
                total_count = excluded.total_count,
                learned_from_user = MAX(ui_elements.learned_from_user, excluded.learned_from_user),
                last_seen = excluded.last_seen,
                embedding = excluded.embedding",
            rusqlite::params![
                user_id,
                app,
                element_key,
                memory.coordinates.x,
                memory.coordinates.y,
                element_json,
                memory.success_rate,
                memory.success_count,
                memory.total_count,
                memory.learned_from_user,
                memory.last_seen.to_rfc3339(),
                embedding,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("요소 위치 저장 실패: {e}")))?;

        debug!(
            user_id,
            app,
            element_key,
            x = memory.coordinates.x,
            y = memory.coordinates.y,
            "요소 위치 저장"
        );
        Ok(())
    }

    /// 설명으로 요소 위치 조회
    ///
    /// 키가 정확히 일치하면 바로 반환하고, 아니면 같은 앱의 요소 중
    /// 코사인 유사도가 하한 이상인 가장 가까운 항목을 반환한다.
    pub fn find_element(
        &self,
        user_id: &str,
        app: &str,
        description: &str,
    ) -> Result<Option<ElementMemory>, CoreError> {
        let conn = self.lock()?;

        let exact = conn
            .query_row(
                &format!(
                    "SELECT {ELEMENT_COLUMNS} FROM ui_elements
                     WHERE user_id = ?1 AND app = ?2 AND element_key = ?3"
                ),
                rusqlite::params![user_id, app, description],
                row_to_element,
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("요소 조회 실패: {e}")))?;

        if let Some((_, memory, _)) = exact {
            debug!(user_id, app, description, "요소 키 일치");
            return Ok(Some(memory));
        }

        let query_vector = self.embedder.embed(description);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ELEMENT_COLUMNS} FROM ui_elements WHERE user_id = ?1 AND app = ?2"
            ))
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let best = stmt
            .query_map(rusqlite::params![user_id, app], row_to_element)
            .map_err(|e| CoreError::Internal(format!("쿼리 실행 실패: {e}")))?
            .filter_map(|r| r.ok())
            .map(|(key, memory, blob)| {
                let score = cosine_similarity(&query_vector, &decode_vector(&blob));
                (key, memory, score)
            })
            .filter(|(_, _, score)| *score >= self.min_similarity)
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best.map(|(key, memory, score)| {
            debug!(user_id, app, description, matched = %key, score, "요소 유사도 일치");
            memory
        }))
    }
}
