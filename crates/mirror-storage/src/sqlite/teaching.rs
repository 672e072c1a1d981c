//! 교육 예제 기록.

use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::memory::TeachingExample;

use super::{parse_timestamp, SqliteMemoryStore};

impl SqliteMemoryStore {
    /// 교육 예제 저장
    pub fn insert_teaching_example(
        &self,
        user_id: &str,
        example: &TeachingExample,
    ) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO teaching_examples (user_id, app, prompt, response, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                user_id,
                example.app,
                example.prompt,
                example.response,
                example.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| CoreError::Internal(format!("교육 예제 저장 실패: {e}")))?;

        debug!(user_id, app = %example.app, "교육 예제 저장");
        Ok(())
    }

    /// 앱별 교육 예제 (최신순)
    pub fn list_teaching_examples(
        &self,
        user_id: &str,
        app: &str,
    ) -> Result<Vec<TeachingExample>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT app, prompt, response, created_at FROM teaching_examples
                 WHERE user_id = ?1 AND app = ?2
                 ORDER BY created_at DESC, id DESC",
            )
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let examples = stmt
            .query_map(rusqlite::params![user_id, app], |row| {
                let created_at: String = row.get(3)?;
                Ok(TeachingExample {
                    app: row.get(0)?,
                    prompt: row.get(1)?,
                    response: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .map_err(|e| CoreError::Internal(format!("쿼리 실행 실패: {e}")))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(examples)
    }
}
