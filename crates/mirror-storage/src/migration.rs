//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
const CURRENT_VERSION: u32 = 2;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// 현재 스키마 버전 조회
pub fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: screens + ui_elements 테이블
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: screens + ui_elements 테이블");

    conn.execute_batch(
        "
        -- 화면 기록 (임베딩: f32 little-endian BLOB)
        CREATE TABLE IF NOT EXISTS screens (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            app TEXT NOT NULL,
            action TEXT NOT NULL,
            success INTEGER NOT NULL DEFAULT 1,
            method TEXT,
            confidence REAL NOT NULL DEFAULT 0,
            content TEXT NOT NULL,
            device_id TEXT,
            frame_number INTEGER,
            embedding BLOB NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_screens_user ON screens(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_screens_user_app ON screens(user_id, app);

        -- 학습된 UI 요소 위치
        CREATE TABLE IF NOT EXISTS ui_elements (
            user_id TEXT NOT NULL,
            app TEXT NOT NULL,
            element_key TEXT NOT NULL,
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            element_json TEXT,
            success_rate REAL NOT NULL,
            success_count INTEGER NOT NULL DEFAULT 0,
            total_count INTEGER NOT NULL DEFAULT 0,
            learned_from_user INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (user_id, app, element_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    info!("마이그레이션 V1 완료");
    Ok(())
}

/// V2: teaching_examples 테이블
fn migrate_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V2 실행: teaching_examples 테이블");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS teaching_examples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            app TEXT NOT NULL,
            prompt TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_teaching_user_app ON teaching_examples(user_id, app);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    info!("마이그레이션 V2 완료");
    Ok(())
}
