//! 감사 로깅.
//!
//! 모든 자동화 실행의 시작/완료/실패를 고정 크기 로컬 버퍼에 기록한다.
//! 버퍼가 가득 차면 가장 오래된 항목부터 버린다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 감사 로그 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// 실행 시작
    Started,
    /// 실행 완료
    Completed,
    /// 실행 실패
    Failed,
}

impl AuditStatus {
    /// 쿼리 문자열 해석 (대소문자 무시)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "started" => Some(Self::Started),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// 감사 로그 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 엔트리 고유 ID
    pub entry_id: String,
    /// 시각
    pub timestamp: DateTime<Utc>,
    /// 실행 ID (시작/종료 항목이 공유)
    pub execution_id: String,
    /// 사용자 ID
    pub user_id: String,
    /// 디바이스 ID
    pub device_id: String,
    /// 액션 설명 (예: "tap Confirm")
    pub action_type: String,
    /// 상태
    pub status: AuditStatus,
    /// 상세 정보
    pub details: Option<String>,
    /// 실행 시간 (밀리초)
    pub execution_time_ms: Option<u64>,
}

/// 감사 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// 실행 주체
#[derive(Debug, Clone, Copy)]
pub struct AuditScope<'a> {
    pub execution_id: &'a str,
    pub user_id: &'a str,
    pub device_id: &'a str,
}

/// 감사 로거: 고정 크기 로컬 버퍼
pub struct AuditLogger {
    buffer: VecDeque<AuditEntry>,
    max_buffer_size: usize,
}

impl AuditLogger {
    /// 새 감사 로거 생성
    pub fn new(max_buffer_size: usize) -> Self {
        let max_buffer_size = max_buffer_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_buffer_size.min(1_024)),
            max_buffer_size,
        }
    }

    /// 실행 시작 기록
    pub fn log_start(&mut self, scope: AuditScope<'_>, action_type: &str) {
        self.push_entry(scope, action_type, AuditStatus::Started, None, None);
    }

    /// 실행 완료 기록 (실행 시간 포함)
    pub fn log_complete(
        &mut self,
        scope: AuditScope<'_>,
        action_type: &str,
        details: &str,
        execution_time_ms: u64,
    ) {
        self.push_entry(
            scope,
            action_type,
            AuditStatus::Completed,
            Some(details.to_string()),
            Some(execution_time_ms),
        );
    }

    /// 실행 실패 기록 (실행 시간 포함)
    pub fn log_failed(
        &mut self,
        scope: AuditScope<'_>,
        action_type: &str,
        error: &str,
        execution_time_ms: u64,
    ) {
        self.push_entry(
            scope,
            action_type,
            AuditStatus::Failed,
            Some(error.to_string()),
            Some(execution_time_ms),
        );
    }

    /// 보관 중인 항목 수
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 최근 N개 항목 조회 (최신순)
    pub fn recent_entries(&self, limit: usize) -> Vec<AuditEntry> {
        self.buffer.iter().rev().take(limit).cloned().collect()
    }

    /// 상태별 필터링 조회 (최신순)
    pub fn entries_by_status(&self, status: AuditStatus, limit: usize) -> Vec<AuditEntry> {
        self.buffer
            .iter()
            .rev()
            .filter(|e| e.status == status)
            .take(limit)
            .cloned()
            .collect()
    }

    /// 통계 집계 (Started 제외)
    pub fn stats(&self) -> AuditStats {
        let mut stats = AuditStats::default();
        for entry in &self.buffer {
            match entry.status {
                AuditStatus::Completed => stats.completed += 1,
                AuditStatus::Failed => stats.failed += 1,
                AuditStatus::Started => {}
            }
        }
        stats.total = stats.completed + stats.failed;
        stats
    }

    fn push_entry(
        &mut self,
        scope: AuditScope<'_>,
        action_type: &str,
        status: AuditStatus,
        details: Option<String>,
        execution_time_ms: Option<u64>,
    ) {
        if self.buffer.len() >= self.max_buffer_size {
            self.buffer.pop_front();
            tracing::warn!("감사 로그 버퍼 오버플로: 가장 오래된 항목 삭제");
        }

        self.buffer.push_back(AuditEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            execution_id: scope.execution_id.to_string(),
            user_id: scope.user_id.to_string(),
            device_id: scope.device_id.to_string(),
            action_type: action_type.to_string(),
            status,
            details,
            execution_time_ms,
        });
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(1_000)
    }
}
