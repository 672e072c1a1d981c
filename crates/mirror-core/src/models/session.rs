//! 디바이스 세션 모델.
//!
//! 디바이스별 카운터, 명령 큐, 최근 상호작용 이력을 보관한다.
//! 이력과 명령 큐는 설정된 길이로 제한되며 오래된 항목부터 버린다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

use super::command::Command;
use super::element::AccessibilityNode;
use super::frame::Frame;

/// 상호작용 이력 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 디바이스 식별자
    pub device_id: String,
    /// 프레임 번호
    pub frame_number: u64,
    /// 화면 이해 요약
    pub understanding: String,
    /// 실행(또는 제안)한 첫 명령
    pub action_taken: Option<Command>,
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
}

/// 디바이스 세션
#[derive(Debug, Clone)]
pub struct DeviceSession {
    /// 디바이스 식별자
    pub device_id: String,
    /// 명령 폴링용 세션 식별자
    pub session_id: String,
    /// 수신한 프레임 수
    pub frames_received: u64,
    /// 휴대폰이 가져간 명령 수
    pub commands_sent: u64,
    /// 마지막 프레임 수신 시각
    pub last_frame_at: Option<DateTime<Utc>>,
    /// 마지막 프레임 번호
    pub last_frame_number: u64,
    /// 대기 중인 명령
    pub command_queue: VecDeque<Command>,
    /// 최근 상호작용 이력
    pub history: VecDeque<HistoryEntry>,
    /// 최신 디코딩 프레임
    pub latest_frame: Option<Frame>,
    /// 최신 접근성 노드
    pub accessibility: Vec<AccessibilityNode>,
    /// 성공 피드백 수
    pub feedback_ok: u64,
    /// 실패 피드백 수
    pub feedback_failed: u64,
    history_limit: usize,
    queue_limit: usize,
}

impl DeviceSession {
    /// 새 세션 생성
    pub fn new(device_id: impl Into<String>, history_limit: usize) -> Self {
        let device_id = device_id.into();
        Self {
            session_id: device_id.clone(),
            device_id,
            frames_received: 0,
            commands_sent: 0,
            last_frame_at: None,
            last_frame_number: 0,
            command_queue: VecDeque::new(),
            history: VecDeque::with_capacity(history_limit),
            latest_frame: None,
            accessibility: Vec::new(),
            feedback_ok: 0,
            feedback_failed: 0,
            history_limit: history_limit.max(1),
            queue_limit: usize::MAX,
        }
    }

    /// 대기 명령 최대 개수 지정
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit.max(1);
        self
    }

    /// 프레임 수신 기록
    pub fn record_frame(&mut self, frame: Frame, accessibility: Vec<AccessibilityNode>) {
        self.frames_received += 1;
        self.last_frame_at = Some(frame.metadata.timestamp);
        self.last_frame_number = frame.metadata.frame_number;
        self.latest_frame = Some(frame);
        if !accessibility.is_empty() {
            self.accessibility = accessibility;
        }
    }

    /// 이력 추가 (최대 길이 초과 시 가장 오래된 항목 제거)
    pub fn push_history(&mut self, entry: HistoryEntry) {
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    /// 최근 `n`개 이력 (오래된 순)
    pub fn recent_history(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// 명령 큐에 추가 (최대 개수 초과 시 가장 오래된 명령 제거)
    ///
    /// 추가한 명령 수를 반환한다.
    pub fn enqueue(&mut self, commands: impl IntoIterator<Item = Command>) -> usize {
        let mut added = 0;
        let mut dropped = 0;
        for command in commands {
            if self.command_queue.len() >= self.queue_limit {
                self.command_queue.pop_front();
                dropped += 1;
            }
            self.command_queue.push_back(command);
            added += 1;
        }
        if dropped > 0 {
            warn!(
                device_id = %self.device_id,
                dropped,
                limit = self.queue_limit,
                "명령 큐 가득 참: 오래된 명령 삭제"
            );
        }
        added
    }

    /// 대기 명령을 모두 꺼내고 전송 카운트 증가
    pub fn drain_commands(&mut self) -> Vec<Command> {
        let commands: Vec<Command> = self.command_queue.drain(..).collect();
        self.commands_sent += commands.len() as u64;
        commands
    }

    /// 이력 초기화
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// 요약 정보
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            device_id: self.device_id.clone(),
            session_id: self.session_id.clone(),
            frames_received: self.frames_received,
            commands_sent: self.commands_sent,
            last_frame: self.last_frame_at,
            context_length: self.history.len(),
            queued_commands: self.command_queue.len(),
        }
    }
}

/// 세션 요약 (GET /sessions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub device_id: String,
    pub session_id: String,
    pub frames_received: u64,
    pub commands_sent: u64,
    pub last_frame: Option<DateTime<Utc>>,
    pub context_length: usize,
    pub queued_commands: usize,
}
