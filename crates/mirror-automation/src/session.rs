//! 디바이스 세션 레지스트리.
//!
//! 디바이스별 `DeviceSession`과 레지스트리 전체의 최신 프레임 슬롯을 보관한다.
//! 모든 접근은 `parking_lot::RwLock`으로 동기화되며, 재시작 시 세션은 사라진다.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use mirror_core::config::SessionConfig;
use mirror_core::models::command::Command;
use mirror_core::models::element::AccessibilityNode;
use mirror_core::models::frame::Frame;
use mirror_core::models::session::{DeviceSession, HistoryEntry, SessionSummary};

/// 명령 폴링 결과
#[derive(Debug, Clone)]
pub struct DrainedCommands {
    pub device_id: String,
    pub session_id: String,
    pub commands: Vec<Command>,
}

/// 디바이스 세션 레지스트리
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, DeviceSession>>,
    /// 마지막으로 수신한 프레임 (디바이스 무관, last-write-wins)
    latest_frame: RwLock<Option<Frame>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            latest_frame: RwLock::new(None),
            config,
        }
    }

    /// 요청의 device_id (비어 있으면 기본값)
    pub fn device_id_or_default(&self, device_id: Option<&str>) -> String {
        device_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.config.default_device_id)
            .to_string()
    }

    /// 요청에 프레임 번호가 없을 때 쓸 번호 (이번 프레임을 포함한 수신 수)
    pub fn next_frame_number(&self, device_id: &str) -> u64 {
        self.sessions
            .read()
            .get(device_id)
            .map_or(1, |s| s.frames_received + 1)
    }

    /// 세션 조회/생성 후 클로저 실행
    pub fn with_session<R>(&self, device_id: &str, f: impl FnOnce(&mut DeviceSession) -> R) -> R {
        let mut sessions = self.sessions.write();
        let session = sessions.entry(device_id.to_string()).or_insert_with(|| {
            info!(device_id, "새 디바이스 세션 생성");
            DeviceSession::new(device_id, self.config.history_limit)
                .with_queue_limit(self.config.queue_limit)
        });
        f(session)
    }

    /// 프레임 수신 기록
    ///
    /// `session_id`가 주어지면 세션의 폴링 식별자를 갱신한다.
    pub fn record_frame(
        &self,
        frame: Frame,
        session_id: Option<&str>,
        accessibility: Vec<AccessibilityNode>,
    ) {
        let device_id = frame.metadata.device_id.clone();
        *self.latest_frame.write() = Some(frame.clone());

        self.with_session(&device_id, |session| {
            if let Some(session_id) = session_id.filter(|s| !s.is_empty()) {
                session.session_id = session_id.to_string();
            }
            session.record_frame(frame, accessibility);
            debug!(
                device_id = %session.device_id,
                frames = session.frames_received,
                "프레임 기록"
            );
        });
    }

    /// 이력 추가
    pub fn push_history(&self, device_id: &str, entry: HistoryEntry) {
        self.with_session(device_id, |session| session.push_history(entry));
    }

    /// 디바이스의 최근 `n`개 이력 (오래된 순)
    pub fn recent_history(&self, device_id: &str, n: usize) -> Vec<HistoryEntry> {
        self.sessions
            .read()
            .get(device_id)
            .map(|s| s.recent_history(n))
            .unwrap_or_default()
    }

    /// 디바이스 명령 큐에 추가 → 추가된 수
    pub fn enqueue(&self, device_id: &str, commands: impl IntoIterator<Item = Command>) -> usize {
        let added = self.with_session(device_id, |session| session.enqueue(commands));
        debug!(device_id, added, "명령 큐 추가");
        added
    }

    /// 모든 세션에 명령 추가 → 대상 디바이스 목록
    pub fn enqueue_all(&self, commands: &[Command]) -> Vec<String> {
        let mut sessions = self.sessions.write();
        let mut devices: Vec<String> = sessions
            .values_mut()
            .map(|session| {
                session.enqueue(commands.iter().cloned());
                session.device_id.clone()
            })
            .collect();
        devices.sort();
        debug!(devices = devices.len(), "전체 세션 명령 추가");
        devices
    }

    /// session_id 또는 device_id가 일치하는 세션의 대기 명령을 모두 꺼낸다.
    pub fn drain_commands(&self, key: &str) -> Option<DrainedCommands> {
        let mut sessions = self.sessions.write();
        let device_id = if sessions.contains_key(key) {
            key.to_string()
        } else {
            sessions
                .values()
                .find(|s| s.session_id == key)?
                .device_id
                .clone()
        };
        let session = sessions.get_mut(&device_id)?;

        let commands = session.drain_commands();
        if !commands.is_empty() {
            debug!(device_id = %session.device_id, count = commands.len(), "명령 전달");
        }
        Some(DrainedCommands {
            device_id: session.device_id.clone(),
            session_id: session.session_id.clone(),
            commands,
        })
    }

    /// 명령 실행 피드백 기록 (세션이 없으면 false)
    pub fn record_feedback(&self, device_id: &str, success: bool) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(device_id) {
            Some(session) => {
                if success {
                    session.feedback_ok += 1;
                } else {
                    session.feedback_failed += 1;
                }
                true
            }
            None => false,
        }
    }

    /// 이력 초기화 (`None`이면 전체) → 초기화된 세션 수
    pub fn reset(&self, device_id: Option<&str>) -> usize {
        let mut sessions = self.sessions.write();
        let count = match device_id {
            Some(id) => match sessions.get_mut(id) {
                Some(session) => {
                    session.reset_history();
                    1
                }
                None => 0,
            },
            None => {
                sessions.values_mut().for_each(DeviceSession::reset_history);
                sessions.len()
            }
        };
        info!(?device_id, sessions = count, "컨텍스트 초기화");
        count
    }

    /// 이력 조회 (`None`이면 전체 세션 병합, 시간순)
    pub fn history(&self, device_id: Option<&str>) -> Vec<HistoryEntry> {
        let sessions = self.sessions.read();
        match device_id {
            Some(id) => sessions
                .get(id)
                .map(|s| s.history.iter().cloned().collect())
                .unwrap_or_default(),
            None => {
                let mut merged: Vec<HistoryEntry> = sessions
                    .values()
                    .flat_map(|s| s.history.iter().cloned())
                    .collect();
                merged.sort_by_key(|e| e.timestamp);
                merged
            }
        }
    }

    /// 세션 요약 (device_id 순)
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> =
            self.sessions.read().values().map(DeviceSession::summary).collect();
        summaries.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        summaries
    }

    /// 디바이스 ID 목록
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 세션 수
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// 전체 세션 수신 프레임 합계
    pub fn total_frames(&self) -> u64 {
        self.sessions.read().values().map(|s| s.frames_received).sum()
    }

    /// 전체 세션 이력 길이 합계
    pub fn total_history_len(&self) -> usize {
        self.sessions.read().values().map(|s| s.history.len()).sum()
    }

    /// 레지스트리 전체 최신 프레임
    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest_frame.read().clone()
    }

    /// 디바이스의 최신 프레임
    pub fn device_frame(&self, device_id: &str) -> Option<Frame> {
        self.sessions
            .read()
            .get(device_id)
            .and_then(|s| s.latest_frame.clone())
    }

    /// 디바이스가 마지막으로 보고한 접근성 노드
    pub fn accessibility_nodes(&self, device_id: &str) -> Vec<AccessibilityNode> {
        self.sessions
            .read()
            .get(device_id)
            .map(|s| s.accessibility.clone())
            .unwrap_or_default()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frame_for, node};
    use chrono::{Duration, Utc};

    fn entry(device_id: &str, n: u64, offset_secs: i64) -> HistoryEntry {
        HistoryEntry {
            device_id: device_id.to_string(),
            frame_number: n,
            understanding: format!("frame {n}"),
            action_taken: None,
            timestamp: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn default_device_id_applies_to_blank() {
        let registry = SessionRegistry::default();
        assert_eq!(registry.device_id_or_default(None), "unknown");
        assert_eq!(registry.device_id_or_default(Some("  ")), "unknown");
        assert_eq!(registry.device_id_or_default(Some("iphone")), "iphone");
    }

    #[test]
    fn record_frame_updates_session_and_latest() {
        let registry = SessionRegistry::default();
        assert_eq!(registry.next_frame_number("iphone"), 1);

        registry.record_frame(frame_for("iphone", 1), None, vec![node("btn", "Send")]);
        registry.record_frame(frame_for("ipad", 7), Some("tablet-session"), Vec::new());

        assert_eq!(registry.next_frame_number("iphone"), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.total_frames(), 2);
        assert_eq!(registry.latest_frame().unwrap().metadata.device_id, "ipad");
        assert_eq!(registry.device_frame("iphone").unwrap().metadata.frame_number, 1);
        assert_eq!(registry.accessibility_nodes("iphone").len(), 1);
        assert!(registry.accessibility_nodes("ipad").is_empty());
    }

    #[test]
    fn drain_matches_session_or_device_id() {
        let registry = SessionRegistry::default();
        registry.record_frame(frame_for("ipad", 1), Some("tablet-session"), Vec::new());
        registry.enqueue("ipad", vec![Command::home("h"), Command::back("b")]);

        let drained = registry.drain_commands("tablet-session").unwrap();
        assert_eq!(drained.device_id, "ipad");
        assert_eq!(drained.commands.len(), 2);

        registry.enqueue("ipad", vec![Command::home("h")]);
        let drained = registry.drain_commands("ipad").unwrap();
        assert_eq!(drained.session_id, "tablet-session");
        assert_eq!(drained.commands.len(), 1);

        assert!(registry.drain_commands("nobody").is_none());
        assert_eq!(registry.summaries()[0].commands_sent, 3);
    }

    #[test]
    fn unpolled_queue_is_capped_by_config() {
        let registry = SessionRegistry::new(SessionConfig {
            queue_limit: 3,
            ..Default::default()
        });
        for n in 0..5 {
            registry.enqueue("ipad", vec![Command::back(n.to_string())]);
        }

        let drained = registry.drain_commands("ipad").unwrap();
        let reasons: Vec<&str> = drained.commands.iter().map(|c| c.reason.as_str()).collect();
        assert_eq!(reasons, vec!["2", "3", "4"]);
    }

    #[test]
    fn enqueue_all_targets_every_session() {
        let registry = SessionRegistry::default();
        assert!(registry.enqueue_all(&[Command::tap(200, 400, "test")]).is_empty());

        registry.record_frame(frame_for("b", 1), None, Vec::new());
        registry.record_frame(frame_for("a", 1), None, Vec::new());
        let devices = registry.enqueue_all(&[Command::tap(200, 400, "test")]);
        assert_eq!(devices, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.summaries()[1].queued_commands, 1);
    }

    #[test]
    fn history_merge_and_reset() {
        let registry = SessionRegistry::default();
        registry.push_history("a", entry("a", 2, 5));
        registry.push_history("b", entry("b", 1, 0));

        let merged = registry.history(None);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].device_id, "b");
        assert_eq!(registry.total_history_len(), 2);

        assert_eq!(registry.reset(Some("a")), 1);
        assert!(registry.history(Some("a")).is_empty());
        assert_eq!(registry.reset(Some("missing")), 0);
        assert_eq!(registry.reset(None), 2);
        assert!(registry.history(None).is_empty());
    }

    #[test]
    fn feedback_counts_per_session() {
        let registry = SessionRegistry::default();
        assert!(!registry.record_feedback("iphone", true));

        registry.record_frame(frame_for("iphone", 1), None, Vec::new());
        assert!(registry.record_feedback("iphone", true));
        assert!(registry.record_feedback("iphone", false));
        registry.with_session("iphone", |s| {
            assert_eq!(s.feedback_ok, 1);
            assert_eq!(s.feedback_failed, 1);
        });
    }
}
