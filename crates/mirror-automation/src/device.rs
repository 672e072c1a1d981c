//! 명령 큐 기반 디바이스 제어.
//!
//! 휴대폰은 `GET /commands`로 명령을 가져가므로, 실행은 세션 큐에 넣는 것으로 끝난다.
//! 화면 캡처는 디바이스가 마지막으로 보낸 프레임을 돌려준다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::command::Command;
use mirror_core::models::frame::Frame;
use mirror_core::ports::device::DeviceController;

use crate::session::SessionRegistry;

/// 세션 명령 큐 디바이스 제어기
pub struct QueueingDeviceController {
    sessions: Arc<SessionRegistry>,
}

impl QueueingDeviceController {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl DeviceController for QueueingDeviceController {
    async fn execute(&self, device_id: &str, command: &Command) -> Result<bool, CoreError> {
        debug!(device_id, action = command.action_name(), "디바이스 명령 큐잉");
        let added = self.sessions.enqueue(device_id, [command.clone()]);
        Ok(added == 1)
    }

    async fn capture_screen(&self, device_id: &str) -> Result<Option<Frame>, CoreError> {
        Ok(self.sessions.device_frame(device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::frame_for;

    #[tokio::test]
    async fn execute_queues_for_next_poll() {
        let sessions = Arc::new(SessionRegistry::default());
        let controller = QueueingDeviceController::new(sessions.clone());

        assert!(controller
            .execute("iphone", &Command::tap(10, 20, "tap"))
            .await
            .unwrap());

        let drained = sessions.drain_commands("iphone").unwrap();
        assert_eq!(drained.commands, vec![Command::tap(10, 20, "tap")]);
    }

    #[tokio::test]
    async fn capture_returns_latest_device_frame() {
        let sessions = Arc::new(SessionRegistry::default());
        let controller = QueueingDeviceController::new(sessions.clone());
        assert!(controller.capture_screen("iphone").await.unwrap().is_none());

        sessions.record_frame(frame_for("iphone", 4), None, Vec::new());
        sessions.record_frame(frame_for("ipad", 9), None, Vec::new());

        let frame = controller.capture_screen("iphone").await.unwrap().unwrap();
        assert_eq!(frame.metadata.frame_number, 4);
    }
}
