//! 디바이스 제어 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::command::Command;
use crate::models::frame::Frame;

/// 휴대폰에 명령을 전달하고 현재 화면을 가져온다.
///
/// 구현체: `QueueingDeviceController` (mirror-automation)
#[async_trait]
pub trait DeviceController: Send + Sync {
    /// 명령 전달 (전달 성공 여부)
    async fn execute(&self, device_id: &str, command: &Command) -> Result<bool, CoreError>;

    /// 디바이스의 현재 화면 (수신한 프레임이 없으면 None)
    async fn capture_screen(&self, device_id: &str) -> Result<Option<Frame>, CoreError>;
}
