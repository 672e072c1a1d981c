//! MIRROR 도메인 모델.
//!
//! 휴대폰-서버 간 주고받는 프레임/명령과 서버 내부의 세션, 분석, 자동화, 메모리
//! 데이터 구조체를 정의한다. 모든 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod analysis;
pub mod automation;
pub mod command;
pub mod element;
pub mod frame;
pub mod memory;
pub mod session;
pub mod teaching;
