//! # mirror-automation
//!
//! 자가 치유 자동화 크레이트.
//! 디바이스 세션과 명령 큐를 관리하고, 고수준 자동화 명령을
//! 접근성 → 캐시/메모리 → 비전 모델 → 좌표 보정 재시도 → 사용자 교육 순으로 실행한다.
//! 모든 실행은 감사 로그에 기록된다.

pub mod accessibility;
pub mod audit;
pub mod device;
pub mod element_cache;
pub mod executor;
pub mod pipeline;
pub mod scorer;
pub mod session;
pub mod teaching;

#[cfg(test)]
pub(crate) mod test_support;
