//! 사용자 교육 요청 중개.
//!
//! 실행기가 요소를 끝내 찾지 못하면 교육 요청을 등록하고 응답을 기다린다.
//! 클라이언트는 `GET /automation/teaching`으로 대기 요청을 보고
//! `POST /automation/teaching/{id}`로 위치를 알려준다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use mirror_core::error::CoreError;
use mirror_core::models::teaching::{TeachingRequest, TeachingResponse};
use mirror_core::ports::teaching::TeachingChannel;

struct PendingTeaching {
    request: TeachingRequest,
    responder: oneshot::Sender<TeachingResponse>,
}

/// 대기 항목 정리 (요청 future가 끝나거나 취소되면 제거)
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, PendingTeaching>>,
    request_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.lock().remove(&self.request_id).is_some() {
            debug!(request_id = %self.request_id, "교육 대기 항목 제거");
        }
    }
}

/// 교육 요청 중개자: `TeachingChannel` 구현
pub struct TeachingBroker {
    pending: Mutex<HashMap<String, PendingTeaching>>,
    timeout: Duration,
}

impl TeachingBroker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// 대기 중인 요청 (오래된 순)
    pub fn pending(&self) -> Vec<TeachingRequest> {
        let mut requests: Vec<TeachingRequest> = self
            .pending
            .lock()
            .values()
            .map(|p| p.request.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    /// 요청에 응답
    pub fn respond(&self, request_id: &str, response: TeachingResponse) -> Result<(), CoreError> {
        let pending = self
            .pending
            .lock()
            .remove(request_id)
            .ok_or_else(|| CoreError::not_found("TeachingRequest", request_id))?;

        info!(
            request_id,
            x = response.coordinates.x,
            y = response.coordinates.y,
            "교육 응답 수신"
        );
        pending
            .responder
            .send(response)
            .map_err(|_| CoreError::not_found("TeachingRequest", request_id))
    }
}

#[async_trait]
impl TeachingChannel for TeachingBroker {
    async fn request_teaching(
        &self,
        request: TeachingRequest,
    ) -> Result<Option<TeachingResponse>, CoreError> {
        let request_id = request.request_id.clone();
        let (tx, rx) = oneshot::channel();

        info!(
            request_id = %request_id,
            app = %request.app,
            description = %request.description,
            "사용자 교육 요청"
        );
        self.pending.lock().insert(
            request_id.clone(),
            PendingTeaching {
                request,
                responder: tx,
            },
        );

        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: request_id.clone(),
        };

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(_)) => Ok(None),
            Err(_) => {
                warn!(
                    request_id = %request_id,
                    timeout_secs = self.timeout.as_secs(),
                    "교육 응답 시간 초과"
                );
                Ok(None)
            }
        }
    }
}
