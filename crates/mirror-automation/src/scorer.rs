//! 실행 신뢰도 점수.
//!
//! `user:app:action:description` 키별 최근 성공 이력, 대상 식별 정보,
//! 모델 신뢰도, 사용자 교육 여부를 조합해 0.0 ~ 1.0 점수를 낸다.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use mirror_core::models::automation::AutomationCommand;

/// 이력이 없을 때 기본 점수
const BASE_SCORE: f64 = 0.5;
/// 사용자 교육으로 학습한 요소 점수
const LEARNED_SCORE: f64 = 0.99;

/// 점수 계산 입력
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub user_id: &'a str,
    pub app: &'a str,
    pub command: &'a AutomationCommand,
    /// 분석기/모델 신뢰도
    pub ai_confidence: Option<f64>,
    /// 사용자 교육으로 학습한 요소인지 여부
    pub learned_from_user: bool,
}

/// 신뢰도 점수기
pub struct ConfidenceScorer {
    history: Mutex<HashMap<String, VecDeque<bool>>>,
    history_limit: usize,
}

impl ConfidenceScorer {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
            history_limit: history_limit.max(1),
        }
    }

    fn key(user_id: &str, app: &str, command: &AutomationCommand) -> String {
        format!(
            "{user_id}:{app}:{}:{}",
            command.action.as_str(),
            command.target.description_key()
        )
    }

    /// 키의 성공률 (이력 없으면 None)
    pub fn success_rate(&self, user_id: &str, app: &str, command: &AutomationCommand) -> Option<f64> {
        let history = self.history.lock();
        history
            .get(&Self::key(user_id, app, command))
            .filter(|outcomes| !outcomes.is_empty())
            .map(|outcomes| {
                outcomes.iter().filter(|ok| **ok).count() as f64 / outcomes.len() as f64
            })
    }

    /// 신뢰도 점수 계산
    pub fn score(&self, ctx: &ScoreContext<'_>) -> f64 {
        if ctx.learned_from_user {
            return LEARNED_SCORE;
        }

        let mut score = match self.success_rate(ctx.user_id, ctx.app, ctx.command) {
            Some(rate) => 0.3 * BASE_SCORE + 0.7 * rate,
            None => BASE_SCORE,
        };

        let target = &ctx.command.target;
        if target.element_id.is_some() {
            score += 0.2;
        } else if target.text.is_some() {
            score += 0.1;
        }

        if let Some(ai) = ctx.ai_confidence {
            score = 0.7 * score + 0.3 * ai;
        }

        let score = score.min(1.0);
        debug!(
            user_id = ctx.user_id,
            app = ctx.app,
            action = ctx.command.action.as_str(),
            score,
            "신뢰도 점수"
        );
        score
    }

    /// 실행 결과 기록 (키별 최근 `history_limit`개 유지)
    pub fn update_history(
        &self,
        user_id: &str,
        app: &str,
        command: &AutomationCommand,
        success: bool,
    ) {
        let mut history = self.history.lock();
        let outcomes = history.entry(Self::key(user_id, app, command)).or_default();
        while outcomes.len() >= self.history_limit {
            outcomes.pop_front();
        }
        outcomes.push_back(success);
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(100)
    }
}
