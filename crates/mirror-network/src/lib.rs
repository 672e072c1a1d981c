//! # mirror-network
//!
//! 원격 비전-언어 모델 어댑터.
//! 프레임 이미지와 프롬프트를 외부 API (Claude, OpenAI 호환 등)에 보내고
//! 모델의 텍스트 응답을 돌려준다. 응답 해석은 `mirror-vision`이 담당한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use mirror_network::vision_client::RemoteVisionModel;
//!
//! let model = RemoteVisionModel::new(&endpoint_config)?;
//! let text = model.complete(&image, "Describe this screen").await?;
//! ```

pub mod vision_client;
