//! 특징 해싱 임베딩.
//!
//! 소문자 단어 토큰과 문자 트라이그램을 FNV-1a로 버킷에 투영한다.
//! 해시 최상위 비트로 부호를 정해 충돌 편향을 줄이고, 결과는 L2 정규화한다.
//! 외부 모델 없이 "같은 단어를 공유하는 문장은 가깝다"는 성질만 보장한다.

use mirror_core::ports::memory::Embedder;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 단어 토큰 가중치
const WORD_WEIGHT: f32 = 1.0;
/// 트라이그램 가중치
const TRIGRAM_WEIGHT: f32 = 0.5;

fn fnv1a(prefix: u8, data: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in std::iter::once(prefix).chain(data.bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a 특징 해싱 임베더
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add(&self, vector: &mut [f32], hash: u64, weight: f32) {
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.add(&mut vector, fnv1a(b'w', token), WORD_WEIGHT);

            let padded: Vec<char> = format!(" {token} ").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add(&mut vector, fnv1a(b't', &trigram), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::cosine_similarity;

    #[test]
    fn output_is_normalized() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("Confirm UberX ride");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = HashingEmbedder::default().embed("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn case_insensitive_and_deterministic() {
        let embedder = HashingEmbedder::default();
        assert_eq!(embedder.embed("Send Button"), embedder.embed("send button"));
    }

    #[test]
    fn shared_words_are_closer() {
        let embedder = HashingEmbedder::default();
        let base = embedder.embed("What to do in Uber");
        let related = embedder.embed("Successfully executed tap on Uber confirm button");
        let unrelated = embedder.embed("zebra quantum lattice");
        assert!(cosine_similarity(&base, &related) > cosine_similarity(&base, &unrelated));
    }

    #[test]
    fn zero_dimension_is_clamped() {
        assert_eq!(HashingEmbedder::new(0).dimension(), 1);
    }
}
