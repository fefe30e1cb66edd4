//! Greedy CTC decoding for the recognition models.
//!
//! The recognition models emit a `T × C` probability sequence where class 0
//! is the CTC blank and class `k+1` corresponds to line `k` of the character
//! dictionary. The models are exported with softmax fused into the head, so
//! the outputs are treated as probabilities directly.

use crate::core::errors::{OcrError, OcrResult};
use crate::core::Tensor3D;
use ndarray::ArrayView2;
use std::path::Path;

/// Greedy CTC decoder over a fixed character dictionary.
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    /// Dictionary tokens; `tokens[k]` maps to model class `k + 1`.
    tokens: Vec<String>,
}

impl CtcDecoder {
    /// Loads the dictionary from a UTF-8 file, one token per line.
    ///
    /// Line `i` maps to model output index `i + 1`; index 0 is the blank.
    pub fn from_dict_file(path: &Path) -> OcrResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OcrError::io(format!("character dictionary {}", path.display()), e))?;
        let tokens: Vec<String> = contents.lines().map(|line| line.to_string()).collect();
        if tokens.is_empty() {
            return Err(OcrError::config(format!(
                "character dictionary {} is empty",
                path.display()
            )));
        }
        Ok(Self { tokens })
    }

    /// Builds a decoder from an in-memory token list.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Number of model classes including the blank.
    pub fn class_count(&self) -> usize {
        self.tokens.len() + 1
    }

    /// Decodes a single `T × C` probability sequence.
    ///
    /// Takes the argmax per time step, collapses consecutive duplicates and
    /// drops blanks. The confidence is the mean probability over the kept
    /// (non-blank, non-repeated) positions; an empty decode yields
    /// `("", 0.0)`.
    pub fn decode(&self, probs: ArrayView2<'_, f32>) -> (String, f32) {
        let steps = probs.shape()[0];
        let classes = probs.shape()[1];

        let mut text = String::new();
        let mut kept_probs: Vec<f32> = Vec::new();
        let mut previous = 0usize;

        for t in 0..steps {
            let mut best = 0usize;
            let mut best_prob = f32::MIN;
            for c in 0..classes {
                let p = probs[[t, c]];
                if p > best_prob {
                    best_prob = p;
                    best = c;
                }
            }

            if best != 0 && best != previous {
                if let Some(token) = self.tokens.get(best - 1) {
                    text.push_str(token);
                    kept_probs.push(best_prob);
                }
            }
            previous = best;
        }

        if kept_probs.is_empty() {
            return (String::new(), 0.0);
        }
        let confidence = kept_probs.iter().sum::<f32>() / kept_probs.len() as f32;
        (text, confidence)
    }

    /// Decodes every sequence of a batched `N × T × C` prediction tensor.
    pub fn decode_batch(&self, preds: &Tensor3D) -> Vec<(String, f32)> {
        (0..preds.shape()[0])
            .map(|i| self.decode(preds.index_axis(ndarray::Axis(0), i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn decoder() -> CtcDecoder {
        CtcDecoder::from_tokens(vec!["a".into(), "b".into(), "c".into()])
    }

    /// Probability rows with a dominant class per step.
    fn probs_for(argmax: &[usize], peak: f32, classes: usize) -> Array2<f32> {
        let rest = (1.0 - peak) / (classes - 1) as f32;
        let mut probs = Array2::from_elem((argmax.len(), classes), rest);
        for (t, &c) in argmax.iter().enumerate() {
            probs[[t, c]] = peak;
        }
        probs
    }

    #[test]
    fn collapses_duplicates_and_drops_blanks() {
        let probs = probs_for(&[1, 1, 0, 1, 2, 2, 0, 3], 0.9, 4);
        let (text, conf) = decoder().decode(probs.view());
        assert_eq!(text, "abac");
        assert!((conf - 0.9).abs() < 1e-5);
    }

    #[test]
    fn blank_separated_repeat_is_kept() {
        let probs = probs_for(&[2, 0, 2], 0.8, 4);
        let (text, _) = decoder().decode(probs.view());
        assert_eq!(text, "bb");
    }

    #[test]
    fn all_blank_sequence_decodes_to_empty() {
        let probs = probs_for(&[0, 0, 0, 0], 0.99, 4);
        let (text, conf) = decoder().decode(probs.view());
        assert!(text.is_empty());
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn decoding_is_idempotent() {
        let probs = probs_for(&[1, 2, 0, 3, 3, 1], 0.85, 4);
        let first = decoder().decode(probs.view());
        let second = decoder().decode(probs.view());
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn confidence_averages_only_kept_positions() {
        let classes = 4;
        let mut probs = probs_for(&[1, 1, 2], 0.9, classes);
        // Second step's duplicate is not counted, so bias its peak.
        probs[[1, 1]] = 0.5;
        let (text, conf) = decoder().decode(probs.view());
        assert_eq!(text, "ab");
        assert!((conf - 0.9).abs() < 1e-5);
    }
}
