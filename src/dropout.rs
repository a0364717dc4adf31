use ndarray::Array2;
use rand::Rng;

use crate::mode::Phase;

/// Inverted dropout: kept units are scaled by `1 / (1 - rate)` so that
/// evaluation needs no correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    rate: f32,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Applies a freshly sampled mask in training phase.
    ///
    /// Returns the masked activations and the mask (already scaled), or
    /// `None` for the mask when nothing was dropped.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        input: &Array2<f32>,
        phase: Phase,
        rng: &mut R,
    ) -> (Array2<f32>, Option<Array2<f32>>) {
        if phase == Phase::Eval || self.rate <= 0.0 {
            return (input.clone(), None);
        }
        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        let mask = Array2::from_shape_fn(input.raw_dim(), |_| {
            if rng.random::<f32>() < keep { scale } else { 0.0 }
        });
        (input * &mask, Some(mask))
    }
}

/// Multiplies `grads` by `mask` when one was used on the forward pass.
pub fn backward_mask(grads: Array2<f32>, mask: Option<&Array2<f32>>) -> Array2<f32> {
    match mask {
        Some(mask) => grads * mask,
        None => grads,
    }
}
