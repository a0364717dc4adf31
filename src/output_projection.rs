use ndarray::{Array2, Axis};
use rand::Rng;

use crate::param::{Param, ParamRole};

/// Dense projection from the top hidden state to vocabulary logits.
#[derive(Debug, Clone)]
pub struct OutputProjection {
    pub weight: Param, // (hidden_dim, vocab_size)
    pub bias: Param,   // (1, vocab_size)
}

impl OutputProjection {
    /// LeCun-normal weights, std = sqrt(1 / fan_in), and zero bias.
    pub fn new<R: Rng + ?Sized>(hidden_dim: usize, vocab_size: usize, rng: &mut R) -> Self {
        let std = (1.0 / hidden_dim as f32).sqrt();
        Self {
            weight: Param::normal("dense.weight", ParamRole::Weight, (hidden_dim, vocab_size), std, rng),
            bias: Param::zeros("dense.bias", ParamRole::Bias, (1, vocab_size)),
        }
    }

    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        // input is [batch, hidden_dim], output is [batch, vocab_size]
        input.dot(&self.weight.data) + &self.bias.data
    }

    /// Accumulates parameter gradients and returns the gradient w.r.t. `input`.
    pub fn backward(&mut self, input: &Array2<f32>, output_grads: &Array2<f32>) -> Array2<f32> {
        self.weight.grad += &input.t().dot(output_grads);
        self.bias.grad += &output_grads.sum_axis(Axis(0)).insert_axis(Axis(0));
        output_grads.dot(&self.weight.data.t())
    }
}
