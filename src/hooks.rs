//! Gradient transforms run by the optimizer before every update.

use crate::param::Param;

/// A transform over all gradients of a model, applied before the update rule.
pub trait UpdateHook: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&mut self, params: &mut [&mut Param]);
}

/// Global L2 norm over every gradient tensor.
pub fn global_grad_norm(params: &[&mut Param]) -> f32 {
    params
        .iter()
        .map(|p| p.grad.iter().map(|&g| g * g).sum::<f32>())
        .sum::<f32>()
        .sqrt()
}

/// Rescales all gradients together so their joint L2 norm is at most `threshold`.
#[derive(Clone, Debug)]
pub struct GradientClipping {
    threshold: f32,
}

impl GradientClipping {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl UpdateHook for GradientClipping {
    fn name(&self) -> &str {
        "GradientClipping"
    }

    fn apply(&mut self, params: &mut [&mut Param]) {
        let norm = global_grad_norm(params);
        // NaN norms fall through untouched so divergence stays visible
        if norm > self.threshold && norm > 0.0 {
            let scale = self.threshold / norm;
            for param in params.iter_mut() {
                param.grad.mapv_inplace(|g| g * scale);
            }
        }
    }
}

/// L2 regularisation: adds `rate * w` to every gradient.
#[derive(Clone, Debug)]
pub struct WeightDecay {
    rate: f32,
}

impl WeightDecay {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl UpdateHook for WeightDecay {
    fn name(&self) -> &str {
        "WeightDecay"
    }

    fn apply(&mut self, params: &mut [&mut Param]) {
        let rate = self.rate;
        for param in params.iter_mut() {
            let param = &mut **param;
            param.grad.zip_mut_with(&param.data, |g, &w| *g += rate * w);
        }
    }
}
