use ndarray::Array2;

/// First and second moment estimates for one parameter tensor.
#[derive(Clone, Debug)]
pub struct Adam {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    pub m: Array2<f32>,
    pub v: Array2<f32>,
}

impl Adam {
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
        }
    }

    /// Reset moment estimates (useful for restarting training)
    pub fn reset(&mut self) {
        self.m.fill(0.0);
        self.v.fill(0.0);
    }

    /// One bias-corrected Adam update; `timestep` is 1-based and shared by
    /// all tensors of an optimizer.
    #[inline]
    pub fn step(&mut self, params: &mut Array2<f32>, grads: &Array2<f32>, lr: f32, timestep: usize) {
        let (beta1, beta2) = (self.beta1, self.beta2);
        self.m.zip_mut_with(grads, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        self.v.zip_mut_with(grads, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let m_correction = 1.0 - beta1.powi(timestep as i32);
        let v_correction = 1.0 - beta2.powi(timestep as i32);

        let m_hat = &self.m / m_correction;
        let v_hat = &self.v / v_correction;

        let update = &m_hat / &(v_hat.mapv(f32::sqrt) + self.epsilon);
        *params -= &(update * lr);
    }
}
