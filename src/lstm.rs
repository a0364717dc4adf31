//! A single LSTM cell with explicitly owned recurrent state.
//!
//! Gate pre-activations are laid out along the columns as `[i | f | o | g]`,
//! each block `hidden_dim` wide:
//!
//! ```text
//! a  = x·W_up + h_prev·W_lat + b
//! c  = sigmoid(a_i) * tanh(a_g) + sigmoid(a_f) * c_prev
//! h  = sigmoid(a_o) * tanh(c)
//! ```

use ndarray::{Array2, Axis, s};
use rand::Rng;

use crate::activations::{sigmoid, tanh};
use crate::errors::{ModelError, Result};
use crate::param::{Param, ParamRole};

/// Standard deviation used for both weight matrices of every cell.
pub const CELL_WEIGHT_STD: f32 = 0.01;

/// Hidden and cell activations carried between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmState {
    pub h: Array2<f32>,
    pub c: Array2<f32>,
}

impl LstmState {
    pub fn zeros(batch: usize, hidden_dim: usize) -> Self {
        Self {
            h: Array2::zeros((batch, hidden_dim)),
            c: Array2::zeros((batch, hidden_dim)),
        }
    }
}

/// Activations of one forward call, kept for the backward pass.
#[derive(Debug, Clone)]
pub struct LstmStep {
    input: Array2<f32>,
    h_prev: Array2<f32>,
    c_prev: Array2<f32>,
    i: Array2<f32>,
    f: Array2<f32>,
    o: Array2<f32>,
    g: Array2<f32>,
    tanh_c: Array2<f32>,
}

#[derive(Debug, Clone)]
pub struct LstmCell {
    pub upward: Param,  // (input_dim, 4 * hidden_dim)
    pub lateral: Param, // (hidden_dim, 4 * hidden_dim)
    pub bias: Param,    // (1, 4 * hidden_dim)
    hidden_dim: usize,
    state: Option<LstmState>,
}

impl LstmCell {
    pub fn new<R: Rng + ?Sized>(index: usize, input_dim: usize, hidden_dim: usize, rng: &mut R) -> Self {
        let gates = 4 * hidden_dim;
        let mut bias = Param::zeros(format!("lstm.{index}.bias"), ParamRole::Bias, (1, gates));
        // forget gate starts open
        bias.data.slice_mut(s![.., hidden_dim..2 * hidden_dim]).fill(1.0);

        Self {
            upward: Param::normal(
                format!("lstm.{index}.upward.weight"),
                ParamRole::RecurrentWeight,
                (input_dim, gates),
                CELL_WEIGHT_STD,
                rng,
            ),
            lateral: Param::normal(
                format!("lstm.{index}.lateral.weight"),
                ParamRole::RecurrentWeight,
                (hidden_dim, gates),
                CELL_WEIGHT_STD,
                rng,
            ),
            bias,
            hidden_dim,
            state: None,
        }
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    pub fn state(&self) -> Option<&LstmState> {
        self.state.as_ref()
    }

    pub fn reset_state(&mut self) {
        self.state = None;
    }

    /// Advances the cell by one time step and returns the new hidden state.
    ///
    /// When `record` is set the activations needed for backpropagation are
    /// returned alongside.
    pub fn forward(&mut self, input: &Array2<f32>, record: bool) -> Result<(Array2<f32>, Option<LstmStep>)> {
        let batch = input.nrows();
        let hd = self.hidden_dim;
        let prev = match self.state.take() {
            Some(state) if state.h.nrows() == batch => state,
            Some(state) => {
                return Err(ModelError::InvalidInput {
                    message: format!(
                        "batch size changed from {} to {} without resetting recurrent state",
                        state.h.nrows(),
                        batch
                    ),
                });
            }
            None => LstmState::zeros(batch, hd),
        };

        let pre = input.dot(&self.upward.data) + &prev.h.dot(&self.lateral.data) + &self.bias.data;
        let i = sigmoid(&pre.slice(s![.., 0..hd]).to_owned());
        let f = sigmoid(&pre.slice(s![.., hd..2 * hd]).to_owned());
        let o = sigmoid(&pre.slice(s![.., 2 * hd..3 * hd]).to_owned());
        let g = tanh(&pre.slice(s![.., 3 * hd..4 * hd]).to_owned());

        let c = &i * &g + &f * &prev.c;
        let tanh_c = tanh(&c);
        let h = &o * &tanh_c;

        let step = record.then(|| LstmStep {
            input: input.clone(),
            h_prev: prev.h.clone(),
            c_prev: prev.c.clone(),
            i,
            f,
            o,
            g,
            tanh_c,
        });

        self.state = Some(LstmState { h: h.clone(), c });
        Ok((h, step))
    }

    /// Backpropagates one recorded step.
    ///
    /// `dh` is the total gradient reaching this step's hidden output and
    /// `dc_next` the gradient flowing back from the next step's cell state.
    /// Returns `(d_input, dh_prev, dc_prev)`.
    pub fn backward(
        &mut self,
        step: &LstmStep,
        dh: Array2<f32>,
        dc_next: Option<Array2<f32>>,
    ) -> (Array2<f32>, Array2<f32>, Array2<f32>) {
        let hd = self.hidden_dim;

        let mut dc = &dh * &step.o * &step.tanh_c.mapv(|t| 1.0 - t * t);
        if let Some(dc_next) = dc_next {
            dc += &dc_next;
        }

        let d_o = &dh * &step.tanh_c;
        let d_i = &dc * &step.g;
        let d_g = &dc * &step.i;
        let d_f = &dc * &step.c_prev;
        let dc_prev = &dc * &step.f;

        let mut d_pre = Array2::<f32>::zeros((dh.nrows(), 4 * hd));
        d_pre
            .slice_mut(s![.., 0..hd])
            .assign(&(&d_i * &step.i.mapv(|v| v * (1.0 - v))));
        d_pre
            .slice_mut(s![.., hd..2 * hd])
            .assign(&(&d_f * &step.f.mapv(|v| v * (1.0 - v))));
        d_pre
            .slice_mut(s![.., 2 * hd..3 * hd])
            .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));
        d_pre
            .slice_mut(s![.., 3 * hd..4 * hd])
            .assign(&(&d_g * &step.g.mapv(|v| 1.0 - v * v)));

        self.upward.grad += &step.input.t().dot(&d_pre);
        self.lateral.grad += &step.h_prev.t().dot(&d_pre);
        self.bias.grad += &d_pre.sum_axis(Axis(0)).insert_axis(Axis(0));

        let d_input = d_pre.dot(&self.upward.data.t());
        let dh_prev = d_pre.dot(&self.lateral.data.t());
        (d_input, dh_prev, dc_prev)
    }
}
