use ndarray::Array2;
use rand::Rng;

use crate::errors::{ModelError, Result};
use crate::param::{Param, ParamRole};

/// Token id → dense vector lookup table of shape `(vocab_size, dim)`.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub weight: Param,
}

impl Embedding {
    /// Table initialised from N(0, 1), the usual default for embedding lookups.
    pub fn new<R: Rng + ?Sized>(vocab_size: usize, dim: usize, rng: &mut R) -> Self {
        Self {
            weight: Param::normal("embed.weight", ParamRole::Embedding, (vocab_size, dim), 1.0, rng),
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.data.nrows()
    }

    pub fn dim(&self) -> usize {
        self.weight.data.ncols()
    }

    /// Gathers one row per id; output shape is `(ids.len(), dim)`.
    pub fn forward(&self, token_ids: &[usize]) -> Result<Array2<f32>> {
        let table = &self.weight.data;
        let mut out = Array2::<f32>::zeros((token_ids.len(), table.ncols()));
        for (i, &token_id) in token_ids.iter().enumerate() {
            if token_id >= table.nrows() {
                return Err(ModelError::InvalidInput {
                    message: format!(
                        "token id {} out of range for vocabulary of size {}",
                        token_id,
                        table.nrows()
                    ),
                });
            }
            out.row_mut(i).assign(&table.row(token_id));
        }
        Ok(out)
    }

    /// Scatter-adds `output_grads` rows into the rows of the looked-up ids.
    pub fn backward(&mut self, token_ids: &[usize], output_grads: &Array2<f32>) {
        for (i, &token_id) in token_ids.iter().enumerate() {
            let mut grad_row = self.weight.grad.row_mut(token_id);
            grad_row += &output_grads.row(i);
        }
    }
}
