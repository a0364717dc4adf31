use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::LstmConfig;
use crate::dropout::{Dropout, backward_mask};
use crate::embeddings::Embedding;
use crate::errors::{ModelError, Result};
use crate::lstm::{LstmCell, LstmStep};
use crate::mode::ForwardMode;
use crate::output_projection::OutputProjection;
use crate::param::{Param, ParameterSet, Parameterized};

/// Everything one recorded time step needs for the backward pass.
#[derive(Debug)]
struct StepRecord {
    token_ids: Vec<usize>,
    embed_mask: Option<Array2<f32>>,
    layers: Vec<LayerRecord>,
    dense_input: Array2<f32>,
    dense_mask: Option<Array2<f32>>,
}

#[derive(Debug)]
struct LayerRecord {
    input_mask: Option<Array2<f32>>,
    step: LstmStep,
}

/// Embedding → stacked LSTM cells → dense projection, one time step per call.
///
/// Recurrent state lives in the cells and persists across [`forward`] calls
/// until [`reset_state`] is invoked. Steps taken with a recording
/// [`ForwardMode`] are appended to a tape that [`backward`] consumes, which is
/// what bounds backpropagation to the current window.
///
/// [`forward`]: LstmLanguageModel::forward
/// [`reset_state`]: LstmLanguageModel::reset_state
/// [`backward`]: LstmLanguageModel::backward
#[derive(Debug)]
pub struct LstmLanguageModel {
    config: LstmConfig,
    embed: Embedding,
    cells: Vec<LstmCell>,
    dense: OutputProjection,
    embed_dropout: Dropout,
    rnn_dropout: Dropout,
    rng: StdRng,
    tape: Vec<StepRecord>,
}

impl LstmLanguageModel {
    pub fn new(config: LstmConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let embed = Embedding::new(config.vocab_size, config.hidden_dim, &mut rng);
        let cells: Vec<LstmCell> = (0..config.num_layers)
            .map(|index| LstmCell::new(index, config.hidden_dim, config.hidden_dim, &mut rng))
            .collect();
        let dense = OutputProjection::new(config.hidden_dim, config.vocab_size, &mut rng);

        let model = Self {
            embed_dropout: Dropout::new(config.dropout_embedding_softmax),
            rnn_dropout: Dropout::new(config.dropout_rnn),
            config,
            embed,
            cells,
            dense,
            rng,
            tape: Vec::new(),
        };
        debug!(
            vocab_size = model.config.vocab_size,
            hidden_dim = model.config.hidden_dim,
            num_layers = model.config.num_layers,
            parameters = model.num_parameters(),
            "LSTM language model initialised"
        );
        Ok(model)
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn hidden_dim(&self) -> usize {
        self.config.hidden_dim
    }

    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[LstmCell] {
        &self.cells
    }

    /// Number of forward steps waiting for a backward pass.
    pub fn recorded_steps(&self) -> usize {
        self.tape.len()
    }

    /// Clears every cell's state and drops any recorded steps.
    pub fn reset_state(&mut self) {
        for cell in &mut self.cells {
            cell.reset_state();
        }
        self.tape.clear();
    }

    /// One time step for a batch of token ids; returns `(batch, vocab_size)` logits.
    pub fn forward(&mut self, token_ids: &[usize], mode: ForwardMode) -> Result<Array2<f32>> {
        let record = mode.records();
        let embedded = self.embed.forward(token_ids)?;
        let (mut activations, embed_mask) = self.embed_dropout.apply(&embedded, mode.phase, &mut self.rng);

        let mut layers = Vec::with_capacity(if record { self.cells.len() } else { 0 });
        for cell in &mut self.cells {
            let (dropped, input_mask) = self.rnn_dropout.apply(&activations, mode.phase, &mut self.rng);
            let (hidden, step) = cell.forward(&dropped, record)?;
            if let Some(step) = step {
                layers.push(LayerRecord { input_mask, step });
            }
            activations = hidden;
        }

        let (dense_input, dense_mask) = self.embed_dropout.apply(&activations, mode.phase, &mut self.rng);
        let logits = self.dense.forward(&dense_input);

        if record {
            self.tape.push(StepRecord {
                token_ids: token_ids.to_vec(),
                embed_mask,
                layers,
                dense_input,
                dense_mask,
            });
        }
        Ok(logits)
    }

    /// Backpropagates through every recorded step, newest first.
    ///
    /// `step_grads[t]` is the loss gradient w.r.t. the logits returned by the
    /// `t`-th recorded forward call. Gradients are accumulated into the
    /// parameters' buffers; the tape is consumed.
    pub fn backward(&mut self, step_grads: &[Array2<f32>]) -> Result<()> {
        let tape = std::mem::take(&mut self.tape);
        if tape.len() != step_grads.len() {
            return Err(ModelError::GradientError {
                message: format!(
                    "backward received {} step gradients for {} recorded steps",
                    step_grads.len(),
                    tape.len()
                ),
            });
        }

        let num_layers = self.cells.len();
        let mut dh_next: Vec<Option<Array2<f32>>> = vec![None; num_layers];
        let mut dc_next: Vec<Option<Array2<f32>>> = vec![None; num_layers];

        for (record, d_logits) in tape.iter().zip(step_grads).rev() {
            let d_dense = self.dense.backward(&record.dense_input, d_logits);
            let mut d_activations = backward_mask(d_dense, record.dense_mask.as_ref());

            for (index, (cell, layer)) in self.cells.iter_mut().zip(&record.layers).enumerate().rev() {
                let dh = match dh_next[index].take() {
                    Some(carried) => d_activations + &carried,
                    None => d_activations,
                };
                let (d_input, dh_prev, dc_prev) = cell.backward(&layer.step, dh, dc_next[index].take());
                dh_next[index] = Some(dh_prev);
                dc_next[index] = Some(dc_prev);
                d_activations = backward_mask(d_input, layer.input_mask.as_ref());
            }

            let d_embedded = backward_mask(d_activations, record.embed_mask.as_ref());
            self.embed.backward(&record.token_ids, &d_embedded);
        }
        Ok(())
    }

    pub fn to_parameter_set(&self) -> ParameterSet {
        ParameterSet::from_params(self.parameters())
    }

    /// Overwrites every parameter from `set`.
    ///
    /// All names and shapes are checked before anything is written, so a
    /// mismatching set leaves the model unchanged.
    pub fn load_parameter_set(&mut self, set: &ParameterSet) -> Result<()> {
        for param in self.parameters() {
            let tensor = set.get(&param.name).ok_or_else(|| ModelError::Checkpoint {
                message: format!("parameter '{}' missing from checkpoint", param.name),
            })?;
            if tensor.dim() != param.data.dim() {
                return Err(ModelError::Checkpoint {
                    message: format!(
                        "parameter '{}' has shape {:?} in checkpoint but {:?} in model",
                        param.name,
                        tensor.dim(),
                        param.data.dim()
                    ),
                });
            }
        }
        for param in self.parameters_mut() {
            if let Some(tensor) = set.get(&param.name) {
                param.data.assign(tensor);
            }
        }
        Ok(())
    }
}

impl Parameterized for LstmLanguageModel {
    /// Parameters in their canonical order: embedding, cells bottom-up, projection.
    fn parameters(&self) -> Vec<&Param> {
        let mut params = vec![&self.embed.weight];
        for cell in &self.cells {
            params.extend([&cell.upward, &cell.lateral, &cell.bias]);
        }
        params.extend([&self.dense.weight, &self.dense.bias]);
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        let mut params = vec![&mut self.embed.weight];
        for cell in &mut self.cells {
            params.extend([&mut cell.upward, &mut cell.lateral, &mut cell.bias]);
        }
        params.extend([&mut self.dense.weight, &mut self.dense.bias]);
        params
    }
}
