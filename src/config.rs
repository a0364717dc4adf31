use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, Result};

/// Shape and regularisation settings of the recurrent language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    /// Number of distinct token ids (max train id + 1)
    pub vocab_size: usize,
    /// Width of the embedding and of every LSTM cell's state
    pub hidden_dim: usize,
    /// Number of stacked LSTM cells
    pub num_layers: usize,
    /// Dropout applied after the embedding and before the output projection
    pub dropout_embedding_softmax: f32,
    /// Dropout applied in front of every LSTM cell
    pub dropout_rnn: f32,
    /// Seed for the model's dropout generator and initialisation; OS entropy when `None`
    pub seed: Option<u64>,
}

impl LstmConfig {
    pub fn new(vocab_size: usize, hidden_dim: usize, num_layers: usize) -> Self {
        Self {
            vocab_size,
            hidden_dim,
            num_layers,
            dropout_embedding_softmax: 0.5,
            dropout_rnn: 0.2,
            seed: None,
        }
    }

    pub fn with_dropout(mut self, embedding_softmax: f32, rnn: f32) -> Self {
        self.dropout_embedding_softmax = embedding_softmax;
        self.dropout_rnn = rnn;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_layers == 0 {
            return Err(invalid("num_layers must be positive"));
        }
        if self.hidden_dim == 0 {
            return Err(invalid("hidden_dim must be positive"));
        }
        if self.vocab_size == 0 {
            return Err(invalid("vocab_size must be positive"));
        }
        check_rate("dropout_embedding_softmax", self.dropout_embedding_softmax)?;
        check_rate("dropout_rnn", self.dropout_rnn)?;
        Ok(())
    }
}

/// Full set of knobs for a training run.
///
/// Defaults mirror the reference PTB recipe: a 2x640 LSTM trained with
/// momentum SGD at lr 1.0, decaying by 0.98 per epoch from epoch 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub batch_size: usize,
    /// Length of the truncated BPTT window
    pub seq_length: usize,
    pub total_epochs: usize,
    /// Accelerator index; negative selects the host
    pub gpu_device: i32,
    /// Global gradient-norm threshold, 0 disables clipping
    pub grad_clip: f32,
    pub learning_rate: f32,
    /// L2 weight-decay coefficient, 0 disables the hook
    pub weight_decay: f32,
    pub dropout_embedding_softmax: f32,
    pub dropout_rnn: f32,
    pub momentum: f32,
    /// Update rule name (`sgd`, `msgd`, `nesterov`, `adam`, `adagrad`, `rmsprop`)
    pub optimizer: String,
    pub ndim_hidden: usize,
    pub num_layers: usize,
    /// First epoch index at whose end the learning rate decays
    pub lr_decay_epoch: usize,
    pub model_filename: PathBuf,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            seq_length: 35,
            total_epochs: 300,
            gpu_device: -1,
            grad_clip: 5.0,
            learning_rate: 1.0,
            weight_decay: 0.000001,
            dropout_embedding_softmax: 0.5,
            dropout_rnn: 0.2,
            momentum: 0.9,
            optimizer: "msgd".to_string(),
            ndim_hidden: 640,
            num_layers: 2,
            lr_decay_epoch: 20,
            model_filename: PathBuf::from("model.bin"),
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Rejects configurations that cannot produce a model or a training step.
    ///
    /// Runs before any model is constructed.
    pub fn validate(&self) -> Result<()> {
        if self.num_layers == 0 {
            return Err(invalid("num_layers must be positive"));
        }
        if self.ndim_hidden == 0 {
            return Err(invalid("ndim_hidden must be positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be positive"));
        }
        if self.seq_length == 0 {
            return Err(invalid("seq_length must be positive"));
        }
        if self.gpu_device >= 0 {
            return Err(invalid(&format!(
                "accelerator device {} requested but only host execution is available; pass a negative device index",
                self.gpu_device
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate must be a positive finite number"));
        }
        if self.grad_clip.is_nan() || self.grad_clip < 0.0 {
            return Err(invalid("grad_clip must be non-negative"));
        }
        if self.weight_decay.is_nan() || self.weight_decay < 0.0 {
            return Err(invalid("weight_decay must be non-negative"));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(invalid("momentum must be in [0, 1)"));
        }
        check_rate("dropout_embedding_softmax", self.dropout_embedding_softmax)?;
        check_rate("dropout_rnn", self.dropout_rnn)?;
        Ok(())
    }

    /// Model shape for a corpus with `vocab_size` distinct ids.
    pub fn model_config(&self, vocab_size: usize) -> LstmConfig {
        LstmConfig {
            vocab_size,
            hidden_dim: self.ndim_hidden,
            num_layers: self.num_layers,
            dropout_embedding_softmax: self.dropout_embedding_softmax,
            dropout_rnn: self.dropout_rnn,
            seed: self.seed,
        }
    }
}

fn check_rate(name: &str, rate: f32) -> Result<()> {
    if (0.0..1.0).contains(&rate) {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be in [0, 1), got {rate}")))
    }
}

fn invalid(message: &str) -> ModelError {
    ModelError::InvalidConfig {
        message: message.to_string(),
    }
}
