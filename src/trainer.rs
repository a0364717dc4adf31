use std::time::{Duration, Instant};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

use crate::activations::softmax_cross_entropy;
use crate::checkpoint;
use crate::config::TrainingConfig;
use crate::dataset_loader::Corpus;
use crate::errors::{ModelError, Result};
use crate::evaluation::evaluate;
use crate::hooks::{GradientClipping, WeightDecay};
use crate::mode::ForwardMode;
use crate::model::LstmLanguageModel;
use crate::optimizer::Optimizer;
use crate::param::Parameterized;
use crate::progress::{ConsoleReporter, ProgressReporter};
use crate::{EVAL_INTERVAL, LR_DECAY_FACTOR, MIN_LEARNING_RATE};

/// One training batch: `batch_size` random windows of the train sequence.
///
/// `targets` is `inputs` shifted one token to the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub inputs: Array2<usize>,
    pub targets: Array2<usize>,
}

impl Window {
    pub fn batch_size(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn seq_length(&self) -> usize {
        self.inputs.ncols()
    }
}

/// Updates per epoch: `floor(len / (seq_length * batch_size))`.
pub fn total_iterations(train_len: usize, seq_length: usize, batch_size: usize) -> usize {
    train_len / (seq_length * batch_size)
}

/// Draws `batch_size` offsets uniformly from `[0, len - seq_length - 1)` and
/// slices inputs/targets out of `train`.
pub fn sample_window<R: Rng + ?Sized>(
    train: &[usize],
    batch_size: usize,
    seq_length: usize,
    rng: &mut R,
) -> Result<Window> {
    if train.len() <= seq_length + 1 {
        return Err(ModelError::InvalidInput {
            message: format!(
                "train sequence of {} tokens is too short for windows of {}",
                train.len(),
                seq_length
            ),
        });
    }

    let upper = train.len() - seq_length - 1;
    let mut inputs = Array2::zeros((batch_size, seq_length));
    let mut targets = Array2::zeros((batch_size, seq_length));
    for row in 0..batch_size {
        let offset = rng.random_range(0..upper);
        for t in 0..seq_length {
            inputs[[row, t]] = train[offset + t];
            targets[[row, t]] = train[offset + t + 1];
        }
    }
    Ok(Window { inputs, targets })
}

/// What one epoch did, as reported on the console and in the logs.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// 0-based; printed 1-based
    pub epoch: usize,
    pub duration: Duration,
    /// Mean over iterations of the per-window summed loss
    pub mean_loss: f64,
    /// Validation NLL, 0 when the epoch was not evaluated
    pub nll: f64,
    /// `None` when the epoch was not evaluated
    pub perplexity: Option<f64>,
    /// Rate used during this epoch, before any decay
    pub learning_rate: f32,
    pub total_minutes: u64,
    pub iterations: usize,
}

/// Drives truncated-BPTT training of an [`LstmLanguageModel`] over a [`Corpus`].
pub struct Trainer {
    config: TrainingConfig,
    corpus: Corpus,
    model: LstmLanguageModel,
    optimizer: Optimizer,
    rng: StdRng,
    reporter: Box<dyn ProgressReporter>,
    started: Instant,
}

impl Trainer {
    /// Builds the model, resumes from `config.model_filename` if it exists, and
    /// prepares the optimizer with its pre-update hooks.
    pub fn new(config: TrainingConfig, corpus: Corpus) -> Result<Self> {
        config.validate()?;

        let train_len = corpus.train.len();
        if train_len <= config.seq_length + 1 {
            return Err(ModelError::InvalidInput {
                message: format!(
                    "train sequence has {} tokens but seq_length is {}",
                    train_len, config.seq_length
                ),
            });
        }
        if total_iterations(train_len, config.seq_length, config.batch_size) == 0 {
            return Err(ModelError::InvalidInput {
                message: format!(
                    "train sequence of {} tokens yields no full batch of {}x{}",
                    train_len, config.batch_size, config.seq_length
                ),
            });
        }
        if corpus.dev.len() < 2 {
            return Err(ModelError::InvalidInput {
                message: format!("dev sequence has {} tokens, need at least 2", corpus.dev.len()),
            });
        }

        let vocab_size = corpus.vocab_size();
        if let Some(&bad) = corpus.dev.iter().find(|&&id| id >= vocab_size) {
            return Err(ModelError::InvalidInput {
                message: format!("dev token id {bad} is outside the train vocabulary of {vocab_size}"),
            });
        }

        let mut model = LstmLanguageModel::new(config.model_config(vocab_size))?;
        if checkpoint::load(&mut model, &config.model_filename)? {
            info!(path = %config.model_filename.display(), "Resuming from existing checkpoint");
        }

        let mut optimizer = Optimizer::configure(&config.optimizer, config.learning_rate, config.momentum)?;
        optimizer.bind(&model);
        if config.grad_clip > 0.0 {
            optimizer.add_pre_update_hook(Box::new(GradientClipping::new(config.grad_clip)));
        }
        if config.weight_decay > 0.0 {
            optimizer.add_pre_update_hook(Box::new(WeightDecay::new(config.weight_decay)));
        }

        // separate stream from the model's dropout RNG
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };

        debug!(
            vocab_size,
            train = train_len,
            dev = corpus.dev.len(),
            parameters = model.num_parameters(),
            hooks = ?optimizer.hook_names(),
            "Trainer ready"
        );

        Ok(Self {
            config,
            corpus,
            model,
            optimizer,
            rng,
            reporter: Box::new(ConsoleReporter::new()),
            started: Instant::now(),
        })
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn model(&self) -> &LstmLanguageModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut LstmLanguageModel {
        &mut self.model
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    /// One forward/backward/update over a window; returns the loss summed over time steps.
    pub fn train_step(&mut self, window: &Window) -> Result<f32> {
        self.model.reset_state();
        self.model.zero_grad();

        let mut loss = 0.0f32;
        let mut step_grads = Vec::with_capacity(window.seq_length());
        for t in 0..window.seq_length() {
            let ids = window.inputs.column(t).to_vec();
            let targets = window.targets.column(t).to_vec();
            let logits = self.model.forward(&ids, ForwardMode::TRAINING)?;
            let (step_loss, d_logits) = softmax_cross_entropy(&logits, &targets);
            loss += step_loss;
            step_grads.push(d_logits);
        }

        self.model.backward(&step_grads)?;
        self.optimizer.step(&mut self.model)?;
        Ok(loss)
    }

    /// Runs every iteration of `epoch`, checkpoints, evaluates on the eval
    /// cadence and applies the learning-rate decay.
    #[instrument(skip(self))]
    pub fn train_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let epoch_start = Instant::now();
        let iterations = total_iterations(
            self.corpus.train.len(),
            self.config.seq_length,
            self.config.batch_size,
        );

        let mut sum_loss = 0.0f64;
        for iteration in 0..iterations {
            self.reporter.progress("Training ...", iteration + 1, iterations);
            let window = sample_window(
                &self.corpus.train,
                self.config.batch_size,
                self.config.seq_length,
                &mut self.rng,
            )?;
            sum_loss += f64::from(self.train_step(&window)?);
            if sum_loss.is_nan() {
                self.reporter.clear();
                return Err(ModelError::diverged("training loss"));
            }
        }
        self.reporter.clear();

        checkpoint::save(&self.model, &self.config.model_filename)?;

        let (nll, perplexity) = if epoch % EVAL_INTERVAL == 0 {
            let evaluation = evaluate(&mut self.model, &self.corpus.dev, self.reporter.as_mut())?;
            (evaluation.nll, Some(evaluation.perplexity))
        } else {
            (0.0, None)
        };

        let summary = EpochSummary {
            epoch,
            duration: epoch_start.elapsed(),
            mean_loss: sum_loss / iterations as f64,
            nll,
            perplexity,
            learning_rate: self.optimizer.learning_rate(),
            total_minutes: self.started.elapsed().as_secs() / 60,
            iterations,
        };
        self.reporter.epoch_done(&summary);
        info!(
            epoch = epoch + 1,
            seconds = summary.duration.as_secs_f64(),
            loss = summary.mean_loss,
            nll = summary.nll,
            perplexity = summary.perplexity.unwrap_or(-1.0),
            lr = summary.learning_rate,
            "Epoch completed"
        );

        if epoch >= self.config.lr_decay_epoch {
            let lr = self
                .optimizer
                .decrease_learning_rate(LR_DECAY_FACTOR, MIN_LEARNING_RATE);
            debug!(lr, "Learning rate decayed");
        }
        Ok(summary)
    }

    /// Trains for `config.total_epochs` epochs, stopping at the first error.
    pub fn run(&mut self) -> Result<Vec<EpochSummary>> {
        info!(
            epochs = self.config.total_epochs,
            batch_size = self.config.batch_size,
            seq_length = self.config.seq_length,
            rule = %self.optimizer.rule(),
            "Starting training"
        );
        (0..self.config.total_epochs)
            .map(|epoch| self.train_epoch(epoch))
            .collect()
    }
}
