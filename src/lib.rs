pub mod activations;
pub mod adam;
pub mod checkpoint;
pub mod config;
pub mod dataset_loader;
pub mod dropout;
pub mod embeddings;
pub mod errors;
pub mod evaluation;
pub mod hooks;
pub mod lstm;
pub mod mode;
pub mod model;
pub mod optimizer;
pub mod output_projection;
pub mod param;
pub mod progress;
pub mod trainer;
pub mod vocab;
// Re-export key structs for easier access
pub use adam::Adam;
pub use checkpoint::{Checkpoint, CheckpointFormat, StagedCheckpoint};
pub use config::{LstmConfig, TrainingConfig};
pub use dataset_loader::{Corpus, CorpusProvider, DatasetType, JsonCorpus, PtbCorpus};
pub use dropout::Dropout;
pub use errors::{ModelError, Result};
pub use evaluation::{Evaluation, evaluate};
pub use hooks::{GradientClipping, UpdateHook, WeightDecay};
pub use lstm::{LstmCell, LstmState};
pub use mode::{ForwardMode, GradMode, Phase};
pub use model::LstmLanguageModel;
pub use optimizer::{Optimizer, UpdateRule};
pub use param::{Param, ParamRole, ParameterSet, Parameterized};
pub use progress::{ConsoleReporter, ProgressReporter, SilentReporter};
pub use trainer::{EpochSummary, Trainer, Window};
pub use vocab::Vocab;

// Constants
/// Largest corpus file the loaders will read (bytes)
pub const MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;
/// Validation perplexity is computed on epochs divisible by this
pub const EVAL_INTERVAL: usize = 10;
pub const LR_DECAY_FACTOR: f32 = 0.98;
pub const MIN_LEARNING_RATE: f32 = 1e-5;
