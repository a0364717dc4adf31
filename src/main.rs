use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use lstm_lm::{DatasetType, TrainingConfig, Trainer, dataset_loader};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CorpusFormat {
    /// ptb.train.txt / ptb.valid.txt / ptb.test.txt in --data-dir
    Ptb,
    /// a single JSON file with train/dev/test id arrays
    Json,
}

impl From<CorpusFormat> for DatasetType {
    fn from(format: CorpusFormat) -> Self {
        match format {
            CorpusFormat::Ptb => DatasetType::PTB,
            CorpusFormat::Json => DatasetType::JSON,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "train-ptb")]
#[command(about = "Train a stacked LSTM language model on the Penn Treebank")]
struct Args {
    #[arg(short = 'b', long = "batchsize", default_value_t = 64)]
    batchsize: usize,

    #[arg(short = 'l', long, default_value_t = 35)]
    seq_length: usize,

    #[arg(short = 'e', long, default_value_t = 300)]
    total_epochs: usize,

    /// Accelerator index; negative runs on the host
    #[arg(short = 'g', long, default_value_t = -1, allow_negative_numbers = true)]
    gpu_device: i32,

    /// Global gradient-norm threshold (0 disables clipping)
    #[arg(long, default_value_t = 5.0)]
    grad_clip: f32,

    #[arg(long, default_value_t = 1.0)]
    learning_rate: f32,

    /// L2 weight decay (0 disables)
    #[arg(long, default_value_t = 0.000001)]
    weight_decay: f32,

    #[arg(long, default_value_t = 0.5)]
    dropout_embedding_softmax: f32,

    #[arg(long, default_value_t = 0.2)]
    dropout_rnn: f32,

    #[arg(long, default_value_t = 0.9)]
    momentum: f32,

    /// sgd, msgd, nesterov, adam, adagrad or rmsprop
    #[arg(long, default_value = "msgd")]
    optimizer: String,

    #[arg(long, default_value_t = 640)]
    ndim_hidden: usize,

    #[arg(long, default_value_t = 2)]
    num_layers: usize,

    #[arg(long, default_value_t = 20)]
    lr_decay_epoch: usize,

    /// Checkpoint path; `.json` selects the JSON format
    #[arg(long, default_value = "model.bin")]
    model_filename: PathBuf,

    /// Directory of the PTB text files, or the JSON corpus file
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = CorpusFormat::Ptb)]
    corpus_format: CorpusFormat,

    /// Seed for initialisation, dropout and batch sampling
    #[arg(long)]
    seed: Option<u64>,
}

impl From<Args> for TrainingConfig {
    fn from(args: Args) -> Self {
        TrainingConfig {
            batch_size: args.batchsize,
            seq_length: args.seq_length,
            total_epochs: args.total_epochs,
            gpu_device: args.gpu_device,
            grad_clip: args.grad_clip,
            learning_rate: args.learning_rate,
            weight_decay: args.weight_decay,
            dropout_embedding_softmax: args.dropout_embedding_softmax,
            dropout_rnn: args.dropout_rnn,
            momentum: args.momentum,
            optimizer: args.optimizer,
            ndim_hidden: args.ndim_hidden,
            num_layers: args.num_layers,
            lr_decay_epoch: args.lr_decay_epoch,
            model_filename: args.model_filename,
            seed: args.seed,
        }
    }
}

fn main() -> lstm_lm::Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let corpus_format = DatasetType::from(args.corpus_format);
    let data_path = args.data_dir.clone();
    let config = TrainingConfig::from(args);
    // fail on a bad configuration before touching the corpus
    config.validate()?;

    let corpus = dataset_loader::provider(corpus_format, &data_path).get_corpus()?;
    tracing::info!(
        train = corpus.train.len(),
        dev = corpus.dev.len(),
        test = corpus.test.len(),
        vocab_size = corpus.vocab_size(),
        "Corpus loaded"
    );

    let mut trainer = Trainer::new(config, corpus)?;
    trainer.run()?;
    Ok(())
}
