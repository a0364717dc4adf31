use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, Result};
use crate::vocab::Vocab;

/// End-of-sentence marker appended to every line of a word corpus
pub const EOS_TOKEN: &str = "<eos>";
/// Out-of-vocabulary marker used by the PTB text files
pub const UNK_TOKEN: &str = "<unk>";

/// The three token-id splits of a corpus. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub train: Vec<usize>,
    pub dev: Vec<usize>,
    pub test: Vec<usize>,
}

impl Corpus {
    pub fn new(train: Vec<usize>, dev: Vec<usize>, test: Vec<usize>) -> Self {
        Self { train, dev, test }
    }

    /// Largest id in the train split, if any.
    pub fn max_train_id(&self) -> Option<usize> {
        self.train.iter().copied().max()
    }

    /// Vocabulary size implied by the train split: max id + 1.
    pub fn vocab_size(&self) -> usize {
        self.max_train_id().map_or(0, |max| max + 1)
    }
}

/// Source of the train/dev/test token-id sequences.
pub trait CorpusProvider {
    fn get_corpus(&self) -> Result<Corpus>;
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetType {
    /// `ptb.{train,valid,test}.txt` word files
    PTB,
    /// `{"train": [...], "dev": [...], "test": [...]}` id arrays
    JSON,
}

/// Penn Treebank style word corpus: one sentence per line, words separated
/// by whitespace, `<eos>` appended to every line.
///
/// Ids are assigned from the train split in order of first appearance. Dev
/// and test words are looked up in that vocabulary; words it does not know
/// map to `<unk>`, and are an error if the train split has no `<unk>`.
#[derive(Debug, Clone)]
pub struct PtbCorpus {
    dir: PathBuf,
}

impl PtbCorpus {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Builds the corpus and returns the vocabulary used to encode it.
    pub fn load_with_vocab(&self) -> Result<(Corpus, Vocab)> {
        let train_text = read_text(&self.dir.join("ptb.train.txt"))?;
        let dev_text = read_text(&self.dir.join("ptb.valid.txt"))?;
        let test_text = read_text(&self.dir.join("ptb.test.txt"))?;

        let mut vocab = Vocab::new();
        let train = build_lines(&train_text, &mut vocab);
        let dev = lookup_lines(&dev_text, &vocab, "ptb.valid.txt")?;
        let test = lookup_lines(&test_text, &vocab, "ptb.test.txt")?;

        tracing::debug!(
            train = train.len(),
            dev = dev.len(),
            test = test.len(),
            vocab_size = vocab.size(),
            "PTB corpus loaded"
        );
        Ok((Corpus::new(train, dev, test), vocab))
    }
}

impl CorpusProvider for PtbCorpus {
    fn get_corpus(&self) -> Result<Corpus> {
        self.load_with_vocab().map(|(corpus, _)| corpus)
    }
}

/// Pre-encoded corpus stored as a JSON object of three id arrays.
#[derive(Debug, Clone)]
pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusProvider for JsonCorpus {
    fn get_corpus(&self) -> Result<Corpus> {
        let raw = read_text(&self.path)?;
        let corpus: Corpus = serde_json::from_str(&raw).map_err(|e| ModelError::DatasetLoad {
            message: format!("{}: {}", self.path.display(), e),
        })?;
        tracing::debug!(
            train = corpus.train.len(),
            dev = corpus.dev.len(),
            test = corpus.test.len(),
            "JSON corpus loaded"
        );
        Ok(corpus)
    }
}

/// Picks a provider for `path` according to `dataset_type`.
pub fn provider(dataset_type: DatasetType, path: impl AsRef<Path>) -> Box<dyn CorpusProvider> {
    match dataset_type {
        DatasetType::PTB => Box::new(PtbCorpus::new(path.as_ref())),
        DatasetType::JSON => Box::new(JsonCorpus::new(path.as_ref())),
    }
}

fn build_lines(text: &str, vocab: &mut Vocab) -> Vec<usize> {
    let mut ids = Vec::new();
    for line in text.lines() {
        ids.extend(line.split_whitespace().map(|word| vocab.insert(word)));
        ids.push(vocab.insert(EOS_TOKEN));
    }
    ids
}

fn lookup_lines(text: &str, vocab: &Vocab, split: &str) -> Result<Vec<usize>> {
    let unknown = vocab.encode(UNK_TOKEN);
    let mut ids = Vec::new();
    for line in text.lines() {
        for word in line.split_whitespace().chain(std::iter::once(EOS_TOKEN)) {
            let id = vocab.encode(word).or(unknown).ok_or_else(|| ModelError::DatasetLoad {
                message: format!("{split}: word '{word}' does not occur in the train split"),
            })?;
            ids.push(id);
        }
    }
    Ok(ids)
}

fn read_text(path: &Path) -> Result<String> {
    // File size validation
    let metadata = fs::metadata(path).map_err(|e| ModelError::DatasetLoad {
        message: format!("{}: {}", path.display(), e),
    })?;
    if metadata.len() > crate::MAX_FILE_SIZE {
        return Err(ModelError::InvalidInput {
            message: format!(
                "File size {} exceeds maximum allowed size {}",
                metadata.len(),
                crate::MAX_FILE_SIZE
            ),
        });
    }
    fs::read_to_string(path).map_err(ModelError::from)
}
