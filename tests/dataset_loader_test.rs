use std::fs;

use lstm_lm::dataset_loader::{self, EOS_TOKEN, UNK_TOKEN};
use lstm_lm::{Corpus, CorpusProvider, DatasetType, ModelError, PtbCorpus};
use tempfile::{NamedTempFile, tempdir};

fn write_ptb(dir: &std::path::Path, train: &str, valid: &str, test: &str) {
    fs::write(dir.join("ptb.train.txt"), train).unwrap();
    fs::write(dir.join("ptb.valid.txt"), valid).unwrap();
    fs::write(dir.join("ptb.test.txt"), test).unwrap();
}

#[test]
fn test_ptb_ids_follow_first_appearance() {
    let dir = tempdir().unwrap();
    write_ptb(dir.path(), " a b c \n b <unk> a\n", "a d\n", "c\n");

    let (corpus, vocab) = PtbCorpus::new(dir.path()).load_with_vocab().unwrap();

    assert_eq!(vocab.words(), vec!["a", "b", "c", EOS_TOKEN, UNK_TOKEN]);
    assert_eq!(corpus.train, vec![0, 1, 2, 3, 1, 4, 0, 3]);
    // `d` never occurs in train
    assert_eq!(corpus.dev, vec![0, 4, 3]);
    assert_eq!(corpus.test, vec![2, 3]);
    assert_eq!(corpus.vocab_size(), 5);
}

#[test]
fn test_ptb_unknown_word_without_unk_token() {
    let dir = tempdir().unwrap();
    write_ptb(dir.path(), "a b\n", "a z\n", "b\n");

    let err = PtbCorpus::new(dir.path()).get_corpus().unwrap_err();
    assert!(matches!(err, ModelError::DatasetLoad { .. }));
}

#[test]
fn test_ptb_missing_split() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ptb.train.txt"), "a b\n").unwrap();

    let err = dataset_loader::provider(DatasetType::PTB, dir.path())
        .get_corpus()
        .unwrap_err();
    assert!(matches!(err, ModelError::DatasetLoad { .. }));
}

#[test]
fn test_json_corpus() {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), r#"{"train": [0, 4, 2, 1], "dev": [1, 2], "test": [3]}"#).unwrap();

    let corpus = dataset_loader::provider(DatasetType::JSON, file.path())
        .get_corpus()
        .unwrap();

    assert_eq!(corpus, Corpus::new(vec![0, 4, 2, 1], vec![1, 2], vec![3]));
    assert_eq!(corpus.max_train_id(), Some(4));
    assert_eq!(corpus.vocab_size(), 5);
}

#[test]
fn test_json_corpus_rejects_negative_ids() {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), r#"{"train": [0, -1], "dev": [], "test": []}"#).unwrap();

    let err = dataset_loader::provider(DatasetType::JSON, file.path())
        .get_corpus()
        .unwrap_err();
    assert!(matches!(err, ModelError::DatasetLoad { .. }));
}

#[test]
fn test_empty_corpus_has_no_vocabulary() {
    assert_eq!(Corpus::new(vec![], vec![], vec![]).vocab_size(), 0);
}
