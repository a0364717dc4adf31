use std::fs;

use approx::assert_abs_diff_eq;
use lstm_lm::checkpoint::{self, Checkpoint, CheckpointFormat};
use lstm_lm::{LstmConfig, LstmLanguageModel, ModelError, Parameterized};
use tempfile::{NamedTempFile, tempdir};

fn model(seed: u64) -> LstmLanguageModel {
    LstmLanguageModel::new(LstmConfig::new(12, 5, 2).with_seed(seed)).unwrap()
}

fn assert_same_parameters(a: &LstmLanguageModel, b: &LstmLanguageModel) {
    for (pa, pb) in a.parameters().iter().zip(b.parameters()) {
        assert_eq!(pa.name, pb.name);
        assert_eq!(pa.data, pb.data, "parameter {} differs", pa.name);
    }
}

#[test]
fn test_binary_round_trip_is_bit_identical() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let original = model(1);
    let mut restored = model(2);

    checkpoint::save(&original, &path).expect("Failed to save checkpoint");
    assert!(checkpoint::load(&mut restored, &path).expect("Failed to load checkpoint"));

    assert_same_parameters(&original, &restored);
}

#[test]
fn test_json_round_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().with_extension("json");
    let original = model(3);
    let mut restored = model(4);

    checkpoint::save(&original, &path).unwrap();
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with('{'));
    assert!(checkpoint::load(&mut restored, &path).unwrap());

    for (pa, pb) in original.parameters().iter().zip(restored.parameters()) {
        for (a, b) in pa.data.iter().zip(pb.data.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
    fs::remove_file(&path).ok();
}

#[test]
fn test_missing_checkpoint_is_not_an_error() {
    let dir = tempdir().unwrap();
    let mut fresh = model(5);
    let before = fresh.to_parameter_set();

    let loaded = checkpoint::load(&mut fresh, dir.path().join("absent.bin")).unwrap();

    assert!(!loaded);
    assert_eq!(fresh.to_parameter_set(), before);
}

#[test]
fn test_uncommitted_stage_leaves_previous_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let first = model(6);
    checkpoint::save(&first, &path).unwrap();

    let staged = checkpoint::stage(&model(7), &path).unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    assert!(temp_path.exists());
    assert_eq!(temp_path.parent(), path.parent());
    // simulated crash between write and rename
    drop(staged);

    assert!(!temp_path.exists());
    let mut restored = model(8);
    assert!(checkpoint::load(&mut restored, &path).unwrap());
    assert_same_parameters(&first, &restored);
}

#[test]
fn test_commit_replaces_previous_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    checkpoint::save(&model(9), &path).unwrap();

    let second = model(10);
    let staged = checkpoint::stage(&second, &path).unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    staged.commit().unwrap();

    assert!(!temp_path.exists());
    let mut restored = model(11);
    checkpoint::load(&mut restored, &path).unwrap();
    assert_same_parameters(&second, &restored);

    // only the checkpoint itself remains in the directory
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_shape_mismatch_is_rejected_and_model_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    checkpoint::save(&model(12), &path).unwrap();

    let mut other = LstmLanguageModel::new(LstmConfig::new(12, 6, 2).with_seed(13)).unwrap();
    let before = other.to_parameter_set();

    let err = checkpoint::load(&mut other, &path).unwrap_err();
    assert!(matches!(err, ModelError::Checkpoint { .. }));
    assert_eq!(other.to_parameter_set(), before);
}

#[test]
fn test_checksum_corruption_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    checkpoint::save(&model(14), &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    let mut envelope = Checkpoint::from_bytes(&bytes, CheckpointFormat::Binary).unwrap();
    assert!(envelope.validate_checksum().is_ok());
    let last = envelope.data.len() - 1;
    envelope.data[last] ^= 0x01;
    fs::write(&path, envelope.to_bytes(CheckpointFormat::Binary).unwrap()).unwrap();

    let err = checkpoint::load(&mut model(15), &path).unwrap_err();
    assert!(matches!(err, ModelError::Checkpoint { .. }));
}

#[test]
fn test_newer_version_rejected() {
    let mut envelope = Checkpoint::from_model(&model(16), CheckpointFormat::Binary).unwrap();
    envelope.version += 1;
    assert!(envelope.validate_version().is_err());
}

#[test]
fn test_metadata_describes_model() {
    let m = model(17);
    let envelope = Checkpoint::from_model(&m, CheckpointFormat::Json).unwrap();
    assert_eq!(envelope.metadata.vocab_size, 12);
    assert_eq!(envelope.metadata.hidden_dim, 5);
    assert_eq!(envelope.metadata.num_layers, 2);
    assert_eq!(envelope.metadata.num_parameters, m.num_parameters());
    assert!(chrono::DateTime::parse_from_rfc3339(&envelope.metadata.saved_at).is_ok());
}

#[test]
fn test_format_follows_extension() {
    assert_eq!(
        CheckpointFormat::from_path("model.JSON".as_ref()),
        CheckpointFormat::Json
    );
    assert_eq!(
        CheckpointFormat::from_path("model.bin".as_ref()),
        CheckpointFormat::Binary
    );
    assert_eq!(CheckpointFormat::from_path("model".as_ref()), CheckpointFormat::Binary);
}
