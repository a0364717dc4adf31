use approx::assert_relative_eq;
use lstm_lm::{LstmConfig, LstmLanguageModel, ModelError, ParamRole, Parameterized, SilentReporter, evaluate};

fn model() -> LstmLanguageModel {
    LstmLanguageModel::new(LstmConfig::new(8, 6, 2).with_seed(21)).unwrap()
}

#[test]
fn test_perplexity_uses_full_sequence_length() {
    let mut model = model();
    let sequence = [0usize, 3, 5, 7, 1, 2];

    let result = evaluate(&mut model, &sequence, &mut SilentReporter).unwrap();

    assert_eq!(result.scored_steps, 5);
    assert!(result.nll > 0.0);
    assert_relative_eq!(result.perplexity, (result.nll / 6.0).exp(), max_relative = 1e-12);
    assert_eq!(model.recorded_steps(), 0);
}

#[test]
fn test_evaluation_is_deterministic() {
    let mut model = model();
    let sequence = [4usize, 4, 2, 6, 0, 1, 3];
    let first = evaluate(&mut model, &sequence, &mut SilentReporter).unwrap();
    let second = evaluate(&mut model, &sequence, &mut SilentReporter).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_uniform_model_scores_log_vocab_per_step() {
    let mut model = model();
    // zero projection makes every prediction uniform over the vocabulary
    for param in model.parameters_mut() {
        if param.name.starts_with("dense.") {
            param.data.fill(0.0);
        }
    }
    let sequence = [1usize, 2, 3, 4];

    let result = evaluate(&mut model, &sequence, &mut SilentReporter).unwrap();

    assert_relative_eq!(result.nll, 3.0 * 8f64.ln(), max_relative = 1e-5);
    assert_relative_eq!(result.perplexity, (3.0 * 8f64.ln() / 4.0).exp(), max_relative = 1e-5);
}

#[test]
fn test_too_short_sequence_rejected() {
    let mut model = model();
    for sequence in [&[][..], &[3][..]] {
        let err = evaluate(&mut model, sequence, &mut SilentReporter).unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput { .. }));
    }
}

#[test]
fn test_nan_likelihood_fails_fast() {
    let mut model = model();
    for param in model.parameters_mut() {
        if param.role == ParamRole::Embedding {
            param.data.fill(f32::NAN);
        }
    }
    let err = evaluate(&mut model, &[1, 2, 3], &mut SilentReporter).unwrap_err();
    assert!(matches!(err, ModelError::Diverged { .. }));
}

#[test]
fn test_out_of_vocabulary_target_rejected() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(8, 4, 1).with_seed(1)).unwrap();

    let err = evaluate(&mut model, &[1, 99], &mut SilentReporter).unwrap_err();

    assert!(matches!(err, ModelError::InvalidInput { .. }));
    assert!(model.cells().iter().all(|cell| cell.state().is_none()));
}
