use lstm_lm::activations::{cross_entropy, softmax_cross_entropy};
use lstm_lm::lstm::CELL_WEIGHT_STD;
use lstm_lm::{ForwardMode, LstmConfig, LstmLanguageModel, ModelError, ParamRole, Parameterized};
use ndarray::Array2;

const INPUTS: [[usize; 2]; 3] = [[0, 3], [4, 1], [2, 2]];
const TARGETS: [[usize; 2]; 3] = [[4, 1], [2, 2], [1, 0]];

fn deterministic_model() -> LstmLanguageModel {
    let config = LstmConfig::new(5, 3, 2).with_dropout(0.0, 0.0).with_seed(42);
    let mut model = LstmLanguageModel::new(config).unwrap();
    // larger cell weights than the initial N(0, 0.01) so the recurrent paths carry signal
    for param in model.parameters_mut() {
        if param.role == ParamRole::RecurrentWeight {
            param.data.mapv_inplace(|w| w * 30.0);
        }
    }
    model
}

fn window_loss(model: &mut LstmLanguageModel) -> f32 {
    model.reset_state();
    INPUTS
        .iter()
        .zip(TARGETS.iter())
        .map(|(ids, targets)| {
            let logits = model.forward(ids, ForwardMode::INFERENCE).unwrap();
            cross_entropy(&logits, targets)
        })
        .sum()
}

#[test]
fn test_parameter_layout() {
    let model = LstmLanguageModel::new(LstmConfig::new(7, 4, 2).with_seed(0)).unwrap();
    let names: Vec<&str> = model.parameters().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "embed.weight",
            "lstm.0.upward.weight",
            "lstm.0.lateral.weight",
            "lstm.0.bias",
            "lstm.1.upward.weight",
            "lstm.1.lateral.weight",
            "lstm.1.bias",
            "dense.weight",
            "dense.bias",
        ]
    );

    let expected = 7 * 4 + 2 * (4 * 16 + 4 * 16 + 16) + 4 * 7 + 7;
    assert_eq!(model.num_parameters(), expected);
}

#[test]
fn test_initialization() {
    let model = LstmLanguageModel::new(LstmConfig::new(50, 40, 1).with_seed(1)).unwrap();
    for param in model.parameters() {
        match param.role {
            ParamRole::RecurrentWeight => {
                let n = param.data.len() as f32;
                let mean = param.data.sum() / n;
                let var = param.data.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / n;
                assert!(mean.abs() < 0.002, "{} mean {}", param.name, mean);
                assert!(
                    (var.sqrt() - CELL_WEIGHT_STD).abs() < 0.002,
                    "{} std {}",
                    param.name,
                    var.sqrt()
                );
            }
            ParamRole::Bias if param.name == "lstm.0.bias" => {
                // gate layout [i | f | o | g]: only the forget slice starts at one
                for (j, &b) in param.data.row(0).iter().enumerate() {
                    let expected = if (40..80).contains(&j) { 1.0 } else { 0.0 };
                    assert_eq!(b, expected);
                }
            }
            ParamRole::Bias => assert!(param.data.iter().all(|&b| b == 0.0)),
            _ => {}
        }
    }
}

#[test]
fn test_reset_makes_forward_repeatable() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(6, 4, 2).with_seed(3)).unwrap();
    let zeros = [0usize, 0];

    model.reset_state();
    let first = model.forward(&zeros, ForwardMode::INFERENCE).unwrap();
    let carried = model.forward(&zeros, ForwardMode::INFERENCE).unwrap();
    model.reset_state();
    let again = model.forward(&zeros, ForwardMode::INFERENCE).unwrap();

    assert_eq!(first, again);
    assert_ne!(first, carried);
    assert!(model.cells().iter().all(|cell| cell.state().is_some()));

    model.reset_state();
    assert!(model.cells().iter().all(|cell| cell.state().is_none()));
}

#[test]
fn test_dropout_only_in_training_phase() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(6, 8, 1).with_seed(4)).unwrap();
    let ids = [1usize, 2, 3];

    model.reset_state();
    let a = model.forward(&ids, ForwardMode::TRAINING).unwrap();
    model.reset_state();
    let b = model.forward(&ids, ForwardMode::TRAINING).unwrap();
    assert_ne!(a, b, "a fresh mask is drawn on every training call");

    model.reset_state();
    let c = model.forward(&ids, ForwardMode::INFERENCE).unwrap();
    model.reset_state();
    let d = model.forward(&ids, ForwardMode::INFERENCE).unwrap();
    assert_eq!(c, d);
}

#[test]
fn test_only_recording_mode_fills_tape() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(6, 4, 1).with_seed(5)).unwrap();
    model.reset_state();
    model.forward(&[1, 2], ForwardMode::INFERENCE).unwrap();
    assert_eq!(model.recorded_steps(), 0);

    model.forward(&[1, 2], ForwardMode::TRAINING).unwrap();
    model.forward(&[3, 4], ForwardMode::TRAINING).unwrap();
    assert_eq!(model.recorded_steps(), 2);

    model.reset_state();
    assert_eq!(model.recorded_steps(), 0);
}

#[test]
fn test_backward_requires_one_gradient_per_step() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(6, 4, 1).with_seed(6)).unwrap();
    model.reset_state();
    model.forward(&[1], ForwardMode::TRAINING).unwrap();
    model.forward(&[2], ForwardMode::TRAINING).unwrap();

    let err = model.backward(&[Array2::zeros((1, 6))]).unwrap_err();
    assert!(matches!(err, ModelError::GradientError { .. }));
}

#[test]
fn test_out_of_range_token_rejected() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(6, 4, 1).with_seed(7)).unwrap();
    let err = model.forward(&[6], ForwardMode::INFERENCE).unwrap_err();
    assert!(matches!(err, ModelError::InvalidInput { .. }));
}

#[test]
fn test_batch_change_without_reset_rejected() {
    let mut model = LstmLanguageModel::new(LstmConfig::new(6, 4, 1).with_seed(8)).unwrap();
    model.reset_state();
    model.forward(&[1, 2], ForwardMode::INFERENCE).unwrap();
    let err = model.forward(&[1], ForwardMode::INFERENCE).unwrap_err();
    assert!(matches!(err, ModelError::InvalidInput { .. }));
}

#[test]
fn test_invalid_configuration_rejected() {
    for config in [
        LstmConfig::new(5, 4, 0),
        LstmConfig::new(5, 0, 1),
        LstmConfig::new(0, 4, 1),
        LstmConfig::new(5, 4, 1).with_dropout(1.0, 0.2),
        LstmConfig::new(5, 4, 1).with_dropout(0.5, -0.1),
    ] {
        let err = LstmLanguageModel::new(config).unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
    }
}

#[test]
fn test_gradients_match_finite_differences() {
    let mut model = deterministic_model();

    model.reset_state();
    model.zero_grad();
    let mut step_grads = Vec::new();
    for (ids, targets) in INPUTS.iter().zip(TARGETS.iter()) {
        let logits = model.forward(ids, ForwardMode::TRAINING).unwrap();
        let (_, d_logits) = softmax_cross_entropy(&logits, targets);
        step_grads.push(d_logits);
    }
    model.backward(&step_grads).unwrap();
    assert_eq!(model.recorded_steps(), 0);

    let analytic: Vec<Array2<f32>> = model.parameters().iter().map(|p| p.grad.clone()).collect();
    let eps = 1e-2f32;

    for (index, grad) in analytic.iter().enumerate() {
        let (rows, cols) = grad.dim();
        for &(r, c) in &[(0, 0), (rows - 1, cols - 1), (rows / 2, cols / 2)] {
            let original = model.parameters()[index].data[[r, c]];

            model.parameters_mut()[index].data[[r, c]] = original + eps;
            let plus = window_loss(&mut model);
            model.parameters_mut()[index].data[[r, c]] = original - eps;
            let minus = window_loss(&mut model);
            model.parameters_mut()[index].data[[r, c]] = original;

            let numeric = (plus - minus) / (2.0 * eps);
            let exact = grad[[r, c]];
            let tolerance = 2e-3 + 2e-2 * (numeric.abs() + exact.abs());
            assert!(
                (numeric - exact).abs() < tolerance,
                "{}[{}, {}]: analytic {} vs numeric {}",
                model.parameters()[index].name,
                r,
                c,
                exact,
                numeric
            );
        }
    }
}
