use crate::activations::cross_entropy;
use crate::errors::{ModelError, Result};
use crate::mode::ForwardMode;
use crate::model::LstmLanguageModel;
use crate::progress::ProgressReporter;

/// Negative log-likelihood and perplexity of a held-out sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Summed cross-entropy over every scored step (nats)
    pub nll: f64,
    /// `exp(nll / len(sequence))`
    pub perplexity: f64,
    /// Always `len(sequence) - 1`
    pub scored_steps: usize,
}

/// Scores `sequence` one token at a time with a batch of one.
///
/// The model state is reset once and then carried across the whole sequence.
/// Perplexity divides by the full sequence length rather than by the number
/// of scored steps, so it is directly comparable with earlier runs.
pub fn evaluate(
    model: &mut LstmLanguageModel,
    sequence: &[usize],
    reporter: &mut dyn ProgressReporter,
) -> Result<Evaluation> {
    if sequence.len() < 2 {
        return Err(ModelError::InvalidInput {
            message: format!(
                "evaluation needs at least 2 tokens, got {}",
                sequence.len()
            ),
        });
    }

    let vocab_size = model.vocab_size();
    if let Some(&bad) = sequence.iter().find(|&&id| id >= vocab_size) {
        return Err(ModelError::InvalidInput {
            message: format!("token id {bad} out of range for vocabulary of size {vocab_size}"),
        });
    }

    let scored_steps = sequence.len() - 1;
    model.reset_state();

    let mut nll = 0.0f64;
    for (step, window) in sequence.windows(2).enumerate() {
        reporter.progress("Computing perplexity ...", step + 1, scored_steps);
        let logits = model.forward(&window[..1], ForwardMode::INFERENCE)?;
        nll += f64::from(cross_entropy(&logits, &window[1..]));
        if nll.is_nan() {
            reporter.clear();
            return Err(ModelError::diverged("validation log-likelihood"));
        }
    }
    reporter.clear();

    // leave no evaluation state behind for the next training window
    model.reset_state();

    let perplexity = (nll / sequence.len() as f64).exp();
    tracing::debug!(nll, perplexity, scored_steps, "Evaluation finished");
    Ok(Evaluation {
        nll,
        perplexity,
        scored_steps,
    })
}
