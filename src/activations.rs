use ndarray::{Array2, Axis};

/// Logistic sigmoid, element-wise
///
/// sigmoid(x) = 1 / (1 + e^{-x})
#[inline]
pub fn sigmoid(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|val| 1.0 / (1.0 + (-val).exp()))
}

#[inline]
pub fn tanh(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(f32::tanh)
}

/// Row-wise softmax with max subtraction for numerical stability.
pub fn softmax(logits: &Array2<f32>) -> Array2<f32> {
    let mut result = logits.clone();
    for mut row in result.rows_mut() {
        let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|x| (x - max_val).exp());
        let sum: f32 = row.sum();
        row.mapv_inplace(|x| x / sum);
    }
    result
}

/// `log(sum(exp(row))) - row[target]` for one row, computed stably.
#[inline]
fn row_nll(row: ndarray::ArrayView1<'_, f32>, target: usize) -> f32 {
    let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_sum = row.iter().map(|&x| (x - max_val).exp()).sum::<f32>().ln() + max_val;
    log_sum - row[target]
}

/// Loss-only softmax cross-entropy, averaged over the batch rows.
pub fn cross_entropy(logits: &Array2<f32>, targets: &[usize]) -> f32 {
    assert_eq!(
        logits.nrows(),
        targets.len(),
        "logits and targets must have the same number of rows"
    );
    let total: f32 = logits
        .axis_iter(Axis(0))
        .zip(targets)
        .map(|(row, &target)| row_nll(row, target))
        .sum();
    total / targets.len() as f32
}

/// Softmax cross-entropy averaged over the batch rows.
///
/// Returns the scalar loss and its gradient with respect to `logits`,
/// `(softmax(logits) - one_hot(targets)) / batch`.
pub fn softmax_cross_entropy(logits: &Array2<f32>, targets: &[usize]) -> (f32, Array2<f32>) {
    assert_eq!(
        logits.nrows(),
        targets.len(),
        "logits and targets must have the same number of rows"
    );
    let batch = targets.len() as f32;
    let mut grads = softmax(logits);
    let mut loss = 0.0f32;

    for (mut row, (&target, logit_row)) in grads
        .axis_iter_mut(Axis(0))
        .zip(targets.iter().zip(logits.axis_iter(Axis(0))))
    {
        loss += row_nll(logit_row, target);
        row[target] -= 1.0;
    }

    grads.mapv_inplace(|g| g / batch);
    (loss / batch, grads)
}
