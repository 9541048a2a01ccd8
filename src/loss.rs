use ndarray::{ArrayView1, Zip};

/// Sum of `(output - target)²` over all elements.
/// `output` and `target` must have the same length.
pub fn sum_squared_error(output: &[f64], target: &[f64]) -> f64 {
    debug_assert_eq!(output.len(), target.len());

    Zip::from(ArrayView1::from(output))
        .and(ArrayView1::from(target))
        .fold(0.0, |loss, &output, &target| loss + (output - target).powi(2))
}

/// Sum of squared error divided by the number of elements.
pub fn mean_squared_error(output: &[f64], target: &[f64]) -> f64 {
    if output.is_empty() {
        return 0.0;
    }
    sum_squared_error(output, target) / output.len() as f64
}
