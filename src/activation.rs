use std::collections::HashMap;

use ndarray::Array2;

use crate::error::{Error, Result};

/// An activation function together with its derivative.
///
/// The derivative is expressed in terms of the function's *output*: given
/// `y = f(x)`, `derivative(y)` returns `f'(x)`. The backward pass only ever
/// holds post-activation values, so this is the form it needs.
#[derive(Clone, Copy)]
pub struct Activation {
    function: fn(f64) -> f64,
    derivative: fn(f64) -> f64,
}

impl Activation {
    pub fn new(function: fn(f64) -> f64, derivative: fn(f64) -> f64) -> Self {
        Self {
            function,
            derivative,
        }
    }

    pub fn sigmoid() -> Self {
        Self::new(sigmoid, |y| y * (1.0 - y))
    }

    pub fn tanh() -> Self {
        Self::new(f64::tanh, |y| 1.0 - y.powi(2))
    }

    pub fn relu() -> Self {
        Self::new(|x| x.max(0.0), |y| if y > 0.0 { 1.0 } else { 0.0 })
    }

    pub fn compute_one(&self, x: f64) -> f64 {
        (self.function)(x)
    }

    pub fn derivative_one(&self, y: f64) -> f64 {
        (self.derivative)(y)
    }

    pub fn compute(&self, x: &Array2<f64>) -> Array2<f64> {
        x.mapv(self.function)
    }

    /// `y` holds outputs of [`Activation::compute`].
    pub fn derivative(&self, y: &Array2<f64>) -> Array2<f64> {
        y.mapv(self.derivative)
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::sigmoid()
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation").finish_non_exhaustive()
    }
}

/// Written as `1 / (1 + e^-x)` rather than `e^x / (e^x + 1)`. The two agree
/// mathematically and may differ in the last bit; this form stays finite for
/// large `x` where the other yields `inf / inf`.
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Activation functions looked up by name.
#[derive(Debug, Clone, Default)]
pub struct ActivationTable {
    entries: HashMap<String, Activation>,
}

impl ActivationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `sigmoid`, `tanh` and `relu`.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register("sigmoid", Activation::sigmoid());
        table.register("tanh", Activation::tanh());
        table.register("relu", Activation::relu());
        table
    }

    /// Add an activation under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, activation: Activation) {
        self.entries.insert(name.into(), activation);
    }

    pub fn get(&self, name: &str) -> Result<Activation> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownActivation(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.entries.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_rel_eq_arr2;

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn sigmoid_compute() {
        let x = arr2(&[[-2.0, -1.0, 0.0, 1.0, 2.0]]);
        let actual = Activation::sigmoid().compute(&x);
        let expected = arr2(&[[
            0.1192029220221175,
            0.2689414213699951,
            0.5000000000000000,
            0.7310585786300049,
            0.8807970779778823,
        ]]);
        assert_rel_eq_arr2!(actual, expected);
    }

    #[test]
    fn sigmoid_derivative_from_output() {
        let sigmoid = Activation::sigmoid();
        let y = sigmoid.compute(&arr2(&[[-2.0, -1.0, 0.0, 1.0, 2.0]]));
        let actual = sigmoid.derivative(&y);
        let expected = arr2(&[[
            0.1049935854035065,
            0.1966119332414819,
            0.2500000000000000,
            0.1966119332414819,
            0.1049935854035066,
        ]]);
        assert_rel_eq_arr2!(actual, expected);
    }

    #[test]
    fn sigmoid_saturates_without_nan() {
        let sigmoid = Activation::sigmoid();
        assert_relative_eq!(1.0, sigmoid.compute_one(800.0));
        assert_relative_eq!(0.0, sigmoid.compute_one(-800.0));
    }

    #[test]
    fn tanh_derivative_from_output() {
        let tanh = Activation::tanh();
        let y = tanh.compute_one(0.3);
        assert_relative_eq!(1.0 - 0.3f64.tanh().powi(2), tanh.derivative_one(y));
    }

    #[test]
    fn relu_compute_and_derivative() {
        let relu = Activation::relu();
        let x = arr2(&[[-1.5, 0.0, 2.0]]);
        let y = relu.compute(&x);
        assert_rel_eq_arr2!(y, arr2(&[[0.0, 0.0, 2.0]]));
        assert_rel_eq_arr2!(relu.derivative(&y), arr2(&[[0.0, 0.0, 1.0]]));
    }

    #[test]
    fn standard_table_lookup() {
        let table = ActivationTable::standard();
        assert_eq!(vec!["relu", "sigmoid", "tanh"], table.names());

        let sigmoid = table.get("sigmoid").unwrap();
        assert_relative_eq!(0.5, sigmoid.compute_one(0.0));
        assert!(matches!(
            table.get("softplus"),
            Err(Error::UnknownActivation(name)) if name == "softplus"
        ));
    }

    #[test]
    fn register_replaces_entry() {
        let mut table = ActivationTable::standard();
        table.register("sigmoid", Activation::new(|x| x, |_| 1.0));
        let identity = table.get("sigmoid").unwrap();
        assert_relative_eq!(3.0, identity.compute_one(3.0));
        assert_relative_eq!(1.0, identity.derivative_one(3.0));
    }
}
