use ndarray::{Array, Array2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::activation::Activation;
use crate::error::{Error, Result};

/// One layer transition: the weights and biases mapping the activations of a
/// layer to the pre-activation values of the next one.
///
/// `weights` has shape `(output_dim, input_dim)` and `biases` is a column of
/// shape `(output_dim, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    weights: Array2<f64>,
    biases: Array2<f64>,
}

impl Layer {
    /// Every weight and bias is drawn independently from `[-1, 1]`.
    pub fn new<R: Rng + ?Sized>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        let distribution = Uniform::new_inclusive(-1.0, 1.0);
        let weights = Array::random_using((output_dim, input_dim), distribution, rng);
        let biases = Array::random_using((output_dim, 1), distribution, rng);
        Layer::with_parameters(weights, biases)
    }

    pub fn with_parameters(weights: Array2<f64>, biases: Array2<f64>) -> Self {
        Self { weights, biases }
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array2<f64> {
        &self.biases
    }

    /// Check that `inputs` is a column this layer can consume and that the
    /// biases line up with the weights.
    pub fn check(&self, inputs: &Array2<f64>) -> Result<()> {
        if inputs.nrows() != self.input_dim() {
            return Err(Error::ShapeMismatch {
                expected: self.input_dim(),
                actual: inputs.nrows(),
            });
        }
        if self.biases.nrows() != self.output_dim() {
            return Err(Error::ShapeMismatch {
                expected: self.output_dim(),
                actual: self.biases.nrows(),
            });
        }
        if self.biases.ncols() != inputs.ncols() {
            return Err(Error::ShapeMismatch {
                expected: inputs.ncols(),
                actual: self.biases.ncols(),
            });
        }
        Ok(())
    }

    pub fn forward(&self, inputs: &Array2<f64>, activation: &Activation) -> Result<Array2<f64>> {
        self.check(inputs)?;
        let dot_products = self.weights.dot(inputs) + &self.biases;
        Ok(activation.compute(&dot_products))
    }

    /// Add `gradients · inputsᵀ` to the weights and `gradients` to the biases.
    pub fn update(&mut self, gradients: &Array2<f64>, inputs: &Array2<f64>) {
        self.weights += &gradients.dot(&inputs.t());
        self.biases += gradients;
    }

    /// Carry `errors` back through the current weights.
    pub fn propagate(&self, errors: &Array2<f64>) -> Array2<f64> {
        self.weights.t().dot(errors)
    }
}
