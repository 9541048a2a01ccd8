use ndarray::{Array2, ArrayView1, Axis};
use ndarray_rand::rand::{rngs::StdRng, thread_rng, Rng, SeedableRng};
use tracing::{info, instrument, trace};

use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::loss::sum_squared_error;

/// Fixed configuration of a [`Network`].
#[derive(Debug, Clone, Copy)]
pub struct NetworkOptions {
    pub activation: Activation,
    pub learning_rate: f64,
    /// Seed for weight initialization. `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            activation: Activation::sigmoid(),
            learning_rate: 0.5,
            seed: None,
        }
    }
}

impl NetworkOptions {
    pub fn activation(self, activation: Activation) -> Self {
        Self { activation, ..self }
    }

    pub fn learning_rate(self, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..self
        }
    }

    pub fn seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }
}

/// A fully connected feed-forward network trained by per-sample gradient descent.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) topology: Vec<usize>,
    pub(crate) layers: Vec<Layer>,
    activation: Activation,
    learning_rate: f64,
}

impl Network {
    /// Build a network whose layer `i` has `topology[i]` neurons.
    /// Layer 0 is the input layer and the last one is the output layer.
    pub fn new(topology: &[usize], options: NetworkOptions) -> Result<Self> {
        if topology.len() < 2 {
            return Err(Error::InvalidTopology(format!(
                "at least 2 layers are required, got {}",
                topology.len()
            )));
        }
        if let Some(index) = topology.iter().position(|&size| size == 0) {
            return Err(Error::InvalidTopology(format!("layer {index} has no neurons")));
        }
        if !(options.learning_rate.is_finite() && options.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                options.learning_rate
            )));
        }

        let layers = match options.seed {
            Some(seed) => init_layers(topology, &mut StdRng::seed_from_u64(seed)),
            None => init_layers(topology, &mut thread_rng()),
        };

        Ok(Self {
            topology: topology.to_vec(),
            layers,
            activation: options.activation,
            learning_rate: options.learning_rate,
        })
    }

    pub fn topology(&self) -> &[usize] {
        &self.topology
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn input_dim(&self) -> usize {
        self.topology[0]
    }

    fn output_dim(&self) -> usize {
        self.topology[self.topology.len() - 1]
    }

    /// Run the input through every layer.
    ///
    /// Returns the output column and the activations each layer consumed: the
    /// input itself followed by every hidden layer's output.
    fn feed_forward(&self, input: &[f64]) -> Result<(Array2<f64>, Vec<Array2<f64>>)> {
        if input.len() != self.input_dim() {
            return Err(Error::ShapeMismatch {
                expected: self.input_dim(),
                actual: input.len(),
            });
        }

        let mut current = column(input);
        let mut activations = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let next = layer.forward(&current, &self.activation)?;
            activations.push(current);
            current = next;
        }

        // Parameters installed by `load` may disagree with the topology.
        if current.nrows() != self.output_dim() {
            return Err(Error::ShapeMismatch {
                expected: self.output_dim(),
                actual: current.nrows(),
            });
        }
        Ok((current, activations))
    }

    /// Run one sample through the network and update every weight and bias.
    ///
    /// All shape checks happen before the first update, so a rejected sample
    /// leaves the parameters untouched. Each layer is updated before its
    /// weights carry the error back to the layer below.
    pub fn train_sample(&mut self, input: &[f64], target: &[f64]) -> Result<()> {
        if target.len() != self.output_dim() {
            return Err(Error::ShapeMismatch {
                expected: self.output_dim(),
                actual: target.len(),
            });
        }
        let (outputs, activations) = self.feed_forward(input)?;

        let activation = self.activation;
        let learning_rate = self.learning_rate;

        let mut errors = column(target) - &outputs;
        let mut gradients = activation.derivative(&outputs);
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            gradients = gradients * &errors * learning_rate;
            let inputs = &activations[i];

            layer.update(&gradients, inputs);
            errors = layer.propagate(&errors);

            if i > 0 {
                gradients = activation.derivative(inputs);
            }
        }

        trace!(
            error = sum_squared_error(&column_to_vec(&outputs), target),
            "Sample trained."
        );
        Ok(())
    }

    /// Train on every `(inputs[i], targets[i])` pair in order, `epochs` times.
    ///
    /// The first failing sample aborts the run. With `logging` set, progress is
    /// reported after every `max(1, epochs / 100)`-th epoch completes, together
    /// with the dataset error at that point. This is an integer interval checked
    /// after the epoch, not a fractional one checked before it, so runs whose
    /// length is not a multiple of 100 report on a coarser or finer cadence
    /// (e.g. every epoch for 150 epochs).
    #[instrument(level = "trace", skip_all, fields(samples = inputs.len(), epochs = epochs))]
    pub fn train<I, T>(
        &mut self,
        inputs: &[I],
        targets: &[T],
        epochs: usize,
        logging: bool,
    ) -> Result<()>
    where
        I: AsRef<[f64]>,
        T: AsRef<[f64]>,
    {
        check_dataset(inputs, targets)?;
        if epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }

        let report_interval = (epochs / 100).max(1);
        for epoch in 1..=epochs {
            for (input, target) in inputs.iter().zip(targets) {
                self.train_sample(input.as_ref(), target.as_ref())?;
            }

            if logging && epoch % report_interval == 0 {
                let error = self.evaluate(inputs, targets)?;
                info!(epoch, epochs, error, "Epoch [ {} / {} ]", epoch, epochs);
            }
        }
        Ok(())
    }

    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        let (outputs, _) = self.feed_forward(input)?;
        Ok(column_to_vec(&outputs))
    }

    /// Mean over the samples of the summed squared error between prediction and target.
    pub fn evaluate<I, T>(&self, inputs: &[I], targets: &[T]) -> Result<f64>
    where
        I: AsRef<[f64]>,
        T: AsRef<[f64]>,
    {
        check_dataset(inputs, targets)?;
        if inputs.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        for (input, target) in inputs.iter().zip(targets) {
            let target = target.as_ref();
            if target.len() != self.output_dim() {
                return Err(Error::ShapeMismatch {
                    expected: self.output_dim(),
                    actual: target.len(),
                });
            }
            total += sum_squared_error(&self.predict(input.as_ref())?, target);
        }
        Ok(total / inputs.len() as f64)
    }
}

fn init_layers<R: Rng + ?Sized>(topology: &[usize], rng: &mut R) -> Vec<Layer> {
    topology
        .windows(2)
        .map(|dims| Layer::new(dims[0], dims[1], &mut *rng))
        .collect()
}

fn check_dataset<I, T>(inputs: &[I], targets: &[T]) -> Result<()> {
    if inputs.len() != targets.len() {
        return Err(Error::DatasetMismatch {
            inputs: inputs.len(),
            targets: targets.len(),
        });
    }
    Ok(())
}

fn column(values: &[f64]) -> Array2<f64> {
    ArrayView1::from(values).insert_axis(Axis(1)).to_owned()
}

fn column_to_vec(column: &Array2<f64>) -> Vec<f64> {
    column.iter().copied().collect()
}
