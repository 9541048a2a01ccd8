//! Saving and restoring network parameters.
//!
//! Parameters are stored as a JSON object with two fields: `w` holds every
//! weight matrix and `b` every bias column, in layer order, each as a list of
//! rows. No topology or version is stored alongside them.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::network::Network;

/// File extension recognized by [`Network::save`] and [`Network::load`].
pub const EXTENSION: &str = "json";

/// The on-disk parameter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub w: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub b: Vec<Vec<Vec<f64>>>,
}

impl Parameters {
    /// Rebuild the layer transitions described by this record.
    fn into_layers(self) -> Result<Vec<Layer>> {
        if self.w.is_empty() {
            return Err(Error::InvalidData("missing or empty field `w`".to_owned()));
        }
        if self.b.is_empty() {
            return Err(Error::InvalidData("missing or empty field `b`".to_owned()));
        }
        if self.w.len() != self.b.len() {
            return Err(Error::InvalidData(format!(
                "{} weight matrices but {} bias vectors",
                self.w.len(),
                self.b.len()
            )));
        }

        self.w
            .into_iter()
            .zip(self.b)
            .enumerate()
            .map(|(i, (weights, biases))| {
                let weights = to_matrix(weights).map_err(|msg| {
                    Error::InvalidData(format!("weight matrix {i}: {msg}"))
                })?;
                let biases = to_matrix(biases)
                    .map_err(|msg| Error::InvalidData(format!("bias vector {i}: {msg}")))?;
                if biases.ncols() != 1 {
                    return Err(Error::InvalidData(format!(
                        "bias vector {i} has {} columns",
                        biases.ncols()
                    )));
                }
                Ok(Layer::with_parameters(weights, biases))
            })
            .collect()
    }
}

fn to_matrix(rows: Vec<Vec<f64>>) -> std::result::Result<Array2<f64>, String> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if nrows == 0 || ncols == 0 {
        return Err("matrix is empty".to_owned());
    }
    if let Some(row) = rows.iter().position(|row| row.len() != ncols) {
        return Err(format!(
            "row {row} has {} columns, expected {ncols}",
            rows[row].len()
        ));
    }

    let values = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), values).map_err(|e| e.to_string())
}

fn from_matrix(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

fn check_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(EXTENSION) => Ok(()),
        _ => Err(Error::InvalidFormat(format!(
            "{} does not end in .{EXTENSION}",
            path.display()
        ))),
    }
}

impl Network {
    /// Copy of every weight matrix and bias vector, in layer order.
    pub fn parameters(&self) -> Parameters {
        let (w, b) = self
            .layers
            .iter()
            .map(|layer| (from_matrix(layer.weights()), from_matrix(layer.biases())))
            .unzip();
        Parameters { w, b }
    }

    /// Replace every weight and bias with the ones in `parameters`.
    ///
    /// The record is fully rebuilt before anything is assigned; on error the
    /// network keeps its current parameters. Shapes are not compared against
    /// the topology here; a disagreement surfaces as
    /// [`Error::ShapeMismatch`](crate::Error::ShapeMismatch) on the next
    /// forward pass.
    pub fn set_parameters(&mut self, parameters: Parameters) -> Result<()> {
        self.layers = parameters.into_layers()?;
        Ok(())
    }

    /// Write the parameters to a new `.json` file at `path`.
    ///
    /// An existing file is never overwritten. Either the whole record is
    /// written or no file is left behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        check_extension(path)?;
        if path.exists() {
            return Err(Error::AlreadyExists(path.display().to_string()));
        }

        let contents = serde_json::to_string(&self.parameters())
            .map_err(|e| Error::InvalidData(format!("failed to serialize parameters: {e}")))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.display().to_string()),
                _ => Error::Io(e),
            })?;
        if let Err(e) = file.write_all(contents.as_bytes()).and_then(|_| file.sync_all()) {
            drop(file);
            if let Err(remove_err) = fs::remove_file(path) {
                warn!(path = %path.display(), %remove_err, "Failed to remove partial file.");
            }
            return Err(Error::Io(e));
        }

        debug!(path = %path.display(), layers = self.layers.len(), "Parameters saved.");
        Ok(())
    }

    /// Replace the parameters with the ones stored at `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        check_extension(path)?;

        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        let parameters: Parameters = serde_json::from_str(&contents)
            .map_err(|e| Error::InvalidData(format!("failed to parse parameters: {e}")))?;
        self.set_parameters(parameters)?;

        debug!(path = %path.display(), layers = self.layers.len(), "Parameters loaded.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::network::NetworkOptions;
    use ndarray::arr2;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn network() -> Network {
        Network::new(&[2, 3, 1], NetworkOptions::default().seed(11)).unwrap()
    }

    #[test]
    fn parameters_follow_layer_shapes() {
        let parameters = network().parameters();
        assert_eq!(2, parameters.w.len());
        assert_eq!(2, parameters.b.len());
        assert_eq!(3, parameters.w[0].len());
        assert!(parameters.w[0].iter().all(|row| row.len() == 2));
        assert_eq!(vec![1, 1, 1], parameters.b[0].iter().map(Vec::len).collect::<Vec<_>>());
        assert_eq!(1, parameters.w[1].len());
        assert_eq!(3, parameters.w[1][0].len());
    }

    #[test]
    fn record_uses_w_and_b_fields() {
        let mut network = Network::new(&[2, 1], NetworkOptions::default()).unwrap();
        network
            .set_parameters(Parameters {
                w: vec![vec![vec![0.5, -1.0]]],
                b: vec![vec![vec![0.25]]],
            })
            .unwrap();
        let json = serde_json::to_string(&network.parameters()).unwrap();
        assert_eq!(r#"{"w":[[[0.5,-1.0]]],"b":[[[0.25]]]}"#, json);
        assert_eq!(&arr2(&[[0.5, -1.0]]), network.layers()[0].weights());
    }

    fn bits(network: &Network) -> Vec<u64> {
        network
            .layers()
            .iter()
            .flat_map(|layer| layer.weights().iter().chain(layer.biases().iter()))
            .map(|v| v.to_bits())
            .collect()
    }

    proptest! {
        #[test]
        fn save_then_load_restores_exact_parameters(
            seed in any::<u64>(),
            topology in prop::collection::vec(1usize..17, 2..5),
            input in prop::collection::vec(-2.0f64..2.0, 16),
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("params.json");

            let source = Network::new(&topology, NetworkOptions::default().seed(seed)).unwrap();
            source.save(&path).unwrap();

            let mut restored = Network::new(&topology, NetworkOptions::default()).unwrap();
            restored.load(&path).unwrap();
            prop_assert_eq!(bits(&source), bits(&restored));

            let input = &input[..topology[0]];
            let expected = source.predict(input).unwrap();
            let actual = restored.predict(input).unwrap();
            prop_assert_eq!(
                expected.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                actual.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn save_never_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");

        network().save(&path).unwrap();
        let first = fs::read_to_string(&path).unwrap();

        let other = Network::new(&[2, 3, 1], NetworkOptions::default().seed(12)).unwrap();
        assert!(matches!(other.save(&path), Err(Error::AlreadyExists(_))));
        assert_eq!(first, fs::read_to_string(&path).unwrap());
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let mut network = network();
        for name in ["params.txt", "params", "params.json.bak"] {
            let path = dir.path().join(name);
            assert!(matches!(network.save(&path), Err(Error::InvalidFormat(_))));
            assert!(!path.exists());
            assert!(matches!(network.load(&path), Err(Error::InvalidFormat(_))));
        }
    }

    #[test]
    fn load_missing_file() {
        let dir = tempdir().unwrap();
        let mut network = network();
        let before = network.layers().to_vec();
        assert!(matches!(
            network.load(dir.path().join("missing.json")),
            Err(Error::NotFound(_))
        ));
        assert_eq!(before, network.layers());
    }

    #[test]
    fn load_rejects_incomplete_records() {
        let dir = tempdir().unwrap();
        let mut network = network();
        let before = network.layers().to_vec();

        let records = [
            ("no_w.json", r#"{"b":[[[1.0]]]}"#),
            ("no_b.json", r#"{"w":[[[1.0]]]}"#),
            ("empty_w.json", r#"{"w":[],"b":[[[1.0]]]}"#),
            ("empty_b.json", r#"{"w":[[[1.0]]],"b":[]}"#),
            ("counts.json", r#"{"w":[[[1.0]],[[1.0]]],"b":[[[1.0]]]}"#),
            ("ragged.json", r#"{"w":[[[1.0,2.0],[3.0]]],"b":[[[1.0],[1.0]]]}"#),
            ("wide_bias.json", r#"{"w":[[[1.0]]],"b":[[[1.0,2.0]]]}"#),
            ("empty_row.json", r#"{"w":[[[]]],"b":[[[1.0]]]}"#),
            ("not_numbers.json", r#"{"w":[[["a"]]],"b":[[[1.0]]]}"#),
            ("not_json.json", "w = 1"),
        ];
        for (name, contents) in records {
            let path = dir.path().join(name);
            fs::write(&path, contents).unwrap();
            assert!(
                matches!(network.load(&path), Err(Error::InvalidData(_))),
                "{name} was accepted"
            );
            assert_eq!(before, network.layers(), "{name} changed the parameters");
        }
    }

    #[test]
    fn load_accepts_shapes_outside_topology() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.json");
        Network::new(&[4, 2], NetworkOptions::default())
            .unwrap()
            .save(&path)
            .unwrap();

        let mut network = network();
        network.load(&path).unwrap();
        assert_eq!(1, network.layers().len());
        assert!(matches!(
            network.predict(&[0.0, 1.0]),
            Err(Error::ShapeMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }
}
