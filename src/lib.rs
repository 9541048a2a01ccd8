//! A small multilayer perceptron.
//!
//! A [`Network`] is built from a list of layer sizes, trained one sample at a
//! time with plain gradient descent, queried with [`Network::predict`] and
//! persisted with [`Network::save`] / [`Network::load`].
//!
//! ```no_run
//! use perceptron::{Network, NetworkOptions};
//!
//! # fn main() -> perceptron::Result<()> {
//! let inputs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
//! let targets = [[0.0], [0.0], [0.0], [1.0]];
//!
//! let mut network = Network::new(&[2, 2, 1], NetworkOptions::default())?;
//! network.train(&inputs, &targets, 10_000, false)?;
//! let output = network.predict(&[1.0, 1.0])?;
//! assert_eq!(1, output.len());
//! network.save("and.json")?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod error;
pub mod layer;
pub mod loss;
pub mod network;
pub mod persist;

pub use activation::{Activation, ActivationTable};
pub use error::{Error, Result};
pub use layer::Layer;
pub use network::{Network, NetworkOptions};
pub use persist::Parameters;

#[macro_export]
macro_rules! assert_rel_eq_arr2 {
    ($actual:expr, $expected:expr $(, $opt:ident = $val:expr)*) => {
        assert_eq!($actual.shape(), $expected.shape());
        ndarray::Zip::from(&$actual)
            .and(&$expected)
            .for_each(|v, w| {
                assert_relative_eq!(v, w $(, $opt = $val)*);
            });
    };
}
