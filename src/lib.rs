//! featurevis: domain objects for feature visualization in Rust.
//!
//! Feature visualization searches for the input that most excites a unit of a
//! trained network (a "most exciting input", MEI) by gradient ascent on the
//! input itself. This crate holds the pieces of that process that carry data:
//! the differentiable input being optimized and the per-iteration snapshot of
//! the optimizer's state.
//!
//! # Modules
//!
//! - [`domain`] — [`Input`](domain::Input), [`State`](domain::State) and a
//!   caller-controlled [`History`](domain::History) of states.
//! - [`variable`] — Shared, autograd-aware tensor handles.
//! - [`tensors`] — Plain row-major tensor values and the `tensor!` macro.
//! - [`backprop`] — A handful of differentiable primitives with backward closures.
//! - [`device`] — Device tags and the process-wide default device.
//! - [`modelio`] — Saving/loading extracted tensors in the `.bpat` format.
//!
//! # Example
//!
//! ```rust
//! use featurevis::domain::Input;
//! use featurevis::tensor;
//! use featurevis::variable::Variable;
//!
//! let image = Variable::new(tensor!([[[0.5, 0.25], [0.0, 1.0]]]));
//! let input = Input::new(image.clone());
//! assert!(image.requires_grad());
//!
//! let snapshot = input.extract();
//! assert_eq!(snapshot.shape(), vec![2, 2]);
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::cast_possible_truncation)]
#![deny(unsafe_code)]
#![forbid(missing_docs)]

pub mod backprop;
pub mod device;
pub mod domain;
pub mod error;
pub mod modelio;
pub mod tensors;
pub mod variable;

pub use error::{Error, Result};

/// The float used in tensors.
pub type TensorFloat = f32;
