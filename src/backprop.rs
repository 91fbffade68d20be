//! Differentiable operations and autograd utilities.
//!
//! A small set of operations that an optimizer of inputs needs to score and
//! differentiate a candidate, plus [`accumulate_grad`] to deposit the result
//! into a [`Variable`]'s gradient slot.
//!
//! ## Autograd Pattern
//!
//! Each operation follows the same pattern:
//! 1. **Inputs** are references to [`Variable`]s (and plain [`Tensor`] constants).
//! 2. **Forward Pass** computes an output [`Tensor`] or scalar.
//! 3. **Backward Pass** is a returned closure capturing the minimal cloned
//!    data needed to map `dL/d(out)` to `dL/d(input)`.
//! 4. **Gradient Application** goes through [`accumulate_grad`].
//!
//! Elementwise kernels run on the CPU with `rayon`.
//!
//! # Example
//!
//! ```rust
//! use featurevis::backprop::{accumulate_grad, sum};
//! use featurevis::tensor;
//! use featurevis::variable::Variable;
//!
//! let x = Variable::new(tensor!([1.0, 2.0]));
//! x.requires_grad_();
//! let (total, back) = sum(&x);
//! assert_eq!(total, 3.0);
//! accumulate_grad(&x, &back(1.0)).unwrap();
//! assert_eq!(x.grad().unwrap().to_tensor().data, vec![1.0, 1.0]);
//! ```

use rayon::prelude::*;

use crate::TensorFloat;
use crate::error::{Error, Result};
use crate::tensors::Tensor;
use crate::variable::Variable;

/// Elementwise product of a variable with a constant tensor.
///
/// # Panics
/// Panics if shapes differ.
pub fn mul(a: &Variable, b: &Tensor) -> (Tensor, impl Fn(&Tensor) -> Tensor + use<>) {
    let x = a.to_tensor();
    assert_eq!(x.shape, b.shape, "mul shape mismatch");

    let data = x
        .data
        .par_iter()
        .zip(b.data.par_iter())
        .map(|(&u, &v)| u * v)
        .collect();
    let out = Tensor::new(x.shape, data);

    let weights = b.clone();
    let back = move |grad_output: &Tensor| {
        assert_eq!(grad_output.shape, weights.shape, "mul gradient shape mismatch");
        let data = grad_output
            .data
            .par_iter()
            .zip(weights.data.par_iter())
            .map(|(&g, &w)| g * w)
            .collect();
        Tensor::new(weights.shape.clone(), data)
    };

    (out, back)
}

/// Sums every element.
///
/// The backward closure spreads `dL/d(sum)` evenly over the input shape.
pub fn sum(input: &Variable) -> (TensorFloat, impl Fn(TensorFloat) -> Tensor + use<>) {
    let total = input.with_values(|v| v.par_iter().sum::<TensorFloat>());
    let shape = input.shape();
    let back = move |grad_output: TensorFloat| {
        let len = shape.iter().product();
        Tensor::new(shape.clone(), vec![grad_output; len])
    };
    (total, back)
}

/// Adds `grad` into the gradient slot of `var`.
///
/// An empty slot receives a fresh gradient variable on the same device as
/// `var`; an occupied one is updated in place, so handles previously
/// obtained through [`Variable::grad`] see the sum.
///
/// # Errors
/// - [`Error::GradientNotTracked`] if `var` does not require gradients.
/// - [`Error::ShapeMismatch`] if `grad` (or the existing gradient) is not
///   shaped like `var`.
pub fn accumulate_grad(var: &Variable, grad: &Tensor) -> Result<()> {
    if !var.requires_grad() {
        return Err(Error::GradientNotTracked);
    }
    let shape = var.shape();
    if grad.shape != shape {
        return Err(Error::ShapeMismatch {
            expected: shape,
            found: grad.shape.clone(),
        });
    }

    match var.grad() {
        Some(existing) => {
            let existing_shape = existing.shape();
            if existing_shape != shape {
                return Err(Error::ShapeMismatch {
                    expected: shape,
                    found: existing_shape,
                });
            }
            existing.update_values(|acc| {
                acc.par_iter_mut()
                    .zip(grad.data.par_iter())
                    .for_each(|(a, &g)| *a += g);
            });
            log::trace!("accumulated gradient into {shape:?}");
        }
        None => {
            var.set_grad(Some(Variable::new_on(grad.clone(), var.device())));
            log::trace!("installed gradient for {shape:?}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn sum_backward_is_uniform() {
        let x = Variable::new(tensor!([[1.0, 2.0], [3.0, 4.0]]));
        let (total, back) = sum(&x);
        assert_eq!(total, 10.0);
        assert_eq!(back(2.0), Tensor::new(vec![2, 2], vec![2.0; 4]));
    }

    #[test]
    fn mul_backward_returns_weights() {
        let x = Variable::new(tensor!([1.0, 2.0, 3.0]));
        let w = tensor!([0.5, 0.0, 2.0]);
        let (out, back) = mul(&x, &w);
        assert_eq!(out.data, vec![0.5, 0.0, 6.0]);
        assert_eq!(back(&tensor!([1.0, 1.0, 1.0])).data, vec![0.5, 0.0, 2.0]);
    }

    #[test]
    fn accumulate_requires_tracking() {
        let x = Variable::new(tensor!([1.0]));
        let err = accumulate_grad(&x, &tensor!([1.0])).unwrap_err();
        assert!(matches!(err, Error::GradientNotTracked));
    }

    #[test]
    fn accumulate_rejects_wrong_shape() {
        let x = Variable::new(tensor!([1.0, 2.0]));
        x.requires_grad_();
        let err = accumulate_grad(&x, &tensor!([1.0])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn accumulate_adds_in_place() {
        let x = Variable::new(tensor!([1.0, 2.0]));
        x.requires_grad_();
        accumulate_grad(&x, &tensor!([1.0, 1.0])).unwrap();
        let first = x.grad().unwrap();
        accumulate_grad(&x, &tensor!([0.5, 2.0])).unwrap();
        assert!(x.grad().unwrap().ptr_eq(&first));
        assert_eq!(first.to_tensor().data, vec![1.5, 3.0]);
    }
}
