//! Plain tensor values.
//!
//! [`Tensor`] is an owned N-dimensional array: a shape and flat row-major
//! data. It carries no gradient state; wrap it in a
//! [`Variable`](crate::variable::Variable) for that.
//!
//! ## Design Highlights
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - A scalar has an empty shape and exactly one element
//! - The `tensor!` macro supports ergonomic tensor creation from nested arrays
//! - `Display` renders nested brackets, e.g. `[[1.0, 2.0], [3.0, 4.0]]`
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting or slicing
//!
//! ## Example
//!
//! ```rust
//! use featurevis::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use core::fmt;

use crate::TensorFloat;
use crate::error::{Error, Result};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Size of each dimension.
    pub shape: Vec<usize>,
    /// Row-major elements.
    pub data: Vec<TensorFloat>,
}

impl Tensor {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<TensorFloat>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Fallible version of [`Tensor::new`].
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] if the element count does not match the shape.
    /// `found` reports the data length as a one-dimensional shape.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<TensorFloat>) -> Result<Self> {
        let shape = shape.into();
        if shape.iter().product::<usize>() != data.len() {
            return Err(Error::ShapeMismatch {
                expected: shape,
                found: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// A zero-dimensional tensor holding `value`.
    pub fn scalar(value: TensorFloat) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// A tensor of zeros with the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns the same data with every size-1 dimension removed.
    pub fn squeeze(mut self) -> Self {
        self.shape = squeezed_shape(&self.shape);
        self
    }
}

/// `shape` without its size-1 dimensions.
pub(crate) fn squeezed_shape(shape: &[usize]) -> Vec<usize> {
    shape.iter().copied().filter(|&d| d != 1).collect()
}

/// Writes `data` as nested brackets following `shape`.
pub(crate) fn write_nested(
    f: &mut fmt::Formatter<'_>,
    shape: &[usize],
    data: &[TensorFloat],
) -> fmt::Result {
    let Some((&outer, inner)) = shape.split_first() else {
        return write!(f, "{:?}", data[0]);
    };
    let stride = inner.iter().product::<usize>();
    f.write_str("[")?;
    for i in 0..outer {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_nested(f, inner, &data[i * stride..(i + 1) * stride])?;
    }
    f.write_str("]")
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nested(f, &self.shape, &self.data)
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use featurevis::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::scalar($lit)
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
