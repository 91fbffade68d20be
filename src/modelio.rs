//! Saving and loading extracted tensors.
//!
//! # `.bpat` Serialization Format
//!
//! Tensors pulled out of an optimization run with
//! [`Input::extract`](crate::domain::Input::extract) are stored in a simple
//! binary format:
//!
//! ```text
//! ┌────────────┬────────────┬─────────────────────┐
//! │ Header     │ Tensor N   │ Tensor N+1 …        │
//! ├────────────┼────────────┼─────────────────────┤
//! │ "bpat"[4]  │ u64: ndim  │ u64: ndim           │
//! │ u8: count  │ [u64; ndim] shape                │
//! │            │ [f64; prod(shape)] data          │
//! └────────────┴──────────────────────────────────┘
//! ```
//!
//! All integers and floats are little-endian. Values are widened to `f64` on
//! disk and narrowed back to [`TensorFloat`] on load.
//!
//! # Limitations
//! - Maximum 255 tensors per file (due to `u8` count limit)
//! - No per-tensor metadata (names, dtypes, etc.)
//!
//! # Example
//!
//! ```rust
//! use featurevis::tensors::Tensor;
//! use featurevis::modelio::{load_tensors, save_tensors};
//!
//! fn main() -> featurevis::Result<()> {
//!     let path = std::env::temp_dir()
//!         .join(format!("featurevis-doc-{}.bpat", std::process::id()));
//!     let tensor = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
//!
//!     save_tensors(&path, &[tensor.clone()])?;
//!     assert_eq!(load_tensors(&path)?, vec![tensor]);
//!
//!     # std::fs::remove_file(&path)?;
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::TensorFloat;
use crate::error::{Error, Result};
use crate::tensors::Tensor;

const BPAT_MAGIC: &[u8; 4] = b"bpat";

/// Tensor as read from disk, before its shape has been checked.
struct PackedTensor {
    shape: Vec<u64>,
    data: Vec<f64>,
}

impl PackedTensor {
    fn validate(&self) -> Result<()> {
        let expected = self
            .shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(Error::Validation)?;
        if self.data.len() as u64 != expected {
            return Err(Error::Validation);
        }
        Ok(())
    }

    fn into_tensor(self) -> Result<Tensor> {
        self.validate()?;
        let shape = self
            .shape
            .iter()
            .map(|&d| usize::try_from(d).map_err(|_| Error::Validation))
            .collect::<Result<Vec<_>>>()?;
        let data = self.data.into_iter().map(|v| v as TensorFloat).collect();
        Ok(Tensor::new(shape, data))
    }
}

/// Saves `tensors` to a `.bpat` file at `path`.
///
/// # Errors
/// - [`Error::TooManyTensors`] for more than 255 tensors.
/// - [`Error::Io`] if creating or writing the file fails.
pub fn save_tensors(path: impl AsRef<Path>, tensors: &[Tensor]) -> Result<()> {
    let path = path.as_ref();
    let count = u8::try_from(tensors.len()).map_err(|_| Error::TooManyTensors(tensors.len()))?;
    let mut file = BufWriter::new(File::create(path)?);

    file.write_all(BPAT_MAGIC)?;
    file.write_all(&[count])?;

    for tensor in tensors {
        file.write_all(&(tensor.shape.len() as u64).to_le_bytes())?;
        for &dim in &tensor.shape {
            file.write_all(&(dim as u64).to_le_bytes())?;
        }
        for &val in &tensor.data {
            file.write_all(&f64::from(val).to_le_bytes())?;
        }
    }

    file.flush()?;
    log::debug!("saved {count} tensor(s) to {}", path.display());
    Ok(())
}

/// Loads every tensor from the `.bpat` file at `path`.
///
/// # Errors
/// - [`Error::InvalidMagic`] if the file does not start with `bpat`.
/// - [`Error::Validation`] if a tensor's data does not fill its shape.
/// - [`Error::Io`] if the file cannot be read or ends early.
pub fn load_tensors(path: impl AsRef<Path>) -> Result<Vec<Tensor>> {
    let path = path.as_ref();
    let mut file = BufReader::new(File::open(path)?);
    let mut buf8 = [0u8; 8];

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != BPAT_MAGIC {
        return Err(Error::InvalidMagic);
    }

    let mut count = [0u8; 1];
    file.read_exact(&mut count)?;
    let count = usize::from(count[0]);

    let mut tensors = Vec::with_capacity(count);

    for _ in 0..count {
        file.read_exact(&mut buf8)?;
        let ndim = u64::from_le_bytes(buf8);

        let mut shape = Vec::new();
        for _ in 0..ndim {
            file.read_exact(&mut buf8)?;
            shape.push(u64::from_le_bytes(buf8));
        }

        let size = shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(Error::Validation)?;
        let mut data = Vec::new();
        for _ in 0..size {
            file.read_exact(&mut buf8)?;
            data.push(f64::from_le_bytes(buf8));
        }

        tensors.push(PackedTensor { shape, data }.into_tensor()?);
    }

    log::debug!("loaded {} tensor(s) from {}", tensors.len(), path.display());
    Ok(tensors)
}
