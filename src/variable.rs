//! Variable - Tensor with Gradient Tracking
//!
//! A [`Variable`] is a shared handle to a tensor that participates in
//! automatic differentiation. Cloning the handle does not copy anything: both
//! handles name the same variable, the same way two references to one tensor
//! object do. Each variable owns
//!
//! - a value buffer, which views ([`Variable::data`], [`Variable::detach`],
//!   [`Variable::squeeze`]) share,
//! - a gradient slot holding another variable or nothing,
//! - a gradient-tracking flag,
//! - a [`Device`] tag.
//!
//! Independent copies are made explicitly with [`Variable::deep_clone`] or by
//! moving to another device.
//!
//! [`Differentiable`] is the tensor-like contract the domain layer is written
//! against; `Variable` is its implementation.

use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::TensorFloat;
use crate::device::{Device, default_device};
use crate::tensors::{Tensor, squeezed_shape, write_nested};

type Storage = Arc<RwLock<Vec<TensorFloat>>>;

struct Inner {
    storage: Storage,
    shape: Vec<usize>,
    grad: Option<Variable>,
    requires_grad: bool,
    device: Device,
}

/// A tensor with automatic differentiation support.
#[derive(Clone)]
pub struct Variable {
    inner: Arc<RwLock<Inner>>,
}

impl Variable {
    /// Creates a variable on the default device.
    ///
    /// Gradient tracking starts disabled and the gradient slot empty.
    pub fn new(tensor: Tensor) -> Self {
        Self::new_on(tensor, default_device())
    }

    /// Creates a variable on `device`.
    pub fn new_on(tensor: Tensor, device: Device) -> Self {
        Self::from_parts(
            Arc::new(RwLock::new(tensor.data)),
            tensor.shape,
            device,
            false,
        )
    }

    /// A zero-dimensional variable holding `value`.
    pub fn scalar(value: TensorFloat) -> Self {
        Self::new(Tensor::scalar(value))
    }

    fn from_parts(storage: Storage, shape: Vec<usize>, device: Device, requires_grad: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                storage,
                shape,
                grad: None,
                requires_grad,
                device,
            })),
        }
    }

    /// Size of each dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.inner.read().shape.clone()
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.inner.read().shape.iter().product()
    }

    /// Device the variable is tagged with.
    pub fn device(&self) -> Device {
        self.inner.read().device
    }

    /// Whether arithmetic on this variable records gradients.
    pub fn requires_grad(&self) -> bool {
        self.inner.read().requires_grad
    }

    /// Enables gradient tracking in place and returns `self` for chaining.
    pub fn requires_grad_(&self) -> &Self {
        self.inner.write().requires_grad = true;
        log::trace!("gradient tracking enabled");
        self
    }

    /// The accumulated gradient, if any.
    ///
    /// Returns a handle to the gradient variable itself, not a copy.
    pub fn grad(&self) -> Option<Self> {
        self.inner.read().grad.clone()
    }

    /// Replaces the gradient slot.
    ///
    /// A variable cannot be its own gradient: that would keep it alive
    /// forever, so the call is ignored with a warning.
    pub fn set_grad(&self, grad: Option<Self>) {
        if grad.as_ref().is_some_and(|g| g.ptr_eq(self)) {
            log::warn!("ignoring attempt to make a variable its own gradient");
            return;
        }
        self.inner.write().grad = grad;
    }

    /// Empties the gradient slot.
    pub fn zero_grad(&self) {
        self.set_grad(None);
    }

    /// A view of the value buffer that does not track gradients.
    ///
    /// Writes through the view are visible in `self`.
    pub fn data(&self) -> Self {
        self.detach()
    }

    /// Rebinds this variable's value buffer and shape to those of `data`.
    ///
    /// Afterwards both variables share one buffer. Gradient slot, tracking
    /// flag and device are left untouched.
    pub fn set_data(&self, data: &Self) {
        let (storage, shape) = {
            let src = data.inner.read();
            (Arc::clone(&src.storage), src.shape.clone())
        };
        let mut inner = self.inner.write();
        inner.storage = storage;
        inner.shape = shape;
    }

    /// A view sharing the value buffer, with no gradient and no tracking.
    pub fn detach(&self) -> Self {
        let inner = self.inner.read();
        Self::from_parts(
            Arc::clone(&inner.storage),
            inner.shape.clone(),
            inner.device,
            false,
        )
    }

    /// An independent copy of the value buffer.
    ///
    /// Shape, device and the tracking flag are kept; the gradient slot of the
    /// copy is empty.
    pub fn deep_clone(&self) -> Self {
        let inner = self.inner.read();
        let values = inner.storage.read().clone();
        Self::from_parts(
            Arc::new(RwLock::new(values)),
            inner.shape.clone(),
            inner.device,
            inner.requires_grad,
        )
    }

    /// The variable placed on `device`.
    ///
    /// Returns `self` (the same handle) when it is already there, otherwise
    /// a copy carrying the tracking flag.
    pub fn to_device(&self, device: Device) -> Self {
        if self.device() == device {
            return self.clone();
        }
        let copy = self.deep_clone();
        copy.inner.write().device = device;
        log::trace!("moved {:?} tensor from {} to {device}", copy.shape(), self.device());
        copy
    }

    /// The variable in host memory. See [`Variable::to_device`].
    pub fn cpu(&self) -> Self {
        self.to_device(Device::Cpu)
    }

    /// A view with every size-1 dimension removed.
    pub fn squeeze(&self) -> Self {
        let inner = self.inner.read();
        Self::from_parts(
            Arc::clone(&inner.storage),
            squeezed_shape(&inner.shape),
            inner.device,
            inner.requires_grad,
        )
    }

    /// Copies the current value out.
    pub fn to_tensor(&self) -> Tensor {
        let inner = self.inner.read();
        let data = inner.storage.read().clone();
        Tensor::new(inner.shape.clone(), data)
    }

    /// Runs `f` over the value buffer.
    pub fn with_values<R>(&self, f: impl FnOnce(&[TensorFloat]) -> R) -> R {
        let storage = self.storage();
        let values = storage.read();
        f(&values)
    }

    /// Runs `f` over the value buffer, mutably.
    ///
    /// Every view sharing the buffer observes the change.
    pub fn update_values<R>(&self, f: impl FnOnce(&mut [TensorFloat]) -> R) -> R {
        let storage = self.storage();
        let mut values = storage.write();
        f(&mut values)
    }

    /// Whether both handles name the same variable.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether both variables read and write the same value buffer.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage(), &other.storage())
    }

    fn storage(&self) -> Storage {
        Arc::clone(&self.inner.read().storage)
    }
}

impl From<Tensor> for Variable {
    fn from(tensor: Tensor) -> Self {
        Self::new(tensor)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Variable")
            .field("shape", &inner.shape)
            .field("device", &inner.device)
            .field("requires_grad", &inner.requires_grad)
            .field("has_grad", &inner.grad.is_some())
            .finish()
    }
}

/// Renders like `tensor([[1.0, 2.0]], device='wgpu', requires_grad=True)`;
/// the device is omitted on the CPU and the flag when it is off.
impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (storage, shape, device, requires_grad) = {
            let inner = self.inner.read();
            (
                Arc::clone(&inner.storage),
                inner.shape.clone(),
                inner.device,
                inner.requires_grad,
            )
        };
        f.write_str("tensor(")?;
        write_nested(f, &shape, &storage.read())?;
        if device != Device::Cpu {
            write!(f, ", device='{device}'")?;
        }
        if requires_grad {
            f.write_str(", requires_grad=True")?;
        }
        f.write_str(")")
    }
}

/// The tensor-like contract the domain layer relies on.
///
/// Implementors are handles: the methods take `&self` and mutate shared
/// state, and the gradient of a tensor is a tensor of the same kind.
pub trait Differentiable: Sized + fmt::Display {
    /// Enables gradient tracking in place.
    fn requires_grad_(&self) -> &Self;
    /// The gradient slot.
    fn grad(&self) -> Option<Self>;
    /// Overwrites the gradient slot.
    fn set_grad(&self, grad: Option<Self>);
    /// The value buffer, outside of gradient tracking.
    fn data(&self) -> Self;
    /// Rebinds the value buffer.
    fn set_data(&self, data: &Self);
    /// Severs the result from gradient tracking.
    fn detach(&self) -> Self;
    /// Copies into independent storage.
    fn deep_clone(&self) -> Self;
    /// Moves to host memory.
    fn cpu(&self) -> Self;
    /// Drops size-1 dimensions.
    fn squeeze(&self) -> Self;
}

impl Differentiable for Variable {
    fn requires_grad_(&self) -> &Self {
        Variable::requires_grad_(self)
    }

    fn grad(&self) -> Option<Self> {
        Variable::grad(self)
    }

    fn set_grad(&self, grad: Option<Self>) {
        Variable::set_grad(self, grad);
    }

    fn data(&self) -> Self {
        Variable::data(self)
    }

    fn set_data(&self, data: &Self) {
        Variable::set_data(self, data);
    }

    fn detach(&self) -> Self {
        Variable::detach(self)
    }

    fn deep_clone(&self) -> Self {
        Variable::deep_clone(self)
    }

    fn cpu(&self) -> Self {
        Variable::cpu(self)
    }

    fn squeeze(&self) -> Self {
        Variable::squeeze(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    fn var() -> Variable {
        Variable::new_on(tensor!([[1.0, 2.0, 3.0]]), Device::Cpu)
    }

    #[test]
    fn clone_is_the_same_variable() {
        let a = var();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        b.requires_grad_();
        assert!(a.requires_grad());
    }

    #[test]
    fn data_view_shares_storage_without_tracking() {
        let a = var();
        a.requires_grad_();
        let view = a.data();
        assert!(view.shares_storage(&a));
        assert!(!view.ptr_eq(&a));
        assert!(!view.requires_grad());
        view.update_values(|v| v[0] = 10.0);
        assert_eq!(a.to_tensor().data, vec![10.0, 2.0, 3.0]);
    }

    #[test]
    fn set_data_rebinds_buffer() {
        let a = var();
        let b = Variable::new_on(tensor!([4.0, 5.0]), Device::Cpu);
        a.set_data(&b);
        assert!(a.shares_storage(&b));
        assert_eq!(a.shape(), vec![2]);
        assert_eq!(a.to_tensor().data, vec![4.0, 5.0]);
    }

    #[test]
    fn set_data_with_itself_is_a_no_op() {
        let a = var();
        a.set_data(&a.clone());
        assert_eq!(a.to_tensor(), tensor!([[1.0, 2.0, 3.0]]));
    }

    #[test]
    fn deep_clone_is_independent() {
        let a = var();
        a.requires_grad_();
        a.set_grad(Some(var()));
        let b = a.deep_clone();
        assert!(!b.shares_storage(&a));
        assert!(b.requires_grad());
        assert!(b.grad().is_none());
        b.update_values(|v| v[1] = 0.0);
        assert_eq!(a.to_tensor().data, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn cpu_is_identity_on_host() {
        let a = var();
        assert!(a.cpu().ptr_eq(&a));
    }

    #[test]
    fn cpu_copies_off_device() {
        let a = var().to_device(Device::Wgpu);
        assert_eq!(a.device(), Device::Wgpu);
        let host = a.cpu();
        assert_eq!(host.device(), Device::Cpu);
        assert!(!host.shares_storage(&a));
        assert_eq!(host.to_tensor(), a.to_tensor());
    }

    #[test]
    fn squeeze_is_a_view() {
        let a = var();
        let s = a.squeeze();
        assert_eq!(s.shape(), vec![3]);
        assert!(s.shares_storage(&a));
    }

    #[test]
    fn grad_slot_holds_a_handle() {
        let a = var();
        let g = var();
        a.set_grad(Some(g.clone()));
        assert!(a.grad().is_some_and(|got| got.ptr_eq(&g)));
        a.zero_grad();
        assert!(a.grad().is_none());
    }

    #[test]
    fn variable_cannot_be_its_own_gradient() {
        let a = var();
        let g = var();
        a.set_grad(Some(g.clone()));
        a.set_grad(Some(a.clone()));
        assert!(a.grad().is_some_and(|got| got.ptr_eq(&g)));
    }

    #[test]
    fn display() {
        let a = var();
        assert_eq!(a.to_string(), "tensor([[1.0, 2.0, 3.0]])");
        a.requires_grad_();
        assert_eq!(a.to_string(), "tensor([[1.0, 2.0, 3.0]], requires_grad=True)");
        let w = Variable::new_on(tensor!(2.5), Device::Wgpu);
        assert_eq!(w.to_string(), "tensor(2.5, device='wgpu')");
    }
}
