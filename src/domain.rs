//! Domain objects of the input optimizer.
//!
//! - [`Input`] wraps the tensor being optimized. Constructing one switches on
//!   gradient tracking for that tensor.
//! - [`State`] is a passive snapshot of one optimization step.
//! - [`History`] retains states for as long as the caller wants them.

use core::fmt;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

use crate::error::{Error, Result};
use crate::variable::{Differentiable, Variable};

/// The input being optimized.
///
/// Holds the caller's tensor handle itself, not a copy, so gradients written
/// by the backward pass are visible through [`Input::gradient`] and updates
/// made through [`Input::data`] are visible to the caller.
pub struct Input<T: Differentiable = Variable> {
    tensor: T,
}

impl<T: Differentiable> Input<T> {
    /// Wraps `tensor` and enables gradient tracking on it.
    pub fn new(tensor: T) -> Self {
        tensor.requires_grad_();
        log::debug!("created input, gradient tracking enabled");
        Self { tensor }
    }

    /// The wrapped tensor.
    pub fn tensor(&self) -> &T {
        &self.tensor
    }

    /// Unwraps the tensor.
    pub fn into_tensor(self) -> T {
        self.tensor
    }

    /// The tensor's gradient slot.
    pub fn gradient(&self) -> Option<T> {
        self.tensor.grad()
    }

    /// Overwrites the tensor's gradient slot.
    pub fn set_gradient(&mut self, gradient: Option<T>) {
        self.tensor.set_grad(gradient);
    }

    /// The tensor's value buffer, outside of gradient tracking.
    pub fn data(&self) -> T {
        self.tensor.data()
    }

    /// Rebinds the tensor's value buffer to `data`.
    pub fn set_data(&mut self, data: &T) {
        log::debug!("rebinding input data");
        self.tensor.set_data(data);
    }

    /// A copy of the current value for inspection.
    ///
    /// Detaches, copies into fresh storage, moves to host memory and drops
    /// size-1 dimensions, in that order. The result shares nothing with the
    /// live tensor and does not track gradients, so it can be handed to
    /// reporting code without affecting the optimization.
    pub fn extract(&self) -> T {
        log::debug!("extracting input");
        self.tensor.detach().deep_clone().cpu().squeeze()
    }
}

/// Deep copy: the clone wraps a tensor with its own storage and has gradient
/// tracking enabled.
impl<T: Differentiable> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self::new(self.tensor.deep_clone())
    }
}

impl<T: Differentiable> fmt::Display for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Input({})", self.tensor)
    }
}

impl<T: Differentiable + fmt::Debug> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.tensor).finish()
    }
}

/// Snapshot of one optimization step.
///
/// `T` is the tensor type of the six tensor fields and `O` the type of the
/// stopper's payload. Nothing is derived or validated; the fields are exactly
/// what the orchestrator passed in.
#[derive(Debug, Clone)]
pub struct State<T = Variable, O = T> {
    i_iter: usize,
    evaluation: f64,
    input: T,
    transformed_input: T,
    post_processed_input: T,
    gradient: T,
    preconditioned_gradient: T,
    stopper_output: O,
}

impl<T, O> State<T, O> {
    /// Records a step.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        i_iter: usize,
        evaluation: f64,
        input: T,
        transformed_input: T,
        post_processed_input: T,
        grad: T,
        preconditioned_grad: T,
        stopper_output: O,
    ) -> Self {
        Self {
            i_iter,
            evaluation,
            input,
            transformed_input,
            post_processed_input,
            gradient: grad,
            preconditioned_gradient: preconditioned_grad,
            stopper_output,
        }
    }

    /// Iteration index.
    pub fn i_iter(&self) -> usize {
        self.i_iter
    }

    /// Score of the input at this step.
    pub fn evaluation(&self) -> f64 {
        self.evaluation
    }

    /// The input as optimized.
    pub fn input(&self) -> &T {
        &self.input
    }

    /// The input after the transform stage.
    pub fn transformed_input(&self) -> &T {
        &self.transformed_input
    }

    /// The input after post-processing.
    pub fn post_processed_input(&self) -> &T {
        &self.post_processed_input
    }

    /// Gradient of the evaluation with respect to the input.
    pub fn gradient(&self) -> &T {
        &self.gradient
    }

    /// The gradient after preconditioning.
    pub fn preconditioned_gradient(&self) -> &T {
        &self.preconditioned_gradient
    }

    /// Whatever the stopper reported for this step.
    pub fn stopper_output(&self) -> &O {
        &self.stopper_output
    }
}

/// `State(i_iter, evaluation, input, transformed_input, post_processed_input,
/// grad, preconditioned_grad, stopper_output)`.
impl<T: fmt::Display, O: fmt::Display> fmt::Display for State<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State({}, {:?}, {}, {}, {}, {}, {}, {})",
            self.i_iter,
            self.evaluation,
            self.input,
            self.transformed_input,
            self.post_processed_input,
            self.gradient,
            self.preconditioned_gradient,
            self.stopper_output,
        )
    }
}

/// States retained across steps, oldest first.
///
/// A bounded history drops its oldest state to make room for a new one.
#[derive(Debug, Clone)]
pub struct History<T = Variable, O = T> {
    states: VecDeque<State<T, O>>,
    limit: Option<NonZeroUsize>,
}

impl<T, O> History<T, O> {
    /// A history that keeps every state.
    pub fn unbounded() -> Self {
        Self {
            states: VecDeque::new(),
            limit: None,
        }
    }

    /// A history that keeps at most `limit` states.
    ///
    /// # Errors
    /// [`Error::InvalidCapacity`] if `limit` is zero.
    pub fn with_capacity_limit(limit: usize) -> Result<Self> {
        let limit = NonZeroUsize::new(limit).ok_or(Error::InvalidCapacity)?;
        Ok(Self {
            states: VecDeque::with_capacity(limit.get()),
            limit: Some(limit),
        })
    }

    /// Maximum number of retained states, if bounded.
    pub fn limit(&self) -> Option<usize> {
        self.limit.map(NonZeroUsize::get)
    }

    /// Appends `state`, evicting the oldest one when full.
    pub fn push(&mut self, state: State<T, O>) {
        if let Some(limit) = self.limit
            && self.states.len() == limit.get()
        {
            self.states.pop_front();
        }
        self.states.push_back(state);
    }

    /// Most recent state.
    pub fn latest(&self) -> Option<&State<T, O>> {
        self.states.back()
    }

    /// State at `index`, counting from the oldest retained one.
    pub fn get(&self, index: usize) -> Option<&State<T, O>> {
        self.states.get(index)
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &State<T, O>> {
        self.states.iter()
    }

    /// Number of retained states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state is retained.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drops every state.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// The state with the highest evaluation.
    ///
    /// Ties go to the earliest state; NaN evaluations are never selected.
    pub fn best_by_evaluation(&self) -> Option<&State<T, O>> {
        self.states
            .iter()
            .filter(|s| !s.evaluation.is_nan())
            .fold(None, |best: Option<&State<T, O>>, s| match best {
                Some(b) if b.evaluation >= s.evaluation => Some(b),
                _ => Some(s),
            })
    }

    /// The retained states, oldest first.
    pub fn into_vec(self) -> Vec<State<T, O>> {
        self.states.into()
    }
}

impl<T, O> Default for History<T, O> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T, O> Extend<State<T, O>> for History<T, O> {
    fn extend<I: IntoIterator<Item = State<T, O>>>(&mut self, iter: I) {
        for state in iter {
            self.push(state);
        }
    }
}
