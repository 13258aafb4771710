//! The `OpInstance` trait, a configured op with a forward pass and its exact adjoint.
use crate::errors::ExecutionError;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};
use std::fmt::Debug;

/// A fully configured op over fixed input and output shapes.
///
/// Both passes accumulate (`+=`) into the supplied output, callers wanting a fresh result should pass zeroed
/// arrays or use `forward()`/`backward()`.
pub trait OpInstance: Debug + Send + Sync {
	/// Should be the same as the builder's type name.
	fn type_name(&self) -> &'static str;

	fn input_shape(&self) -> &[usize];

	fn output_shape(&self) -> &[usize];

	/// Accumulate the op's output for `input` into `output`.
	fn execute(&self, input: ArrayViewD<f32>, output: ArrayViewMutD<f32>) -> Result<(), ExecutionError>;

	/// Accumulate the gradient with respect to the input into `input_grad`, given the gradient of the output.
	///
	/// Must be the transpose of `execute()`.
	fn execute_backward(
		&self,
		output_grad: ArrayViewD<f32>,
		input_grad: ArrayViewMutD<f32>,
	) -> Result<(), ExecutionError>;

	/// Allocate a zeroed output and run `execute()`.
	fn forward(&self, input: ArrayViewD<f32>) -> Result<ArrayD<f32>, ExecutionError> {
		let mut output = ArrayD::zeros(IxDyn(self.output_shape()));
		self.execute(input, output.view_mut())?;
		Ok(output)
	}

	/// Allocate a zeroed input gradient and run `execute_backward()`.
	fn backward(&self, output_grad: ArrayViewD<f32>) -> Result<ArrayD<f32>, ExecutionError> {
		let mut input_grad = ArrayD::zeros(IxDyn(self.input_shape()));
		self.execute_backward(output_grad, input_grad.view_mut())?;
		Ok(input_grad)
	}
}

/// Return an error unless `found` equals `expected`.
pub fn check_shape(name: &'static str, expected: &[usize], found: &[usize]) -> Result<(), ExecutionError> {
	if expected == found {
		Ok(())
	} else {
		Err(ExecutionError::shape_mismatch(name, expected, found))
	}
}
