//! `UnpoolingLayer`, which owns an `Unpool` configuration and rebuilds its instance whenever the input shape changes.
use crate::unpool::{geometry::GeometryParams, Method, Unpool, UnpoolInstance};
use log::debug;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};
use unpool_core::{base_ops::OpInstance, errors::LayerError};

#[derive(Clone, Debug)]
enum LayerState {
	Unconfigured,
	Configured(UnpoolInstance),
}

/// An unpooling layer.
///
/// Starts unconfigured. A successful `reshape()` configures it for one input shape, after which `forward()` and
/// `backward()` may be called any number of times in any order. A failed `reshape()` leaves it unconfigured.
#[derive(Clone, Debug)]
pub struct UnpoolingLayer {
	unpool: Unpool,
	state: LayerState,
}

impl UnpoolingLayer {
	pub fn new(unpool: Unpool) -> Self {
		UnpoolingLayer {
			unpool,
			state: LayerState::Unconfigured,
		}
	}

	/// Create a layer from a method name, as found in a layer description.
	pub fn from_method_name(method: &str, params: GeometryParams) -> Result<Self, LayerError> {
		let method: Method = method.parse()?;
		Ok(UnpoolingLayer::new(Unpool::with_params(method, params)))
	}

	pub fn unpool(&self) -> &Unpool {
		&self.unpool
	}

	pub fn is_configured(&self) -> bool {
		match self.state {
			LayerState::Configured(_) => true,
			LayerState::Unconfigured => false,
		}
	}

	/// The instance built by the last successful `reshape()`.
	pub fn instance(&self) -> Result<&UnpoolInstance, LayerError> {
		match &self.state {
			LayerState::Configured(instance) => Ok(instance),
			LayerState::Unconfigured => Err(LayerError::Unconfigured),
		}
	}

	/// Configure the layer for `input_shape`, returning the output shape.
	///
	/// `companion` is the auto-sizing target for FIXED, DIV and REP or the label input for GROUP.
	pub fn reshape(&mut self, input_shape: &[usize], companion: Option<ArrayViewD<f32>>) -> Result<&[usize], LayerError> {
		self.state = LayerState::Unconfigured;
		let instance = self.unpool.build_instance(input_shape, companion).map_err(|err| {
			debug!("unpooling layer left unconfigured: {}", err);
			err
		})?;
		self.state = LayerState::Configured(instance);
		Ok(self.instance()?.output_shape())
	}

	pub fn forward(&self, input: ArrayViewD<f32>) -> Result<ArrayD<f32>, LayerError> {
		Ok(self.instance()?.forward(input)?)
	}

	pub fn backward(&self, output_grad: ArrayViewD<f32>) -> Result<ArrayD<f32>, LayerError> {
		Ok(self.instance()?.backward(output_grad)?)
	}

	/// Accumulate into an existing output.
	pub fn forward_into(&self, input: ArrayViewD<f32>, output: ArrayViewMutD<f32>) -> Result<(), LayerError> {
		Ok(self.instance()?.execute(input, output)?)
	}

	/// Accumulate into an existing input gradient.
	pub fn backward_into(&self, output_grad: ArrayViewD<f32>, input_grad: ArrayViewMutD<f32>) -> Result<(), LayerError> {
		Ok(self.instance()?.execute_backward(output_grad, input_grad)?)
	}
}
