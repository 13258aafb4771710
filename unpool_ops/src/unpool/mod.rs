//! Unpooling: increase the spatial size of an (N, C, H, W) input, the reverse direction of pooling.
//!
//! Four methods are supported:
//!  * FIXED copies each source cell to the midpoint of its receptive window.
//!  * DIV spreads each source cell evenly over its window, then divides every destination cell by the number of
//!    windows covering it.
//!  * REP is DIV without the division by window area.
//!  * GROUP keeps the spatial size and replaces each value with the mean of its group, as given by a label input.
//!
//! `Unpool` resolves the geometry and builds the plan (mask or group partition) for a given input shape, giving
//! an `UnpoolInstance` that runs the forward pass and its exact adjoint.
pub mod backward;
pub mod forward;
pub mod geometry;
pub mod group;
pub mod mask;

use self::{
	geometry::{Geometry, GeometryParams},
	group::GroupPartition,
	mask::{OverlapMask, SourceMask},
};
use log::{debug, warn};
use ndarray::{ArrayView2, ArrayViewD, ArrayViewMut2, ArrayViewMutD, Ix4};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::{fmt, str::FromStr, sync::Arc};
use unpool_core::{
	base_ops::{check_shape, OpInstance},
	errors::{ConfigError, ExecutionError, UnsupportedMethodError},
	shape::GridShape,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	Fixed,
	Div,
	Rep,
	Group,
}

impl FromStr for Method {
	type Err = UnsupportedMethodError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"fixed" => Ok(Method::Fixed),
			"div" => Ok(Method::Div),
			"rep" => Ok(Method::Rep),
			"group" => Ok(Method::Group),
			_ => Err(UnsupportedMethodError { method: s.to_string() }),
		}
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let name = match self {
			Method::Fixed => "FIXED",
			Method::Div => "DIV",
			Method::Rep => "REP",
			Method::Group => "GROUP",
		};
		f.write_str(name)
	}
}

/// Derived state for one shape epoch, shared read-only by every plane of every pass.
#[derive(Clone, Debug, PartialEq)]
pub enum UnpoolPlan {
	Fixed { mask: SourceMask },
	Div { mask: OverlapMask },
	Rep { mask: OverlapMask },
	Group { divisor: usize, partition: GroupPartition },
}

impl UnpoolPlan {
	pub fn method(&self) -> Method {
		match self {
			UnpoolPlan::Fixed { .. } => Method::Fixed,
			UnpoolPlan::Div { .. } => Method::Div,
			UnpoolPlan::Rep { .. } => Method::Rep,
			UnpoolPlan::Group { .. } => Method::Group,
		}
	}

	fn forward_plane(&self, n: usize, input: ArrayView2<f32>, output: ArrayViewMut2<f32>) -> Result<(), ExecutionError> {
		match self {
			UnpoolPlan::Fixed { mask } => forward::fixed(mask, input, output),
			UnpoolPlan::Div { mask } => forward::div(mask, input, output)?,
			UnpoolPlan::Rep { mask } => forward::rep(mask, input, output)?,
			UnpoolPlan::Group { divisor, partition } => forward::group(partition, n, *divisor, input, output),
		}
		Ok(())
	}

	fn backward_plane(
		&self,
		n: usize,
		output_grad: ArrayView2<f32>,
		input_grad: ArrayViewMut2<f32>,
	) -> Result<(), ExecutionError> {
		match self {
			UnpoolPlan::Fixed { mask } => backward::fixed(mask, output_grad, input_grad),
			UnpoolPlan::Div { mask } => backward::div(mask, output_grad, input_grad)?,
			UnpoolPlan::Rep { mask } => backward::rep(mask, output_grad, input_grad)?,
			UnpoolPlan::Group { divisor, partition } => {
				backward::group(partition, n, *divisor, output_grad, input_grad)
			}
		}
		Ok(())
	}
}

/// Unpooling op builder.
///
/// Kernel, stride and pad can each be set in symmetric form or per axis. Stride defaults to 1 and pad to 0.
/// GROUP ignores kernel and stride.
#[must_use]
#[derive(Clone, Debug)]
pub struct Unpool {
	method: Method,
	params: GeometryParams,
}

impl Unpool {
	pub fn new(method: Method) -> Self {
		Unpool {
			method,
			params: GeometryParams::default(),
		}
	}

	pub fn with_params(method: Method, params: GeometryParams) -> Self {
		Unpool { method, params }
	}

	pub fn method(&self) -> Method {
		self.method
	}

	pub fn params(&self) -> &GeometryParams {
		&self.params
	}

	pub fn kernel_size(mut self, kernel_size: usize) -> Self {
		self.params.kernel_size = Some(kernel_size);
		self
	}

	pub fn kernel_h(mut self, kernel_h: usize) -> Self {
		self.params.kernel_h = Some(kernel_h);
		self
	}

	pub fn kernel_w(mut self, kernel_w: usize) -> Self {
		self.params.kernel_w = Some(kernel_w);
		self
	}

	/// Default: 1
	pub fn stride(mut self, stride: usize) -> Self {
		self.params.stride = Some(stride);
		self
	}

	pub fn stride_h(mut self, stride_h: usize) -> Self {
		self.params.stride_h = Some(stride_h);
		self
	}

	pub fn stride_w(mut self, stride_w: usize) -> Self {
		self.params.stride_w = Some(stride_w);
		self
	}

	/// Default: 0
	pub fn pad(mut self, pad: usize) -> Self {
		self.params.pad = Some(pad);
		self
	}

	pub fn pad_h(mut self, pad_h: usize) -> Self {
		self.params.pad_h = Some(pad_h);
		self
	}

	pub fn pad_w(mut self, pad_w: usize) -> Self {
		self.params.pad_w = Some(pad_w);
		self
	}

	/// Resolve the geometry for `input_shape` and build the plan.
	///
	/// `companion` is optional for FIXED, DIV and REP, where its shape is the target size for auto-sizing. For GROUP
	/// it is required and holds the labels, shape (N, G, H, W).
	pub fn build_instance(
		&self,
		input_shape: &[usize],
		companion: Option<ArrayViewD<f32>>,
	) -> Result<UnpoolInstance, ConfigError> {
		let source = GridShape::from_slice(input_shape)?;
		let geometry = geometry::resolve(
			self.method,
			&self.params,
			&source,
			companion.as_ref().map(|companion| companion.shape()),
		)?;
		let (out_h, out_w) = geometry.output_size(source.height, source.width)?;
		let dest = source.with_spatial(out_h, out_w);

		let spatial = (source.height, source.width);
		let plan = match self.method {
			Method::Fixed => {
				let mask = SourceMask::build(&geometry, spatial, (out_h, out_w));
				if mask.dropped() > 0 {
					warn!(
						"FIXED unpooling with {} drops {} source cells that share a destination cell with a later one",
						geometry,
						mask.dropped()
					);
				}
				UnpoolPlan::Fixed { mask }
			}
			Method::Div => UnpoolPlan::Div {
				mask: OverlapMask::build(&geometry, spatial, (out_h, out_w)),
			},
			Method::Rep => UnpoolPlan::Rep {
				mask: OverlapMask::build(&geometry, spatial, (out_h, out_w)),
			},
			Method::Group => {
				let labels = companion.ok_or(ConfigError::MissingGroupLabels)?;
				let partition = GroupPartition::build(labels, &source)?;
				UnpoolPlan::Group {
					divisor: partition.group_channels(),
					partition,
				}
			}
		};

		debug!(
			"built {} unpooling plan: {} -> {} with {}",
			self.method, source, dest, geometry
		);

		Ok(UnpoolInstance {
			input_shape: source.slice(),
			output_shape: dest.slice(),
			source,
			dest,
			geometry,
			plan: Arc::new(plan),
		})
	}
}

/// A configured unpooling op for one input shape.
///
/// Clones share the plan.
#[derive(Clone, Debug)]
pub struct UnpoolInstance {
	input_shape: SmallVec<[usize; 4]>,
	output_shape: SmallVec<[usize; 4]>,
	source: GridShape,
	dest: GridShape,
	geometry: Geometry,
	plan: Arc<UnpoolPlan>,
}

impl UnpoolInstance {
	pub fn method(&self) -> Method {
		self.plan.method()
	}

	pub fn geometry(&self) -> &Geometry {
		&self.geometry
	}

	pub fn plan(&self) -> &UnpoolPlan {
		&self.plan
	}

	pub fn source(&self) -> &GridShape {
		&self.source
	}

	pub fn dest(&self) -> &GridShape {
		&self.dest
	}
}

impl OpInstance for UnpoolInstance {
	fn type_name(&self) -> &'static str {
		"Unpool"
	}

	fn input_shape(&self) -> &[usize] {
		&self.input_shape
	}

	fn output_shape(&self) -> &[usize] {
		&self.output_shape
	}

	fn execute(&self, input: ArrayViewD<f32>, output: ArrayViewMutD<f32>) -> Result<(), ExecutionError> {
		check_shape("input", &self.input_shape, input.shape())?;
		check_shape("output", &self.output_shape, output.shape())?;
		let input = input
			.into_dimensionality::<Ix4>()
			.map_err(|_| ExecutionError::shape_mismatch("input", &self.input_shape, &self.input_shape))?;
		let mut output = output
			.into_dimensionality::<Ix4>()
			.map_err(|_| ExecutionError::shape_mismatch("output", &self.output_shape, &self.output_shape))?;

		let plan = &*self.plan;
		output
			.outer_iter_mut()
			.into_par_iter()
			.zip(input.outer_iter())
			.enumerate()
			.try_for_each(|(n, (mut output, input))| {
				output
					.outer_iter_mut()
					.into_par_iter()
					.zip(input.outer_iter())
					.try_for_each(|(output, input)| plan.forward_plane(n, input, output))
			})
	}

	fn execute_backward(
		&self,
		output_grad: ArrayViewD<f32>,
		input_grad: ArrayViewMutD<f32>,
	) -> Result<(), ExecutionError> {
		check_shape("output_grad", &self.output_shape, output_grad.shape())?;
		check_shape("input_grad", &self.input_shape, input_grad.shape())?;
		let output_grad = output_grad
			.into_dimensionality::<Ix4>()
			.map_err(|_| ExecutionError::shape_mismatch("output_grad", &self.output_shape, &self.output_shape))?;
		let mut input_grad = input_grad
			.into_dimensionality::<Ix4>()
			.map_err(|_| ExecutionError::shape_mismatch("input_grad", &self.input_shape, &self.input_shape))?;

		let plan = &*self.plan;
		input_grad
			.outer_iter_mut()
			.into_par_iter()
			.zip(output_grad.outer_iter())
			.enumerate()
			.try_for_each(|(n, (mut input_grad, output_grad))| {
				input_grad
					.outer_iter_mut()
					.into_par_iter()
					.zip(output_grad.outer_iter())
					.try_for_each(|(input_grad, output_grad)| plan.backward_plane(n, output_grad, input_grad))
			})
	}
}
