//! Backward kernels, the transposes of those in `forward`. Each call handles a single (batch, channel) plane and
//! accumulates into `input_grad`.
use super::{
	group::GroupPartition,
	mask::{OverlapMask, SourceMask},
};
use ndarray::{ArrayView2, ArrayViewMut2};
use unpool_core::errors::ExecutionError;

/// Route the gradient of each destination cell with a source back to that source.
pub fn fixed(mask: &SourceMask, output_grad: ArrayView2<f32>, mut input_grad: ArrayViewMut2<f32>) {
	let (_, out_w) = mask.shape();
	let in_w = input_grad.ncols();
	for (dst, src) in mask.pairs() {
		input_grad[[src / in_w, src % in_w]] += output_grad[[dst / out_w, dst % out_w]];
	}
}

pub fn div(
	mask: &OverlapMask,
	output_grad: ArrayView2<f32>,
	input_grad: ArrayViewMut2<f32>,
) -> Result<(), ExecutionError> {
	gather(mask, output_grad, input_grad, true)
}

pub fn rep(
	mask: &OverlapMask,
	output_grad: ArrayView2<f32>,
	input_grad: ArrayViewMut2<f32>,
) -> Result<(), ExecutionError> {
	gather(mask, output_grad, input_grad, false)
}

/// Each source cell collects the count normalised gradient over its clipped window.
fn gather(
	mask: &OverlapMask,
	output_grad: ArrayView2<f32>,
	mut input_grad: ArrayViewMut2<f32>,
	divide_area: bool,
) -> Result<(), ExecutionError> {
	let (_, out_w) = mask.shape();
	for ((h, w), grad) in input_grad.indexed_iter_mut() {
		let mut sum = 0.0;
		for index in mask.window_indices(h, w) {
			sum += output_grad[[index / out_w, index % out_w]] / mask.divisor(index)?;
		}
		if divide_area {
			sum /= mask.area(h, w) as f32;
		}
		*grad += sum;
	}
	Ok(())
}

/// The GROUP operator is symmetric: position `p` receives from `q` exactly what `q` receives from `p`, so the
/// transpose is the same group averaging applied to the output gradient.
///
/// Summing each group once and broadcasting keeps this linear in the number of positions rather than quadratic in
/// group size.
pub fn group(
	partition: &GroupPartition,
	n: usize,
	divisor: usize,
	output_grad: ArrayView2<f32>,
	mut input_grad: ArrayViewMut2<f32>,
) {
	let width = output_grad.ncols();
	for gc in 0..partition.group_channels() {
		for members in partition.groups(n, gc) {
			let total: f32 = members.iter().map(|&p| output_grad[[p / width, p % width]]).sum();
			let share = total / (members.len() * divisor) as f32;
			for &p in members {
				input_grad[[p / width, p % width]] += share;
			}
		}
	}
}
