//! Forward kernels. Each call handles a single (batch, channel) plane and accumulates into `output`.
use super::{
	group::GroupPartition,
	mask::{OverlapMask, SourceMask},
};
use itertools::iproduct;
use ndarray::{ArrayView2, ArrayViewMut2};
use unpool_core::errors::ExecutionError;

/// Copy each source cell to the destination cell recorded for it. Cells with no source are left untouched.
pub fn fixed(mask: &SourceMask, input: ArrayView2<f32>, mut output: ArrayViewMut2<f32>) {
	let (_, out_w) = mask.shape();
	let in_w = input.ncols();
	for (dst, src) in mask.pairs() {
		output[[dst / out_w, dst % out_w]] += input[[src / in_w, src % in_w]];
	}
}

/// Spread each source cell evenly over its clipped window, normalised by the overlap count of each cell.
pub fn div(mask: &OverlapMask, input: ArrayView2<f32>, output: ArrayViewMut2<f32>) -> Result<(), ExecutionError> {
	spread(mask, input, output, true)
}

/// Replicate each source cell over its clipped window, normalised by the overlap count of each cell.
pub fn rep(mask: &OverlapMask, input: ArrayView2<f32>, output: ArrayViewMut2<f32>) -> Result<(), ExecutionError> {
	spread(mask, input, output, false)
}

fn spread(
	mask: &OverlapMask,
	input: ArrayView2<f32>,
	mut output: ArrayViewMut2<f32>,
	divide_area: bool,
) -> Result<(), ExecutionError> {
	let (_, out_w) = mask.shape();
	for ((h, w), &value) in input.indexed_iter() {
		let value = if divide_area {
			value / mask.area(h, w) as f32
		} else {
			value
		};
		let (rows, cols) = mask.window(h, w);
		for (uh, uw) in iproduct!(rows, cols) {
			output[[uh, uw]] += value / mask.divisor(uh * out_w + uw)?;
		}
	}
	Ok(())
}

/// Add to every position the mean of its group, once per group-channel.
///
/// The mean of a group with `m` members is its sum divided by `m * divisor`, where `divisor` is the number of
/// group-channels, so the result is the average over group-channels of the per-channel group means.
pub fn group(
	partition: &GroupPartition,
	n: usize,
	divisor: usize,
	input: ArrayView2<f32>,
	mut output: ArrayViewMut2<f32>,
) {
	let width = input.ncols();
	for gc in 0..partition.group_channels() {
		for members in partition.groups(n, gc) {
			let sum: f32 = members.iter().map(|&p| input[[p / width, p % width]]).sum();
			let mean = sum / (members.len() * divisor) as f32;
			for &p in members {
				output[[p / width, p % width]] += mean;
			}
		}
	}
}
