//! Geometry derived masks, shared by every (batch, channel) plane.
use super::geometry::Geometry;
use itertools::iproduct;
use std::ops::Range;
use unpool_core::errors::ExecutionError;

/// Destination cells of a `SourceMask` that no source cell maps to.
pub const NO_SOURCE: usize = usize::MAX;

/// FIXED mask: for every destination cell, the row-major index of the source cell copied there, or `NO_SOURCE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceMask {
	height: usize,
	width: usize,
	sources: Vec<usize>,
	dropped: usize,
}

impl SourceMask {
	/// Each source cell is sent to the (clamped) midpoint of its receptive window.
	///
	/// Source cells are visited in row-major order and a later cell overwrites an earlier one landing on the same
	/// destination cell. The overwritten cell then takes no part in either pass.
	pub fn build(geometry: &Geometry, source: (usize, usize), output: (usize, usize)) -> Self {
		let (height, width) = output;
		let mut sources = vec![NO_SOURCE; height * width];
		let mut dropped = 0;

		for (h, w) in iproduct!(0..source.0, 0..source.1) {
			let uh = geometry.rows(h).midpoint(height);
			let uw = geometry.cols(w).midpoint(width);
			let cell = &mut sources[uh * width + uw];
			if *cell != NO_SOURCE {
				dropped += 1;
			}
			*cell = h * source.1 + w;
		}

		SourceMask {
			height,
			width,
			sources,
			dropped,
		}
	}

	pub fn shape(&self) -> (usize, usize) {
		(self.height, self.width)
	}

	/// Source index recorded for a destination cell, if any.
	pub fn source(&self, index: usize) -> Option<usize> {
		match self.sources[index] {
			NO_SOURCE => None,
			src => Some(src),
		}
	}

	/// Raw mask including `NO_SOURCE` entries.
	pub fn as_slice(&self) -> &[usize] {
		&self.sources
	}

	/// (destination index, source index) for every destination cell with a source.
	pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
		self.sources
			.iter()
			.enumerate()
			.filter(|&(_, &src)| src != NO_SOURCE)
			.map(|(dst, &src)| (dst, src))
	}

	/// Number of source cells lost to a later writer during `build()`.
	pub fn dropped(&self) -> usize {
		self.dropped
	}
}

/// DIV and REP mask: for every destination cell, the number of source receptive windows covering it.
///
/// The clipped window of each source cell is cached alongside the counts, so the passes never recompute geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlapMask {
	height: usize,
	width: usize,
	counts: Vec<u32>,
	rows: Vec<Range<usize>>,
	cols: Vec<Range<usize>>,
}

impl OverlapMask {
	pub fn build(geometry: &Geometry, source: (usize, usize), output: (usize, usize)) -> Self {
		let (height, width) = output;
		let rows: Vec<Range<usize>> = (0..source.0).map(|h| geometry.rows(h).clip(height)).collect();
		let cols: Vec<Range<usize>> = (0..source.1).map(|w| geometry.cols(w).clip(width)).collect();

		let mut counts = vec![0u32; height * width];
		for (row, col) in iproduct!(&rows, &cols) {
			for (uh, uw) in iproduct!(row.clone(), col.clone()) {
				counts[uh * width + uw] += 1;
			}
		}

		OverlapMask {
			height,
			width,
			counts,
			rows,
			cols,
		}
	}

	pub fn shape(&self) -> (usize, usize) {
		(self.height, self.width)
	}

	pub fn counts(&self) -> &[u32] {
		&self.counts
	}

	/// Overlap count at a destination index, as a divisor.
	///
	/// # Errors
	/// A zero count means the mask and geometry disagree, and the pass must stop.
	pub fn divisor(&self, index: usize) -> Result<f32, ExecutionError> {
		match self.counts[index] {
			0 => Err(ExecutionError::ZeroMaskCount { index }),
			count => Ok(count as f32),
		}
	}

	/// Receptive window of source cell (h, w), clipped to the destination.
	pub fn window(&self, h: usize, w: usize) -> (Range<usize>, Range<usize>) {
		(self.rows[h].clone(), self.cols[w].clone())
	}

	/// Number of destination cells inside the clipped window of source cell (h, w).
	pub fn area(&self, h: usize, w: usize) -> usize {
		self.rows[h].len() * self.cols[w].len()
	}

	/// Row-major destination indices inside the clipped window of source cell (h, w).
	pub fn window_indices(&self, h: usize, w: usize) -> impl Iterator<Item = usize> + '_ {
		let width = self.width;
		iproduct!(self.rows[h].clone(), self.cols[w].clone()).map(move |(uh, uw)| uh * width + uw)
	}

	#[cfg(test)]
	pub(crate) fn zero_count(&mut self, index: usize) {
		self.counts[index] = 0;
	}
}
