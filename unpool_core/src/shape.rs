//! Types for describing the (N, C, H, W) grids the unpooling ops read and write.
use crate::errors::ConfigError;
use smallvec::SmallVec;
use std::fmt::{self, Display};

/// A fully known four axis shape: batch, channels, height, width.
///
/// Channel may stand in for group-channels when describing a label input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridShape {
	pub batch: usize,
	pub channels: usize,
	pub height: usize,
	pub width: usize,
}

impl GridShape {
	pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
		GridShape {
			batch,
			channels,
			height,
			width,
		}
	}

	/// Validate a dynamic shape as (N, C, H, W) with every axis non-zero.
	pub fn from_slice(shape: &[usize]) -> Result<Self, ConfigError> {
		match *shape {
			[batch, channels, height, width] if shape.iter().all(|&d| d > 0) => {
				Ok(GridShape::new(batch, channels, height, width))
			}
			_ => Err(ConfigError::input_shape(shape)),
		}
	}

	/// Same batch and channels, new spatial size.
	pub fn with_spatial(&self, height: usize, width: usize) -> Self {
		GridShape { height, width, ..*self }
	}

	/// Number of elements in one (height, width) plane.
	pub fn spatial(&self) -> usize {
		self.height * self.width
	}

	/// Number of (height, width) planes.
	pub fn planes(&self) -> usize {
		self.batch * self.channels
	}

	pub fn flat_size(&self) -> usize {
		self.planes() * self.spatial()
	}

	pub fn slice(&self) -> SmallVec<[usize; 4]> {
		SmallVec::from_buf([self.batch, self.channels, self.height, self.width])
	}
}

impl Display for GridShape {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "({}, {}, {}, {})", self.batch, self.channels, self.height, self.width)
	}
}
