use crate::util::display::IterDisplay;
use failure::Fail;

use smallvec::SmallVec;

/// Shape type carried inside errors so they can be displayed without the original array.
pub type ErrorShape = IterDisplay<usize, SmallVec<[usize; 4]>>;

pub(crate) fn error_shape(shape: &[usize]) -> ErrorShape {
	IterDisplay {
		inner: shape.iter().cloned().collect(),
	}
}

/// Returned while resolving geometry or rebuilding the mask/partition for a new shape.
///
/// Any `ConfigError` is terminal for the current shape epoch, the layer stays unconfigured until the next
/// successful reshape.
#[derive(Debug, Fail)]
pub enum ConfigError {
	#[fail(
		display = "ConfigError::ConflictingForms `{}` was given together with `{}_h`/`{}_w`, use one form only",
		symmetric, pair, pair
	)]
	ConflictingForms {
		symmetric: &'static str,
		pair: &'static str,
	},

	#[fail(
		display = "ConfigError::IncompletePair `{}_h` and `{}_w` must be given together",
		param, param
	)]
	IncompletePair { param: &'static str },

	#[fail(display = "ConfigError::MissingKernel kernel size must be given as `kernel_size` or `kernel_h` and `kernel_w`")]
	MissingKernel,

	#[fail(display = "ConfigError::NonPositiveKernel kernel {} must be greater than 0", axis)]
	NonPositiveKernel { axis: &'static str },

	#[fail(
		display = "ConfigError::PadNotLessThanKernel pad {} ({}) must be less than kernel {} ({})",
		axis, pad, axis, kernel
	)]
	PadNotLessThanKernel {
		axis: &'static str,
		pad: usize,
		kernel: usize,
	},

	#[fail(
		display = "ConfigError::GroupPadding padding is not supported for GROUP unpooling (pad_h: {}, pad_w: {})",
		pad_h, pad_w
	)]
	GroupPadding { pad_h: usize, pad_w: usize },

	#[fail(
		display = "ConfigError::EmptyOutput the {} axis would be unpooled from {} to a non-positive size ({})",
		axis, source_size, size
	)]
	EmptyOutput {
		axis: &'static str,
		source_size: usize,
		size: isize,
	},

	#[fail(
		display = "ConfigError::GeometryOverflow the {} axis unpooled from {} with kernel {} stride {} pad {} overflows",
		axis, source_size, kernel, stride, pad
	)]
	GeometryOverflow {
		axis: &'static str,
		source_size: usize,
		kernel: usize,
		stride: usize,
		pad: usize,
	},

	#[fail(
		display = "ConfigError::OutputTooLarge output shape {} has more elements than an array can hold",
		shape
	)]
	OutputTooLarge { shape: ErrorShape },

	#[fail(
		display = "ConfigError::InputShape input must have shape (N, C, H, W) with non-zero axes, found {}",
		shape
	)]
	InputShape { shape: ErrorShape },

	#[fail(display = "ConfigError::CompanionMismatch {}", desc)]
	CompanionMismatch { desc: String },

	#[fail(display = "ConfigError::MissingGroupLabels GROUP unpooling requires a label input of shape (N, G, H, W)")]
	MissingGroupLabels,

	#[fail(
		display = "ConfigError::InvalidGroupLabel label {} at batch {} group channel {} position {} is not finite",
		value, batch, group_channel, position
	)]
	InvalidGroupLabel {
		value: f32,
		batch: usize,
		group_channel: usize,
		position: usize,
	},
}

impl ConfigError {
	pub fn input_shape(shape: &[usize]) -> Self {
		ConfigError::InputShape {
			shape: error_shape(shape),
		}
	}

	pub fn output_too_large(shape: &[usize]) -> Self {
		ConfigError::OutputTooLarge {
			shape: error_shape(shape),
		}
	}
}

impl<I: Into<String>> From<I> for ConfigError {
	fn from(desc: I) -> ConfigError {
		ConfigError::CompanionMismatch { desc: desc.into() }
	}
}

/// Returned from a forward or backward pass. The whole pass is abandoned, no partial output is meaningful.
#[derive(Debug, Fail)]
pub enum ExecutionError {
	/// An overlap count of zero was read, meaning the mask does not match the geometry.
	#[fail(
		display = "ExecutionError::ZeroMaskCount overlap count at destination index {} is zero",
		index
	)]
	ZeroMaskCount { index: usize },

	#[fail(
		display = "ExecutionError::ShapeMismatch {} has shape {} but the configured shape is {}",
		name, found, expected
	)]
	ShapeMismatch {
		name: &'static str,
		expected: ErrorShape,
		found: ErrorShape,
	},
}

impl ExecutionError {
	pub fn shape_mismatch(name: &'static str, expected: &[usize], found: &[usize]) -> Self {
		ExecutionError::ShapeMismatch {
			name,
			expected: error_shape(expected),
			found: error_shape(found),
		}
	}
}

/// Returned when parsing an unknown unpooling method name.
#[derive(Debug, Fail)]
#[fail(
	display = "UnsupportedMethodError '{}' is not one of FIXED, DIV, REP or GROUP",
	method
)]
pub struct UnsupportedMethodError {
	pub method: String,
}

/// Fail type returned by the layer surface.
#[derive(Debug, Fail)]
pub enum LayerError {
	#[fail(display = "LayerError::Config {}", error)]
	Config { error: ConfigError },

	#[fail(display = "LayerError::Execution {}", error)]
	Execution { error: ExecutionError },

	#[fail(display = "LayerError::UnsupportedMethod {}", error)]
	UnsupportedMethod { error: UnsupportedMethodError },

	/// Forward or backward was called before a successful reshape.
	#[fail(display = "LayerError::Unconfigured reshape must succeed before forward or backward")]
	Unconfigured,
}

impl From<ConfigError> for LayerError {
	fn from(error: ConfigError) -> LayerError {
		LayerError::Config { error }
	}
}

impl From<ExecutionError> for LayerError {
	fn from(error: ExecutionError) -> LayerError {
		LayerError::Execution { error }
	}
}

impl From<UnsupportedMethodError> for LayerError {
	fn from(error: UnsupportedMethodError) -> LayerError {
		LayerError::UnsupportedMethod { error }
	}
}
