//! Resolution of kernel, stride and padding, either from explicit parameters or from the size of a target grid.
use super::Method;
use std::{
	cmp::{max, min},
	fmt,
	ops::Range,
};
use unpool_core::{errors::ConfigError, shape::GridShape};

/// Geometry parameters as given by the user, before validation.
///
/// Each quantity can be given in symmetric form (`kernel_size`) or as a per-axis pair (`kernel_h`, `kernel_w`), but
/// not both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeometryParams {
	pub kernel_size: Option<usize>,
	pub kernel_h: Option<usize>,
	pub kernel_w: Option<usize>,
	pub stride: Option<usize>,
	pub stride_h: Option<usize>,
	pub stride_w: Option<usize>,
	pub pad: Option<usize>,
	pub pad_h: Option<usize>,
	pub pad_w: Option<usize>,
}

impl GeometryParams {
	fn kernel(&self) -> Result<Option<(usize, usize)>, ConfigError> {
		axis_pair("kernel_size", "kernel", self.kernel_size, self.kernel_h, self.kernel_w)
	}

	fn stride(&self) -> Result<Option<(usize, usize)>, ConfigError> {
		axis_pair("stride", "stride", self.stride, self.stride_h, self.stride_w)
	}

	fn pad(&self) -> Result<Option<(usize, usize)>, ConfigError> {
		axis_pair("pad", "pad", self.pad, self.pad_h, self.pad_w)
	}
}

/// Combine the symmetric and per-axis forms of one quantity.
fn axis_pair(
	symmetric: &'static str,
	pair: &'static str,
	sym: Option<usize>,
	h: Option<usize>,
	w: Option<usize>,
) -> Result<Option<(usize, usize)>, ConfigError> {
	match (sym, h, w) {
		(Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(ConfigError::ConflictingForms { symmetric, pair }),
		(Some(x), None, None) => Ok(Some((x, x))),
		(None, Some(h), Some(w)) => Ok(Some((h, w))),
		(None, None, None) => Ok(None),
		(None, _, _) => Err(ConfigError::IncompletePair { param: pair }),
	}
}

/// Validated kernel, stride and padding.
///
/// Source cell `(h, w)` influences the destination rectangle `rows(h) x cols(w)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Geometry {
	pub kernel_h: usize,
	pub kernel_w: usize,
	pub stride_h: usize,
	pub stride_w: usize,
	pub pad_h: usize,
	pub pad_w: usize,
}

impl Geometry {
	/// kernel = stride = 1, pad = 0. Used by GROUP, which keeps the source resolution.
	pub fn unit() -> Self {
		Geometry::square(1, 1, 0)
	}

	pub fn square(kernel: usize, stride: usize, pad: usize) -> Self {
		Geometry {
			kernel_h: kernel,
			kernel_w: kernel,
			stride_h: stride,
			stride_w: stride,
			pad_h: pad,
			pad_w: pad,
		}
	}

	/// Derive kernel, stride and padding so that a `source` grid unpools to (at least) the `target` size.
	///
	/// kernel = stride = ceil(target / source) per axis, with the stride collapsed to 1 where it would equal the
	/// target (only possible when the source axis has size 1).
	pub fn auto(source: (usize, usize), target: (usize, usize)) -> Self {
		let (kernel_h, stride_h, pad_h) = auto_axis(source.0, target.0);
		let (kernel_w, stride_w, pad_w) = auto_axis(source.1, target.1);
		Geometry {
			kernel_h,
			kernel_w,
			stride_h,
			stride_w,
			pad_h,
			pad_w,
		}
	}

	/// Checks kernel positivity and that any padding stays inside the kernel.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.kernel_h == 0 {
			return Err(ConfigError::NonPositiveKernel { axis: "height" });
		}
		if self.kernel_w == 0 {
			return Err(ConfigError::NonPositiveKernel { axis: "width" });
		}
		if self.pad_h != 0 || self.pad_w != 0 {
			if self.pad_h >= self.kernel_h {
				return Err(ConfigError::PadNotLessThanKernel {
					axis: "height",
					pad: self.pad_h,
					kernel: self.kernel_h,
				});
			}
			if self.pad_w >= self.kernel_w {
				return Err(ConfigError::PadNotLessThanKernel {
					axis: "width",
					pad: self.pad_w,
					kernel: self.kernel_w,
				});
			}
		}
		Ok(())
	}

	/// `(source - 1) * stride - 2 * pad + kernel` on each axis.
	pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize), ConfigError> {
		let out_h = axis_output_size("height", height, self.kernel_h, self.stride_h, self.pad_h)?;
		let out_w = axis_output_size("width", width, self.kernel_w, self.stride_w, self.pad_w)?;
		Ok((out_h, out_w))
	}

	/// Receptive window of source row `h` in destination coordinates.
	pub fn rows(&self, h: usize) -> Window {
		Window::new(h, self.kernel_h, self.stride_h, self.pad_h)
	}

	/// Receptive window of source column `w` in destination coordinates.
	pub fn cols(&self, w: usize) -> Window {
		Window::new(w, self.kernel_w, self.stride_w, self.pad_w)
	}
}

impl fmt::Display for Geometry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"kernel {}x{} stride {}x{} pad {}x{}",
			self.kernel_h, self.kernel_w, self.stride_h, self.stride_w, self.pad_h, self.pad_w
		)
	}
}

fn auto_axis(source: usize, target: usize) -> (usize, usize, usize) {
	let kernel = (target + source - 1) / source;
	let stride = if kernel == target { 1 } else { kernel };
	let pad = ((source - 1) * stride + kernel).saturating_sub(target) / 2;
	(kernel, stride, pad)
}

fn axis_output_size(
	axis: &'static str,
	source: usize,
	kernel: usize,
	stride: usize,
	pad: usize,
) -> Result<usize, ConfigError> {
	// every window bound is then representable as an isize
	let span = (source - 1)
		.checked_mul(stride)
		.and_then(|span| span.checked_add(kernel))
		.filter(|&span| span <= isize::MAX as usize);
	let pad2 = pad.checked_mul(2).filter(|&pad2| pad2 <= isize::MAX as usize);
	let (span, pad2) = match (span, pad2) {
		(Some(span), Some(pad2)) => (span, pad2),
		_ => {
			return Err(ConfigError::GeometryOverflow {
				axis,
				source_size: source,
				kernel,
				stride,
				pad,
			})
		}
	};
	if span > pad2 {
		Ok(span - pad2)
	} else {
		Err(ConfigError::EmptyOutput {
			axis,
			source_size: source,
			size: span as isize - pad2 as isize,
		})
	}
}

/// Half open range `[start, end)` of destination coordinates along one axis, may extend past either edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
	pub start: isize,
	pub end: isize,
}

impl Window {
	/// Only valid for geometry whose `output_size()` succeeded for a source axis longer than `coord`.
	pub fn new(coord: usize, kernel: usize, stride: usize, pad: usize) -> Self {
		let start = (coord * stride) as isize - pad as isize;
		Window {
			start,
			end: start + kernel as isize,
		}
	}

	/// `floor((start + end - 1) / 2)` clamped to `[0, len - 1]`.
	pub fn midpoint(&self, len: usize) -> usize {
		let mid = (self.start + self.end - 1).div_euclid(2);
		min(max(mid, 0) as usize, len - 1)
	}

	/// The part of the window inside `[0, len)`.
	pub fn clip(&self, len: usize) -> Range<usize> {
		let start = min(max(self.start, 0) as usize, len);
		let end = min(max(self.end, 0) as usize, len);
		start..max(start, end)
	}
}

/// ConfigResolver: produce validated geometry for `method` on a `source` grid.
///
/// For non-GROUP methods, a `companion` shape switches on auto-sizing (configured kernel, stride and pad are then
/// ignored). For GROUP the geometry is always the unit geometry and the companion carries labels, not a size.
pub fn resolve(
	method: Method,
	params: &GeometryParams,
	source: &GridShape,
	companion: Option<&[usize]>,
) -> Result<Geometry, ConfigError> {
	if method == Method::Group {
		let (pad_h, pad_w) = params.pad()?.unwrap_or((0, 0));
		if pad_h != 0 || pad_w != 0 {
			return Err(ConfigError::GroupPadding { pad_h, pad_w });
		}
		return Ok(Geometry::unit());
	}

	// mutual exclusivity is checked even when auto-sizing will discard the values
	let kernel = params.kernel()?;
	let stride = params.stride()?;
	let pad = params.pad()?;

	let geometry = if let Some(companion) = companion {
		let target = GridShape::from_slice(companion)
			.map_err(|_| ConfigError::from(format!("auto-sizing target must have shape (N, C, H, W), found {:?}", companion)))?;
		if target.batch != source.batch {
			return Err(format!(
				"auto-sizing target batch size ({}) does not match input batch size ({})",
				target.batch, source.batch
			)
			.into());
		}
		if target.height < source.height || target.width < source.width {
			return Err(format!(
				"auto-sizing target spatial size ({}x{}) is smaller than the input ({}x{})",
				target.height, target.width, source.height, source.width
			)
			.into());
		}
		Geometry::auto((source.height, source.width), (target.height, target.width))
	} else {
		let (kernel_h, kernel_w) = kernel.ok_or(ConfigError::MissingKernel)?;
		let (stride_h, stride_w) = stride.unwrap_or((1, 1));
		let (pad_h, pad_w) = pad.unwrap_or((0, 0));
		Geometry {
			kernel_h,
			kernel_w,
			stride_h,
			stride_w,
			pad_h,
			pad_w,
		}
	};

	geometry.validate()?;
	let (out_h, out_w) = geometry.output_size(source.height, source.width)?;
	let dest = [source.batch, source.channels, out_h, out_w];
	dest.iter()
		.try_fold(1usize, |acc, &len| acc.checked_mul(len))
		.filter(|&len| len <= isize::MAX as usize)
		.ok_or_else(|| ConfigError::output_too_large(&dest))?;
	Ok(geometry)
}

#[cfg(test)]
mod tests {
	use super::{resolve, Geometry, GeometryParams, Window};
	use crate::unpool::Method;
	use unpool_core::{errors::ConfigError, shape::GridShape};

	fn params() -> GeometryParams {
		GeometryParams::default()
	}

	#[test]
	fn output_size_formula() {
		for &(kernel, stride, pad) in &[(2, 1, 0), (3, 1, 0), (3, 2, 0), (3, 2, 1), (4, 2, 1), (5, 3, 2), (1, 4, 0)] {
			let geometry = Geometry::square(kernel, stride, pad);
			for &(h, w) in &[(1, 1), (3, 2), (7, 5)] {
				let (out_h, out_w) = geometry.output_size(h, w).unwrap();
				assert_eq!(out_h as isize, (h as isize - 1) * stride as isize - 2 * pad as isize + kernel as isize);
				assert_eq!(out_w as isize, (w as isize - 1) * stride as isize - 2 * pad as isize + kernel as isize);
			}
		}
	}

	#[test]
	fn explicit_sizes() {
		let source = GridShape::new(2, 3, 3, 2);

		let mut p = params();
		p.kernel_size = Some(3);
		let g = resolve(Method::Fixed, &p, &source, None).unwrap();
		assert_eq!(g.output_size(3, 2).unwrap(), (5, 4));

		p.stride = Some(2);
		let g = resolve(Method::Fixed, &p, &source, None).unwrap();
		assert_eq!(g.output_size(3, 2).unwrap(), (7, 5));

		p.pad = Some(1);
		let g = resolve(Method::Div, &p, &source, None).unwrap();
		assert_eq!(g.output_size(3, 2).unwrap(), (5, 3));
	}

	#[test]
	fn per_axis_forms() {
		let source = GridShape::new(1, 1, 4, 4);
		let mut p = params();
		p.kernel_h = Some(3);
		p.kernel_w = Some(4);
		p.stride_h = Some(2);
		p.stride_w = Some(1);
		p.pad_h = Some(1);
		p.pad_w = Some(0);
		let g = resolve(Method::Rep, &p, &source, None).unwrap();
		assert_eq!(
			g,
			Geometry {
				kernel_h: 3,
				kernel_w: 4,
				stride_h: 2,
				stride_w: 1,
				pad_h: 1,
				pad_w: 0,
			}
		);
		assert_eq!(g.output_size(4, 4).unwrap(), (7, 7));
	}

	#[test]
	fn conflicting_and_incomplete_forms() {
		let source = GridShape::new(1, 1, 4, 4);

		let mut p = params();
		p.kernel_size = Some(3);
		p.kernel_h = Some(3);
		p.kernel_w = Some(3);
		match resolve(Method::Fixed, &p, &source, None) {
			Err(ConfigError::ConflictingForms { symmetric: "kernel_size", .. }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_h = Some(3);
		match resolve(Method::Fixed, &p, &source, None) {
			Err(ConfigError::IncompletePair { param: "kernel" }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_size = Some(3);
		p.stride = Some(2);
		p.stride_w = Some(2);
		match resolve(Method::Fixed, &p, &source, None) {
			Err(ConfigError::ConflictingForms { symmetric: "stride", .. }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_size = Some(3);
		p.pad_w = Some(1);
		match resolve(Method::Div, &p, &source, None) {
			Err(ConfigError::IncompletePair { param: "pad" }) => {}
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn kernel_and_pad_checks() {
		let source = GridShape::new(1, 1, 4, 4);

		match resolve(Method::Fixed, &params(), &source, None) {
			Err(ConfigError::MissingKernel) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_h = Some(0);
		p.kernel_w = Some(2);
		match resolve(Method::Fixed, &p, &source, None) {
			Err(ConfigError::NonPositiveKernel { axis: "height" }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_size = Some(2);
		p.pad_h = Some(1);
		p.pad_w = Some(2);
		match resolve(Method::Rep, &p, &source, None) {
			Err(ConfigError::PadNotLessThanKernel { axis: "width", pad: 2, kernel: 2 }) => {}
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn empty_output() {
		let mut p = params();
		p.kernel_size = Some(3);
		p.pad = Some(2);
		match resolve(Method::Div, &p, &GridShape::new(1, 1, 1, 1), None) {
			Err(ConfigError::EmptyOutput { axis: "height", size: -1, .. }) => {}
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn overflowing_geometry() {
		let source = GridShape::new(1, 1, 2, 2);

		let mut p = params();
		p.kernel_size = Some(usize::MAX);
		match resolve(Method::Div, &p, &source, None) {
			Err(ConfigError::GeometryOverflow { axis: "height", .. }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_size = Some(2);
		p.stride = Some(usize::MAX / 2);
		match resolve(Method::Fixed, &p, &GridShape::new(1, 1, 4, 2), None) {
			Err(ConfigError::GeometryOverflow { axis: "height", source_size: 4, .. }) => {}
			other => panic!("{:?}", other),
		}

		// fits in usize but not isize
		let mut p = params();
		p.kernel_h = Some(1);
		p.kernel_w = Some(isize::MAX as usize + 1);
		match resolve(Method::Rep, &p, &source, None) {
			Err(ConfigError::GeometryOverflow { axis: "width", .. }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.kernel_size = Some(isize::MAX as usize / 2);
		p.pad = Some(1);
		match resolve(Method::Rep, &p, &GridShape::new(4, 4, 1, 1), None) {
			Err(ConfigError::OutputTooLarge { .. }) => {}
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn auto_sizing() {
		let source = GridShape::new(2, 3, 3, 2);

		// configured values are ignored
		let mut p = params();
		p.kernel_size = Some(0);
		p.stride = Some(0);

		let g = resolve(Method::Fixed, &p, &source, Some(&[2, 3, 6, 4])).unwrap();
		assert_eq!(g, Geometry::square(2, 2, 0));
		assert_eq!(g.output_size(3, 2).unwrap(), (6, 4));

		let mut p = params();
		p.kernel_size = Some(3);
		p.stride = Some(2);
		let g = resolve(Method::Fixed, &p, &source, Some(&[2, 3, 7, 5])).unwrap();
		assert_eq!(
			g,
			Geometry {
				kernel_h: 3,
				kernel_w: 3,
				stride_h: 3,
				stride_w: 3,
				pad_h: 1,
				pad_w: 0,
			}
		);
		// parity leaves the width one larger than the target
		assert_eq!(g.output_size(3, 2).unwrap(), (7, 6));
	}

	#[test]
	fn auto_sizing_unit_source() {
		let source = GridShape::new(1, 1, 1, 1);
		let g = resolve(Method::Rep, &params(), &source, Some(&[1, 1, 5, 4])).unwrap();
		assert_eq!(
			g,
			Geometry {
				kernel_h: 5,
				kernel_w: 4,
				stride_h: 1,
				stride_w: 1,
				pad_h: 0,
				pad_w: 0,
			}
		);
		assert_eq!(g.output_size(1, 1).unwrap(), (5, 4));
	}

	#[test]
	fn auto_sizing_rejects() {
		let source = GridShape::new(2, 3, 3, 2);
		assert!(resolve(Method::Fixed, &params(), &source, Some(&[3, 3, 6, 4])).is_err());
		assert!(resolve(Method::Fixed, &params(), &source, Some(&[2, 3, 2, 4])).is_err());
		assert!(resolve(Method::Fixed, &params(), &source, Some(&[2, 3, 6])).is_err());
		// source 5 into target 6 needs pad 2 with kernel 2
		match resolve(Method::Div, &params(), &GridShape::new(1, 1, 5, 5), Some(&[1, 1, 6, 6])) {
			Err(ConfigError::PadNotLessThanKernel { .. }) => {}
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn group_geometry() {
		let source = GridShape::new(2, 3, 3, 2);
		let mut p = params();
		p.kernel_size = Some(4);
		p.stride = Some(3);
		assert_eq!(resolve(Method::Group, &p, &source, None).unwrap(), Geometry::unit());

		p.pad = Some(1);
		match resolve(Method::Group, &p, &source, None) {
			Err(ConfigError::GroupPadding { pad_h: 1, pad_w: 1 }) => {}
			other => panic!("{:?}", other),
		}

		let mut p = params();
		p.pad_h = Some(0);
		p.pad_w = Some(0);
		assert!(resolve(Method::Group, &p, &source, None).is_ok());
	}

	#[test]
	fn window() {
		let w = Window::new(0, 3, 2, 1);
		assert_eq!(w, Window { start: -1, end: 2 });
		assert_eq!(w.clip(5), 0..2);
		assert_eq!(w.midpoint(5), 0);

		let w = Window::new(2, 3, 2, 1);
		assert_eq!(w.clip(5), 3..5);
		assert_eq!(w.midpoint(5), 4);

		// even kernels round the midpoint down
		let w = Window::new(1, 4, 2, 0);
		assert_eq!(w.midpoint(10), 3);

		// negative midpoints clamp to 0
		let w = Window::new(0, 2, 1, 1);
		assert_eq!(w.midpoint(3), 0);

		// windows that miss the grid entirely clip to an empty range
		let w = Window { start: 6, end: 8 };
		assert!(w.clip(5).is_empty());
		assert_eq!(w.midpoint(5), 4);
	}
}
