use ndarray::{prelude::*, Data};
use num_traits::Float;
use std::fmt::Debug;

pub trait RelClose<A: Float + Debug> {
	/// Similar to `all_close()` for ArrayBase, however it tests
	/// `(*x - *y).abs() <= tol * y.abs().max(1)`
	/// rather than
	/// `(*x - *y).abs() <= tol`
	///
	/// `rhs` is broadcast to the shape of `self`.
	fn all_relatively_close<S2, E2>(&self, rhs: &ArrayBase<S2, E2>, tol: A) -> bool
	where
		A: Float,
		S2: Data<Elem = A>,
		E2: Dimension;
}

impl<A: Float + Debug, S1: Data<Elem = A>, E1: Dimension> RelClose<A> for ArrayBase<S1, E1> {
	fn all_relatively_close<S2, E2>(&self, rhs: &ArrayBase<S2, E2>, tol: A) -> bool
	where
		S2: Data<Elem = A>,
		E2: Dimension,
	{
		let rhs = match rhs.broadcast(self.raw_dim()) {
			Some(rhs) => rhs,
			None => {
				eprintln!("shape {:?} can not be broadcast to {:?}", rhs.shape(), self.shape());
				return false;
			}
		};
		self.indexed_iter().zip(rhs.iter()).all(|((index, &x), &y)| {
			let close = (x - y).abs() <= tol * y.abs().max(A::one());
			if !close {
				eprintln!(
					"tolerance failed at {:?}, found: {:?}, expect within {:?} of {:?}",
					index, x, tol, y
				);
			}
			close
		})
	}
}
