use std::fmt::{Display, Formatter, Result};

use control_flow_graph::instruction::Constant;

/// How a value varies across the lanes of a vector.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum VectorShape {
	/// Every lane holds the same value.
	#[default]
	Uniform,
	/// Lanes hold unrelated values.
	Varying,
	/// Lane `i` holds the value of lane `0` plus `i` times the stride.
	Strided(i64),
	/// Nothing is known yet, the bottom of the lattice.
	Undefined,
}

impl VectorShape {
	#[must_use]
	pub const fn from_constant(_constant: Constant) -> Self {
		Self::Uniform
	}

	#[must_use]
	pub const fn is_uniform(self) -> bool {
		matches!(self, Self::Uniform)
	}

	/// The least shape describing both `self` and `other`.
	#[must_use]
	pub const fn join(self, other: Self) -> Self {
		match (self, other) {
			(Self::Undefined, shape) | (shape, Self::Undefined) => shape,
			(Self::Uniform, Self::Uniform) => Self::Uniform,
			(Self::Strided(lhs), Self::Strided(rhs)) if lhs == rhs => Self::Strided(lhs),
			_ => Self::Varying,
		}
	}
}

impl Display for VectorShape {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result {
		match self {
			Self::Uniform => write!(f, "uniform"),
			Self::Varying => write!(f, "varying"),
			Self::Strided(stride) => write!(f, "strided({stride})"),
			Self::Undefined => write!(f, "undefined"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::VectorShape;

	#[test]
	fn join_moves_up_the_lattice() {
		use VectorShape::{Strided, Undefined, Uniform, Varying};

		assert_eq!(Undefined.join(Strided(4)), Strided(4));
		assert_eq!(Uniform.join(Undefined), Uniform);
		assert_eq!(Strided(4).join(Strided(4)), Strided(4));
		assert_eq!(Strided(4).join(Strided(2)), Varying);
		assert_eq!(Uniform.join(Strided(1)), Varying);
		assert_eq!(Varying.join(Uniform), Varying);
	}
}
