use alloc::vec::Vec;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Constant {
	Bool(bool),
	Integer(i64),
}

impl Constant {
	#[must_use]
	pub const fn to_i64(self) -> i64 {
		match self {
			Self::Bool(data) => data as i64,
			Self::Integer(data) => data,
		}
	}
}

#[derive(Clone, Debug)]
pub struct Phi {
	pub block: u16,
	pub incoming: Vec<(u16, u32)>,
}

impl Phi {
	#[must_use]
	pub fn find_incoming(&self, block: u16) -> Option<u32> {
		self.incoming
			.iter()
			.find_map(|&(id, value)| (id == block).then_some(value))
	}
}

#[derive(Clone, Copy, Debug)]
pub struct LaneIndex {
	pub block: u16,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UnaryOperator {
	Not,
	Negate,
}

#[derive(Clone, Copy, Debug)]
pub struct UnaryOperation {
	pub block: u16,
	pub source: u32,

	pub operator: UnaryOperator,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOperator {
	Add,
	Subtract,
	Multiply,
	Remainder,
	And,
	Or,
	ExclusiveOr,
	Equal,
	NotEqual,
	LessThan,
	LessThanEqual,
}

#[derive(Clone, Copy, Debug)]
pub struct BinaryOperation {
	pub block: u16,
	pub lhs: u32,
	pub rhs: u32,

	pub operator: BinaryOperator,
}

#[derive(Clone, Copy, Debug)]
pub struct Select {
	pub block: u16,
	pub condition: u32,
	pub on_true: u32,
	pub on_false: u32,
}

/// Horizontal OR of a boolean over all active lanes.
#[derive(Clone, Copy, Debug)]
pub struct AnyLane {
	pub block: u16,
	pub source: u32,
}

#[derive(Clone, Debug)]
pub enum Value {
	Argument(u16),
	Constant(Constant),
	Undefined,

	Phi(Phi),

	LaneIndex(LaneIndex),
	UnaryOperation(UnaryOperation),
	BinaryOperation(BinaryOperation),
	Select(Select),
	AnyLane(AnyLane),
}

impl Value {
	/// The block defining this value, or `None` if it is not an instruction.
	#[must_use]
	pub const fn block(&self) -> Option<u16> {
		match self {
			Self::Argument(_) | Self::Constant(_) | Self::Undefined => None,
			Self::Phi(Phi { block, .. })
			| Self::LaneIndex(LaneIndex { block })
			| Self::UnaryOperation(UnaryOperation { block, .. })
			| Self::BinaryOperation(BinaryOperation { block, .. })
			| Self::Select(Select { block, .. })
			| Self::AnyLane(AnyLane { block, .. }) => Some(*block),
		}
	}

	pub fn set_block(&mut self, id: u16) {
		match self {
			Self::Argument(_) | Self::Constant(_) | Self::Undefined => {}
			Self::Phi(Phi { block, .. })
			| Self::LaneIndex(LaneIndex { block })
			| Self::UnaryOperation(UnaryOperation { block, .. })
			| Self::BinaryOperation(BinaryOperation { block, .. })
			| Self::Select(Select { block, .. })
			| Self::AnyLane(AnyLane { block, .. }) => *block = id,
		}
	}

	#[must_use]
	pub const fn as_constant(&self) -> Option<Constant> {
		if let Self::Constant(constant) = self {
			Some(*constant)
		} else {
			None
		}
	}

	#[must_use]
	pub const fn as_phi(&self) -> Option<&Phi> {
		if let Self::Phi(phi) = self {
			Some(phi)
		} else {
			None
		}
	}

	pub fn as_mut_phi(&mut self) -> Option<&mut Phi> {
		if let Self::Phi(phi) = self {
			Some(phi)
		} else {
			None
		}
	}

	pub fn for_each_operand<H: FnMut(u32)>(&self, mut handler: H) {
		match self {
			Self::Argument(_) | Self::Constant(_) | Self::Undefined | Self::LaneIndex(_) => {}
			Self::Phi(Phi { incoming, .. }) => {
				incoming.iter().for_each(|&(_, value)| handler(value));
			}
			Self::UnaryOperation(UnaryOperation { source, .. })
			| Self::AnyLane(AnyLane { source, .. }) => handler(*source),
			Self::BinaryOperation(BinaryOperation { lhs, rhs, .. }) => {
				handler(*lhs);
				handler(*rhs);
			}
			Self::Select(Select {
				condition,
				on_true,
				on_false,
				..
			}) => {
				handler(*condition);
				handler(*on_true);
				handler(*on_false);
			}
		}
	}

	pub fn for_each_mut_operand<H: FnMut(&mut u32)>(&mut self, mut handler: H) {
		match self {
			Self::Argument(_) | Self::Constant(_) | Self::Undefined | Self::LaneIndex(_) => {}
			Self::Phi(Phi { incoming, .. }) => {
				incoming.iter_mut().for_each(|(_, value)| handler(value));
			}
			Self::UnaryOperation(UnaryOperation { source, .. })
			| Self::AnyLane(AnyLane { source, .. }) => handler(source),
			Self::BinaryOperation(BinaryOperation { lhs, rhs, .. }) => {
				handler(lhs);
				handler(rhs);
			}
			Self::Select(Select {
				condition,
				on_true,
				on_false,
				..
			}) => {
				handler(condition);
				handler(on_true);
				handler(on_false);
			}
		}
	}
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Terminator {
	/// Leaves the function, optionally producing `result`.
	Return { result: Option<u32> },
	/// Continues at the only successor.
	Jump,
	/// Continues at successor 0 if `condition` holds, successor 1 otherwise.
	Branch { condition: u32 },
	/// Continues at successor `selector`, or the last successor when out of range.
	Switch { selector: u32 },
}

impl Terminator {
	#[must_use]
	pub const fn condition(self) -> Option<u32> {
		match self {
			Self::Return { .. } | Self::Jump => None,
			Self::Branch { condition } => Some(condition),
			Self::Switch { selector } => Some(selector),
		}
	}

	#[must_use]
	pub const fn is_conditional(self) -> bool {
		self.condition().is_some()
	}

	pub fn for_each_operand<H: FnMut(u32)>(self, mut handler: H) {
		match self {
			Self::Return { result: None } | Self::Jump => {}
			Self::Return {
				result: Some(value),
			}
			| Self::Branch { condition: value }
			| Self::Switch { selector: value } => handler(value),
		}
	}

	pub fn for_each_mut_operand<H: FnMut(&mut u32)>(&mut self, mut handler: H) {
		match self {
			Self::Return { result: None } | Self::Jump => {}
			Self::Return {
				result: Some(value),
			}
			| Self::Branch { condition: value }
			| Self::Switch { selector: value } => handler(value),
		}
	}
}
