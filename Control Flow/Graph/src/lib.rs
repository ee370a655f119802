#![no_std]
#![expect(clippy::missing_panics_doc)]

extern crate alloc;

mod basic_block;
mod dot;

pub mod instruction;

use alloc::vec::Vec;

use self::instruction::{
	AnyLane, BinaryOperation, BinaryOperator, Constant, LaneIndex, Phi, Select, Terminator,
	UnaryOperation, UnaryOperator, Value,
};

pub use self::{basic_block::BasicBlock, dot::Dot};

/// A directed graph of basic blocks holding values in SSA form.
///
/// Block `0` is the entry. The divergence passes expect, without checking, that:
///
/// * The graph is reducible
/// * No edge is critical
/// * Every loop exit block has a single predecessor
pub struct ControlFlowGraph {
	pub basic_blocks: Vec<BasicBlock>,
	pub values: Vec<Value>,
}

impl ControlFlowGraph {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			basic_blocks: Vec::new(),
			values: Vec::new(),
		}
	}

	#[must_use]
	pub fn block_ids(&self) -> core::ops::Range<u16> {
		0..self.basic_blocks.len().try_into().unwrap()
	}

	#[must_use]
	pub fn value_ids(&self) -> core::ops::Range<u32> {
		0..self.values.len().try_into().unwrap()
	}

	#[must_use]
	pub fn block(&self, id: u16) -> &BasicBlock {
		&self.basic_blocks[usize::from(id)]
	}

	pub fn block_mut(&mut self, id: u16) -> &mut BasicBlock {
		&mut self.basic_blocks[usize::from(id)]
	}

	#[must_use]
	pub fn value(&self, id: u32) -> &Value {
		&self.values[usize::try_from(id).unwrap()]
	}

	pub fn value_mut(&mut self, id: u32) -> &mut Value {
		&mut self.values[usize::try_from(id).unwrap()]
	}

	pub fn predecessors(&self, id: u16) -> impl Iterator<Item = u16> + '_ {
		self.block(id).predecessors.iter().copied()
	}

	pub fn successors(&self, id: u16) -> impl Iterator<Item = u16> + '_ {
		self.block(id).successors.iter().copied()
	}

	#[must_use]
	pub fn phis(&self, id: u16) -> &[u32] {
		&self.block(id).phis
	}

	#[must_use]
	pub fn instructions(&self, id: u16) -> &[u32] {
		&self.block(id).instructions
	}

	#[must_use]
	pub fn terminator(&self, id: u16) -> Terminator {
		self.block(id).terminator
	}

	#[must_use]
	pub fn has_multiple_successors(&self, id: u16) -> bool {
		let mut successors = self.successors(id);

		successors.next().is_some() && successors.next().is_some()
	}

	#[must_use]
	pub fn has_multiple_predecessors(&self, id: u16) -> bool {
		let mut predecessors = self.predecessors(id);

		predecessors.next().is_some() && predecessors.next().is_some()
	}

	pub fn add_edge(&mut self, from: u16, to: u16) {
		self.block_mut(to).predecessors.push(from);
		self.block_mut(from).successors.push(to);
	}

	pub fn replace_edge(&mut self, from: u16, to: u16, new: u16) {
		let from_usize = usize::from(from);
		let to_usize = usize::from(to);
		let new_usize = usize::from(new);

		let successor = self.successors(from).position(|id| id == to).unwrap();

		self.basic_blocks[from_usize].successors[successor] = new;
		self.basic_blocks[new_usize].predecessors.push(from);

		let predecessor = self.predecessors(to).position(|id| id == from).unwrap();

		self.basic_blocks[to_usize].predecessors.remove(predecessor);
	}

	/// Renames the incoming block `old` to `new` in every phi of `id`.
	pub fn replace_incoming(&mut self, id: u16, old: u16, new: u16) {
		for index in 0..self.phis(id).len() {
			let phi = self.phis(id)[index];
			let Phi { incoming, .. } = self.value_mut(phi).as_mut_phi().unwrap();

			for (block, _) in incoming {
				if *block == old {
					*block = new;
				}
			}
		}
	}

	/// Replaces uses of `old` by `new` in every block accepted by `filter`.
	pub fn replace_uses_if<F: Fn(u16) -> bool>(&mut self, old: u32, new: u32, filter: F) {
		let replace = move |operand: &mut u32| {
			if *operand == old {
				*operand = new;
			}
		};

		for value in &mut self.values {
			if value.block().is_some_and(&filter) {
				value.for_each_mut_operand(replace);
			}
		}

		for (basic_block, id) in self.basic_blocks.iter_mut().zip(0..) {
			if filter(id) {
				basic_block.terminator.for_each_mut_operand(replace);
			}
		}
	}

	/// Moves everything but the phis of `id` into a new block that `id` jumps to.
	pub fn split_after_phis(&mut self, id: u16) -> u16 {
		let split = self.add_basic_block();

		let BasicBlock {
			successors,
			instructions,
			terminator,
			..
		} = self.block_mut(id);

		let successors = core::mem::take(successors);
		let instructions = core::mem::take(instructions);
		let terminator = core::mem::replace(terminator, Terminator::Jump);

		for &instruction in &instructions {
			self.value_mut(instruction).set_block(split);
		}

		for &successor in &successors {
			self.block_mut(successor).replace_predecessor(id, split);
			self.replace_incoming(successor, id, split);
		}

		let basic_block = self.block_mut(split);

		basic_block.successors = successors;
		basic_block.instructions = instructions;
		basic_block.terminator = terminator;

		self.add_edge(id, split);

		split
	}

	pub fn add_basic_block(&mut self) -> u16 {
		let id = self.basic_blocks.len().try_into().unwrap();

		self.basic_blocks.push(BasicBlock::new());

		id
	}

	pub fn add_value(&mut self, value: Value) -> u32 {
		let id = self.values.len().try_into().unwrap();

		self.values.push(value);

		id
	}

	fn add_instruction(&mut self, block: u16, value: Value) -> u32 {
		let id = self.add_value(value);

		self.block_mut(block).instructions.push(id);

		id
	}

	pub fn add_argument(&mut self, index: u16) -> u32 {
		self.add_value(Value::Argument(index))
	}

	pub fn add_bool(&mut self, data: bool) -> u32 {
		self.add_value(Value::Constant(Constant::Bool(data)))
	}

	pub fn add_integer(&mut self, data: i64) -> u32 {
		self.add_value(Value::Constant(Constant::Integer(data)))
	}

	pub fn add_undefined(&mut self) -> u32 {
		self.add_value(Value::Undefined)
	}

	pub fn add_phi(&mut self, block: u16, incoming: Vec<(u16, u32)>) -> u32 {
		let id = self.add_value(Value::Phi(Phi { block, incoming }));

		self.block_mut(block).phis.push(id);

		id
	}

	pub fn add_lane_index(&mut self, block: u16) -> u32 {
		self.add_instruction(block, Value::LaneIndex(LaneIndex { block }))
	}

	pub fn add_unary_operation(
		&mut self,
		block: u16,
		source: u32,
		operator: UnaryOperator,
	) -> u32 {
		let unary_operation = Value::UnaryOperation(UnaryOperation {
			block,
			source,
			operator,
		});

		self.add_instruction(block, unary_operation)
	}

	pub fn add_binary_operation(
		&mut self,
		block: u16,
		lhs: u32,
		rhs: u32,
		operator: BinaryOperator,
	) -> u32 {
		let binary_operation = Value::BinaryOperation(BinaryOperation {
			block,
			lhs,
			rhs,
			operator,
		});

		self.add_instruction(block, binary_operation)
	}

	pub fn add_select(&mut self, block: u16, condition: u32, on_true: u32, on_false: u32) -> u32 {
		let select = Value::Select(Select {
			block,
			condition,
			on_true,
			on_false,
		});

		self.add_instruction(block, select)
	}

	pub fn add_any_lane(&mut self, block: u16, source: u32) -> u32 {
		self.add_instruction(block, Value::AnyLane(AnyLane { block, source }))
	}

	pub fn set_jump(&mut self, from: u16, to: u16) {
		self.add_edge(from, to);
		self.block_mut(from).terminator = Terminator::Jump;
	}

	pub fn set_branch(&mut self, from: u16, condition: u32, on_true: u16, on_false: u16) {
		self.add_edge(from, on_true);
		self.add_edge(from, on_false);
		self.block_mut(from).terminator = Terminator::Branch { condition };
	}

	pub fn set_switch(&mut self, from: u16, selector: u32, targets: &[u16]) {
		for &target in targets {
			self.add_edge(from, target);
		}

		self.block_mut(from).terminator = Terminator::Switch { selector };
	}

	pub fn set_return(&mut self, from: u16, result: Option<u32>) {
		self.block_mut(from).terminator = Terminator::Return { result };
	}
}

impl Default for ControlFlowGraph {
	fn default() -> Self {
		Self::new()
	}
}
