use alloc::vec::Vec;
use list::resizable::Resizable;

use crate::instruction::Terminator;

pub struct BasicBlock {
	pub predecessors: Resizable<u16, 7>,
	pub successors: Resizable<u16, 7>,

	pub phis: Vec<u32>,
	pub instructions: Vec<u32>,
	pub terminator: Terminator,
}

impl BasicBlock {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			predecessors: Resizable::new(),
			successors: Resizable::new(),

			phis: Vec::new(),
			instructions: Vec::new(),
			terminator: Terminator::Return { result: None },
		}
	}

	#[must_use]
	pub fn is_sink(&self) -> bool {
		self.successors.is_empty()
	}

	pub fn replace_predecessor(&mut self, old: u16, new: u16) {
		for id in &mut self.predecessors {
			if *id == old {
				*id = new;
			}
		}
	}
}

impl Default for BasicBlock {
	fn default() -> Self {
		Self::new()
	}
}
