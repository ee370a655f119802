pub mod diagnostics;
mod error;
mod region;
mod shape;

use std::fmt::{Display, Formatter};

use control_flow_analysis::LoopInfo;
use control_flow_graph::{ControlFlowGraph, instruction::Value};
use hashbrown::HashMap;
use set::Set;

pub use self::{
	diagnostics::{Buffer, Diagnostics, Event, LoopState, Silent, Trace},
	error::{Error, Result},
	region::{BlockRegion, Region},
	shape::VectorShape,
};

/// Per-value shapes and per-block predicates of a function being vectorized.
pub struct ShapeStore {
	shapes: HashMap<u32, VectorShape>,
	predicates: HashMap<u16, u32>,
	mandatory: Set,
	divergent_loops: Set,

	region: Option<Box<dyn Region>>,
}

impl ShapeStore {
	/// Creates a store where the whole function is vectorized.
	#[must_use]
	pub fn new() -> Self {
		Self {
			shapes: HashMap::new(),
			predicates: HashMap::new(),
			mandatory: Set::new(),
			divergent_loops: Set::new(),

			region: None,
		}
	}

	/// Creates a store where only `region` is vectorized.
	#[must_use]
	pub fn with_region(region: Box<dyn Region>) -> Self {
		Self {
			region: Some(region),
			..Self::new()
		}
	}

	#[must_use]
	pub fn in_region(&self, block: u16) -> bool {
		self.region
			.as_ref()
			.is_none_or(|region| region.contains(block))
	}

	/// Whether `value` is an instruction of a block in the region.
	#[must_use]
	pub fn value_in_region(&self, graph: &ControlFlowGraph, value: u32) -> bool {
		graph
			.value(value)
			.block()
			.is_some_and(|block| self.in_region(block))
	}

	pub fn add_to_region(&mut self, block: u16) {
		if let Some(region) = &mut self.region {
			region.add(block);
		}
	}

	#[must_use]
	pub fn entry(&self) -> u16 {
		self.region.as_ref().map_or(0, |region| region.entry())
	}

	#[must_use]
	pub fn shape(&self, value: u32) -> Option<VectorShape> {
		self.shapes.get(&value).copied()
	}

	/// Returns the shape of `value`.
	///
	/// Constants derive their shape from their literal. Values with no record
	/// default to uniform when they are not instructions of the region.
	///
	/// # Errors
	///
	/// Returns [`Error::MissingShape`] for an instruction of the region that
	/// has no recorded shape.
	pub fn query_shape(&self, graph: &ControlFlowGraph, value: u32) -> Result<VectorShape> {
		match graph.value(value) {
			Value::Constant(constant) => return Ok(VectorShape::from_constant(*constant)),
			Value::Undefined => return Ok(VectorShape::Undefined),
			_ => {}
		}

		if let Some(shape) = self.shape(value) {
			Ok(shape)
		} else if self.value_in_region(graph, value) {
			Err(Error::MissingShape { value })
		} else {
			Ok(VectorShape::Uniform)
		}
	}

	/// Whether [`Self::query_shape`] succeeds for `value`.
	#[must_use]
	pub fn has_known_shape(&self, graph: &ControlFlowGraph, value: u32) -> bool {
		self.shapes.contains_key(&value) || !self.value_in_region(graph, value)
	}

	pub fn set_shape(&mut self, value: u32, shape: VectorShape) {
		self.shapes.insert(value, shape);
	}

	pub fn drop_shape(&mut self, value: u32) {
		self.shapes.remove(&value);
	}

	/// Records shapes for every argument, by argument index.
	pub fn set_argument_shapes(&mut self, graph: &ControlFlowGraph, shapes: &[VectorShape]) {
		for (value, id) in graph.values.iter().zip(0..) {
			if let Value::Argument(index) = *value
				&& let Some(&shape) = shapes.get(usize::from(index))
			{
				self.set_shape(id, shape);
			}
		}
	}

	#[must_use]
	pub fn get_predicate(&self, block: u16) -> Option<u32> {
		self.predicates.get(&block).copied()
	}

	pub fn set_predicate(&mut self, block: u16, predicate: u32) {
		self.predicates.insert(block, predicate);
	}

	pub fn drop_predicate(&mut self, block: u16) {
		self.predicates.remove(&block);
	}

	/// Makes every block predicated on `old` predicated on `new` instead.
	pub fn remap_predicate(&mut self, new: u32, old: u32) {
		for predicate in self.predicates.values_mut() {
			if *predicate == old {
				*predicate = new;
			}
		}
	}

	/// Records that every lane executes `block`, which then needs no predicate.
	pub fn mark_mandatory(&mut self, block: u16) {
		self.mandatory.grow_insert(block.into());
		self.drop_predicate(block);
	}

	#[must_use]
	pub fn is_mandatory(&self, block: u16) -> bool {
		self.mandatory.contains(block.into())
	}

	#[must_use]
	pub fn is_kill_exit(&self, block: u16) -> bool {
		!self.is_mandatory(block)
	}

	pub fn set_divergent_loop(&mut self, header: u16) {
		self.divergent_loops.grow_insert(header.into());
	}

	pub fn set_loop_divergence(&mut self, header: u16, divergent: bool) {
		if divergent {
			self.set_divergent_loop(header);
		} else {
			self.divergent_loops.remove(header.into());
		}
	}

	#[must_use]
	pub fn is_divergent_loop(&self, header: u16) -> bool {
		self.divergent_loops.contains(header.into())
	}

	/// Whether the loop at `index` is divergent but its parent is not.
	#[must_use]
	pub fn is_divergent_loop_top_level(&self, index: usize, loops: &LoopInfo) -> bool {
		let lp = loops.get(index);

		self.is_divergent_loop(lp.header)
			&& lp
				.parent
				.is_none_or(|parent| !self.is_divergent_loop(loops.get(parent).header))
	}

	/// Returns a textual listing of the predicates and shapes of the region.
	#[must_use]
	pub const fn dump<'a>(&'a self, graph: &'a ControlFlowGraph) -> Dump<'a> {
		Dump { store: self, graph }
	}
}

impl Default for ShapeStore {
	fn default() -> Self {
		Self::new()
	}
}

pub struct Dump<'a> {
	store: &'a ShapeStore,
	graph: &'a ControlFlowGraph,
}

impl Dump<'_> {
	fn fmt_value(&self, f: &mut Formatter<'_>, id: u32) -> std::fmt::Result {
		match self.store.query_shape(self.graph, id) {
			Ok(shape) => writeln!(f, "\t%{id} : {shape}"),
			Err(_) => writeln!(f, "\t%{id} : unknown shape"),
		}
	}
}

impl Display for Dump<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		if self.store.region.is_some() {
			writeln!(f, "ShapeStore for region at block {}", self.store.entry())?;
		} else {
			writeln!(f, "ShapeStore for function")?;
		}

		writeln!(f, "Arguments:")?;

		for (value, id) in self.graph.values.iter().zip(0..) {
			if let Value::Argument(_) = value {
				self.fmt_value(f, id)?;
			}
		}

		for block in self.graph.block_ids() {
			if !self.store.in_region(block) {
				continue;
			}

			match self.store.get_predicate(block) {
				Some(predicate) => writeln!(f, "Block {block}, predicate %{predicate}")?,
				None if self.store.is_mandatory(block) => writeln!(f, "Block {block}, mandatory")?,
				None => writeln!(f, "Block {block}, predicate none")?,
			}

			let basic_block = self.graph.block(block);

			for &id in basic_block.phis.iter().chain(&basic_block.instructions) {
				self.fmt_value(f, id)?;
			}
		}

		Ok(())
	}
}
