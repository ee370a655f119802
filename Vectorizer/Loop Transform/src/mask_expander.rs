use control_flow_graph::{
	ControlFlowGraph,
	instruction::{BinaryOperator, Terminator, UnaryOperator},
};
use vectorizer_info::{Error, Result, ShapeStore, VectorShape};

/// Materializes the per-lane activity of blocks and edges as boolean values.
pub trait MaskExpander {
	/// Returns a value holding, per lane, whether the lane executes `block`.
	///
	/// # Errors
	///
	/// Returns an error if the mask cannot be built from the known shapes.
	fn request_block_mask(
		&mut self,
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		block: u16,
	) -> Result<u32>;

	/// Returns a value holding, per lane, whether the lane goes from `from`
	/// to `to`. New instructions are placed in `from`.
	///
	/// # Errors
	///
	/// Returns an error if `to` is not a successor of `from`, or if the mask
	/// cannot be built from the known shapes.
	fn request_edge_mask(
		&mut self,
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		from: u16,
		to: u16,
	) -> Result<u32>;
}

/// Builds masks out of the recorded block predicates and the branch
/// conditions. Blocks without a predicate are active in every lane.
pub struct PredicateMaskExpander;

impl PredicateMaskExpander {
	fn lane_shape(lhs: VectorShape, rhs: VectorShape) -> VectorShape {
		if lhs.join(rhs).is_uniform() {
			VectorShape::Uniform
		} else {
			VectorShape::Varying
		}
	}

	fn add_binary(
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		block: u16,
		lhs: u32,
		rhs: u32,
		operator: BinaryOperator,
	) -> Result<u32> {
		let shape = Self::lane_shape(
			store.query_shape(graph, lhs)?,
			store.query_shape(graph, rhs)?,
		);
		let id = graph.add_binary_operation(block, lhs, rhs, operator);

		store.set_shape(id, shape);

		Ok(id)
	}

	fn add_not(
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		block: u16,
		source: u32,
	) -> Result<u32> {
		let shape = Self::lane_shape(store.query_shape(graph, source)?, VectorShape::Uniform);
		let id = graph.add_unary_operation(block, source, UnaryOperator::Not);

		store.set_shape(id, shape);

		Ok(id)
	}

	// The lanes of `from` that continue at successor `position`, or `None` if all of them do.
	fn find_condition(
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		from: u16,
		position: usize,
	) -> Result<Option<u32>> {
		let len = graph.successors(from).count();

		match graph.terminator(from) {
			Terminator::Return { .. } | Terminator::Jump => Ok(None),
			Terminator::Branch { condition } => {
				if position == 0 {
					Ok(Some(condition))
				} else {
					Self::add_not(graph, store, from, condition).map(Some)
				}
			}
			Terminator::Switch { selector } => {
				if len == 1 {
					return Ok(None);
				}

				if position + 1 == len {
					let zero = graph.add_integer(0);
					let last = graph.add_integer((len - 1).try_into().unwrap());
					let below = Self::add_binary(
						graph,
						store,
						from,
						selector,
						zero,
						BinaryOperator::LessThan,
					)?;
					let inside = Self::add_binary(
						graph,
						store,
						from,
						selector,
						last,
						BinaryOperator::LessThan,
					)?;
					let above = Self::add_not(graph, store, from, inside)?;

					Self::add_binary(graph, store, from, below, above, BinaryOperator::Or).map(Some)
				} else {
					let case = graph.add_integer(position.try_into().unwrap());

					Self::add_binary(graph, store, from, selector, case, BinaryOperator::Equal)
						.map(Some)
				}
			}
		}
	}
}

impl MaskExpander for PredicateMaskExpander {
	fn request_block_mask(
		&mut self,
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		block: u16,
	) -> Result<u32> {
		Ok(store
			.get_predicate(block)
			.unwrap_or_else(|| graph.add_bool(true)))
	}

	fn request_edge_mask(
		&mut self,
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		from: u16,
		to: u16,
	) -> Result<u32> {
		let position = graph
			.successors(from)
			.position(|id| id == to)
			.ok_or(Error::Precondition {
				block: from,
				reason: "edge mask requested for a missing edge",
			})?;

		let predicate = store.get_predicate(from);
		let condition = Self::find_condition(graph, store, from, position)?;

		match (predicate, condition) {
			(Some(predicate), Some(condition)) => {
				Self::add_binary(graph, store, from, predicate, condition, BinaryOperator::And)
			}
			(Some(mask), None) | (None, Some(mask)) => Ok(mask),
			(None, None) => Ok(graph.add_bool(true)),
		}
	}
}
