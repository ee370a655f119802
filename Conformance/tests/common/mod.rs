#![allow(dead_code)]

pub mod simulator;

use control_flow_analysis::{DominatorTree, Frontiers, LoopInfo};
use control_flow_graph::{
	ControlFlowGraph,
	instruction::{BinaryOperator, Value},
};
use vectorizer_branch_dependence::{BranchDependenceAnalysis, DivergenceMarker};
use vectorizer_info::{Diagnostics, Result, ShapeStore, VectorShape};
use vectorizer_loop_transform::{DivergentLoopTransform, PredicateMaskExpander, Statistics};

pub use self::simulator::Simulator;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

fn operand_shape(graph: &ControlFlowGraph, store: &ShapeStore, operand: u32) -> VectorShape {
	match graph.value(operand) {
		Value::Constant(_) => VectorShape::Uniform,
		Value::Undefined => VectorShape::Undefined,
		Value::Argument(_) => store.shape(operand).unwrap_or(VectorShape::Uniform),
		_ => store.shape(operand).unwrap_or(VectorShape::Undefined),
	}
}

/// Gives every instruction the join of its operand shapes, with lane
/// indices varying, until nothing changes.
pub fn infer_shapes(graph: &ControlFlowGraph, store: &mut ShapeStore) {
	let mut changed = true;

	while changed {
		changed = false;

		for id in graph.value_ids() {
			let value = graph.value(id);

			if value.block().is_none() {
				continue;
			}

			let shape = match value {
				Value::LaneIndex(_) => VectorShape::Varying,
				Value::AnyLane(_) => VectorShape::Uniform,
				_ => {
					let mut shape = VectorShape::Undefined;

					value.for_each_operand(|operand| {
						shape = shape.join(operand_shape(graph, store, operand));
					});

					if let VectorShape::Strided(_) = shape {
						VectorShape::Varying
					} else {
						shape
					}
				}
			};

			if store.shape(id) != Some(shape) {
				store.set_shape(id, shape);

				changed = true;
			}
		}
	}
}

pub struct Divergence {
	pub analysis: BranchDependenceAnalysis,
	pub loops: LoopInfo,
}

/// Computes the branch dependences of `graph` and marks its divergence.
pub fn analyze(
	graph: &ControlFlowGraph,
	store: &mut ShapeStore,
	diagnostics: &mut dyn Diagnostics,
) -> Result<Divergence> {
	let dominators = DominatorTree::dominators(graph, store.entry());
	let post_dominators = DominatorTree::post_dominators(graph);
	let dominance = Frontiers::dominance(graph, &dominators);
	let post_dominance = Frontiers::post_dominance(graph, &post_dominators);
	let loops = LoopInfo::compute(graph, &dominators);

	let analysis = BranchDependenceAnalysis::compute(
		graph,
		&dominance,
		&post_dominance,
		&loops,
		diagnostics,
	);

	DivergenceMarker::new().run(graph, &analysis, &loops, store, diagnostics)?;

	Ok(Divergence { analysis, loops })
}

pub fn transform(
	graph: &mut ControlFlowGraph,
	store: &mut ShapeStore,
	diagnostics: &mut dyn Diagnostics,
) -> Result<Statistics> {
	DivergentLoopTransform::new().run(graph, store, &mut PredicateMaskExpander, diagnostics)
}

/// Block `0` branches on the lane parity to `1` or `2`, which join at `3`.
pub struct Diamond {
	pub graph: ControlFlowGraph,
	pub condition: u32,
	pub result: u32,
}

pub fn diamond() -> Diamond {
	let mut graph = ControlFlowGraph::new();
	let [entry, left, right, join] = [(); 4].map(|()| graph.add_basic_block());

	let lane = graph.add_lane_index(entry);
	let two = graph.add_integer(2);
	let zero = graph.add_integer(0);
	let parity = graph.add_binary_operation(entry, lane, two, BinaryOperator::Remainder);
	let condition = graph.add_binary_operation(entry, parity, zero, BinaryOperator::Equal);

	let one = graph.add_integer(1);
	let on_left = graph.add_binary_operation(left, lane, one, BinaryOperator::Add);
	let on_right = graph.add_binary_operation(right, lane, two, BinaryOperator::Multiply);
	let result = graph.add_phi(join, vec![(left, on_left), (right, on_right)]);

	graph.set_branch(entry, condition, left, right);
	graph.set_jump(left, join);
	graph.set_jump(right, join);
	graph.set_return(join, Some(result));

	Diamond {
		graph,
		condition,
		result,
	}
}

/// A loop with header `1`, body `2` and latch `3`, leaving from the header
/// to `4` when an even lane reaches its second iteration and from the body
/// to `5` when any lane reaches its fifth. Both exits join at `6`.
pub struct TwoExitLoop {
	pub graph: ControlFlowGraph,
	pub value: u32,
}

pub fn two_exit_loop() -> TwoExitLoop {
	let mut graph = ControlFlowGraph::new();
	let [entry, header, body, latch, even_exit, odd_exit] = [(); 6].map(|()| graph.add_basic_block());
	let join = graph.add_basic_block();

	let zero = graph.add_integer(0);
	let one = graph.add_integer(1);
	let two = graph.add_integer(2);
	let four = graph.add_integer(4);
	let ten = graph.add_integer(10);

	let lane = graph.add_lane_index(entry);
	let parity = graph.add_binary_operation(entry, lane, two, BinaryOperator::Remainder);
	let even = graph.add_binary_operation(entry, parity, zero, BinaryOperator::Equal);

	let index = graph.add_phi(header, vec![(entry, zero)]);
	let value = graph.add_binary_operation(header, index, ten, BinaryOperator::Multiply);
	let second = graph.add_binary_operation(header, index, one, BinaryOperator::Equal);
	let leave_even = graph.add_binary_operation(header, even, second, BinaryOperator::And);

	let leave_odd = graph.add_binary_operation(body, index, four, BinaryOperator::Equal);
	let next = graph.add_binary_operation(latch, index, one, BinaryOperator::Add);

	if let Some(phi) = graph.value_mut(index).as_mut_phi() {
		phi.incoming.push((latch, next));
	}

	let even_result = graph.add_phi(even_exit, vec![(header, value)]);
	let odd_result = graph.add_phi(odd_exit, vec![(body, value)]);
	let result = graph.add_phi(join, vec![(even_exit, even_result), (odd_exit, odd_result)]);

	graph.set_jump(entry, header);
	graph.set_branch(header, leave_even, even_exit, body);
	graph.set_branch(body, leave_odd, odd_exit, latch);
	graph.set_jump(latch, header);
	graph.set_jump(even_exit, join);
	graph.set_jump(odd_exit, join);
	graph.set_return(join, Some(result));

	TwoExitLoop { graph, value }
}

/// A loop with three exits, where a lane picks exit `argument 0` (the last
/// one when out of range) once the counter reaches `argument 1`. The result
/// is `7 * counter + 3` plus `1000` times the exit position.
pub fn three_exit_loop() -> ControlFlowGraph {
	let mut graph = ControlFlowGraph::new();
	let [entry, header, second, third, latch] = [(); 5].map(|()| graph.add_basic_block());
	let exits = [(); 3].map(|()| graph.add_basic_block());
	let join = graph.add_basic_block();

	let choice = graph.add_argument(0);
	let trip = graph.add_argument(1);
	let zero = graph.add_integer(0);
	let one = graph.add_integer(1);
	let three = graph.add_integer(3);
	let seven = graph.add_integer(7);

	let index = graph.add_phi(header, vec![(entry, zero)]);
	let scaled = graph.add_binary_operation(header, index, seven, BinaryOperator::Multiply);
	let value = graph.add_binary_operation(header, scaled, three, BinaryOperator::Add);
	let arrived = graph.add_binary_operation(header, index, trip, BinaryOperator::Equal);
	let first = graph.add_binary_operation(header, choice, zero, BinaryOperator::Equal);
	let leave_first = graph.add_binary_operation(header, arrived, first, BinaryOperator::And);

	let middle = graph.add_binary_operation(second, choice, one, BinaryOperator::Equal);
	let leave_second = graph.add_binary_operation(second, arrived, middle, BinaryOperator::And);

	let next = graph.add_binary_operation(latch, index, one, BinaryOperator::Add);

	if let Some(phi) = graph.value_mut(index).as_mut_phi() {
		phi.incoming.push((latch, next));
	}

	let sources = [header, second, third];
	let mut incoming = Vec::new();

	for ((&exit, &source), offset) in exits.iter().zip(&sources).zip(0..) {
		let captured = graph.add_phi(exit, vec![(source, value)]);
		let bonus = graph.add_integer(offset * 1000);
		let result = graph.add_binary_operation(exit, captured, bonus, BinaryOperator::Add);

		graph.set_jump(exit, join);
		incoming.push((exit, result));
	}

	let result = graph.add_phi(join, incoming);

	graph.set_jump(entry, header);
	graph.set_branch(header, leave_first, exits[0], second);
	graph.set_branch(second, leave_second, exits[1], third);
	graph.set_branch(third, arrived, exits[2], latch);
	graph.set_jump(latch, header);
	graph.set_return(join, Some(result));

	graph
}

/// A counting loop that every lane leaves after `count` iterations, with the
/// counter times two used after it.
pub fn uniform_loop(count: i64) -> ControlFlowGraph {
	let mut graph = ControlFlowGraph::new();
	let [entry, header, latch, exit] = [(); 4].map(|()| graph.add_basic_block());

	let zero = graph.add_integer(0);
	let one = graph.add_integer(1);
	let two = graph.add_integer(2);
	let limit = graph.add_integer(count);

	let index = graph.add_phi(header, vec![(entry, zero)]);
	let doubled = graph.add_binary_operation(header, index, two, BinaryOperator::Multiply);
	let done = graph.add_binary_operation(header, index, limit, BinaryOperator::Equal);
	let next = graph.add_binary_operation(latch, index, one, BinaryOperator::Add);

	if let Some(phi) = graph.value_mut(index).as_mut_phi() {
		phi.incoming.push((latch, next));
	}

	let result = graph.add_phi(exit, vec![(header, doubled)]);

	graph.set_jump(entry, header);
	graph.set_branch(header, done, exit, latch);
	graph.set_jump(latch, header);
	graph.set_return(exit, Some(result));

	graph
}

pub fn lanes_without_arguments(lanes: usize) -> Vec<Vec<i64>> {
	vec![Vec::new(); lanes]
}
