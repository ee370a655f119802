use control_flow_analysis::DominatorTree;
use control_flow_graph::{
	ControlFlowGraph,
	instruction::{
		AnyLane, BinaryOperation, BinaryOperator, Phi, Select, Terminator, UnaryOperation,
		UnaryOperator, Value,
	},
};

const STEP_LIMIT: usize = 100_000;

/// Runs a graph over several lanes in lock-step.
///
/// The active lanes split at branches they disagree on and join again at
/// the immediate post-dominator of the branch.
pub struct Simulator<'graph> {
	graph: &'graph ControlFlowGraph,
	post_dominators: DominatorTree,

	arguments: Vec<Vec<i64>>,
	registers: Vec<Vec<i64>>,
	previous: Vec<u16>,
	results: Vec<Option<i64>>,
	steps: usize,
}

impl<'graph> Simulator<'graph> {
	/// `arguments[lane][index]` is argument `index` of `lane`.
	pub fn new(graph: &'graph ControlFlowGraph, arguments: Vec<Vec<i64>>) -> Self {
		let lanes = arguments.len();

		Self {
			graph,
			post_dominators: DominatorTree::post_dominators(graph),

			arguments,
			registers: vec![vec![0; lanes]; graph.values.len()],
			previous: vec![u16::MAX; lanes],
			results: vec![None; lanes],
			steps: 0,
		}
	}

	fn read(&self, value: u32, lane: usize) -> i64 {
		match self.graph.value(value) {
			Value::Argument(index) => self.arguments[lane][usize::from(*index)],
			Value::Constant(constant) => constant.to_i64(),
			Value::Undefined => 0,
			_ => self.registers[usize::try_from(value).unwrap()][lane],
		}
	}

	fn write(&mut self, value: u32, lane: usize, data: i64) {
		self.registers[usize::try_from(value).unwrap()][lane] = data;
	}

	fn evaluate(&self, value: u32, lane: usize, mask: &[bool]) -> i64 {
		match self.graph.value(value) {
			Value::LaneIndex(_) => lane.try_into().unwrap(),
			Value::UnaryOperation(UnaryOperation {
				source, operator, ..
			}) => {
				let source = self.read(*source, lane);

				match operator {
					UnaryOperator::Not => i64::from(source == 0),
					UnaryOperator::Negate => -source,
				}
			}
			Value::BinaryOperation(BinaryOperation {
				lhs, rhs, operator, ..
			}) => {
				let lhs = self.read(*lhs, lane);
				let rhs = self.read(*rhs, lane);

				match operator {
					BinaryOperator::Add => lhs + rhs,
					BinaryOperator::Subtract => lhs - rhs,
					BinaryOperator::Multiply => lhs * rhs,
					BinaryOperator::Remainder => lhs % rhs,
					BinaryOperator::And => lhs & rhs,
					BinaryOperator::Or => lhs | rhs,
					BinaryOperator::ExclusiveOr => lhs ^ rhs,
					BinaryOperator::Equal => i64::from(lhs == rhs),
					BinaryOperator::NotEqual => i64::from(lhs != rhs),
					BinaryOperator::LessThan => i64::from(lhs < rhs),
					BinaryOperator::LessThanEqual => i64::from(lhs <= rhs),
				}
			}
			Value::Select(Select {
				condition,
				on_true,
				on_false,
				..
			}) => {
				if self.read(*condition, lane) != 0 {
					self.read(*on_true, lane)
				} else {
					self.read(*on_false, lane)
				}
			}
			Value::AnyLane(AnyLane { source, .. }) => {
				let any = (0..mask.len()).any(|lane| mask[lane] && self.read(*source, lane) != 0);

				i64::from(any)
			}
			Value::Argument(_) | Value::Constant(_) | Value::Undefined | Value::Phi(_) => {
				self.read(value, lane)
			}
		}
	}

	fn lanes(mask: &[bool]) -> impl Iterator<Item = usize> + '_ {
		(0..mask.len()).filter(|&lane| mask[lane])
	}

	fn execute_phis(&mut self, block: u16, mask: &[bool]) {
		let mut pending = Vec::new();

		for &phi in self.graph.phis(block) {
			let Value::Phi(Phi { incoming, .. }) = self.graph.value(phi) else {
				unreachable!("block {block} lists a value that is not a phi");
			};

			for lane in Self::lanes(mask) {
				let previous = self.previous[lane];
				let &(_, value) = incoming
					.iter()
					.find(|&&(id, _)| id == previous)
					.unwrap_or_else(|| panic!("phi %{phi} has no value from block {previous}"));

				pending.push((phi, lane, self.read(value, lane)));
			}
		}

		for (phi, lane, data) in pending {
			self.write(phi, lane, data);
		}
	}

	fn execute_block(&mut self, block: u16, mask: &[bool]) {
		self.steps += 1;

		assert!(self.steps < STEP_LIMIT, "simulation did not terminate");

		self.execute_phis(block, mask);

		for &instruction in self.graph.instructions(block) {
			for lane in Self::lanes(mask) {
				let data = self.evaluate(instruction, lane, mask);

				self.write(instruction, lane, data);
			}
		}

		for lane in Self::lanes(mask) {
			self.previous[lane] = block;
		}
	}

	fn find_target(&self, block: u16, lane: usize) -> u16 {
		let successors: Vec<_> = self.graph.successors(block).collect();

		match self.graph.terminator(block) {
			Terminator::Return { .. } => unreachable!("returns have no target"),
			Terminator::Jump => successors[0],
			Terminator::Branch { condition } => {
				if self.read(condition, lane) != 0 {
					successors[0]
				} else {
					successors[1]
				}
			}
			Terminator::Switch { selector } => {
				let last = successors.len() - 1;
				let index = usize::try_from(self.read(selector, lane))
					.ok()
					.filter(|&index| index < last)
					.unwrap_or(last);

				successors[index]
			}
		}
	}

	fn run_region(&mut self, mut block: u16, mask: Vec<bool>, stop: Option<u16>) {
		loop {
			if Some(block) == stop {
				return;
			}

			self.execute_block(block, &mask);

			if let Terminator::Return { result } = self.graph.terminator(block) {
				for lane in Self::lanes(&mask) {
					self.results[lane] = Some(result.map_or(0, |result| self.read(result, lane)));
				}

				return;
			}

			let mut groups: Vec<(u16, Vec<bool>)> = Vec::new();

			for lane in Self::lanes(&mask) {
				let target = self.find_target(block, lane);

				match groups.iter_mut().find(|(id, _)| *id == target) {
					Some((_, group)) => group[lane] = true,
					None => {
						let mut group = vec![false; mask.len()];

						group[lane] = true;
						groups.push((target, group));
					}
				}
			}

			if let [(target, _)] = groups[..] {
				block = target;

				continue;
			}

			let join = self.post_dominators.immediate(block);

			for (target, group) in groups {
				self.run_region(target, group, join);
			}

			match join {
				Some(join) => block = join,
				None => return,
			}
		}
	}

	/// Runs from block `0` with every lane active and returns each lane's result.
	pub fn run(mut self) -> Vec<i64> {
		let lanes = self.arguments.len();

		self.run_region(0, vec![true; lanes], None);

		self.results
			.into_iter()
			.map(|result| result.expect("lane never returned"))
			.collect()
	}
}
