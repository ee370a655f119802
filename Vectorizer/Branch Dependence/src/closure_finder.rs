use control_flow_analysis::Frontiers;
use set::Set;

/// Finds the blocks reachable by repeatedly following a frontier relation.
pub struct ClosureFinder {
	seen: Set,
	stack: Vec<u16>,
}

impl ClosureFinder {
	pub const fn new() -> Self {
		Self {
			seen: Set::new(),
			stack: Vec::new(),
		}
	}

	fn add_member(&mut self, id: u16) {
		if self.seen.grow_insert(id.into()) {
			return;
		}

		self.stack.push(id);
	}

	/// Returns the iterated frontier of `id` in ascending order. It only
	/// holds `id` itself when `id` is in its own iterated frontier.
	pub fn run(&mut self, frontiers: &Frontiers, id: u16) -> Vec<u16> {
		self.seen.clear();

		for &member in frontiers.get(id) {
			self.add_member(member);
		}

		while let Some(id) = self.stack.pop() {
			for &member in frontiers.get(id) {
				self.add_member(member);
			}
		}

		self.seen
			.ascending()
			.map(|id| id.try_into().unwrap())
			.collect()
	}
}
