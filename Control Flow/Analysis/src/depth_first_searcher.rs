use alloc::vec::Vec;
use set::Set;

pub struct DepthFirstSearcher {
	seen: Set,
	stack: Vec<(u16, bool)>,
}

impl DepthFirstSearcher {
	pub const fn new() -> Self {
		Self {
			seen: Set::new(),
			stack: Vec::new(),
		}
	}

	fn add_successor(&mut self, id: u16) {
		if self.seen.contains(id.into()) {
			return;
		}

		self.stack.push((id, false));
	}

	/// Pushes every block reachable from `entry` onto `result` in post-order.
	pub fn run<H, I>(&mut self, result: &mut Vec<u16>, entry: u16, successors: H)
	where
		H: Fn(u16) -> I,
		I: IntoIterator<Item = u16>,
	{
		self.seen.clear();

		self.add_successor(entry);

		while let Some((id, post)) = self.stack.pop() {
			if post {
				result.push(id);
			} else if !self.seen.grow_insert(id.into()) {
				self.stack.push((id, true));

				for id in successors(id) {
					self.add_successor(id);
				}
			}
		}
	}
}
