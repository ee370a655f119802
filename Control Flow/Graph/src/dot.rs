use core::fmt::{Display, Formatter, Result};

use crate::{
	ControlFlowGraph,
	instruction::{
		AnyLane, BinaryOperation, Constant, Phi, Select, Terminator, UnaryOperation, Value,
	},
};

#[derive(PartialEq, Eq, Clone, Copy)]
enum Vertex {
	Selection,
	Empty,
	Instructions,
}

impl Vertex {
	fn from_block(graph: &ControlFlowGraph, id: u16) -> Self {
		if graph.terminator(id).is_conditional() {
			Self::Selection
		} else if graph.phis(id).is_empty() && graph.instructions(id).is_empty() {
			Self::Empty
		} else {
			Self::Instructions
		}
	}

	const fn group(self) -> &'static str {
		match self {
			Self::Selection => "B",
			Self::Empty => "C",
			Self::Instructions => "D",
		}
	}

	const fn color(self) -> &'static str {
		match self {
			Self::Selection => "#EF8784",
			Self::Empty => "#C2C5FA",
			Self::Instructions => "#FBE78E",
		}
	}
}

impl Display for Vertex {
	fn fmt(&self, f: &mut Formatter) -> Result {
		writeln!(
			f,
			"\tnode [fillcolor = \"{}\", group = {}];",
			self.color(),
			self.group()
		)
	}
}

fn fmt_value(value: &Value, f: &mut Formatter) -> Result {
	match value {
		Value::Argument(index) => write!(f, "argument {index}"),
		Value::Constant(Constant::Bool(data)) => write!(f, "{data}"),
		Value::Constant(Constant::Integer(data)) => write!(f, "{data}"),
		Value::Undefined => write!(f, "undefined"),
		Value::Phi(Phi { incoming, .. }) => {
			write!(f, "phi")?;

			incoming
				.iter()
				.try_for_each(|(block, value)| write!(f, " [N{block}: %{value}]"))
		}
		Value::LaneIndex(_) => write!(f, "lane_index"),
		Value::UnaryOperation(UnaryOperation {
			source, operator, ..
		}) => write!(f, "{operator:?} %{source}"),
		Value::BinaryOperation(BinaryOperation {
			lhs, rhs, operator, ..
		}) => write!(f, "{operator:?} %{lhs}, %{rhs}"),
		Value::Select(Select {
			condition,
			on_true,
			on_false,
			..
		}) => write!(f, "select %{condition}, %{on_true}, %{on_false}"),
		Value::AnyLane(AnyLane { source, .. }) => write!(f, "any_lane %{source}"),
	}
}

fn fmt_terminator(terminator: Terminator, f: &mut Formatter) -> Result {
	match terminator {
		Terminator::Return { result: None } => write!(f, "return"),
		Terminator::Return {
			result: Some(result),
		} => write!(f, "return %{result}"),
		Terminator::Jump => write!(f, "jump"),
		Terminator::Branch { condition } => write!(f, "branch %{condition}"),
		Terminator::Switch { selector } => write!(f, "switch %{selector}"),
	}
}

pub struct Dot<'inner> {
	inner: &'inner ControlFlowGraph,
}

impl<'inner> Dot<'inner> {
	#[must_use]
	pub const fn new(inner: &'inner ControlFlowGraph) -> Self {
		Self { inner }
	}

	fn fmt_lines(&self, id: u16, f: &mut Formatter) -> Result {
		let graph = self.inner;

		graph
			.phis(id)
			.iter()
			.chain(graph.instructions(id))
			.try_for_each(|&value| {
				write!(f, "%{value} = ")?;
				fmt_value(graph.value(value), f)?;

				write!(f, "\\l")
			})?;

		fmt_terminator(graph.terminator(id), f)?;

		write!(f, "\\l")
	}

	fn fmt_nodes(&self, f: &mut Formatter) -> Result {
		writeln!(f, "\tnode [shape = box, style = filled, ordering = out];")?;

		let mut last_vertex = Vertex::Instructions;

		last_vertex.fmt(f)?;

		self.inner.block_ids().try_for_each(|id| {
			let vertex = Vertex::from_block(self.inner, id);

			if vertex != last_vertex {
				last_vertex = vertex;

				last_vertex.fmt(f)?;
			}

			write!(f, "\tN{id} [xlabel = {id}, label = \"")?;

			self.fmt_lines(id, f)?;

			writeln!(f, "\"];")
		})
	}

	fn fmt_edges(&self, f: &mut Formatter) -> Result {
		writeln!(f, "\tedge [color = \"#444477\"];")?;

		self.inner.block_ids().try_for_each(|id| {
			self.inner.successors(id).try_for_each(|successor| {
				let style = if successor <= id {
					" [style = dashed]"
				} else {
					""
				};

				writeln!(f, "\tN{id} -> N{successor}{style};")
			})
		})
	}
}

impl Display for Dot<'_> {
	fn fmt(&self, f: &mut Formatter) -> Result {
		writeln!(f, "digraph {{")?;

		self.fmt_nodes(f)?;
		self.fmt_edges(f)?;

		writeln!(f, "}}")
	}
}
