use control_flow_graph::Dot;
use pretty_assertions::assert_eq;
use vectorizer_info::{BlockRegion, Buffer, Event, ShapeStore, Silent, Trace};

use self::common::{analyze, diamond, infer_shapes, init_tracing, transform, two_exit_loop};

mod common;

#[test]
fn dump_lists_blocks_and_shapes() {
	let diamond = diamond();
	let mut store = ShapeStore::new();

	infer_shapes(&diamond.graph, &mut store);
	analyze(&diamond.graph, &mut store, &mut Silent).unwrap();

	let expected = "\
ShapeStore for function
Arguments:
Block 0, mandatory
\t%0 : varying
\t%3 : varying
\t%4 : varying
Block 1, predicate none
\t%6 : varying
Block 2, predicate none
\t%7 : varying
Block 3, mandatory
\t%8 : varying
";

	assert_eq!(store.dump(&diamond.graph).to_string(), expected);
}

#[test]
fn region_dump_skips_outside_blocks() {
	let diamond = diamond();
	let mut store = ShapeStore::with_region(Box::new(BlockRegion::new(1, [1])));

	infer_shapes(&diamond.graph, &mut store);

	let dump = store.dump(&diamond.graph).to_string();

	assert!(dump.starts_with("ShapeStore for region at block 1\n"));
	assert!(dump.contains("Block 1, predicate none\n"));
	assert!(!dump.contains("Block 0"));
	assert!(!dump.contains("Block 3"));
}

#[test]
fn transform_reports_kill_exits_and_trackers() {
	let two_exit_loop = two_exit_loop();
	let mut graph = two_exit_loop.graph;
	let mut store = ShapeStore::new();
	let mut buffer = Buffer::new();

	infer_shapes(&graph, &mut store);
	analyze(&graph, &mut store, &mut buffer).unwrap();
	transform(&mut graph, &mut store, &mut buffer).unwrap();

	let closures = buffer
		.events
		.iter()
		.filter(|event| matches!(event, Event::DominanceClosure { .. }))
		.count();

	assert_eq!(closures, 7);
	assert_eq!(
		buffer
			.events
			.iter()
			.filter(|event| matches!(event, Event::DivergentLoop { header: 1 }))
			.count(),
		1
	);

	let kills: Vec<_> = buffer
		.events
		.iter()
		.filter_map(|event| match *event {
			Event::KillExit { exiting, exit, .. } => Some((exiting, exit)),
			_ => None,
		})
		.collect();

	assert_eq!(kills, [(8, 4), (2, 5)]);

	let trackers: Vec<_> = buffer
		.events
		.iter()
		.filter_map(|event| match *event {
			Event::Tracker { value, exit, .. } => Some((value, exit)),
			_ => None,
		})
		.collect();

	assert_eq!(trackers, [(two_exit_loop.value, 4), (two_exit_loop.value, 5)]);
}

#[test]
fn traced_run_matches_silent_run() {
	init_tracing();

	let mut traced = two_exit_loop().graph;
	let mut silent = two_exit_loop().graph;
	let mut traced_store = ShapeStore::new();
	let mut silent_store = ShapeStore::new();

	infer_shapes(&traced, &mut traced_store);
	infer_shapes(&silent, &mut silent_store);
	analyze(&traced, &mut traced_store, &mut Trace).unwrap();
	analyze(&silent, &mut silent_store, &mut Silent).unwrap();

	let traced_statistics = transform(&mut traced, &mut traced_store, &mut Trace).unwrap();
	let silent_statistics = transform(&mut silent, &mut silent_store, &mut Silent).unwrap();

	assert_eq!(traced_statistics, silent_statistics);
	assert_eq!(
		Dot::new(&traced).to_string(),
		Dot::new(&silent).to_string()
	);
}

#[test]
fn dot_lists_every_block() {
	let diamond = diamond();
	let dot = Dot::new(&diamond.graph).to_string();

	assert!(dot.starts_with("digraph {"));

	for block in diamond.graph.block_ids() {
		assert!(dot.contains(&format!("N{block}")), "block {block} is missing");
	}
}
