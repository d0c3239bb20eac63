use roadgraph::{DiGraph, GraphError};

/// A small one-way street grid shared by several tests.
///
/// ```
/// 0 --1.0--> 1 --1.0--> 2
/// |                     ^
/// 5.0                   |
/// v                     |
/// 3 --------0.5-------> 4 (4 -> 2 costs 0.5)
/// ```
fn one_way_grid() -> DiGraph {
    DiGraph::from_arcs(5, &[
        (0, 1, 1.0),
        (1, 2, 1.0),
        (0, 3, 5.0),
        (3, 4, 0.5),
        (4, 2, 0.5),
    ]).unwrap()
}

fn distance(graph: &DiGraph, source: usize, target: usize, cutoff: f64) -> Option<f64> {
    graph.distances_within(source, cutoff).unwrap()
        .into_iter()
        .find(|&(node, _)| node == target)
        .map(|(_, dist)| dist)
}

#[test]
fn distances_follow_shortest_paths() {
    let graph = one_way_grid();
    let mut reached = graph.distances_within(0, f64::INFINITY).unwrap();
    reached.sort_by_key(|&(node, _)| node);
    assert_eq!(reached, vec![(0, 0.0), (1, 1.0), (2, 2.0), (3, 5.0), (4, 5.5)]);
}

#[test]
fn results_come_out_in_distance_order() {
    let graph = one_way_grid();
    let reached = graph.distances_within(0, f64::INFINITY).unwrap();
    for pair in reached.windows(2) { assert!(pair[0].1 <= pair[1].1) }
}

#[test]
fn cutoff_is_inclusive() {
    let graph = one_way_grid();
    let nodes = |cutoff| {
        let mut nodes = graph.distances_within(0, cutoff).unwrap()
            .into_iter().map(|(node, _)| node).collect::<Vec<_>>();
        nodes.sort();
        nodes
    };
    assert_eq!(nodes(0.0), vec![0]);
    assert_eq!(nodes(1.0), vec![0, 1]);
    assert_eq!(nodes(2.0), vec![0, 1, 2]);
    assert_eq!(nodes(5.0), vec![0, 1, 2, 3]);
}

#[test]
fn direction_matters() {
    let graph = one_way_grid();
    assert_eq!(distance(&graph, 2, 0, f64::INFINITY), None);
    assert_eq!(distance(&graph.reversed(), 2, 0, f64::INFINITY), Some(2.0));
}

#[test]
fn parallel_arcs_use_the_cheapest() {
    let graph = DiGraph::from_arcs(2, &[(0, 1, 9.0), (0, 1, 2.0), (0, 1, 4.0)]).unwrap();
    assert_eq!(distance(&graph, 0, 1, 10.0), Some(2.0));
}

#[test]
fn zero_weight_cycles_terminate() {
    let graph = DiGraph::from_arcs(3, &[(0, 1, 0.0), (1, 0, 0.0), (1, 2, 0.0)]).unwrap();
    let mut reached = graph.distances_within(0, 0.0).unwrap();
    reached.sort_by_key(|&(node, _)| node);
    assert_eq!(reached, vec![(0, 0.0), (1, 0.0), (2, 0.0)]);
}

#[test]
fn rejects_bad_sources_and_cutoffs() {
    let graph = one_way_grid();
    assert_eq!(
        graph.distances_within(7, 1.0).unwrap_err(),
        GraphError::NodeOutOfRange { node: 7, size: 5 },
    );
    assert_eq!(graph.distances_within(0, -1.0).unwrap_err(), GraphError::InvalidCutoff(-1.0));
    assert!(matches!(graph.distances_within(0, f64::NAN), Err(GraphError::InvalidCutoff(_))));
}
