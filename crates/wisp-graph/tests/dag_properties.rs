use std::collections::HashMap;

use proptest::prelude::*;
use wisp_graph::{Module, ModuleGraph, ModuleId, ModuleKind};

fn id(index: usize) -> ModuleId {
    ModuleId::new(format!("/app/src/m{index}.js")).unwrap()
}

/// Edges only point from lower to higher indices, so the graph is acyclic.
fn dag(size: usize, edges: &[(usize, usize)]) -> ModuleGraph {
    let mut graph = ModuleGraph::new();
    for from in 0..size {
        let mut builder = Module::builder(id(from), ModuleKind::Script).code(format!("m{from}"));
        for &(a, b) in edges {
            let (lo, hi) = (a.min(b), a.max(b));
            if lo == from && lo != hi {
                builder = builder.dependency(format!("./m{hi}"), id(hi));
            }
        }
        graph.add_module(builder.build());
    }
    graph.add_entry_point("main", id(0));
    graph
}

proptest! {
    #[test]
    fn topological_order_respects_every_edge(
        size in 1usize..24,
        raw_edges in proptest::collection::vec((0usize..24, 0usize..24), 0..60),
    ) {
        let edges: Vec<_> = raw_edges
            .into_iter()
            .map(|(a, b)| (a % size, b % size))
            .collect();
        let graph = dag(size, &edges);

        let order = graph.topological_order();
        prop_assert_eq!(order.len(), graph.len());

        let position: HashMap<_, _> = order.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        for (importer, imported) in graph.edges() {
            prop_assert!(position[&imported] < position[&importer]);
        }
        prop_assert!(graph.detect_cycles().is_empty());
    }

    #[test]
    fn order_is_deterministic(
        size in 1usize..16,
        raw_edges in proptest::collection::vec((0usize..16, 0usize..16), 0..40),
    ) {
        let edges: Vec<_> = raw_edges
            .into_iter()
            .map(|(a, b)| (a % size, b % size))
            .collect();
        prop_assert_eq!(
            dag(size, &edges).topological_order(),
            dag(size, &edges).topological_order()
        );
    }
}
