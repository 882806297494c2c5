//! Shortest-path pricing: fixed scenarios and random graphs.

use proptest::prelude::*;

use solver_decomp::pricing::{PathArc, PathBlock, PricingOracle, PricingResult, PricingTarget, ShortestPathOracle};
use solver_decomp::BlockModel;

fn unit(tail: usize, head: usize) -> PathArc {
    PathArc { tail, head, cost: 1.0 }
}

/// Directed 4-cycle 0 -> 1 -> 2 -> 3 -> 0, routing from 0 to 2.
fn cycle() -> (BlockModel, ShortestPathOracle) {
    let arcs = vec![unit(0, 1), unit(1, 2), unit(2, 3), unit(3, 0)];
    let block = BlockModel::new(0, "cycle", vec![0, 1, 2, 3]).unwrap();
    let graph = PathBlock::new(4, 0, 2, arcs).unwrap();
    (block, ShortestPathOracle::new(vec![graph]))
}

#[test]
fn test_cycle_single_column() {
    let (block, oracle) = cycle();
    let target = 3.5;
    let result = oracle
        .price(&block, &[1.0; 4], PricingTarget::Improve(target))
        .unwrap();

    let cols = result.columns();
    assert_eq!(cols.len(), 1);
    assert_eq!(cols[0].entries(), &[(0, 1.0), (1, 1.0)]);
    assert!((cols[0].reduced_cost() - (2.0 - target)).abs() < 1e-9);
    assert!((cols[0].cost() - 2.0).abs() < 1e-12);
}

#[test]
fn test_cycle_no_column_above_target() {
    let (block, oracle) = cycle();
    let result = oracle.price(&block, &[1.0; 4], PricingTarget::Improve(1.5)).unwrap();
    assert!(result.columns().is_empty());
    assert!(matches!(result, PricingResult::Optimal { .. }));
}

#[test]
fn test_negative_arc_skips_initial_columns() {
    let (block, oracle) = cycle();
    let result = oracle
        .price(&block, &[1.0, 1.0, -0.5, 1.0], PricingTarget::InitialColumns)
        .unwrap();
    assert_eq!(result, PricingResult::no_column());
}

#[test]
fn test_pricing_is_idempotent() {
    let (block, oracle) = cycle();
    let prices = [0.25, 1.5, 0.75, 2.0];
    let first = oracle.price(&block, &prices, PricingTarget::Improve(4.0)).unwrap();
    let second = oracle.price(&block, &prices, PricingTarget::Improve(4.0)).unwrap();
    assert_eq!(first, second);
}

#[derive(Debug, Clone)]
struct RandomGraph {
    num_nodes: usize,
    /// (tail, head, price in hundredths)
    arcs: Vec<(usize, usize, u32)>,
    target: u32,
}

fn random_graph() -> impl Strategy<Value = RandomGraph> {
    (3usize..8).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n, 0u32..500), 1..24),
            0u32..3000,
        )
            .prop_map(|(num_nodes, arcs, target)| RandomGraph {
                num_nodes,
                arcs,
                target,
            })
    })
}

/// Bellman-Ford from node 0 without entering it again.
fn reference_distance(g: &RandomGraph) -> Option<f64> {
    let mut dist = vec![f64::INFINITY; g.num_nodes];
    dist[0] = 0.0;
    for _ in 0..g.num_nodes {
        for &(t, h, p) in &g.arcs {
            if h == 0 || dist[t].is_infinite() {
                continue;
            }
            let nd = dist[t] + p as f64 / 100.0;
            if nd < dist[h] {
                dist[h] = nd;
            }
        }
    }
    let d = dist[g.num_nodes - 1];
    d.is_finite().then_some(d)
}

proptest! {
    #[test]
    fn prop_returned_columns_improve(g in random_graph()) {
        let arcs: Vec<PathArc> = g.arcs.iter().map(|&(t, h, _)| unit(t, h)).collect();
        let prices: Vec<f64> = g.arcs.iter().map(|&(_, _, p)| p as f64 / 100.0).collect();
        let target = g.target as f64 / 100.0;

        let block = BlockModel::new(0, "random", (0..arcs.len()).collect()).unwrap();
        let graph = PathBlock::new(g.num_nodes, 0, g.num_nodes - 1, arcs).unwrap();
        let oracle = ShortestPathOracle::new(vec![graph]);
        let result = oracle.price(&block, &prices, PricingTarget::Improve(target)).unwrap();

        match reference_distance(&g) {
            None => prop_assert_eq!(result, PricingResult::Infeasible),
            Some(d) => {
                let cols = result.columns();
                if d < target - 1e-9 {
                    prop_assert_eq!(cols.len(), 1);
                    let rc = cols[0].price(&prices) - target;
                    prop_assert!(rc < 0.0);
                    prop_assert!((rc - (d - target)).abs() < 1e-9);
                    prop_assert!((cols[0].reduced_cost() - rc).abs() < 1e-9);
                } else {
                    prop_assert!(cols.is_empty());
                }
                if let PricingResult::Optimal { best_reduced_cost: Some(best), .. } = result {
                    prop_assert!(best <= d - target + 1e-9);
                }
            }
        }
    }
}
