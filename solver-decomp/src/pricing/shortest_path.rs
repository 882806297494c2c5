//! Shortest-path pricing for blocks that route one unit from a source to a sink.
//!
//! Prices are scaled to integers (`round(price * 1e4)`) and the target is
//! added to every arc leaving the source. The shortest path is a column if its
//! scaled price, with the offset removed, is below the scaled target. The
//! reported best reduced cost is lowered by the worst-case rounding error so
//! that it stays a valid bound on the unscaled minimum.
//!
//! Dijkstra handles the usual case where only source arcs can be negative.
//! Positive duals on `>=` or `=` master rows (branching bounds, cuts) can push
//! inner arcs below zero; those rounds use Bellman-Ford, which fails with
//! [`DecompError::NegativeCycle`] if a negative cycle is reachable.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{PricingOracle, PricingResult, PricingTarget};
use crate::error::{DecompError, DecompResult};
use crate::model::{BlockId, BlockModel};

/// Fixed-point factor applied to prices.
pub const PRICE_SCALE: f64 = 1e4;

fn scaled(value: f64) -> i64 {
    (value * PRICE_SCALE).round() as i64
}

/// Directed arc. Its position in [`PathBlock::arcs`] is the block-local index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathArc {
    /// Tail node.
    pub tail: usize,
    /// Head node.
    pub head: usize,
    /// True (original-space) cost of routing the unit over this arc.
    pub cost: f64,
}

/// Graph of one path block.
#[derive(Debug, Clone)]
pub struct PathBlock {
    num_nodes: usize,
    source: usize,
    sink: usize,
    arcs: Vec<PathArc>,
    /// Outgoing arc indices per node, in arc order.
    out: Vec<Vec<usize>>,
}

impl PathBlock {
    /// Create a path block over nodes `0..num_nodes`.
    pub fn new(num_nodes: usize, source: usize, sink: usize, arcs: Vec<PathArc>) -> DecompResult<Self> {
        if source >= num_nodes || sink >= num_nodes || source == sink {
            return Err(DecompError::InvalidModel(format!(
                "path block needs distinct source/sink in 0..{}, got {} -> {}",
                num_nodes, source, sink
            )));
        }
        let mut out = vec![Vec::new(); num_nodes];
        for (a, arc) in arcs.iter().enumerate() {
            if arc.tail >= num_nodes || arc.head >= num_nodes {
                return Err(DecompError::InvalidModel(format!(
                    "arc {} ({} -> {}) leaves the graph of {} nodes",
                    a, arc.tail, arc.head, num_nodes
                )));
            }
            out[arc.tail].push(a);
        }
        Ok(Self {
            num_nodes,
            source,
            sink,
            arcs,
            out,
        })
    }

    /// Source node.
    pub fn source(&self) -> usize {
        self.source
    }

    /// Sink node.
    pub fn sink(&self) -> usize {
        self.sink
    }

    /// Arcs, in local index order.
    pub fn arcs(&self) -> &[PathArc] {
        &self.arcs
    }

    /// Dijkstra from the source; returns the sink distance and its arcs in path order.
    ///
    /// Arcs into the source are never relaxed, so negative weights on arcs
    /// leaving the source are safe. Ties go to the lower node index and the
    /// earlier arc.
    fn shortest_path(&self, weights: &[i64]) -> Option<(i64, Vec<usize>)> {
        let mut dist: Vec<Option<i64>> = vec![None; self.num_nodes];
        let mut pred: Vec<Option<usize>> = vec![None; self.num_nodes];
        let mut done = vec![false; self.num_nodes];
        let mut heap = BinaryHeap::new();

        dist[self.source] = Some(0);
        heap.push(Reverse((0i64, self.source)));

        while let Some(Reverse((d, u))) = heap.pop() {
            if done[u] {
                continue;
            }
            done[u] = true;
            if u == self.sink {
                break;
            }
            for &a in &self.out[u] {
                let v = self.arcs[a].head;
                if v == self.source || done[v] {
                    continue;
                }
                let nd = d.saturating_add(weights[a]);
                if dist[v].map_or(true, |dv| nd < dv) {
                    dist[v] = Some(nd);
                    pred[v] = Some(a);
                    heap.push(Reverse((nd, v)));
                }
            }
        }

        let total = dist[self.sink]?;
        self.trace(&pred).map(|path| (total, path))
    }

    /// Bellman-Ford from the source for weights with negative inner arcs.
    ///
    /// Arcs are relaxed in index order until a pass changes nothing; a change
    /// in pass `num_nodes` means a reachable negative cycle.
    fn shortest_path_signed(&self, weights: &[i64], block: BlockId) -> DecompResult<Option<(i64, Vec<usize>)>> {
        let mut dist: Vec<Option<i64>> = vec![None; self.num_nodes];
        let mut pred: Vec<Option<usize>> = vec![None; self.num_nodes];
        dist[self.source] = Some(0);

        for _ in 0..self.num_nodes {
            let mut changed = false;
            for (a, arc) in self.arcs.iter().enumerate() {
                if arc.head == self.source {
                    continue;
                }
                let d = match dist[arc.tail] {
                    Some(d) => d,
                    None => continue,
                };
                let nd = d.saturating_add(weights[a]);
                if dist[arc.head].map_or(true, |dv| nd < dv) {
                    dist[arc.head] = Some(nd);
                    pred[arc.head] = Some(a);
                    changed = true;
                }
            }
            if !changed {
                return Ok(dist[self.sink].and_then(|total| self.trace(&pred).map(|path| (total, path))));
            }
        }
        Err(DecompError::NegativeCycle { block })
    }

    /// Arcs from the source to the sink along predecessor links, in path order.
    fn trace(&self, pred: &[Option<usize>]) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut node = self.sink;
        while node != self.source {
            if path.len() >= self.num_nodes {
                return None;
            }
            let a = pred[node]?;
            path.push(a);
            node = self.arcs[a].tail;
        }
        path.reverse();
        Some(path)
    }
}

/// Exact pricing oracle for path blocks, indexed by block id.
#[derive(Debug, Clone, Default)]
pub struct ShortestPathOracle {
    blocks: Vec<PathBlock>,
}

impl ShortestPathOracle {
    /// Create an oracle; `blocks[k]` is the graph of block `k`.
    pub fn new(blocks: Vec<PathBlock>) -> Self {
        Self { blocks }
    }

    /// Graph of a block.
    pub fn block(&self, id: BlockId) -> Option<&PathBlock> {
        self.blocks.get(id)
    }
}

impl PricingOracle for ShortestPathOracle {
    fn price(&self, block: &BlockModel, prices: &[f64], target: PricingTarget) -> DecompResult<PricingResult> {
        let graph = self.blocks.get(block.id).ok_or_else(|| {
            DecompError::InvalidModel(format!("no path graph registered for block {}", block.id))
        })?;
        if graph.arcs.len() != block.num_cols() {
            return Err(DecompError::InvalidModel(format!(
                "block {} has {} columns but its graph has {} arcs",
                block.id,
                block.num_cols(),
                graph.arcs.len()
            )));
        }

        let mut local_prices = Vec::with_capacity(graph.arcs.len());
        for &m in block.active_columns() {
            match prices.get(m) {
                Some(&p) if p.is_finite() => local_prices.push(p),
                _ => {
                    return Err(DecompError::InvalidModel(format!(
                        "block {}: missing or non-finite price for variable {}",
                        block.id, m
                    )))
                }
            }
        }

        // The oracle cannot handle negative cycles; leave initial columns to pricing.
        if target == PricingTarget::InitialColumns && local_prices.iter().any(|&p| p < 0.0) {
            log::debug!("block {}: negative price, no initial column", block.id);
            return Ok(PricingResult::no_column());
        }

        let (target_scaled, offset) = match target {
            PricingTarget::Improve(t) => (scaled(t), scaled(t)),
            PricingTarget::InitialColumns => (i64::MAX, 0),
        };

        let mut weights = Vec::with_capacity(local_prices.len());
        let mut negative_inner = false;
        for (&p, arc) in local_prices.iter().zip(&graph.arcs) {
            let mut w = scaled(p);
            if arc.tail == graph.source {
                w = w.saturating_add(offset);
            } else if w < 0 {
                negative_inner = true;
            }
            weights.push(w);
        }

        let found = if negative_inner {
            log::debug!("block {}: negative inner arc, using Bellman-Ford", block.id);
            graph.shortest_path_signed(&weights, block.id)?
        } else {
            graph.shortest_path(&weights)
        };
        let (dist, path) = match found {
            Some(found) => found,
            None => return Ok(PricingResult::Infeasible),
        };
        let path_weight = dist.saturating_sub(offset);

        // Rounding moves each arc and the target by at most half a unit.
        let slack = graph.num_nodes as f64 * 0.5 / PRICE_SCALE;
        let best_reduced_cost = target
            .value()
            .map(|t| path_weight as f64 / PRICE_SCALE - t - slack);
        if path_weight >= target_scaled {
            return Ok(PricingResult::Optimal {
                columns: Vec::new(),
                best_reduced_cost,
            });
        }

        let cost: f64 = path.iter().map(|&a| graph.arcs[a].cost).sum();
        let local: Vec<(usize, f64)> = path.iter().map(|&a| (a, 1.0)).collect();
        let reduced_cost = match target {
            PricingTarget::Improve(t) => path_weight as f64 / PRICE_SCALE - t,
            PricingTarget::InitialColumns => path_weight as f64 / PRICE_SCALE,
        };
        let column = block.column_from_local(&local, cost)?.with_reduced_cost(reduced_cost);

        Ok(PricingResult::Optimal {
            columns: vec![column],
            best_reduced_cost,
        })
    }

    fn name(&self) -> &str {
        "shortest-path"
    }
}
