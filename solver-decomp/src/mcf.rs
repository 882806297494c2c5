//! Multi-commodity flow models.
//!
//! ```text
//! min  sum_k sum_a demand_k * weight_a * x[k, a]
//! s.t. sum_k demand_k * x[k, a] <= capacity_a          (master, per arc)
//!      flow conservation of one unit from s_k to t_k   (block k)
//!      x[k, a] in {0, 1}
//! ```
//! Variables are indexed `k * num_arcs + a`. Each commodity is a block whose
//! extreme points are source-sink paths, priced by [`ShortestPathOracle`].

use crate::error::{DecompError, DecompResult};
use crate::model::{BlockModel, MasterModel, Row};
use crate::pricing::{PathArc, PathBlock, ShortestPathOracle};

/// Arc of the flow network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McfArc {
    /// Tail node.
    pub tail: usize,
    /// Head node.
    pub head: usize,
    /// Cost per unit of flow.
    pub weight: f64,
    /// Capacity shared by all commodities.
    pub capacity: f64,
}

/// Source-sink pair routed as a single path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commodity {
    /// Source node.
    pub source: usize,
    /// Sink node.
    pub sink: usize,
    /// Amount shipped along the path.
    pub demand: f64,
}

/// Multi-commodity flow instance.
#[derive(Debug, Clone)]
pub struct McfInstance {
    /// Number of nodes.
    pub num_nodes: usize,
    /// Arcs.
    pub arcs: Vec<McfArc>,
    /// Commodities.
    pub commodities: Vec<Commodity>,
}

/// Models ready for [`crate::solve_node`].
#[derive(Debug, Clone)]
pub struct McfModels {
    /// Capacity rows and objective.
    pub master: MasterModel,
    /// One block per commodity.
    pub blocks: Vec<BlockModel>,
    /// Path oracle covering every block.
    pub oracle: ShortestPathOracle,
}

impl McfInstance {
    /// Six nodes, twelve unit arcs and four commodities.
    ///
    /// Commodities of demand 2 cannot share a unit arc, so the LP optimum
    /// (12) splits them over several paths.
    pub fn small() -> Self {
        let pairs = [
            (0, 1),
            (0, 2),
            (1, 2),
            (1, 3),
            (1, 5),
            (2, 1),
            (2, 3),
            (2, 5),
            (3, 0),
            (4, 1),
            (4, 2),
            (5, 4),
        ];
        let arcs = pairs
            .iter()
            .map(|&(tail, head)| McfArc {
                tail,
                head,
                weight: 1.0,
                capacity: 1.0,
            })
            .collect();
        let commodities = [(0, 3, 1.0), (1, 2, 2.0), (2, 1, 2.0), (4, 5, 1.0)]
            .iter()
            .map(|&(source, sink, demand)| Commodity { source, sink, demand })
            .collect();
        Self {
            num_nodes: 6,
            arcs,
            commodities,
        }
    }

    /// Number of original variables.
    pub fn num_vars(&self) -> usize {
        self.arcs.len() * self.commodities.len()
    }

    /// Master index of `x[k, a]`.
    pub fn var(&self, commodity: usize, arc: usize) -> usize {
        commodity * self.arcs.len() + arc
    }

    fn check(&self) -> DecompResult<()> {
        if self.commodities.is_empty() || self.arcs.is_empty() {
            return Err(DecompError::InvalidModel(
                "instance needs at least one arc and one commodity".to_string(),
            ));
        }
        for (k, c) in self.commodities.iter().enumerate() {
            if c.source >= self.num_nodes || c.sink >= self.num_nodes || !(c.demand > 0.0) {
                return Err(DecompError::InvalidModel(format!(
                    "commodity {}: bad source/sink/demand ({}, {}, {})",
                    k, c.source, c.sink, c.demand
                )));
            }
        }
        for (a, arc) in self.arcs.iter().enumerate() {
            if arc.weight < 0.0 || arc.capacity < 0.0 {
                return Err(DecompError::InvalidModel(format!(
                    "arc {}: negative weight or capacity",
                    a
                )));
            }
        }
        Ok(())
    }

    /// Build the master, the commodity blocks and the path oracle.
    pub fn build(&self) -> DecompResult<McfModels> {
        self.check()?;
        let num_arcs = self.arcs.len();

        let mut objective = Vec::with_capacity(self.num_vars());
        for c in &self.commodities {
            objective.extend(self.arcs.iter().map(|arc| arc.weight * c.demand));
        }
        let mut master = MasterModel::new(objective);
        for v in 0..master.num_vars() {
            master.set_var_bounds(v, 0.0, 1.0);
        }
        master.set_integer(0..self.num_vars());

        for (a, arc) in self.arcs.iter().enumerate() {
            let coefs = self
                .commodities
                .iter()
                .enumerate()
                .map(|(k, c)| (self.var(k, a), c.demand))
                .collect();
            let name = format!("cap({}_{},{})", a, arc.tail, arc.head);
            master.add_row(Row::le(coefs, arc.capacity).with_name(name))?;
        }

        let mut blocks = Vec::with_capacity(self.commodities.len());
        let mut graphs = Vec::with_capacity(self.commodities.len());
        for (k, c) in self.commodities.iter().enumerate() {
            let active = (0..num_arcs).map(|a| self.var(k, a)).collect();
            let mut block = BlockModel::new(k, format!("comm{}", k), active)?;

            for i in 0..self.num_nodes {
                let coefs: Vec<(usize, f64)> = self
                    .arcs
                    .iter()
                    .enumerate()
                    .filter_map(|(a, arc)| {
                        if arc.head == i {
                            Some((a, 1.0))
                        } else if arc.tail == i {
                            Some((a, -1.0))
                        } else {
                            None
                        }
                    })
                    .collect();
                let rhs = if i == c.source {
                    -1.0
                } else if i == c.sink {
                    1.0
                } else {
                    0.0
                };
                block.push_row(Row::eq(coefs, rhs).with_name(format!("flow({}_{})", k, i)))?;
            }
            for a in 0..num_arcs {
                block.set_col_bounds(a, 0.0, 1.0)?;
            }

            let path_arcs = self
                .arcs
                .iter()
                .map(|arc| PathArc {
                    tail: arc.tail,
                    head: arc.head,
                    cost: arc.weight * c.demand,
                })
                .collect();
            graphs.push(PathBlock::new(self.num_nodes, c.source, c.sink, path_arcs)?);
            blocks.push(block);
        }

        master.validate(&blocks)?;
        Ok(McfModels {
            master,
            blocks,
            oracle: ShortestPathOracle::new(graphs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{PricingOracle, PricingTarget};

    #[test]
    fn test_small_dimensions() {
        let inst = McfInstance::small();
        let models = inst.build().unwrap();
        assert_eq!(models.master.num_vars(), 48);
        assert_eq!(models.master.num_rows(), 12);
        assert_eq!(models.blocks.len(), 4);
        assert_eq!(models.blocks[2].active_columns()[0], 24);
        assert_eq!(models.blocks[2].rows().len(), 6);
        // Objective is weight * demand.
        assert_eq!(models.master.objective[inst.var(1, 3)], 2.0);
        assert_eq!(models.master.rows[4].coefs[1], (inst.var(1, 4), 2.0));
    }

    #[test]
    fn test_initial_columns_follow_cheapest_paths() {
        let models = McfInstance::small().build().unwrap();
        let block = &models.blocks[0];
        let result = models
            .oracle
            .price(block, &models.master.objective, PricingTarget::InitialColumns)
            .unwrap();
        let cols = result.columns();
        assert_eq!(cols.len(), 1);
        // 0 -> 1 -> 3 and 0 -> 2 -> 3 both cost 2; ties go to the earlier arc.
        assert_eq!(cols[0].entries(), &[(0, 1.0), (3, 1.0)]);
        assert!((cols[0].cost() - 2.0).abs() < 1e-12);
        assert!(block.contains(&cols[0], 1e-9));
    }

    #[test]
    fn test_rejects_bad_commodity() {
        let mut inst = McfInstance::small();
        inst.commodities[0].sink = 9;
        assert!(inst.build().is_err());
    }
}
