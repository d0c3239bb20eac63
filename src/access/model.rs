use std::sync::Arc;

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::access::{DecayFunction, RoadNetwork, Scenario};
use crate::access::network::NODES_LAYER;
use crate::error::{Result, ResultExt};
use crate::store::{AttributeStore, ColumnType, UpsertPolicy, Value};

/// Parameters of the two-step floating catchment model.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AccessibilityConfig {
    /// Catchment size, in edge length units.
    pub d0: f64,
    /// Name of the decay function.
    pub decay: String,
    /// Node attribute holding the demand (population).
    pub demand_field: String,
    /// Threads for the per-node searches; defaults to the core count.
    pub threads: Option<usize>,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self { d0: 1000.0, decay: "Gaussian".to_string(), demand_field: "allPopulation".to_string(), threads: None }
    }
}

/// Supply ratios and accessibility of one run, keyed by node index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scores {
    pub supply_ratios: Vec<(usize, f64)>,
    pub accessibility: Vec<(usize, f64)>,
}

/// Two-step floating catchment accessibility over a road network.
pub struct AccessibilityModel {
    d0: f64,
    decay: DecayFunction,
    pool: Arc<ThreadPool>,
}

impl AccessibilityModel {
    /// Fails with a configuration error on an unknown decay name.
    pub fn new(config: &AccessibilityConfig, pool: Arc<ThreadPool>) -> Result<Self> {
        let decay = config.decay.parse::<DecayFunction>()?;
        if !(config.d0.is_finite() && config.d0 > 0.0) {
            return Err(crate::Error::configuration(format!("catchment size must be positive, got {}", config.d0)))
        }
        Ok(Self { d0: config.d0, decay, pool })
    }

    #[inline] pub fn d0(&self) -> f64 { self.d0 }
    #[inline] pub fn decay(&self) -> DecayFunction { self.decay }

    /// `R(s) = capacity(s) / Σ demand(d) · decay(dist(s, d))` over nodes reachable
    /// from `s` within `d0`, for every supply node. A zero denominator gives 0.
    pub fn supply_ratios(&self, network: &RoadNetwork) -> Result<Vec<(usize, f64)>> {
        let supply = network.supply_nodes().collect::<Vec<_>>();
        let graph = network.graph();
        self.pool.install(|| {
            supply.par_iter().map(|&s| {
                let reach = graph.distances_within(s, self.d0)?;
                let weighted_demand: f64 = reach.iter()
                    .map(|&(d, dist)| network.demand(d) * self.decay.weight(dist, self.d0))
                    .sum();
                let capacity = network.capacity(s).unwrap_or(0.0);
                let ratio = if weighted_demand > 0.0 { capacity / weighted_demand } else { 0.0 };
                Ok::<_, crate::Error>((s, ratio))
            }).collect()
        })
    }

    /// `A(d) = Σ R(s) · decay(dist(d, s))` over supply nodes that reach `d` within
    /// `d0`, for every node with non-zero demand.
    pub fn accessibility(&self, network: &RoadNetwork, ratios: &[(usize, f64)]) -> Result<Vec<(usize, f64)>> {
        let mut ratio_of = vec![None; network.len()];
        for &(s, r) in ratios { ratio_of[s] = Some(r) }

        let reverse = network.graph().reversed();
        let demand = network.demand_nodes().collect::<Vec<_>>();
        self.pool.install(|| {
            demand.par_iter().map(|&d| {
                let access: f64 = reverse.distances_within(d, self.d0)?
                    .into_iter()
                    .filter_map(|(s, dist)| ratio_of[s].map(|r| r * self.decay.weight(dist, self.d0)))
                    .sum();
                Ok::<_, crate::Error>((d, access))
            }).collect()
        })
    }

    pub fn run(&self, network: &RoadNetwork) -> Result<Scores> {
        let supply_ratios = self.supply_ratios(network).context("computing supply ratios")?;
        let accessibility = self.accessibility(network, &supply_ratios).context("computing accessibility")?;
        Ok(Scores { supply_ratios, accessibility })
    }

    /// Write `R_<suffix>` and `A_<suffix>` onto the nodes layer.
    pub fn persist(&self, store: &dyn AttributeStore, network: &RoadNetwork, scores: &Scores, scenario: &Scenario) -> Result<()> {
        for (prefix, values) in [("R", &scores.supply_ratios), ("A", &scores.accessibility)] {
            let column = format!("{prefix}_{}", scenario.suffix());
            store.ensure_column(NODES_LAYER, &column, ColumnType::Real, None, false)?;
            let rows = values.iter().map(|&(i, v)| (network.fid(i), Value::Real(v))).collect::<Vec<_>>();
            let written = store.bulk_upsert(NODES_LAYER, &column, &rows, UpsertPolicy::Overwrite)?;
            log::debug!("wrote {written} values to {NODES_LAYER}.{column}");
        }
        Ok(())
    }
}
