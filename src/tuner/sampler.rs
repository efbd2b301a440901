use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::models::{Draw, ParamSetting, ParamValue, Parameters};
use crate::space::ParameterModel;
use crate::tuner::cover::extract_core;
use crate::tuner::history::ObservationLog;

/// Weight given to values (and multiplicities) that were never drawn.
pub const UNEXPLORED_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Prefer values that were drawn least.
    Explore,
    /// Prefer values that took part in core configurations.
    Exploit,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Explore => write!(f, "explore"),
            Policy::Exploit => write!(f, "exploit"),
        }
    }
}

/// Sampling probabilities of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDistribution {
    /// One entry per domain value, in domain order.
    pub values: Vec<f64>,
    /// Entry `k - 1` is the probability of drawing `k` values.
    pub multiplicities: Vec<f64>,
}

/// Scale weights to sum to one. All-zero (or empty-sum) weights become uniform.
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        let n = weights.len() as f64;
        return weights.iter().map(|_| 1.0 / n).collect();
    }
    weights.iter().map(|w| w / total).collect()
}

fn inverse_usage(count: u64) -> f64 {
    if count > 0 {
        1.0 / count as f64
    } else {
        UNEXPLORED_WEIGHT
    }
}

/// Raw explore weights: inverse usage, with a boost for untried options.
pub fn explore_weights(model: &ParameterModel) -> BTreeMap<String, ParamDistribution> {
    model
        .specs()
        .iter()
        .filter_map(|(name, spec)| {
            let usage = model.usage(name)?;
            let values = spec
                .domain
                .iter()
                .map(|v| inverse_usage(usage.value(v)))
                .collect();
            let multiplicities = (1..=spec.max_multiplicity)
                .map(|k| inverse_usage(usage.multiplicity(k)))
                .collect();
            Some((
                name.clone(),
                ParamDistribution {
                    values,
                    multiplicities,
                },
            ))
        })
        .collect()
}

/// How often values and multiplicities appear among core draws.
#[derive(Debug, Default)]
struct CoreCounts<'a> {
    values: HashMap<&'a ParamValue, u64>,
    multiplicities: HashMap<usize, u64>,
}

fn count_core<'a>(
    model: &ParameterModel,
    core: &[&'a Draw],
) -> HashMap<&'a str, CoreCounts<'a>> {
    let mut counts: HashMap<&str, CoreCounts> = HashMap::new();
    for &draw in core {
        for (name, values) in draw {
            if !model.contains(name) {
                continue;
            }
            let entry = counts.entry(name.as_str()).or_default();
            *entry.multiplicities.entry(values.len()).or_insert(0) += 1;
            for value in values {
                *entry.values.entry(value).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Raw exploit weights: share of each option's uses that ended up in a core
/// configuration.
///
/// A value tried but never part of the core gets zero; an untried value gets
/// [`UNEXPLORED_WEIGHT`]. An untried multiplicity gets zero.
pub fn exploit_weights(
    model: &ParameterModel,
    history: &ObservationLog,
) -> BTreeMap<String, ParamDistribution> {
    let core = extract_core(history.observations());
    let core_counts = count_core(model, &core);
    let empty = CoreCounts::default();

    model
        .specs()
        .iter()
        .filter_map(|(name, spec)| {
            let usage = model.usage(name)?;
            let in_core = core_counts.get(name.as_str()).unwrap_or(&empty);

            let values = spec
                .domain
                .iter()
                .map(|v| {
                    let overall = usage.value(v);
                    if overall > 0 {
                        let hits = in_core.values.get(v).copied().unwrap_or(0);
                        hits as f64 / overall as f64
                    } else {
                        UNEXPLORED_WEIGHT
                    }
                })
                .collect();

            let multiplicities = (1..=spec.max_multiplicity)
                .map(|k| {
                    let overall = usage.multiplicity(k);
                    if overall > 0 {
                        let hits = in_core.multiplicities.get(&k).copied().unwrap_or(0);
                        hits as f64 / overall as f64
                    } else {
                        0.0
                    }
                })
                .collect();

            Some((
                name.clone(),
                ParamDistribution {
                    values,
                    multiplicities,
                },
            ))
        })
        .collect()
}

/// Normalized distributions of every parameter under `policy`.
pub fn distributions(
    policy: Policy,
    model: &ParameterModel,
    history: &ObservationLog,
) -> BTreeMap<String, ParamDistribution> {
    let raw = match policy {
        Policy::Explore => explore_weights(model),
        Policy::Exploit => exploit_weights(model, history),
    };
    raw.into_iter()
        .map(|(name, d)| {
            (
                name,
                ParamDistribution {
                    values: normalize(&d.values),
                    multiplicities: normalize(&d.multiplicities),
                },
            )
        })
        .collect()
}

fn pick_index(rng: &mut impl Rng, probabilities: &[f64]) -> usize {
    match WeightedIndex::new(probabilities) {
        Ok(index) => index.sample(rng),
        Err(_) => rng.gen_range(0..probabilities.len()),
    }
}

/// One round's configuration.
#[derive(Debug, Clone)]
pub struct Sample {
    pub policy: Policy,
    /// Values drawn from the tuning space.
    pub draw: Draw,
    /// Defaults overridden by the draw.
    pub parameters: Parameters,
}

/// Draws configurations from the tuning space.
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Probability of exploiting when no policy is forced.
    pub exploit_portion: f64,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            exploit_portion: 0.7,
        }
    }
}

impl Sampler {
    pub fn new(exploit_portion: f64) -> Self {
        Self {
            exploit_portion: exploit_portion.clamp(0.0, 1.0),
        }
    }

    pub fn choose_policy(&self, rng: &mut impl Rng) -> Policy {
        if rng.gen_bool(self.exploit_portion.clamp(0.0, 1.0)) {
            Policy::Exploit
        } else {
            Policy::Explore
        }
    }

    /// Draw a configuration. A coin flip picks the policy when none is given.
    ///
    /// Parameters with an empty domain are left to the defaults.
    pub fn sample(
        &self,
        rng: &mut impl Rng,
        policy: Option<Policy>,
        model: &ParameterModel,
        defaults: &Parameters,
        history: &ObservationLog,
    ) -> Sample {
        let policy = policy.unwrap_or_else(|| self.choose_policy(rng));
        let distributions = distributions(policy, model, history);

        let mut draw = Draw::new();
        for (name, spec) in model.specs() {
            if spec.domain.is_empty() {
                continue;
            }
            let Some(dist) = distributions.get(name) else {
                continue;
            };

            let k = pick_index(rng, &dist.multiplicities) + 1;
            let values = (0..k)
                .map(|_| spec.domain[pick_index(rng, &dist.values)].clone())
                .collect();
            draw.insert(name.clone(), values);
        }

        let mut parameters = defaults.clone();
        for (name, values) in &draw {
            parameters.insert(name.clone(), ParamSetting::Many(values.clone()));
        }

        Sample {
            policy,
            draw,
            parameters,
        }
    }
}
