use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::models::{Draw, ParamValue};

/// Candidate values of one parameter and how many may be drawn at once.
///
/// Serialized as `[domain, max_multiplicity]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(Vec<ParamValue>, usize)",
    into = "(Vec<ParamValue>, usize)"
)]
pub struct ParamSpec {
    pub domain: Vec<ParamValue>,
    pub max_multiplicity: usize,
}

impl ParamSpec {
    pub fn new(domain: Vec<ParamValue>, max_multiplicity: usize) -> Self {
        Self {
            domain,
            max_multiplicity,
        }
    }
}

impl From<(Vec<ParamValue>, usize)> for ParamSpec {
    fn from((domain, max_multiplicity): (Vec<ParamValue>, usize)) -> Self {
        Self::new(domain, max_multiplicity)
    }
}

impl From<ParamSpec> for (Vec<ParamValue>, usize) {
    fn from(spec: ParamSpec) -> Self {
        (spec.domain, spec.max_multiplicity)
    }
}

/// How often each value and each multiplicity of a parameter has been drawn.
#[derive(Debug, Clone, Default)]
pub struct UsageCounts {
    values: HashMap<ParamValue, u64>,
    /// Index `k - 1` counts rounds that drew exactly `k` values.
    multiplicities: Vec<u64>,
}

impl UsageCounts {
    fn new(spec: &ParamSpec) -> Self {
        let mut counts = Self {
            values: HashMap::new(),
            multiplicities: vec![0; spec.max_multiplicity],
        };
        counts.register(&spec.domain);
        counts
    }

    fn register(&mut self, values: &[ParamValue]) {
        for value in values {
            self.values.entry(value.clone()).or_insert(0);
        }
    }

    fn record(&mut self, values: &[ParamValue]) {
        match self.multiplicities.get_mut(values.len().wrapping_sub(1)) {
            Some(slot) => *slot += 1,
            None => {
                debug!("ignoring draw of {} values outside multiplicity range", values.len());
                return;
            }
        }
        for value in values {
            *self.values.entry(value.clone()).or_insert(0) += 1;
        }
    }

    /// Times `value` has been drawn; 0 for values never seen.
    pub fn value(&self, value: &ParamValue) -> u64 {
        self.values.get(value).copied().unwrap_or(0)
    }

    /// Rounds that drew exactly `k` values.
    pub fn multiplicity(&self, k: usize) -> u64 {
        k.checked_sub(1)
            .and_then(|i| self.multiplicities.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of individual value draws.
    pub fn total_values(&self) -> u64 {
        self.values.values().sum()
    }

    /// Total number of drawn values as implied by the multiplicity counts.
    pub fn total_by_multiplicity(&self) -> u64 {
        self.multiplicities
            .iter()
            .enumerate()
            .map(|(i, n)| (i as u64 + 1) * n)
            .sum()
    }

    /// Number of rounds in which the parameter was sampled.
    pub fn rounds(&self) -> u64 {
        self.multiplicities.iter().sum()
    }
}

/// The tuning space together with its usage statistics.
#[derive(Debug, Clone, Default)]
pub struct ParameterModel {
    specs: BTreeMap<String, ParamSpec>,
    usage: BTreeMap<String, UsageCounts>,
}

impl ParameterModel {
    /// Build a model with all counters at zero.
    pub fn new(specs: BTreeMap<String, ParamSpec>) -> Result<Self> {
        if let Some((name, _)) = specs.iter().find(|(_, s)| s.max_multiplicity == 0) {
            return Err(TunerError::InvalidSpace(format!(
                "{} must allow at least one value",
                name
            )));
        }

        let usage = specs
            .iter()
            .map(|(name, spec)| (name.clone(), UsageCounts::new(spec)))
            .collect();
        Ok(Self { specs, usage })
    }

    pub fn specs(&self) -> &BTreeMap<String, ParamSpec> {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn usage(&self, name: &str) -> Option<&UsageCounts> {
        self.usage.get(name)
    }

    /// Count the values of one round. Parameters outside the space are ignored.
    pub fn record_draw(&mut self, draw: &Draw) {
        for (name, values) in draw {
            if let Some(counts) = self.usage.get_mut(name) {
                counts.record(values);
            }
        }
    }

    /// Replace the domain of `name`, keeping counts of retained values.
    ///
    /// Repeated values are collapsed, first occurrence wins.
    pub fn replace_domain(&mut self, name: &str, values: Vec<ParamValue>) -> Result<()> {
        let spec = self
            .specs
            .get_mut(name)
            .ok_or_else(|| TunerError::InvalidSpace(format!("unknown parameter {}", name)))?;

        let mut domain: Vec<ParamValue> = Vec::with_capacity(values.len());
        for value in values {
            if !domain.contains(&value) {
                domain.push(value);
            }
        }

        if let Some(counts) = self.usage.get_mut(name) {
            counts.register(&domain);
        }
        spec.domain = domain;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> ParameterModel {
        let mut specs = BTreeMap::new();
        specs.insert(
            "-search".to_string(),
            ParamSpec::new(vec!["bfs".into(), "dfs".into()], 1),
        );
        specs.insert(
            "-sym-arg".to_string(),
            ParamSpec::new(vec![ParamValue::Int(1), ParamValue::Int(2)], 3),
        );
        ParameterModel::new(specs).unwrap()
    }

    #[test]
    fn test_zero_multiplicity_rejected() {
        let mut specs = BTreeMap::new();
        specs.insert("-x".to_string(), ParamSpec::new(vec![], 0));
        assert!(ParameterModel::new(specs).is_err());
    }

    #[test]
    fn test_record_draw_counts_values_and_multiplicity() {
        let mut model = sample_model();
        let mut draw = Draw::new();
        draw.insert(
            "-sym-arg".to_string(),
            vec![ParamValue::Int(1), ParamValue::Int(1), ParamValue::Int(2)],
        );
        draw.insert("-unknown".to_string(), vec!["x".into()]);
        model.record_draw(&draw);

        let usage = model.usage("-sym-arg").unwrap();
        assert_eq!(usage.value(&ParamValue::Int(1)), 2);
        assert_eq!(usage.value(&ParamValue::Int(2)), 1);
        assert_eq!(usage.multiplicity(3), 1);
        assert_eq!(usage.multiplicity(1), 0);
        assert_eq!(usage.rounds(), 1);
        assert!(model.usage("-unknown").is_none());
    }

    #[test]
    fn test_counter_conservation() {
        let mut model = sample_model();
        let draws = [
            vec![ParamValue::Int(1)],
            vec![ParamValue::Int(2), ParamValue::Int(2)],
            vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(1)],
        ];
        for values in draws {
            let mut draw = Draw::new();
            draw.insert("-sym-arg".to_string(), values);
            model.record_draw(&draw);
        }
        let usage = model.usage("-sym-arg").unwrap();
        assert_eq!(usage.total_values(), 6);
        assert_eq!(usage.total_values(), usage.total_by_multiplicity());
        assert_eq!(usage.rounds(), 3);
    }

    #[test]
    fn test_replace_domain_keeps_retained_counts() {
        let mut model = sample_model();
        for value in ["bfs", "dfs"] {
            let mut draw = Draw::new();
            draw.insert("-search".to_string(), vec![value.into()]);
            model.record_draw(&draw);
        }

        model
            .replace_domain("-search", vec!["bfs".into(), "nurs:md2u".into(), "bfs".into()])
            .unwrap();

        let spec = model.spec("-search").unwrap();
        assert_eq!(spec.domain, vec![ParamValue::text("bfs"), ParamValue::text("nurs:md2u")]);
        let usage = model.usage("-search").unwrap();
        assert_eq!(usage.value(&"bfs".into()), 1);
        assert_eq!(usage.value(&"nurs:md2u".into()), 0);
        // retired values keep their history
        assert_eq!(usage.value(&"dfs".into()), 1);
        assert_eq!(usage.total_values(), usage.total_by_multiplicity());
    }

    #[test]
    fn test_replace_unknown_domain_fails() {
        let mut model = sample_model();
        assert!(model.replace_domain("-nope", vec![]).is_err());
    }
}
