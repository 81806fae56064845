//! Metric merging
//!
//! Per metric name: sum the latest value across the children that
//! reported it, then divide by the number of children that were
//! *queried*. A child that failed to report still depresses the
//! average; that matches the behavior callers observe today and is
//! deliberately not "fixed" here (see DESIGN.md). A metric reported by
//! zero children is omitted from the output entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Latest value of one metric as reported by one child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub latest: f64,
    pub unit: Option<String>,
}

/// One metric after aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    /// Sum of reported values divided by the queried-child count
    pub average: f64,

    /// Unit taken from the first reporting child
    pub unit: Option<String>,

    /// How many children actually reported this metric
    pub reporters: usize,
}

/// Rollup result across all children of one parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedStats {
    /// Aggregated metrics keyed by name; empty when nothing reported
    pub metrics: BTreeMap<String, AggregatedMetric>,

    /// Children a metric query was dispatched to (the denominator)
    pub children_queried: usize,

    /// Children that returned at least one sample
    pub children_reported: usize,

    /// When the rollup was computed
    pub captured_at: DateTime<Utc>,
}

/// Merge per-child samples into one aggregated result
///
/// `per_child` holds one entry per child that reported successfully;
/// `children_queried` is the number of dispatched queries and is used
/// as the denominator for every metric.
pub fn aggregate(
    per_child: &HashMap<String, Vec<MetricSample>>,
    children_queried: usize,
) -> AggregatedStats {
    let mut sums: BTreeMap<String, (f64, usize, Option<String>)> = BTreeMap::new();
    for samples in per_child.values() {
        for sample in samples {
            let entry = sums
                .entry(sample.name.clone())
                .or_insert((0.0, 0, sample.unit.clone()));
            entry.0 += sample.latest;
            entry.1 += 1;
        }
    }

    let metrics = sums
        .into_iter()
        .filter(|(_, (_, reporters, _))| *reporters > 0)
        .map(|(name, (sum, reporters, unit))| {
            (
                name,
                AggregatedMetric {
                    average: sum / children_queried as f64,
                    unit,
                    reporters,
                },
            )
        })
        .collect();

    AggregatedStats {
        metrics,
        children_queried,
        children_reported: per_child.len(),
        captured_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, latest: f64) -> MetricSample {
        MetricSample {
            name: name.to_string(),
            latest,
            unit: Some("percent".to_string()),
        }
    }

    #[test]
    fn test_average_divides_by_queried_count() {
        let mut per_child = HashMap::new();
        per_child.insert("/vms/a".to_string(), vec![sample("cpu", 30.0)]);
        per_child.insert("/vms/b".to_string(), vec![sample("cpu", 60.0)]);
        // third child was queried but reported nothing

        let stats = aggregate(&per_child, 3);
        let cpu = &stats.metrics["cpu"];
        assert_eq!(cpu.average, 30.0); // (30 + 60) / 3, not / 2
        assert_eq!(cpu.reporters, 2);
        assert_eq!(stats.children_queried, 3);
        assert_eq!(stats.children_reported, 2);
    }

    #[test]
    fn test_unreported_metric_is_omitted() {
        let mut per_child = HashMap::new();
        per_child.insert("/vms/a".to_string(), vec![sample("cpu", 10.0)]);

        let stats = aggregate(&per_child, 1);
        assert!(stats.metrics.contains_key("cpu"));
        assert!(!stats.metrics.contains_key("memory"));
    }

    #[test]
    fn test_empty_child_set() {
        let stats = aggregate(&HashMap::new(), 0);
        assert!(stats.metrics.is_empty());
        assert_eq!(stats.children_queried, 0);
    }

    #[test]
    fn test_unit_metadata_carried() {
        let mut per_child = HashMap::new();
        per_child.insert("/vms/a".to_string(), vec![sample("cpu", 50.0)]);

        let stats = aggregate(&per_child, 1);
        assert_eq!(stats.metrics["cpu"].unit.as_deref(), Some("percent"));
    }

    #[test]
    fn test_multiple_metrics_per_child() {
        let mut per_child = HashMap::new();
        per_child.insert(
            "/vms/a".to_string(),
            vec![
                sample("cpu", 40.0),
                MetricSample {
                    name: "memory".to_string(),
                    latest: 2048.0,
                    unit: Some("mb".to_string()),
                },
            ],
        );
        per_child.insert("/vms/b".to_string(), vec![sample("cpu", 20.0)]);

        let stats = aggregate(&per_child, 2);
        assert_eq!(stats.metrics["cpu"].average, 30.0);
        assert_eq!(stats.metrics["memory"].average, 1024.0);
        assert_eq!(stats.metrics["memory"].reporters, 1);
    }
}
