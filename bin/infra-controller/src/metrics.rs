//! Prometheus metrics for reconcile passes

use anyhow::Result;
use infra_api::common::BindingPhase;
use prometheus::{CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics collector for the controllers
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Reconcile passes by kind and result
    pub reconcile_total: CounterVec,
    /// Failed passes by kind and error reason
    pub reconcile_errors_total: CounterVec,
    /// Duration of reconcile passes in seconds
    pub reconcile_duration_seconds: HistogramVec,
    /// Binding phase changes by kind and new phase
    pub binding_transitions_total: CounterVec,
    pub registry: Arc<Registry>,
}

impl ControllerMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let reconcile_total = CounterVec::new(
            Opts::new("reconcile_total", "Total reconcile passes"),
            &["kind", "result"],
        )?;

        let reconcile_errors_total = CounterVec::new(
            Opts::new("reconcile_errors_total", "Total failed reconcile passes by reason"),
            &["kind", "reason"],
        )?;

        let reconcile_duration_seconds = HistogramVec::new(
            Opts::new(
                "reconcile_duration_seconds",
                "Reconcile pass latency in seconds",
            )
            .into(),
            &["kind"],
        )?;

        let binding_transitions_total = CounterVec::new(
            Opts::new("binding_transitions_total", "Total binding phase transitions"),
            &["kind", "phase"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;
        registry.register(Box::new(binding_transitions_total.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_errors_total,
            reconcile_duration_seconds,
            binding_transitions_total,
            registry,
        })
    }

    pub fn record_result(&self, kind: &str, result: &str) {
        self.reconcile_total.with_label_values(&[kind, result]).inc();
    }

    pub fn record_error(&self, kind: &str, reason: &str) {
        self.reconcile_errors_total
            .with_label_values(&[kind, reason])
            .inc();
    }

    /// Count a binding phase change; no-op when the phase is unchanged
    pub fn record_transition(&self, kind: &str, from: BindingPhase, to: BindingPhase) {
        if from != to {
            self.binding_transitions_total
                .with_label_values(&[kind, &to.to_string()])
                .inc();
        }
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_exported() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.record_result("AKSCluster", "synced");
        metrics.record_error("AKSCluster", "NoMatchingReference");
        metrics.record_transition("AKSCluster", BindingPhase::Unbound, BindingPhase::Bound);
        metrics
            .reconcile_duration_seconds
            .with_label_values(&["AKSCluster"])
            .observe(0.25);

        let output = metrics.gather().unwrap();
        assert!(output.contains(r#"reconcile_total{kind="AKSCluster",result="synced"} 1"#));
        assert!(output.contains(
            r#"reconcile_errors_total{kind="AKSCluster",reason="NoMatchingReference"} 1"#
        ));
        assert!(output.contains(r#"binding_transitions_total{kind="AKSCluster",phase="Bound"} 1"#));
        assert!(output.contains("reconcile_duration_seconds_count"));
    }

    #[test]
    fn test_unchanged_phase_is_not_a_transition() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.record_transition("Subnet", BindingPhase::Bound, BindingPhase::Bound);

        let output = metrics.gather().unwrap();
        assert!(!output.contains("binding_transitions_total{"));
    }
}
