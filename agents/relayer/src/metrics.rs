use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};
use relay_core::TransactionStatus;

use crate::consumer::MessageOutcome;

const METRICS_NAMESPACE: &str = "relay_consumer";

fn namespaced(name: &str) -> String {
    format!("{METRICS_NAMESPACE}_{name}")
}

/// Consumer loop metrics
#[derive(Debug, Clone)]
pub struct ConsumerMetrics {
    registry: Registry,
    messages_received: IntCounter,
    // label: outcome
    message_outcomes: IntCounterVec,
    // label: status
    settled_transactions: IntCounterVec,
    // unix seconds of the last completed receive cycle
    last_cycle: IntGauge,
}

impl ConsumerMetrics {
    /// Register the consumer metrics with `registry`
    pub fn new(registry: Registry) -> eyre::Result<Self> {
        let messages_received = register_int_counter_with_registry!(
            opts!(
                namespaced("messages_received"),
                "The number of queue messages received",
            ),
            registry.clone()
        )?;
        let message_outcomes = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("message_outcomes"),
                "The number of handled messages by outcome",
            ),
            &["outcome"],
            registry.clone()
        )?;
        let settled_transactions = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("settled_transactions"),
                "The number of transactions settled by this consumer, by store status",
            ),
            &["status"],
            registry.clone()
        )?;
        let last_cycle = register_int_gauge_with_registry!(
            opts!(
                namespaced("last_cycle_timestamp"),
                "The liveness of the consumer loop, expressed as a timestamp since the epoch",
            ),
            registry.clone()
        )?;
        Ok(Self {
            registry,
            messages_received,
            message_outcomes,
            settled_transactions,
            last_cycle,
        })
    }

    /// Metrics registered with a fresh registry
    #[cfg(test)]
    pub fn dummy() -> Self {
        Self::new(Registry::new()).unwrap()
    }

    /// The registry everything is registered with
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn record_received(&self, count: usize) {
        self.messages_received.inc_by(count as u64);
    }

    pub(crate) fn record_outcome(&self, outcome: MessageOutcome) {
        self.message_outcomes
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    pub(crate) fn record_settled(&self, status: TransactionStatus) {
        self.settled_transactions
            .with_label_values(&[status.as_ref()])
            .inc();
    }

    pub(crate) fn record_cycle(&self) {
        self.last_cycle.set(chrono::Utc::now().timestamp());
    }

    #[cfg(test)]
    pub(crate) fn outcome_count(&self, outcome: MessageOutcome) -> u64 {
        self.message_outcomes
            .with_label_values(&[outcome.as_label()])
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_under_namespace() {
        let metrics = ConsumerMetrics::dummy();
        metrics.record_received(2);
        metrics.record_outcome(MessageOutcome::Settled);
        metrics.record_settled(TransactionStatus::Confirmed);

        let body = relay_base::server::encode_metrics(metrics.registry()).unwrap();
        assert!(body.contains("relay_consumer_messages_received 2"), "{body}");
        assert!(
            body.contains(r#"relay_consumer_message_outcomes{outcome="settled"} 1"#),
            "{body}"
        );
        assert!(
            body.contains(r#"relay_consumer_settled_transactions{status="confirmed"} 1"#),
            "{body}"
        );
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Registry::new();
        ConsumerMetrics::new(registry.clone()).unwrap();
        assert!(ConsumerMetrics::new(registry).is_err());
    }
}
