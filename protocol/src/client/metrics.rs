//! # Client Metrics
//!
//! Prometheus counters for the correlation client. Each client owns its own
//! [`prometheus::Registry`], so several clients in one process (or one test
//! binary) never collide.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

/// Metric handles for one correlation client. Clones share the underlying
/// metrics.
#[derive(Clone)]
pub struct ClientMetrics {
    registry: Registry,
    /// Envelopes written to the node.
    pub requests_sent_total: IntCounter,
    /// Inbound envelopes that completed a pending request.
    pub responses_matched_total: IntCounter,
    /// Inbound envelopes with no pending request, or a bad signature.
    pub responses_dropped_total: IntCounter,
    pub timeouts_total: IntCounter,
    pub cancellations_total: IntCounter,
    /// Current size of the pending table.
    pub pending_requests: IntGauge,
    /// Time from registration to matched response, in seconds.
    pub response_latency_seconds: Histogram,
}

impl ClientMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("docstamp_client".into()), None)?;

        let requests_sent_total =
            IntCounter::new("requests_sent_total", "Envelopes written to the ledger node")?;
        registry.register(Box::new(requests_sent_total.clone()))?;

        let responses_matched_total = IntCounter::new(
            "responses_matched_total",
            "Responses that completed a pending request",
        )?;
        registry.register(Box::new(responses_matched_total.clone()))?;

        let responses_dropped_total = IntCounter::new(
            "responses_dropped_total",
            "Responses dropped as unattributable or unauthenticated",
        )?;
        registry.register(Box::new(responses_dropped_total.clone()))?;

        let timeouts_total =
            IntCounter::new("timeouts_total", "Pending requests that hit their deadline")?;
        registry.register(Box::new(timeouts_total.clone()))?;

        let cancellations_total = IntCounter::new(
            "cancellations_total",
            "Pending requests abandoned by their caller or by shutdown",
        )?;
        registry.register(Box::new(cancellations_total.clone()))?;

        let pending_requests =
            IntGauge::new("pending_requests", "Requests currently awaiting a response")?;
        registry.register(Box::new(pending_requests.clone()))?;

        let response_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "response_latency_seconds",
                "Time from request registration to matched response",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(response_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_sent_total,
            responses_matched_total,
            responses_dropped_total,
            timeouts_total,
            cancellations_total,
            pending_requests,
            response_latency_seconds,
        })
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_prefixed_names() {
        let metrics = ClientMetrics::new().unwrap();
        metrics.requests_sent_total.inc();
        metrics.pending_requests.set(3);
        let text = metrics.encode().unwrap();
        assert!(text.contains("docstamp_client_requests_sent_total 1"));
        assert!(text.contains("docstamp_client_pending_requests 3"));
    }

    #[test]
    fn test_independent_registries() {
        let a = ClientMetrics::new().unwrap();
        let b = ClientMetrics::new().unwrap();
        a.timeouts_total.inc();
        assert_eq!(a.timeouts_total.get(), 1);
        assert_eq!(b.timeouts_total.get(), 0);
    }
}
