use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Counters shared by a controller and its register client.
#[derive(Clone)]
pub struct HandMetrics {
    pub requests: IntCounter,
    pub bytes_rx: IntCounter,
    pub short_reads: IntCounter,
    pub tactile_faults: IntCounter,
    pub transport_errors: IntCounter,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub hand: HandMetrics,
}

fn counter(name: &str, help: &str) -> Result<IntCounter, String> {
    IntCounter::new(name, help).map_err(|e| format!("metrics init error: {e}"))
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let hand = HandMetrics {
            requests: counter("hand_requests_total", "Frames or register requests sent")?,
            bytes_rx: counter("hand_rx_bytes_total", "Serial bytes received")?,
            short_reads: counter("hand_short_reads_total", "Reads that returned fewer values than required")?,
            tactile_faults: counter("hand_tactile_faults_total", "Tactile pads dropped from a frame")?,
            transport_errors: counter("hand_transport_errors_total", "Transport or device exception failures")?,
        };
        for c in [
            &hand.requests,
            &hand.bytes_rx,
            &hand.short_reads,
            &hand.tactile_faults,
            &hand.transport_errors,
        ] {
            let _ = registry.register(Box::new(c.clone()));
        }
        Ok(Self { registry, hand })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
