/*
[INPUT]:  Host environment signals (network reachability, wall-clock jumps, manual notifications)
[OUTPUT]: ExternalTrigger broadcasts consumed by the stream runtime
[POS]:    Stream layer - external recovery triggers
[UPDATE]: When adding trigger kinds or detection strategies
*/

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const TRIGGER_CAPACITY: usize = 16;

/// Environment signals that may bypass the reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalTrigger {
    /// The host resumed after being suspended or hidden.
    VisibilityRegained,
    ConnectivityRegained,
    ConnectivityLost,
}

pub trait TriggerSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ExternalTrigger>;
}

/// Fan-in point for trigger producers.
#[derive(Debug, Clone)]
pub struct TriggerHub {
    tx: broadcast::Sender<ExternalTrigger>,
}

impl TriggerHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TRIGGER_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self, trigger: ExternalTrigger) {
        if self.tx.send(trigger).is_err() {
            debug!(?trigger, "trigger dropped: no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for TriggerHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerSource for TriggerHub {
    fn subscribe(&self) -> broadcast::Receiver<ExternalTrigger> {
        self.tx.subscribe()
    }
}

/// Polls TCP reachability of the stream host and reports transitions.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    target: String,
    interval: Duration,
    timeout: Duration,
    failures_before_offline: u32,
}

impl ConnectivityProbe {
    pub fn new(target: impl Into<String>, interval: Duration) -> Self {
        Self {
            target: target.into(),
            interval,
            timeout: Duration::from_secs(3),
            failures_before_offline: 2,
        }
    }

    /// Probe the `host:port` behind a `ws://` or `wss://` URL.
    pub fn for_url(url: &str, interval: Duration) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{host}:{port}"), interval))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Consecutive failed probes needed before reporting offline.
    pub fn with_failures_before_offline(mut self, failures: u32) -> Self {
        self.failures_before_offline = failures.max(1);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn probe(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await,
            Ok(Ok(_))
        )
    }

    /// Run until `shutdown` fires. The first result only sets the baseline.
    pub fn spawn(self, hub: TriggerHub, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            let mut online: Option<bool> = None;
            let mut failures = 0u32;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let reachable = self.probe().await;
                if reachable {
                    failures = 0;
                } else {
                    failures = failures.saturating_add(1);
                    if failures < self.failures_before_offline && online != Some(false) {
                        continue;
                    }
                }

                match online {
                    Some(previous) if previous == reachable => {}
                    Some(_) if reachable => {
                        info!(host = %self.target, "stream host reachable again");
                        hub.notify(ExternalTrigger::ConnectivityRegained);
                    }
                    Some(_) => {
                        warn!(host = %self.target, "stream host unreachable");
                        hub.notify(ExternalTrigger::ConnectivityLost);
                    }
                    None => debug!(host = %self.target, reachable, "connectivity baseline"),
                }
                online = Some(reachable);
            }
            debug!(host = %self.target, "connectivity probe stopped");
        })
    }
}

/// Detects host suspension by watching the wall clock jump past the tick.
#[derive(Debug, Clone)]
pub struct SuspendDetector {
    tick: Duration,
    threshold: Duration,
}

impl SuspendDetector {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            threshold: tick.max(Duration::from_secs(2)),
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Whether a gap between two wall-clock readings means the host slept.
    pub fn is_resume(&self, gap: chrono::TimeDelta) -> bool {
        gap.to_std()
            .map(|gap| gap > self.tick + self.threshold)
            .unwrap_or(false)
    }

    pub fn spawn(self, hub: TriggerHub, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last = chrono::Utc::now();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.tick) => {}
                }

                let now = chrono::Utc::now();
                let gap = now - last;
                if self.is_resume(gap) {
                    info!(gap_ms = gap.num_milliseconds(), "host resumed from suspend");
                    hub.notify(ExternalTrigger::VisibilityRegained);
                }
                last = now;
            }
            debug!("suspend detector stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn hub_fans_out_to_every_subscriber() {
        let hub = TriggerHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.notify(ExternalTrigger::VisibilityRegained);
        assert_eq!(first.recv().await.unwrap(), ExternalTrigger::VisibilityRegained);
        assert_eq!(second.recv().await.unwrap(), ExternalTrigger::VisibilityRegained);

        drop(first);
        drop(second);
        assert_eq!(hub.subscriber_count(), 0);
        hub.notify(ExternalTrigger::ConnectivityLost);
    }

    #[test]
    fn probe_target_uses_scheme_default_port() {
        let probe = ConnectivityProbe::for_url("wss://engine.example.com/ws", Duration::from_secs(5));
        assert_eq!(probe.unwrap().target(), "engine.example.com:443");

        let probe = ConnectivityProbe::for_url("ws://localhost:8765", Duration::from_secs(5));
        assert_eq!(probe.unwrap().target(), "localhost:8765");

        assert!(ConnectivityProbe::for_url("not a url", Duration::from_secs(5)).is_none());
    }

    #[tokio::test]
    async fn probe_reports_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = ConnectivityProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.probe().await);

        drop(listener);
        let probe = ConnectivityProbe::new("127.0.0.1:1", Duration::from_secs(1))
            .with_timeout(Duration::from_millis(500));
        assert!(!probe.probe().await);
    }

    #[tokio::test]
    async fn probe_emits_lost_then_regained_on_transitions_only() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = TriggerHub::new();
        let mut rx = hub.subscribe();
        let shutdown = CancellationToken::new();

        let task = ConnectivityProbe::new(addr.to_string(), Duration::from_millis(20))
            .with_timeout(Duration::from_millis(200))
            .with_failures_before_offline(1)
            .spawn(hub.clone(), shutdown.clone());

        // Let the baseline (online) settle, then take the host away.
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(listener);
        let lost = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lost, ExternalTrigger::ConnectivityLost);

        let _listener = TcpListener::bind(addr).await.unwrap();
        let regained = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(regained, ExternalTrigger::ConnectivityRegained);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[test]
    fn suspend_gap_detection() {
        let detector = SuspendDetector::new(Duration::from_secs(5));
        assert!(!detector.is_resume(chrono::TimeDelta::seconds(5)));
        assert!(!detector.is_resume(chrono::TimeDelta::seconds(9)));
        assert!(detector.is_resume(chrono::TimeDelta::seconds(11)));
        // Clock stepped backwards.
        assert!(!detector.is_resume(chrono::TimeDelta::seconds(-30)));
    }

    #[tokio::test]
    async fn suspend_detector_reports_clock_gap_as_visibility_regained() {
        let hub = TriggerHub::new();
        let mut triggers = hub.subscribe();
        let shutdown = CancellationToken::new();
        let task = SuspendDetector::new(Duration::from_millis(20))
            .with_threshold(Duration::from_millis(100))
            .spawn(hub.clone(), shutdown.clone());

        // Let a few regular ticks pass, then stall the runtime thread.
        tokio::time::sleep(Duration::from_millis(60)).await;
        std::thread::sleep(Duration::from_millis(500));

        let trigger = tokio::time::timeout(Duration::from_secs(2), triggers.recv())
            .await
            .expect("resume reported")
            .unwrap();
        assert_eq!(trigger, ExternalTrigger::VisibilityRegained);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn suspend_detector_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let task = SuspendDetector::new(Duration::from_millis(10)).spawn(TriggerHub::new(), shutdown.clone());
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
