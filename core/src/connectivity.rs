//! Backend reachability probe with a cached result.
//!
//! # Design
//! Probing before every request would flood a backend that is already down,
//! so probes are gated: while one is in flight, or within `probe_interval`
//! of the last completed probe, callers get the cached answer. Concurrent
//! callers collapse into the in-flight probe through a compare-exchange on
//! `in_progress`; the flag is released by a guard on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{cache_busted, no_cache_headers, HttpMethod, HttpRequest};
use crate::transport::Transport;

pub const HEALTH_ENDPOINT: &str = "/healthcheck";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub available: bool,
    /// When the last probe completed; `None` until the first probe.
    pub last_checked_at: Option<Instant>,
}

pub struct ConnectivityProber {
    transport: Arc<dyn Transport>,
    health_url: String,
    timeout: Duration,
    max_response_bytes: u64,
    interval: Duration,
    state: Mutex<ConnectivityState>,
    in_progress: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ConnectivityProber {
    /// The backend is assumed reachable until a probe or request says otherwise.
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            health_url: format!("{}{HEALTH_ENDPOINT}", config.base_url),
            timeout: config.health_timeout,
            max_response_bytes: config.max_response_bytes,
            interval: config.probe_interval,
            state: Mutex::new(ConnectivityState {
                available: true,
                last_checked_at: None,
            }),
            in_progress: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, ConnectivityState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ConnectivityState {
        *self.state()
    }

    /// Last known state; never touches the network.
    pub fn is_available(&self) -> bool {
        self.state().available
    }

    pub fn is_probing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Record an observation made outside a probe. The probe window is left as is.
    pub fn mark_available(&self, available: bool) {
        let mut state = self.state();
        if state.available != available {
            log_transition(available);
        }
        state.available = available;
    }

    /// Probe the health endpoint unless a probe is running or ran recently.
    pub fn check_connection(&self) -> bool {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("connectivity probe already in flight, using cached state");
            return self.is_available();
        }
        let _in_flight = InFlight(&self.in_progress);

        {
            let state = self.state();
            if let Some(at) = state.last_checked_at {
                if at.elapsed() < self.interval {
                    return state.available;
                }
            }
        }

        let request = HttpRequest {
            method: HttpMethod::Get,
            url: cache_busted(&self.health_url),
            headers: no_cache_headers(),
            body: None,
            timeout: self.timeout,
            max_response_bytes: self.max_response_bytes,
        };

        let available = match self.transport.execute(&request) {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                debug!(status = response.status, "health check returned non-success status");
                false
            }
            // The backend answered; only its body was unusable.
            Err(TransportError::UnreadableBody { status, .. }) if (200..300).contains(&status) => {
                true
            }
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        };

        let mut state = self.state();
        if state.available != available {
            log_transition(available);
        }
        *state = ConnectivityState {
            available,
            last_checked_at: Some(Instant::now()),
        };
        available
    }
}

fn log_transition(available: bool) {
    if available {
        info!("backend is reachable again");
    } else {
        warn!("backend marked unreachable");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::http::HttpResponse;
    use crate::transport::scripted::ScriptedTransport;

    fn prober(transport: Arc<ScriptedTransport>, interval: Duration) -> ConnectivityProber {
        let config = ClientConfig::for_base_url("http://backend/api").with_probe_interval(interval);
        ConnectivityProber::new(transport, &config)
    }

    #[test]
    fn starts_available_without_probing() {
        let transport = Arc::new(ScriptedTransport::new());
        let prober = prober(transport.clone(), Duration::from_secs(2));
        assert!(prober.is_available());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn probe_hits_health_endpoint_without_caching() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, r#"{"status":"ok"}"#);
        let prober = prober(transport.clone(), Duration::from_secs(2));

        assert!(prober.check_connection());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert!(requests[0].url.starts_with("http://backend/api/healthcheck?_t="));
        assert_eq!(
            requests[0].header("cache-control"),
            Some("no-cache, no-store, must-revalidate")
        );
        assert_eq!(requests[0].timeout, Duration::from_millis(3_000));
    }

    #[test]
    fn two_checks_inside_interval_issue_one_call() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(500, "{}").push_json(200, "{}");
        let prober = prober(transport.clone(), Duration::from_secs(2));

        assert!(!prober.check_connection());
        assert!(!prober.check_connection());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn check_after_interval_probes_again() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(500, "{}").push_json(200, "{}");
        let prober = prober(transport.clone(), Duration::ZERO);

        assert!(!prober.check_connection());
        assert!(prober.check_connection());
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn transport_error_marks_unavailable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(TransportError::Timeout(Duration::from_millis(3_000))));
        let prober = prober(transport.clone(), Duration::from_secs(2));

        assert!(!prober.check_connection());
        assert!(!prober.is_available());
        assert!(!prober.is_probing());
        assert!(prober.snapshot().last_checked_at.is_some());
    }

    #[test]
    fn successful_status_with_unreadable_body_counts_as_reachable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(TransportError::UnreadableBody {
            status: 200,
            detail: "the response body is larger than request limit".to_string(),
        }));
        let prober = prober(transport.clone(), Duration::from_secs(2));

        assert!(prober.check_connection());
        assert!(prober.is_available());
    }

    #[test]
    fn mark_available_keeps_probe_window() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(503, "{}");
        let prober = prober(transport.clone(), Duration::from_secs(2));

        assert!(!prober.check_connection());
        prober.mark_available(true);
        assert!(prober.check_connection());
        assert_eq!(transport.calls(), 1);
    }

    /// Blocks inside `execute` until released, to hold a probe in flight.
    struct GatedTransport {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Transport for GatedTransport {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(HttpResponse {
                status: 503,
                headers: Vec::new(),
                body: String::new(),
            })
        }
    }

    #[test]
    fn concurrent_check_collapses_into_in_flight_probe() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let transport = Arc::new(GatedTransport {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let config = ClientConfig::for_base_url("http://backend/api");
        let prober = Arc::new(ConnectivityProber::new(transport, &config));

        let background = {
            let prober = prober.clone();
            thread::spawn(move || prober.check_connection())
        };
        entered_rx.recv().unwrap();

        assert!(prober.is_probing());
        // Returns the cached optimistic state while the real probe is blocked.
        assert!(prober.check_connection());

        release_tx.send(()).unwrap();
        assert!(!background.join().unwrap());
        assert!(!prober.is_probing());
        assert!(!prober.is_available());
    }
}
