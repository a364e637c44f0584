// ABOUTME: Server-Sent Events transport for demo streams
// ABOUTME: Per-IP connection limits with RAII release, keep-alive and DemoEvent framing

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::stream::{Stream, StreamExt};
use pmstation_config::{constants, env};
use pmstation_workflow::{DemoEvent, DemoEventStream};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Error returned when SSE connection limit is exceeded
#[derive(Debug)]
pub struct SseConnectionLimitExceeded;

/// Tracks concurrent SSE connections per IP address
#[derive(Clone)]
pub struct SseConnectionTracker {
    connections: Arc<Mutex<HashMap<IpAddr, usize>>>,
    max_connections_per_ip: usize,
}

impl Default for SseConnectionTracker {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SseConnectionTracker {
    pub fn new(max_connections_per_ip: usize) -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            max_connections_per_ip,
        }
    }

    /// Limit from `PMSTATION_SSE_MAX_CONNECTIONS_PER_IP`, valid range 1..=100
    pub fn from_env() -> Self {
        Self::new(env::parse_env_in_range(
            constants::PMSTATION_SSE_MAX_CONNECTIONS_PER_IP,
            constants::DEFAULT_SSE_MAX_CONNECTIONS_PER_IP,
            1,
            100,
        ))
    }

    pub fn max_connections_per_ip(&self) -> usize {
        self.max_connections_per_ip
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, usize>> {
        self.connections.lock().unwrap_or_else(|poisoned| {
            warn!("SSE connection tracker mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Take a slot for `ip`; the slot is held until the guard drops
    pub fn try_acquire(
        &self,
        ip: IpAddr,
    ) -> Result<SseConnectionGuard, SseConnectionLimitExceeded> {
        let mut connections = self.lock();
        let count = connections.entry(ip).or_insert(0);

        if *count >= self.max_connections_per_ip {
            warn!(
                ip = %ip,
                current = %count,
                max = self.max_connections_per_ip,
                "SSE connection limit exceeded"
            );
            return Err(SseConnectionLimitExceeded);
        }

        *count += 1;
        info!(ip = %ip, count = %count, "SSE connection acquired");

        Ok(SseConnectionGuard {
            ip,
            tracker: self.clone(),
        })
    }

    fn release(&self, ip: IpAddr) {
        let mut connections = self.lock();
        if let Some(count) = connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
            info!(ip = %ip, remaining = %count, "SSE connection released");
            if *count == 0 {
                connections.remove(&ip);
            }
        }
    }

    /// Open streams for `ip`
    pub fn active(&self, ip: IpAddr) -> usize {
        self.lock().get(&ip).copied().unwrap_or(0)
    }
}

/// RAII guard that releases an SSE connection slot when dropped
pub struct SseConnectionGuard {
    ip: IpAddr,
    tracker: SseConnectionTracker,
}

impl Drop for SseConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release(self.ip);
    }
}

/// Stream that owns its connection guard, so the slot is freed even if the
/// client disconnects before the stream is consumed
pub struct GuardedSseStream<S> {
    stream: std::pin::Pin<Box<S>>,
    _guard: SseConnectionGuard,
}

impl<S> GuardedSseStream<S> {
    pub fn new(stream: S, guard: SseConnectionGuard) -> Self {
        Self {
            stream: Box::pin(stream),
            _guard: guard,
        }
    }
}

impl<S, T, E> Stream for GuardedSseStream<S>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

/// Frame a demo event as `event: <name>` with its JSON payload
pub fn demo_event(event: &DemoEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// SSE response with standard keep-alive settings
pub fn create_sse_response<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

pub type DemoSse = Sse<KeepAliveStream<GuardedSseStream<futures::stream::BoxStream<'static, Result<Event, Infallible>>>>>;

/// Serve a demo event stream while holding `guard`
pub fn stream_demo_events(events: DemoEventStream, guard: SseConnectionGuard) -> DemoSse {
    let framed = events
        .map(|event| {
            debug!(event = event.name(), "Sending demo event");
            Ok::<_, Infallible>(demo_event(&event))
        })
        .boxed();
    create_sse_response(GuardedSseStream::new(framed, guard))
}
