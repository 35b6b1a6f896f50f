use crate::config::types::{SourceConfig, SyncConfig};
use crate::sync::gulp::{validate, SourcePayload, Validation};
use crate::sync::reader::{CloseDelimitedReader, PayloadReader};
use chrono::Utc;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no sources configured")]
    NoSources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No listening endpoints open.
    Unbound,
    /// Every configured source has a bound endpoint.
    Listening,
    Accepting,
    Reading,
    Validating,
    /// Tearing down and rebuilding all endpoints.
    Resyncing,
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(Validation),
    /// The cancellation token fired; nothing from this cycle was processed.
    Cancelled,
}

struct Endpoint {
    source_id: String,
    configured: SocketAddr,
    /// Address actually bound the first time. Reused on rebind so that a
    /// configured port 0 keeps its OS-assigned port across resyncs.
    bound: Option<SocketAddr>,
    listener: Option<TcpListener>,
}

impl Endpoint {
    async fn bind(&mut self) {
        let addr = self.bound.unwrap_or(self.configured);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                let local = listener.local_addr().unwrap_or(addr);
                debug!(source_id = %self.source_id, addr = %local, "Endpoint listening");
                self.bound = Some(local);
                self.listener = Some(listener);
            }
            Err(e) => {
                warn!(source_id = %self.source_id, addr = %addr, error = %e, "socket bind failed");
            }
        }
    }
}

/// Accepts one connection per source each cycle and checks that every source
/// is on the same gulp.
pub struct GulpSynchronizer<R = CloseDelimitedReader> {
    endpoints: Vec<Endpoint>,
    reader: R,
    state: SyncState,
    bind_retry: Duration,
    resyncs: u64,
}

impl GulpSynchronizer<CloseDelimitedReader> {
    pub fn from_config(sources: &[SourceConfig], sync: &SyncConfig) -> Result<Self, SyncError> {
        Self::with_reader(
            sources,
            CloseDelimitedReader::new(sync.max_payload_bytes),
            sync.bind_retry,
        )
    }
}

impl<R: PayloadReader> GulpSynchronizer<R> {
    pub fn with_reader(
        sources: &[SourceConfig],
        reader: R,
        bind_retry: Duration,
    ) -> Result<Self, SyncError> {
        if sources.is_empty() {
            return Err(SyncError::NoSources);
        }

        let endpoints = sources
            .iter()
            .map(|source| Endpoint {
                source_id: source.id.clone(),
                configured: source.listen,
                bound: None,
                listener: None,
            })
            .collect();

        Ok(Self {
            endpoints,
            reader,
            state: SyncState::Unbound,
            bind_retry,
            resyncs: 0,
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Number of times the endpoints were torn down and rebuilt.
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Addresses of endpoints that are currently listening, in source order.
    pub fn local_addrs(&self) -> Vec<Option<SocketAddr>> {
        self.endpoints
            .iter()
            .map(|e| e.listener.as_ref().and_then(|l| l.local_addr().ok()))
            .collect()
    }

    /// Bind every endpoint that is not yet listening. A failure on one
    /// endpoint only skips that endpoint for this pass.
    pub async fn bind(&mut self) -> usize {
        for endpoint in self.endpoints.iter_mut().filter(|e| e.listener.is_none()) {
            endpoint.bind().await;
        }

        let bound = self.bound_count();
        if bound == self.endpoints.len() {
            self.state = SyncState::Listening;
        } else if bound == 0 {
            self.state = SyncState::Unbound;
        }
        bound
    }

    fn bound_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.listener.is_some()).count()
    }

    /// Close every endpoint and bind them again.
    pub async fn resync(&mut self) {
        self.state = SyncState::Resyncing;
        for endpoint in &mut self.endpoints {
            endpoint.listener = None;
        }
        self.state = SyncState::Unbound;
        self.resyncs += 1;

        let bound = self.bind().await;
        info!(bound = bound, expected = self.endpoints.len(), "Restarted socket connections");
    }

    /// Run one accept/read/validate cycle.
    pub async fn next_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        let expected = self.endpoints.len();

        if self.bound_count() < expected {
            let bound = self.bind().await;
            if bound < expected {
                warn!(bound = bound, expected = expected, "Not all endpoints are listening");
                tokio::select! {
                    _ = cancel.cancelled() => return CycleOutcome::Cancelled,
                    _ = tokio::time::sleep(self.bind_retry) => {}
                }
                return CycleOutcome::Completed(Validation::Incomplete {
                    parsed: 0,
                    expected,
                });
            }
        }

        self.state = SyncState::Accepting;
        let mut connections: Vec<(String, TcpStream)> = Vec::with_capacity(expected);
        for endpoint in &self.endpoints {
            let Some(listener) = endpoint.listener.as_ref() else {
                continue;
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Escaping socket connection");
                    return CycleOutcome::Cancelled;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(source_id = %endpoint.source_id, peer = %peer, "Accepted connection");
                        connections.push((endpoint.source_id.clone(), stream));
                    }
                    Err(e) => {
                        warn!(source_id = %endpoint.source_id, error = %e, "Accept failed");
                    }
                }
            }
        }

        self.state = SyncState::Reading;
        let mut payloads = Vec::with_capacity(connections.len());
        for (source_id, mut stream) in connections {
            let raw = tokio::select! {
                _ = cancel.cancelled() => return CycleOutcome::Cancelled,
                read = self.reader.read_payload(&mut stream) => read,
            };

            match raw {
                Ok(raw) => match SourcePayload::parse(&source_id, &raw) {
                    Ok(payload) => payloads.push(payload),
                    Err(e) => {
                        warn!(source_id = %source_id, error = %e, "Skipping this client");
                    }
                },
                Err(e) => {
                    warn!(source_id = %source_id, error = %e, "Read failed, skipping this client");
                }
            }
        }

        self.state = SyncState::Validating;
        let gulp_ids: Vec<i64> = payloads.iter().map(|p| p.gulp_id).collect();
        debug!(gulps = ?gulp_ids, "Received gulps");

        let validation = validate(payloads, expected, Utc::now());

        if let Validation::Divergent { gulp_ids } = &validation {
            warn!(gulps = ?gulp_ids, "not all clients received from same gulp, restarting socket connections");
            self.resync().await;
        } else {
            self.state = SyncState::Listening;
        }

        CycleOutcome::Completed(validation)
    }
}
