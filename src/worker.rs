//! Message-passing boundary around a [`SpatialIndex`].
//!
//! Requests and responses are JSON envelopes tagged by `type` and correlated
//! by `requestId`. [`spawn_worker`] runs the index behind a channel;
//! [`WorkerHandle`] issues requests, matches responses to callers and gives
//! up after the configured timeout. A request that times out keeps running
//! in the worker, so whatever it loads stays cached for later requests.
//!
//! ```json
//! {"type": "queryBounds", "requestId": "42",
//!  "bounds": {"minLat": 10, "maxLat": 11, "minLon": 10, "maxLon": 11}, "zoom": 2}
//! ```

use crate::error::{GeoscopeError, Result};
use crate::index::SpatialIndex;
use crate::query::events::{EventMarker, EventsInView};
use geoscope_types::{Bounds, EventRecord, PlaceRecord, QueryDate};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: usize = 20;

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    QueryBounds {
        bounds: Bounds,
        zoom: usize,
    },
    TextSearch {
        query: String,
        #[serde(default = "default_search_limit")]
        limit: usize,
    },
    GetEventsForBoundsAndDate {
        bounds: Bounds,
        zoom: usize,
        date: QueryDate,
        #[serde(default)]
        strict_date: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    QueryResults {
        request_id: String,
        results: Vec<Arc<PlaceRecord>>,
    },
    Events {
        request_id: String,
        events: Vec<EventMarker>,
        dot_events: Vec<Arc<EventRecord>>,
    },
    Error {
        request_id: Option<String>,
        code: String,
        error: String,
    },
}

impl Response {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Response::QueryResults { request_id, .. } | Response::Events { request_id, .. } => {
                Some(request_id)
            }
            Response::Error { request_id, .. } => request_id.as_deref(),
        }
    }

    fn from_error(request_id: Option<String>, err: &GeoscopeError) -> Self {
        Response::Error {
            request_id,
            code: err.code().to_string(),
            error: err.to_string(),
        }
    }

    /// Turn an `error` response back into a [`GeoscopeError`].
    fn into_result(self) -> Result<Self> {
        match self {
            Response::Error {
                request_id,
                code,
                error,
            } => Err(if code == "protocol" {
                GeoscopeError::Protocol {
                    request_id,
                    message: error,
                }
            } else {
                GeoscopeError::Worker {
                    code,
                    message: error,
                }
            }),
            other => Ok(other),
        }
    }
}

/// Handle one raw message. Never fails: problems become `error` responses
/// carrying the request id when it could be read.
pub async fn handle_message(index: &SpatialIndex, raw: &str) -> Response {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Malformed worker message: {}", e);
            let err = GeoscopeError::Protocol {
                request_id: None,
                message: format!("malformed message: {}", e),
            };
            return Response::from_error(None, &err);
        }
    };

    let request_id = value
        .get("requestId")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<RequestEnvelope>(value) {
        Ok(envelope) => dispatch(index, envelope).await,
        Err(e) => {
            log::warn!("Rejected worker message {:?}: {}", request_id, e);
            let err = GeoscopeError::Protocol {
                request_id: request_id.clone(),
                message: e.to_string(),
            };
            Response::from_error(request_id, &err)
        }
    }
}

/// Run a decoded request against the index.
pub async fn dispatch(index: &SpatialIndex, envelope: RequestEnvelope) -> Response {
    let RequestEnvelope {
        request_id,
        request,
    } = envelope;

    let result = match request {
        Request::QueryBounds { bounds, zoom } => index
            .get_entries_in_bounds(&bounds, zoom)
            .await
            .map(|results| Response::QueryResults {
                request_id: request_id.clone(),
                results,
            }),
        Request::TextSearch { query, limit } => Ok(Response::QueryResults {
            request_id: request_id.clone(),
            results: index.text_search(&query, limit),
        }),
        Request::GetEventsForBoundsAndDate {
            bounds,
            zoom,
            date,
            strict_date,
        } => index
            .get_events_for_bounds_and_date(&bounds, zoom, date, strict_date)
            .await
            .map(|view| Response::Events {
                request_id: request_id.clone(),
                events: view.events,
                dot_events: view.dot_events,
            }),
    };

    result.unwrap_or_else(|e| Response::from_error(Some(request_id), &e))
}

type Pending = Arc<Mutex<FxHashMap<String, oneshot::Sender<Response>>>>;

/// Client side of a spawned worker.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<String>,
    pending: Pending,
    timeout: Duration,
}

/// Start a worker task serving `index`. Each message is handled on its own
/// task, so a slow request does not hold up the others.
///
/// Must be called from within a tokio runtime.
pub fn spawn_worker(index: SpatialIndex) -> WorkerHandle {
    let timeout = index.config().query_timeout();
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<String>();
    let (response_tx, mut response_rx) = mpsc::unbounded_channel::<Response>();

    tokio::spawn(async move {
        while let Some(raw) = request_rx.recv().await {
            let index = index.clone();
            let responses = response_tx.clone();
            tokio::spawn(async move {
                let response = handle_message(&index, &raw).await;
                // The handle may be gone; nobody is left to answer then.
                let _ = responses.send(response);
            });
        }
        log::debug!("Worker request channel closed");
    });

    let pending: Pending = Arc::new(Mutex::new(FxHashMap::default()));
    let routes = Arc::clone(&pending);
    tokio::spawn(async move {
        while let Some(response) = response_rx.recv().await {
            let waiter = response
                .request_id()
                .and_then(|id| routes.lock().remove(id));
            match waiter {
                Some(waiter) => {
                    let _ = waiter.send(response);
                }
                None => log::debug!(
                    "Dropping response for unknown or expired request {:?}",
                    response.request_id()
                ),
            }
        }
    });

    WorkerHandle {
        sender: request_tx,
        pending,
        timeout,
    }
}

impl WorkerHandle {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request under a fresh correlation id and wait for its response.
    ///
    /// `error` responses are returned as `Err`.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let request_id = Uuid::new_v4().to_string();
        let raw = serde_json::to_string(&RequestEnvelope {
            request_id: request_id.clone(),
            request,
        })?;
        self.round_trip(request_id, raw).await?.into_result()
    }

    /// Send an already encoded message. It must carry a string `requestId`.
    pub async fn request_raw(&self, raw: &str) -> Result<Response> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let request_id = value
            .get("requestId")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GeoscopeError::Protocol {
                request_id: None,
                message: "message has no requestId".to_string(),
            })?
            .to_string();
        self.round_trip(request_id, raw.to_string()).await?.into_result()
    }

    async fn round_trip(&self, request_id: String, raw: String) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);

        if self.sender.send(raw).is_err() {
            self.pending.lock().remove(&request_id);
            return Err(GeoscopeError::Protocol {
                request_id: Some(request_id),
                message: "worker has shut down".to_string(),
            });
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(GeoscopeError::Protocol {
                request_id: Some(request_id),
                message: "worker dropped the request".to_string(),
            }),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                log::debug!("Request {} timed out after {:?}", request_id, self.timeout);
                Err(GeoscopeError::Timeout(self.timeout))
            }
        }
    }

    pub async fn query_bounds(&self, bounds: Bounds, zoom: usize) -> Result<Vec<Arc<PlaceRecord>>> {
        match self.request(Request::QueryBounds { bounds, zoom }).await? {
            Response::QueryResults { results, .. } => Ok(results),
            other => Err(unexpected(other)),
        }
    }

    pub async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<Arc<PlaceRecord>>> {
        let request = Request::TextSearch {
            query: query.to_string(),
            limit,
        };
        match self.request(request).await? {
            Response::QueryResults { results, .. } => Ok(results),
            other => Err(unexpected(other)),
        }
    }

    pub async fn events_for_bounds_and_date(
        &self,
        bounds: Bounds,
        zoom: usize,
        date: QueryDate,
        strict_date: bool,
    ) -> Result<EventsInView> {
        let request = Request::GetEventsForBoundsAndDate {
            bounds,
            zoom,
            date,
            strict_date,
        };
        match self.request(request).await? {
            Response::Events {
                events, dot_events, ..
            } => Ok(EventsInView { events, dot_events }),
            other => Err(unexpected(other)),
        }
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }
}

fn unexpected(response: Response) -> GeoscopeError {
    GeoscopeError::Protocol {
        request_id: response.request_id().map(str::to_string),
        message: "unexpected response type".to_string(),
    }
}
