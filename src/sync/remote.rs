use async_trait::async_trait;

use crate::sync::cache::ThingRecord;
use crate::sync::error::SyncResult;
use crate::sync::operations::{ActionInvocation, ThingQuery};

/// A request routed to the remote boundary.
///
/// The remote and auth names come from the syncable's merged endpoint
/// configuration, falling back to the runtime defaults. Transport and wire
/// serialization are behind the boundary and out of scope here.
#[derive(Debug, Clone)]
pub struct RemoteRequest {
    pub query: ThingQuery,
    pub action: Option<ActionInvocation>,
    /// Request path from the endpoint configuration
    pub path: Option<String>,
    /// Name of the remote to route to
    pub remote: Option<String>,
    /// Name of the auth configuration to attach
    pub auth: Option<String>,
}

/// The remote authoritative service, as an abstract capability.
///
/// Given an action and/or thing query, asynchronously answers the resolved
/// authoritative record or an error.
#[async_trait]
pub trait RemoteBoundary: Send + Sync {
    async fn execute(&self, request: RemoteRequest) -> SyncResult<ThingRecord>;
}

#[cfg(feature = "mock")]
pub use mock::MockRemote;

#[cfg(feature = "mock")]
mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::watch;

    use super::{RemoteBoundary, RemoteRequest};
    use crate::sync::cache::ThingRecord;
    use crate::sync::error::{SyncError, SyncResult};

    /// Mock implementation of the remote boundary for tests.
    ///
    /// Responses can be scripted per (thing, key); unscripted requests are
    /// answered by echoing an authoritative record with the action payload
    /// applied. A gate lets tests hold requests in flight to exercise
    /// cancellation, and every request is recorded in a call log.
    pub struct MockRemote {
        responses: Mutex<HashMap<(String, String), SyncResult<ThingRecord>>>,
        log: Mutex<Vec<RemoteRequest>>,
        gate_tx: watch::Sender<bool>,
        gate_rx: watch::Receiver<bool>,
    }

    impl Default for MockRemote {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockRemote {
        pub fn new() -> Self {
            let (gate_tx, gate_rx) = watch::channel(true);
            Self {
                responses: Mutex::new(HashMap::new()),
                log: Mutex::new(Vec::new()),
                gate_tx,
                gate_rx,
            }
        }

        /// Scripts a successful response for the given thing and key
        pub fn respond_with(&self, record: ThingRecord) {
            let mut responses = self.responses.lock().unwrap();
            responses.insert((record.thing.clone(), record.key.clone()), Ok(record));
        }

        /// Scripts a failure for the given thing and key
        pub fn fail_with(&self, thing: &str, key: &str, error: SyncError) {
            let mut responses = self.responses.lock().unwrap();
            responses.insert((thing.to_string(), key.to_string()), Err(error));
        }

        /// Holds all requests in flight until `release` is called
        pub fn hold(&self) {
            let _ = self.gate_tx.send(false);
        }

        /// Releases held requests
        pub fn release(&self) {
            let _ = self.gate_tx.send(true);
        }

        /// Requests executed so far, in order
        pub fn requests(&self) -> Vec<RemoteRequest> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RemoteBoundary for MockRemote {
        async fn execute(&self, request: RemoteRequest) -> SyncResult<ThingRecord> {
            {
                let mut log = self.log.lock().unwrap();
                log.push(request.clone());
            }

            let mut gate = self.gate_rx.clone();
            let _ = gate.wait_for(|open| *open).await;

            let scripted = {
                let responses = self.responses.lock().unwrap();
                responses
                    .get(&(request.query.thing.clone(), request.query.key.clone()))
                    .cloned()
            };
            match scripted {
                Some(response) => response,
                None => {
                    // Authoritative echo: the canonical post-mutation state
                    // is the requested record with the payload applied.
                    let mut record =
                        ThingRecord::new(&request.query.thing, &request.query.key);
                    if let Some(action) = &request.action {
                        record.apply(&action.payload);
                    }
                    Ok(record)
                }
            }
        }
    }
}
