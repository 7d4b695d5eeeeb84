//! Push dispatcher
//!
//! Owns the per-proxy stream senders and fans resource changes out as
//! per-proxy rebuild-and-push tasks. A change is intersected against each
//! connected proxy's subscription sets; every affected proxy is rebuilt on
//! its own task, so a slow or stuck downstream backs up only its own bounded
//! channel. Categories are pushed in the fixed order so a proxy never sees a
//! route referencing a cluster it has not been told about, and pushes onto
//! one proxy's stream are serialized so batches from overlapping changes
//! never interleave.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;
use tracing::{debug, error, info};
use uuid::Uuid;

use trellis_api::ResourceType;
use trellis_proxy::{Proxy, ProxyRegistry};

use crate::types::{DiscoveryRequest, DiscoveryResponse};
use crate::ResponseBuilder;

/// Dispatcher tuning knobs
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Identifier of this control-plane instance, for diagnostics
    pub server_id: String,
    /// Capacity of each per-proxy response channel
    pub stream_buffer: usize,
    /// Upper bound on concurrently registered streams
    pub max_concurrent_streams: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            server_id: "trellis".to_string(),
            stream_buffer: 16,
            max_concurrent_streams: 4096,
        }
    }
}

/// A change to the resources of one category, by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub resource_type: ResourceType,
    /// Changed resource names; empty means "anything of this category"
    pub names: BTreeSet<String>,
}

struct ProxyStream {
    sender: mpsc::Sender<Result<DiscoveryResponse, Status>>,
    /// Serializes pushes onto this stream. The lock is fair, so pushes from
    /// overlapping changes drain in arrival order.
    push_gate: Arc<Mutex<()>>,
}

/// Fans configuration changes out to connected proxies
pub struct PushDispatcher {
    config: DispatcherConfig,
    registry: Arc<ProxyRegistry>,
    builders: HashMap<ResourceType, Arc<dyn ResponseBuilder>>,
    streams: DashMap<Uuid, ProxyStream>,
}

impl PushDispatcher {
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<ProxyRegistry>,
        builders: Vec<Arc<dyn ResponseBuilder>>,
    ) -> Self {
        let builders = builders
            .into_iter()
            .map(|b| (b.resource_type(), b))
            .collect();
        Self {
            config,
            registry,
            builders,
            streams: DashMap::new(),
        }
    }

    /// Attach a response stream for a registered proxy. The receiving half
    /// is handed to the transport layer.
    pub fn register_stream(
        &self,
        proxy_uuid: Uuid,
    ) -> Result<ReceiverStream<Result<DiscoveryResponse, Status>>, Status> {
        if self.streams.len() >= self.config.max_concurrent_streams {
            return Err(Status::resource_exhausted(format!(
                "{}: stream limit {} reached",
                self.config.server_id, self.config.max_concurrent_streams
            )));
        }
        let (sender, receiver) = mpsc::channel(self.config.stream_buffer);
        self.streams.insert(
            proxy_uuid,
            ProxyStream {
                sender,
                push_gate: Arc::new(Mutex::new(())),
            },
        );
        info!(proxy_uuid = %proxy_uuid, "Registered discovery stream");
        Ok(ReceiverStream::new(receiver))
    }

    /// Detach a proxy's stream and drop its registry record
    pub fn unregister_stream(&self, proxy_uuid: Uuid) {
        self.streams.remove(&proxy_uuid);
        self.registry.unregister(proxy_uuid);
        info!(proxy_uuid = %proxy_uuid, "Unregistered discovery stream");
    }

    /// Number of currently attached streams
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    /// Answer one discovery request: record the subscription (replacing the
    /// previous set for that category), then build the targeted response.
    pub fn handle_request(
        &self,
        proxy: &Proxy,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, Status> {
        let resource_type = request.resource_type().ok_or_else(|| {
            Status::invalid_argument(format!("unknown type URL '{}'", request.type_url))
        })?;
        let builder = self
            .builders
            .get(&resource_type)
            .ok_or_else(|| Status::unimplemented(format!("{resource_type} is not served")))?;

        self.registry.set_subscribed_resources(
            proxy,
            resource_type,
            request.resource_names.iter().cloned().collect(),
        );

        let requested = if request.is_wildcard() {
            None
        } else {
            Some(request.resource_names.as_slice())
        };
        let resources = builder.build(proxy, requested).map_err(|e| {
            error!(
                proxy = %proxy,
                resource_type = %resource_type,
                error = %e,
                "Failed to build discovery response"
            );
            Status::internal(e.to_string())
        })?;
        Ok(DiscoveryResponse::new(resource_type, resources))
    }

    /// Schedule a rebuild-and-push for every proxy whose subscription for
    /// the changed category intersects the changed names. Each affected
    /// proxy is pushed on its own task.
    pub fn broadcast_change(self: &Arc<Self>, change: ResourceChange) -> Vec<JoinHandle<()>> {
        let affected = self
            .registry
            .affected_proxies(change.resource_type, &change.names);
        info!(
            resource_type = %change.resource_type,
            changed = change.names.len(),
            affected = affected.len(),
            "Scheduling configuration pushes"
        );
        affected
            .into_iter()
            .map(|proxy| {
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    dispatcher.push_full_update(&proxy).await;
                })
            })
            .collect()
    }

    /// Rebuild and push every served category to one proxy, in the fixed
    /// push order. A build failure aborts the remainder of this proxy's
    /// push; other proxies are unaffected. At most one push writes to a
    /// proxy's stream at a time: a later change waits for the earlier push
    /// to finish rather than interleaving its batches with it.
    pub async fn push_full_update(&self, proxy: &Proxy) {
        let Some((sender, push_gate)) = self
            .streams
            .get(&proxy.uuid())
            .map(|s| (s.sender.clone(), s.push_gate.clone()))
        else {
            debug!(proxy = %proxy, "No active stream; skipping push");
            return;
        };
        let _push = push_gate.lock().await;

        for resource_type in ResourceType::PUSH_ORDER {
            let Some(builder) = self.builders.get(&resource_type) else {
                continue;
            };
            let subscribed = proxy.subscribed_resources(resource_type);
            let requested: Option<Vec<String>> = if subscribed.is_empty() {
                None
            } else {
                Some(subscribed.into_iter().collect())
            };

            let response = match builder.build(proxy, requested.as_deref()) {
                Ok(resources) => DiscoveryResponse::new(resource_type, resources),
                Err(e) => {
                    error!(
                        proxy = %proxy,
                        resource_type = %resource_type,
                        error = %e,
                        "Failed to build pushed response; aborting push for proxy"
                    );
                    return;
                }
            };
            if sender.send(Ok(response)).await.is_err() {
                debug!(proxy = %proxy, "Stream closed mid-push");
                self.streams.remove(&proxy.uuid());
                return;
            }
        }
    }
}
