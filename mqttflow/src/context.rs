//! Shared engine state and the collaborator traits injected by the host.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use mqttflow_codec::Publish;

use crate::config::FlowConfig;
use crate::packet_id::PacketIdProvider;
use crate::retry::RetryMonitorRegistry;
use crate::session::{ClientSession, ConnectionWill, RetainedMessage};
use crate::storage::{MemoryRepository, Repository};
use crate::topic::TopicEvaluator;

/// Credential check performed during the connect exchange.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        client_id: &str,
        username: Option<&str>,
        password: Option<&[u8]>,
    ) -> bool;
}

/// Accepts every connection. The default for embedders that do their own
/// access control at the transport layer.
pub struct AllowAllAuthenticator;

#[async_trait]
impl Authenticator for AllowAllAuthenticator {
    async fn authenticate(&self, _: &str, _: Option<&str>, _: Option<&[u8]>) -> bool {
        true
    }
}

/// Application-side sink for inbound publishes that passed their QoS
/// bookkeeping. On a server this is the subscriber fan-out, on a client the
/// message callback.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn deliver(&self, client_id: &str, publish: &Publish);
}

struct LogDelivery;

#[async_trait]
impl MessageDelivery for LogDelivery {
    async fn deliver(&self, client_id: &str, publish: &Publish) {
        log::info!("{client_id} received {publish:?}");
    }
}

/// Everything the flows need: configuration, repositories, collaborators and
/// the two pieces of engine-owned shared state (packet id sequence, retry
/// monitors).
///
/// Cheap to share; wrap in an `Arc` and hand a clone of that to every
/// connection task.
pub struct FlowContext {
    pub cfg: FlowConfig,
    pub sessions: Arc<dyn Repository<ClientSession>>,
    pub retained: Arc<dyn Repository<RetainedMessage>>,
    pub wills: Arc<dyn Repository<ConnectionWill>>,
    pub authenticator: Arc<dyn Authenticator>,
    pub delivery: Arc<dyn MessageDelivery>,
    pub topics: TopicEvaluator,
    pub packet_ids: PacketIdProvider,
    pub monitors: RetryMonitorRegistry,
}

impl fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowContext").field("cfg", &self.cfg).finish()
    }
}

impl FlowContext {
    pub fn new(cfg: FlowConfig) -> FlowContextBuilder {
        FlowContextBuilder {
            cfg,
            sessions: None,
            retained: None,
            wills: None,
            authenticator: None,
            delivery: None,
        }
    }

    /// Consumes the will registered for the client, for publication after an
    /// ungraceful disconnection.
    pub fn take_will(&self, client_id: &str) -> Option<ConnectionWill> {
        self.wills.delete(client_id)
    }
}

pub struct FlowContextBuilder {
    cfg: FlowConfig,
    sessions: Option<Arc<dyn Repository<ClientSession>>>,
    retained: Option<Arc<dyn Repository<RetainedMessage>>>,
    wills: Option<Arc<dyn Repository<ConnectionWill>>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    delivery: Option<Arc<dyn MessageDelivery>>,
}

impl FlowContextBuilder {
    pub fn sessions(mut self, repo: Arc<dyn Repository<ClientSession>>) -> Self {
        self.sessions = Some(repo);
        self
    }

    pub fn retained(mut self, repo: Arc<dyn Repository<RetainedMessage>>) -> Self {
        self.retained = Some(repo);
        self
    }

    pub fn wills(mut self, repo: Arc<dyn Repository<ConnectionWill>>) -> Self {
        self.wills = Some(repo);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn delivery(mut self, delivery: Arc<dyn MessageDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn build(self) -> FlowContext {
        let topics = TopicEvaluator::new(self.cfg.support_wildcards);
        FlowContext {
            cfg: self.cfg,
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(MemoryRepository::default())),
            retained: self
                .retained
                .unwrap_or_else(|| Arc::new(MemoryRepository::default())),
            wills: self.wills.unwrap_or_else(|| Arc::new(MemoryRepository::default())),
            authenticator: self.authenticator.unwrap_or_else(|| Arc::new(AllowAllAuthenticator)),
            delivery: self.delivery.unwrap_or_else(|| Arc::new(LogDelivery)),
            topics,
            packet_ids: PacketIdProvider::new(),
            monitors: RetryMonitorRegistry::default(),
        }
    }
}
