mod chartered;
mod error;
mod events;
mod expiry;
mod mirror;
mod moderation;
mod negotiation;
mod notifier;
mod recordings;
mod rooms;
mod sessions;

use std::{fmt::Display, future::Future, sync::Arc};

use dashmap::DashMap;
use driftline_core::{CapabilityToken, Config, CredentialIssuer, Role};
use log::warn;
use parking_lot::Mutex;

pub use chartered::*;
pub use error::*;
pub use events::*;
pub use mirror::*;
pub use moderation::*;
pub use negotiation::*;
pub use notifier::*;
pub use recordings::*;
pub use rooms::*;
pub use sessions::*;

/// A map shared between every component of the collab system
pub type Store<K, V> = Arc<DashMap<K, V>>;

/// The driftline collab system: sessions, rooms, negotiation, moderation and ticketing.
pub struct Collab {
    context: CollabContext,

    pub sessions: SessionRegistry,
    pub rooms: RoomHub,
    pub negotiation: JoinNegotiation,
    pub moderation: ModerationEngine,
    pub chartered: TicketedAccess,
    pub recordings: RecordingLog,
}

/// A type passed to various components of the collab system, to access state and reach external collaborators.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<Config>,
    pub issuer: Arc<CredentialIssuer>,
    pub mirror: Arc<dyn Mirror>,
    pub notifier: Arc<dyn Notifier>,

    pub sessions: Store<String, Session>,
    pub rooms: Store<String, Arc<Room>>,
    pub drifts: Store<String, CharteredDrift>,
    /// Ticket numbers of live drifts, mapped to the drift holding them
    pub tickets: Store<String, String>,
    pub recordings: Store<String, Recording>,
    pub blocks: Arc<BlockList>,
    pub live_feed: Arc<Mutex<Subscribers>>,
}

impl Collab {
    pub fn new(config: Config, mirror: Arc<dyn Mirror>, notifier: Arc<dyn Notifier>) -> Self {
        let context = CollabContext::new(config, mirror, notifier);

        Self {
            sessions: SessionRegistry::new(&context),
            rooms: RoomHub::new(&context),
            negotiation: JoinNegotiation::new(&context),
            moderation: ModerationEngine::new(&context),
            chartered: TicketedAccess::new(&context),
            recordings: RecordingLog::new(&context),
            context,
        }
    }

    /// Creates the collab system with the mirror and notifier the config points at
    pub fn from_config(config: Config) -> Self {
        let mirror: Arc<dyn Mirror> = match &config.mirror_url {
            Some(url) => Arc::new(RestMirror::new(url)),
            None => Arc::new(MemoryMirror::default()),
        };

        let notifier: Arc<dyn Notifier> = match &config.push_url {
            Some(url) => Arc::new(WebhookNotifier::new(url)),
            None => Arc::new(NoopNotifier),
        };

        Self::new(config, mirror, notifier)
    }

    pub fn context(&self) -> &CollabContext {
        &self.context
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Issues a token for any channel, outside of a session or drift
    pub fn issue_token(
        &self,
        channel: &str,
        uid: &str,
        role: Role,
        ttl_secs: u64,
    ) -> CollabResult<CapabilityToken> {
        let channel = error::required(channel, "channel")?;
        let token = self.context.issuer.issue(channel, uid, role, ttl_secs)?;

        Ok(token)
    }

    /// Subscribes to the live feed, starting with the current live sessions
    pub fn subscribe_live_feed(&self, subscriber: Arc<dyn Subscriber>) -> Subscription {
        let hello = LiveFeedEvent::Hello {
            items: self.sessions.live(),
        };

        self.rooms.subscribe_live_feed(subscriber, hello)
    }
}

impl CollabContext {
    pub fn new(config: Config, mirror: Arc<dyn Mirror>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            issuer: Arc::new(CredentialIssuer::new(&config)),
            config: Arc::new(config),
            mirror,
            notifier,
            sessions: Default::default(),
            rooms: Default::default(),
            drifts: Default::default(),
            tickets: Default::default(),
            recordings: Default::default(),
            blocks: Default::default(),
            live_feed: Default::default(),
        }
    }

    /// Returns the room with the given name
    pub fn room(&self, room_name: &str) -> CollabResult<Arc<Room>> {
        self.rooms
            .get(room_name)
            .map(|r| r.clone())
            .ok_or_else(|| CollabError::not_found("Room", room_name))
    }

    /// A context with in-memory collaborators and a signing secret
    #[cfg(test)]
    pub(crate) fn for_tests(config: Config) -> Self {
        let config = Config {
            rtc_certificate: config
                .rtc_certificate
                .or_else(|| Some("test-certificate".to_string())),
            ..config
        };

        Self::new(
            config,
            Arc::new(MemoryMirror::default()),
            Arc::new(NoopNotifier),
        )
    }
}

/// Runs a side call in the background, logging instead of propagating its failure
pub(crate) fn spawn_best_effort<F, E>(what: &'static str, future: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display,
{
    tokio::spawn(async move {
        if let Err(e) = future.await {
            warn!("{} failed: {}", what, e);
        }
    });
}
