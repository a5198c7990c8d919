use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::expiry::{Expiry, ExpiryId};

/// A time-limited restriction with its scheduled removal
#[derive(Debug)]
pub struct Restriction {
    pub until: DateTime<Utc>,
    expiry: Expiry,
}

impl Restriction {
    pub fn new(until: DateTime<Utc>, expiry: Expiry) -> Self {
        Self { until, expiry }
    }

    pub fn expiry_id(&self) -> ExpiryId {
        self.expiry.id()
    }
}

/// The per-room moderation state
#[derive(Debug, Default)]
pub struct ModerationState {
    /// Consulted by the calling layer, not enforced here
    pub moderators: BTreeSet<String>,
    pub co_hosts: BTreeSet<String>,
    pub pinned: Option<String>,
    muted: HashMap<String, Restriction>,
    timed_out: HashMap<String, Restriction>,
}

/// A serializable view of [ModerationState]. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    pub moderators: Vec<String>,
    pub co_hosts: Vec<String>,
    pub pinned_user_id: Option<String>,
    pub muted_until: BTreeMap<String, i64>,
    pub timed_out_until: BTreeMap<String, i64>,
}

impl ModerationState {
    pub fn muted_until(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.muted.get(user_id).map(|r| r.until)
    }

    pub fn timed_out_until(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.timed_out.get(user_id).map(|r| r.until)
    }

    /// Returns true if the user has a timeout that hasn't run out yet
    pub fn is_timed_out(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        self.timed_out_until(user_id)
            .map(|until| until > now)
            .unwrap_or(false)
    }

    /// Stores a mute, cancelling any previous one for the same user
    pub fn set_mute(&mut self, user_id: &str, restriction: Restriction) {
        self.muted.insert(user_id.to_string(), restriction);
    }

    pub fn clear_mute(&mut self, user_id: &str) -> Option<Restriction> {
        self.muted.remove(user_id)
    }

    /// Clears a mute only if it is still the one scheduled with `id`
    pub fn expire_mute(&mut self, user_id: &str, id: ExpiryId) -> bool {
        take_if_current(&mut self.muted, user_id, id)
    }

    /// Stores a timeout, cancelling any previous one for the same user
    pub fn set_timeout(&mut self, user_id: &str, restriction: Restriction) {
        self.timed_out.insert(user_id.to_string(), restriction);
    }

    /// Clears a timeout only if it is still the one scheduled with `id`
    pub fn expire_timeout(&mut self, user_id: &str, id: ExpiryId) -> bool {
        take_if_current(&mut self.timed_out, user_id, id)
    }

    pub fn restrictions(&self) -> Restrictions {
        let as_millis = |map: &HashMap<String, Restriction>| {
            map.iter()
                .map(|(k, r)| (k.clone(), r.until.timestamp_millis()))
                .collect()
        };

        Restrictions {
            moderators: self.moderators.iter().cloned().collect(),
            co_hosts: self.co_hosts.iter().cloned().collect(),
            pinned_user_id: self.pinned.clone(),
            muted_until: as_millis(&self.muted),
            timed_out_until: as_millis(&self.timed_out),
        }
    }
}

fn take_if_current(map: &mut HashMap<String, Restriction>, user_id: &str, id: ExpiryId) -> bool {
    let is_current = map
        .get(user_id)
        .map(|r| r.expiry_id() == id)
        .unwrap_or(false);

    if is_current {
        map.remove(user_id);
    }

    is_current
}
