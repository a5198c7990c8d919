use std::collections::BTreeSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use driftline_core::{next_time_id, CapabilityToken, Role};
use log::info;
use serde::{Serialize, Serializer};

use crate::{
    error::required, spawn_best_effort, CollabContext, CollabError, CollabResult, Notification,
    RoomEvent, RoomHub, SessionStatus,
};

/// A paid session. Prices and earnings are kept in cents and serialize as dollars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharteredDrift {
    pub id: String,
    pub title: String,
    pub ticket_number: String,
    #[serde(rename = "priceUSD", serialize_with = "as_dollars")]
    pub price_cents: u64,
    pub duration_mins: u64,
    pub host_uid: String,
    pub host_name: String,
    /// The RTC channel, which is also the name of the room
    pub channel: String,
    pub status: SessionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ends_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub chat_enabled: bool,
    /// Always contains the host
    pub pass_holders: BTreeSet<String>,
    pub earnings: Earnings,
}

/// What a drift has made so far. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    #[serde(rename = "totalUSD", serialize_with = "as_dollars")]
    pub total_cents: u64,
    /// The host's own pass is not counted
    pub tickets_sold: u64,
}

#[derive(Debug, Clone, Default)]
pub struct NewCharteredDrift {
    pub title: String,
    pub ticket_number: String,
    pub price_usd: f64,
    pub duration_mins: u64,
    pub host_uid: String,
    pub host_name: String,
}

#[derive(Debug, Clone)]
pub struct StartedDrift {
    pub drift: CharteredDrift,
    pub channel: String,
    pub host_token: CapabilityToken,
}

#[derive(Debug, Clone)]
pub struct PurchasedPass {
    pub drift_id: String,
    pub channel: String,
    pub token: CapabilityToken,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedDrift {
    pub drift: CharteredDrift,
    pub earnings: Earnings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftEarnings {
    pub drift_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub earnings: Earnings,
}

/// Every drift of a host and what they made together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEarnings {
    pub host_uid: String,
    pub drifts: Vec<DriftEarnings>,
    #[serde(rename = "totalUSD", serialize_with = "as_dollars")]
    pub total_cents: u64,
    pub tickets_sold: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Promo {
    pub share_url: String,
    pub web_url: String,
    pub message: String,
}

/// Sells passes to chartered drifts and keeps their earnings
pub struct TicketedAccess {
    context: CollabContext,
    hub: RoomHub,
}

impl TicketedAccess {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            hub: RoomHub::new(context),
        }
    }

    /// Starts a drift with the host as its first pass holder.
    /// The host's token lasts as long as the drift.
    pub fn start_chartered(&self, new_drift: NewCharteredDrift) -> CollabResult<StartedDrift> {
        use dashmap::mapref::entry::Entry;

        let ticket_number = required(&new_drift.ticket_number, "ticketNumber")?;
        let host_uid = required(&new_drift.host_uid, "hostUid")?;
        let price_cents = to_cents(new_drift.price_usd)?;

        if new_drift.duration_mins == 0 {
            return Err(CollabError::invalid("durationMins must be positive"));
        }

        let number = next_time_id();
        let id = format!("chartered_{}", number);
        let channel = format!("CharteredDrift_{}_{}", ticket_number, number);

        let host_token = self.context.issuer.issue(
            &channel,
            host_uid,
            Role::Publisher,
            new_drift.duration_mins.saturating_mul(60),
        )?;

        match self.context.tickets.entry(ticket_number.to_string()) {
            Entry::Occupied(_) => {
                return Err(CollabError::Conflict(format!(
                    "Ticket number {ticket_number} is already in use"
                )))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(id.clone());
            }
        }

        if let Err(e) = self.hub.open_room(&channel, host_uid) {
            self.context.tickets.remove(ticket_number);
            return Err(e);
        }

        let now = Utc::now();
        let drift = CharteredDrift {
            id: id.clone(),
            title: new_drift.title.trim().to_string(),
            ticket_number: ticket_number.to_string(),
            price_cents,
            duration_mins: new_drift.duration_mins,
            host_uid: host_uid.to_string(),
            host_name: new_drift.host_name.trim().to_string(),
            channel: channel.clone(),
            status: SessionStatus::Live,
            started_at: now,
            ends_at: now + minutes(new_drift.duration_mins),
            ended_at: None,
            chat_enabled: true,
            pass_holders: BTreeSet::from([host_uid.to_string()]),
            earnings: Earnings::default(),
        };

        self.context.drifts.insert(id.clone(), drift.clone());

        info!(
            "Chartered drift {} ({}) started by {} at {} cents",
            id, ticket_number, host_uid, price_cents
        );
        self.mirror(drift.clone());

        Ok(StartedDrift {
            drift,
            channel,
            host_token,
        })
    }

    /// Sells a pass. The pass and its earnings are recorded together or not at all.
    pub fn purchase_pass(&self, drift_id: &str, uid: &str) -> CollabResult<PurchasedPass> {
        let uid = required(uid, "uid")?;

        let (purchase, title) = {
            let mut drift = self
                .context
                .drifts
                .get_mut(drift_id)
                .ok_or_else(|| CollabError::not_found("Drift", drift_id))?;

            if drift.status != SessionStatus::Live || Utc::now() >= drift.ends_at {
                return Err(CollabError::Forbidden(format!(
                    "Drift {drift_id} is not live"
                )));
            }

            if drift.pass_holders.contains(uid) {
                return Err(CollabError::Conflict(format!(
                    "{uid} already holds a pass for {drift_id}"
                )));
            }

            let token = self.context.issuer.issue(
                &drift.channel,
                uid,
                Role::Subscriber,
                self.context.config.pass_token_ttl_secs,
            )?;

            let price_cents = drift.price_cents;
            drift.pass_holders.insert(uid.to_string());
            drift.earnings.tickets_sold += 1;
            drift.earnings.total_cents += price_cents;

            info!(
                "{} bought a pass for {} ({} sold)",
                uid, drift_id, drift.earnings.tickets_sold
            );

            let purchase = PurchasedPass {
                drift_id: drift_id.to_string(),
                channel: drift.channel.clone(),
                token,
            };

            (purchase, drift.title.clone())
        };

        let notifier = self.context.notifier.clone();
        let notification = Notification::PassPurchased {
            drift_id: drift_id.to_string(),
            user_id: uid.to_string(),
            title,
        };

        spawn_best_effort("Pass notification", async move {
            notifier.notify(notification).await
        });

        Ok(purchase)
    }

    /// Ends a drift, returning its final ledger. Ending it again returns the same result.
    /// Only the room is torn down, the drift keeps the ledger that `host_earnings` sums.
    pub fn end_chartered(&self, drift_id: &str) -> CollabResult<EndedDrift> {
        let now = Utc::now();

        let (drift, ended_now) = {
            let mut drift = self
                .context
                .drifts
                .get_mut(drift_id)
                .ok_or_else(|| CollabError::not_found("Drift", drift_id))?;

            let ended_now = drift.status == SessionStatus::Live;

            if ended_now {
                drift.status = SessionStatus::Ended;
                drift.ended_at = Some(now);
            }

            (drift.clone(), ended_now)
        };

        if ended_now {
            self.context
                .tickets
                .remove_if(&drift.ticket_number, |_, id| id == &drift.id);

            self.hub.close_room(
                &drift.channel,
                RoomEvent::SessionEnded {
                    session_id: drift.id.clone(),
                    ended_at: now.timestamp_millis(),
                },
            );
            self.hub
                .schedule_teardown(&drift.channel, self.context.config.end_grace);

            info!(
                "Chartered drift {} ended with {} pass(es) sold",
                drift.id, drift.earnings.tickets_sold
            );
            self.mirror(drift.clone());
        }

        Ok(EndedDrift {
            earnings: drift.earnings,
            drift,
        })
    }

    /// Turns the chat of a drift on or off, broadcasting the change to its room
    pub fn toggle_chat(&self, drift_id: &str, enabled: bool) -> CollabResult<CharteredDrift> {
        let mut drift = self
            .context
            .drifts
            .get_mut(drift_id)
            .ok_or_else(|| CollabError::not_found("Drift", drift_id))?;

        drift.chat_enabled = enabled;

        if let Ok(room) = self.context.room(&drift.channel) {
            room.lock().set_chat(enabled);
        }

        Ok(drift.clone())
    }

    pub fn drift(&self, drift_id: &str) -> CollabResult<CharteredDrift> {
        self.context
            .drifts
            .get(drift_id)
            .map(|d| d.clone())
            .ok_or_else(|| CollabError::not_found("Drift", drift_id))
    }

    /// Live drifts, newest first
    pub fn live(&self) -> Vec<CharteredDrift> {
        let mut drifts: Vec<_> = self
            .context
            .drifts
            .iter()
            .filter(|d| d.status == SessionStatus::Live)
            .map(|d| d.clone())
            .collect();

        drifts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        drifts
    }

    pub fn passes(&self, drift_id: &str) -> CollabResult<Vec<String>> {
        Ok(self.drift(drift_id)?.pass_holders.into_iter().collect())
    }

    pub fn earnings(&self, drift_id: &str) -> CollabResult<Earnings> {
        Ok(self.drift(drift_id)?.earnings)
    }

    /// The earnings of every drift a host has run in this process
    pub fn host_earnings(&self, host_uid: &str) -> HostEarnings {
        let mut drifts: Vec<_> = self
            .context
            .drifts
            .iter()
            .filter(|d| d.host_uid == host_uid)
            .map(|d| {
                let earnings = DriftEarnings {
                    drift_id: d.id.clone(),
                    title: d.title.clone(),
                    status: d.status,
                    earnings: d.earnings,
                };

                (d.started_at, earnings)
            })
            .collect();

        drifts.sort_by(|a, b| b.0.cmp(&a.0));
        let drifts: Vec<_> = drifts.into_iter().map(|(_, d)| d).collect();

        HostEarnings {
            host_uid: host_uid.to_string(),
            total_cents: drifts.iter().map(|d| d.earnings.total_cents).sum(),
            tickets_sold: drifts.iter().map(|d| d.earnings.tickets_sold).sum(),
            drifts,
        }
    }

    /// Links promoting a drift. Followers of the host are told through a push notification.
    pub fn share_promo(&self, drift_id: &str) -> CollabResult<Promo> {
        let drift = self.drift(drift_id)?;

        let promo = Promo {
            share_url: format!("drift://chartered/{}", drift.id),
            web_url: format!("https://drift.app/chartered/{}", drift.id),
            message: format!(
                "{} is hosting \"{}\" on Drift. Passes are {}.",
                drift.host_name,
                drift.title,
                dollars(drift.price_cents)
            ),
        };

        let notifier = self.context.notifier.clone();
        let notification = Notification::DriftPromoted {
            drift_id: drift.id,
            host_uid: drift.host_uid,
            title: drift.title,
            share_url: promo.share_url.clone(),
        };

        spawn_best_effort("Promo notification", async move {
            notifier.notify(notification).await
        });

        Ok(promo)
    }

    fn mirror(&self, drift: CharteredDrift) {
        let mirror = self.context.mirror.clone();

        spawn_best_effort("Mirror write of drift", async move {
            mirror.save_drift(&drift).await
        });
    }
}

fn to_cents(price_usd: f64) -> CollabResult<u64> {
    let cents = (price_usd * 100.0).round();

    if !cents.is_finite() || cents < 1.0 || cents > u32::MAX as f64 {
        return Err(CollabError::invalid("priceUSD must be a positive amount"));
    }

    Ok(cents as u64)
}

fn dollars(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

fn as_dollars<S: Serializer>(cents: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(*cents as f64 / 100.0)
}

fn minutes(mins: u64) -> ChronoDuration {
    // Capped at a year so the end time can't overflow
    ChronoDuration::minutes(mins.min(60 * 24 * 365) as i64)
}
