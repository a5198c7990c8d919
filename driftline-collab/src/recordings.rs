use chrono::{DateTime, Utc};
use driftline_core::{now_millis, random_string};
use log::info;
use serde::Serialize;

use crate::{error::required, CollabContext, CollabError, CollabResult, RoomEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Recording,
    Stopped,
}

/// Bookkeeping for a cloud recording of a channel. The media itself is handled elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub recording_id: String,
    pub channel: String,
    pub uid: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub stopped_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: RecordingStatus,
}

/// Keeps track of recordings and announces them to their rooms
pub struct RecordingLog {
    context: CollabContext,
}

impl RecordingLog {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Starts recording a channel. A channel can only have one recording running.
    pub fn start_recording(&self, channel: &str, uid: &str) -> CollabResult<Recording> {
        let channel = required(channel, "channel")?;
        let uid = required(uid, "uid")?;

        let running = self
            .context
            .recordings
            .iter()
            .any(|r| r.channel == channel && r.status == RecordingStatus::Recording);

        if running {
            return Err(CollabError::Conflict(format!(
                "{channel} is already being recorded"
            )));
        }

        let recording = Recording {
            recording_id: format!("rec_{}_{}", now_millis(), random_string(6)),
            channel: channel.to_string(),
            uid: uid.to_string(),
            started_at: Utc::now(),
            stopped_at: None,
            duration_ms: None,
            status: RecordingStatus::Recording,
        };

        self.context
            .recordings
            .insert(recording.recording_id.clone(), recording.clone());

        info!("Recording {} of {} started", recording.recording_id, channel);

        if let Ok(room) = self.context.room(channel) {
            room.publish(RoomEvent::RecordingStarted {
                recording_id: recording.recording_id.clone(),
            });
        }

        Ok(recording)
    }

    /// Stops a recording, given its id or the channel it records.
    /// Stopping it again returns the same result.
    pub fn stop_recording(&self, id_or_channel: &str) -> CollabResult<Recording> {
        let target = required(id_or_channel, "recordingId")?;

        let recording_id = if self.context.recordings.contains_key(target) {
            target.to_string()
        } else {
            self.context
                .recordings
                .iter()
                .find(|r| r.channel == target && r.status == RecordingStatus::Recording)
                .map(|r| r.key().clone())
                .ok_or_else(|| CollabError::not_found("Recording", target))?
        };

        let (recording, stopped_now) = {
            let mut recording = self
                .context
                .recordings
                .get_mut(&recording_id)
                .ok_or_else(|| CollabError::not_found("Recording", target))?;

            let stopped_now = recording.status == RecordingStatus::Recording;

            if stopped_now {
                let now = Utc::now();

                recording.duration_ms = Some((now - recording.started_at).num_milliseconds());
                recording.stopped_at = Some(now);
                recording.status = RecordingStatus::Stopped;
            }

            (recording.clone(), stopped_now)
        };

        if stopped_now {
            info!("Recording {} stopped", recording.recording_id);

            if let Ok(room) = self.context.room(&recording.channel) {
                room.publish(RoomEvent::RecordingStopped {
                    recording_id: recording.recording_id.clone(),
                    duration_ms: recording.duration_ms.unwrap_or_default(),
                });
            }
        }

        Ok(recording)
    }

    pub fn recording(&self, recording_id: &str) -> CollabResult<Recording> {
        self.context
            .recordings
            .get(recording_id)
            .map(|r| r.clone())
            .ok_or_else(|| CollabError::not_found("Recording", recording_id))
    }

    /// Recordings of a channel, or of every channel, newest first
    pub fn recordings(&self, channel: Option<&str>) -> Vec<Recording> {
        let mut recordings: Vec<_> = self
            .context
            .recordings
            .iter()
            .filter(|r| channel.map(|c| r.channel == c).unwrap_or(true))
            .map(|r| r.clone())
            .collect();

        recordings.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        recordings
    }
}

#[cfg(test)]
mod test {
    use driftline_core::Config;

    use crate::{MemorySubscriber, RoomHub};

    use super::*;

    fn log() -> (RecordingLog, RoomHub) {
        let context = CollabContext::for_tests(Config::default());
        (RecordingLog::new(&context), RoomHub::new(&context))
    }

    #[test]
    fn test_recording_is_announced() {
        let (log, hub) = log();
        let subscriber = MemorySubscriber::new();

        hub.open_room("beach-cam", "host").unwrap();
        hub.subscribe("beach-cam", subscriber.clone()).unwrap();

        let recording = log.start_recording("beach-cam", "host").unwrap();
        assert!(recording.recording_id.starts_with("rec_"));

        let stopped = log.stop_recording("beach-cam").unwrap();
        assert_eq!(stopped.status, RecordingStatus::Stopped);
        assert!(stopped.duration_ms.is_some());

        assert_eq!(
            subscriber.event_types(),
            vec!["hello", "recording_started", "recording_stopped"]
        );
    }

    #[test]
    fn test_one_recording_per_channel() {
        let (log, _) = log();

        let first = log.start_recording("beach-cam", "host").unwrap();

        assert!(matches!(
            log.start_recording("beach-cam", "host"),
            Err(CollabError::Conflict(_))
        ));

        log.stop_recording(&first.recording_id).unwrap();
        assert!(log.start_recording("beach-cam", "host").is_ok());
        assert_eq!(log.recordings(Some("beach-cam")).len(), 2);
        assert!(log.recordings(Some("elsewhere")).is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (log, _) = log();
        let recording = log.start_recording("beach-cam", "host").unwrap();

        let first = log.stop_recording(&recording.recording_id).unwrap();
        let second = log.stop_recording(&recording.recording_id).unwrap();

        assert_eq!(first, second);
        assert_eq!(log.recording(&recording.recording_id).unwrap(), first);
    }

    #[test]
    fn test_stop_unknown() {
        let (log, _) = log();

        assert!(matches!(
            log.stop_recording("rec_0_none"),
            Err(CollabError::NotFound { .. })
        ));
    }
}
