use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use super::domain::{ApplicantId, ApplicationId, PropertyId};
use super::draft::DraftReceipt;

/// How long `saved` / `error` stay visible before the signal returns to
/// `idle`. The windows are part of the observable contract, not styling:
/// tests drive them with an injected clock.
const SAVED_DISPLAY_MILLIS: i64 = 2_000;
const ERROR_DISPLAY_MILLIS: i64 = 3_000;

/// The field delta captured at a trigger point (blur or step navigation).
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    pub applicant_id: ApplicantId,
    pub property_id: PropertyId,
    pub step: u16,
    pub fields: BTreeMap<String, Value>,
}

/// Transport failures surfaced to the coordinator. `Timeout` is retried
/// transparently up to the configured bound; everything else shows `error`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("save rejected: {0}")]
    Rejected(String),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// The network seam: first save POSTs to create the record, every later save
/// PATCHes the pinned id.
pub trait DraftTransport {
    fn create(&self, snapshot: &DraftSnapshot) -> Result<DraftReceipt, TransportError>;
    fn update(
        &self,
        id: &ApplicationId,
        snapshot: &DraftSnapshot,
    ) -> Result<DraftReceipt, TransportError>;
}

/// Save indicator shown beside the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Display {
    Idle,
    Saving,
    Saved(DateTime<Utc>),
    Error(DateTime<Utc>),
}

/// A snapshot handed to the transport, tagged with the generation that
/// produced it so a late completion of a superseded save can be discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightSave {
    pub generation: u64,
    pub snapshot: DraftSnapshot,
}

/// Client-side autosave process.
///
/// Triggers coalesce: a new trigger replaces any pending snapshot and bumps
/// the generation, so overlapping saves can never interleave and the store
/// only ever reflects the last triggered snapshot. The server-assigned id
/// from the first successful save is pinned for every later one.
#[derive(Debug)]
pub struct AutosaveCoordinator {
    application_id: Option<ApplicationId>,
    pending: Option<DraftSnapshot>,
    generation: u64,
    display: Display,
    retry_limit: u8,
}

impl AutosaveCoordinator {
    pub fn new(retry_limit: u8) -> Self {
        Self {
            application_id: None,
            pending: None,
            generation: 0,
            display: Display::Idle,
            retry_limit,
        }
    }

    /// Resume against a record that already exists server-side.
    pub fn resuming(id: ApplicationId, retry_limit: u8) -> Self {
        Self {
            application_id: Some(id),
            ..Self::new(retry_limit)
        }
    }

    pub fn application_id(&self) -> Option<&ApplicationId> {
        self.application_id.as_ref()
    }

    /// Capture a snapshot on blur or step navigation. Synchronously enters
    /// `saving` and supersedes any snapshot not yet on the wire.
    pub fn trigger(&mut self, snapshot: DraftSnapshot) {
        self.generation += 1;
        self.pending = Some(snapshot);
        self.display = Display::Saving;
    }

    /// Take the latest pending snapshot for the wire, if any.
    pub fn begin_save(&mut self) -> Option<InFlightSave> {
        self.pending.take().map(|snapshot| InFlightSave {
            generation: self.generation,
            snapshot,
        })
    }

    /// Settle a transport response. A response for a superseded generation
    /// is discarded outright: its write was cancelled by a newer trigger and
    /// must not move the signal or the pinned id.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<DraftReceipt, TransportError>,
        now: DateTime<Utc>,
    ) {
        if generation != self.generation {
            return;
        }

        match result {
            Ok(receipt) => {
                if self.application_id.is_none() {
                    self.application_id = Some(receipt.id);
                }
                self.display = Display::Saved(now);
            }
            Err(_) => {
                self.display = Display::Error(now);
            }
        }
    }

    /// Drive one pending snapshot through the transport, with bounded
    /// transparent retry on timeout.
    pub fn save<T: DraftTransport>(&mut self, transport: &T, now: DateTime<Utc>) -> SaveStatus {
        let Some(in_flight) = self.begin_save() else {
            return self.status(now);
        };

        let mut timeouts = 0u8;
        let result = loop {
            let attempt = match &self.application_id {
                Some(id) => transport.update(id, &in_flight.snapshot),
                None => transport.create(&in_flight.snapshot),
            };
            match attempt {
                Err(TransportError::Timeout) if timeouts < self.retry_limit => {
                    timeouts += 1;
                }
                settled => break settled,
            }
        };

        self.complete(in_flight.generation, result, now);
        self.status(now)
    }

    /// Current signal, with the timed fallback to `idle` after the display
    /// window (2s on success, 3s on error).
    pub fn status(&self, now: DateTime<Utc>) -> SaveStatus {
        match self.display {
            Display::Idle => SaveStatus::Idle,
            Display::Saving => SaveStatus::Saving,
            Display::Saved(shown_at) => {
                if now - shown_at >= Duration::milliseconds(SAVED_DISPLAY_MILLIS) {
                    SaveStatus::Idle
                } else {
                    SaveStatus::Saved
                }
            }
            Display::Error(shown_at) => {
                if now - shown_at >= Duration::milliseconds(ERROR_DISPLAY_MILLIS) {
                    SaveStatus::Idle
                } else {
                    SaveStatus::Error
                }
            }
        }
    }
}
