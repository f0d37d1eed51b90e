//! The measurement workflow.
//!
//! ```text
//! AwaitingIdentity --submit--> AwaitingReadings --readings--> Ready --confirm--> Saving --> Saved
//!        ^                            |                       |  ^                          |
//!        +------------cancel----------+-----------------------+  +--re-fetch                |
//!        +------------------------------------start new-------------------------------------+
//! ```
//!
//! Every fetch is tagged with a [`FetchTicket`] carrying the generation it was
//! issued for. Cancelling, starting over or issuing a newer fetch bumps the
//! generation, so readings that arrive late are dropped instead of being
//! applied to a workflow that has moved on.

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::config::IdentityConfig;
use crate::error::{Error, Result};
use crate::identity::{IdentityForm, IdentityRecord};
use crate::measurement::{MeasurementRecord, ReadingSample};
use crate::qr::{QrEncoder, QrImage};
use crate::readings::{read_sample, ReadingProvider};
use crate::sink::{RemoteSink, SinkRow};
use crate::store::LocalStore;

/// Where the workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    /// Waiting for a validated identity.
    AwaitingIdentity,
    /// Readings have been requested and not yet applied.
    AwaitingReadings,
    /// Readings are shown; the operator may confirm, re-fetch or cancel.
    Ready,
    /// The record is being built and stored.
    Saving,
    /// The record was stored locally.
    Saved,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingIdentity => "awaiting identity",
            Self::AwaitingReadings => "awaiting readings",
            Self::Ready => "ready",
            Self::Saving => "saving",
            Self::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// Handle for one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    age_at_least_one_year: bool,
}

impl FetchTicket {
    /// The generation this fetch belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Which height source the fetch should read.
    #[must_use]
    pub fn age_at_least_one_year(&self) -> bool {
        self.age_at_least_one_year
    }
}

/// Severity of an operator notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something degraded but the workflow continues.
    Warning,
}

/// A short message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Headline.
    pub title: String,
    /// Details.
    pub message: String,
}

impl Notice {
    fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }

    fn warning(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// The outcome of a confirmed measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedMeasurement {
    /// The stored record.
    pub record: MeasurementRecord,
    /// Its QR code, if encoding succeeded.
    pub qr: Option<QrImage>,
}

/// Drives one measurement at a time from identity to saved record.
pub struct MeasurementWorkflow {
    readings: Arc<dyn ReadingProvider>,
    store: LocalStore,
    sink: Option<Arc<dyn RemoteSink>>,
    qr: QrEncoder,
    identity_rules: IdentityConfig,
    state: WorkflowState,
    identity: Option<IdentityRecord>,
    sample: Option<ReadingSample>,
    generation: u64,
    in_flight: bool,
    saved: Option<SavedMeasurement>,
    notices: Vec<Notice>,
    mirrors: JoinSet<Result<()>>,
    mirrored: usize,
}

impl fmt::Debug for MeasurementWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementWorkflow")
            .field("state", &self.state)
            .field("identity", &self.identity)
            .field("sample", &self.sample)
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight)
            .field("remote_sink", &self.sink.as_ref().map(|s| s.table().to_string()))
            .field("pending_mirrors", &self.mirrors.len())
            .finish_non_exhaustive()
    }
}

impl MeasurementWorkflow {
    /// Create a workflow with no remote sink.
    #[must_use]
    pub fn new(readings: Arc<dyn ReadingProvider>, store: LocalStore) -> Self {
        Self {
            readings,
            store,
            sink: None,
            qr: QrEncoder::default(),
            identity_rules: IdentityConfig::default(),
            state: WorkflowState::AwaitingIdentity,
            identity: None,
            sample: None,
            generation: 0,
            in_flight: false,
            saved: None,
            notices: Vec::new(),
            mirrors: JoinSet::new(),
            mirrored: 0,
        }
    }

    /// Mirror saved records to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RemoteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use `encoder` for QR codes.
    #[must_use]
    pub fn with_qr_encoder(mut self, encoder: QrEncoder) -> Self {
        self.qr = encoder;
        self
    }

    /// Validate identity forms with `rules`.
    #[must_use]
    pub fn with_identity_rules(mut self, rules: IdentityConfig) -> Self {
        self.identity_rules = rules;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// The identity being measured.
    #[must_use]
    pub fn identity(&self) -> Option<&IdentityRecord> {
        self.identity.as_ref()
    }

    /// The readings currently shown.
    #[must_use]
    pub fn sample(&self) -> Option<ReadingSample> {
        self.sample
    }

    /// The last saved measurement, while in [`WorkflowState::Saved`].
    #[must_use]
    pub fn saved(&self) -> Option<&SavedMeasurement> {
        self.saved.as_ref()
    }

    /// Whether a fetch has been issued and not yet applied.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.in_flight
    }

    /// The local store.
    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// All saved records in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub fn history(&self) -> Result<Vec<MeasurementRecord>> {
        self.store.list_all()
    }

    fn transition(&mut self, to: WorkflowState) {
        debug!("Workflow {} -> {}", self.state, to);
        self.state = to;
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            from: self.state,
            action,
        }
    }

    fn issue_ticket(&mut self, age_at_least_one_year: bool) -> FetchTicket {
        self.generation += 1;
        self.in_flight = true;
        FetchTicket {
            generation: self.generation,
            age_at_least_one_year,
        }
    }

    /// Validate `form` and, if it passes, accept the identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without changing state if any field is
    /// invalid, or [`Error::InvalidTransition`] outside
    /// [`WorkflowState::AwaitingIdentity`].
    pub fn submit_form(&mut self, form: &IdentityForm, today: NaiveDate) -> Result<FetchTicket> {
        if self.state != WorkflowState::AwaitingIdentity {
            return Err(self.invalid("submit identity"));
        }
        let identity = form.validate(today, &self.identity_rules)?;
        self.submit_identity(identity)
    }

    /// Accept a validated identity and request readings for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside
    /// [`WorkflowState::AwaitingIdentity`].
    pub fn submit_identity(&mut self, identity: IdentityRecord) -> Result<FetchTicket> {
        if self.state != WorkflowState::AwaitingIdentity {
            return Err(self.invalid("submit identity"));
        }
        info!("Measuring {} (age {})", identity.name, identity.age);
        let ticket = self.issue_ticket(identity.is_at_least_one_year());
        self.identity = Some(identity);
        self.sample = None;
        self.transition(WorkflowState::AwaitingReadings);
        Ok(ticket)
    }

    /// Request a fresh pair of readings, replacing the current ones once
    /// applied. The state stays [`WorkflowState::Ready`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside [`WorkflowState::Ready`].
    pub fn begin_refetch(&mut self) -> Result<FetchTicket> {
        if self.state != WorkflowState::Ready {
            return Err(self.invalid("re-fetch readings"));
        }
        let at_least_one_year = self
            .identity
            .as_ref()
            .is_some_and(IdentityRecord::is_at_least_one_year);
        Ok(self.issue_ticket(at_least_one_year))
    }

    /// Fetch the readings a ticket asks for.
    ///
    /// The returned future owns everything it needs, so it can be spawned or
    /// awaited after the workflow has moved on.
    pub fn fetch_readings(
        &self,
        ticket: FetchTicket,
    ) -> impl Future<Output = ReadingSample> + Send + 'static {
        let provider = Arc::clone(&self.readings);
        async move { read_sample(provider.as_ref(), ticket.age_at_least_one_year).await }
    }

    /// Apply fetched readings.
    ///
    /// Returns `false` and changes nothing when the ticket is stale.
    pub fn apply_readings(&mut self, ticket: FetchTicket, sample: ReadingSample) -> bool {
        let accepting = matches!(
            self.state,
            WorkflowState::AwaitingReadings | WorkflowState::Ready
        );
        if ticket.generation != self.generation || !accepting {
            debug!(
                "Discarding readings for generation {} (current {}, {})",
                ticket.generation, self.generation, self.state
            );
            return false;
        }

        self.in_flight = false;
        self.sample = Some(sample);

        if sample.weight_kg == 0.0 {
            self.notices.push(Notice::warning(
                "Weight Unavailable",
                "No weight reading was obtained. Check the scale and re-fetch.",
            ));
        }
        if sample.height_cm == 0.0 {
            self.notices.push(Notice::warning(
                "Height Unavailable",
                "No height reading was obtained. Check the height sensor and re-fetch.",
            ));
        }
        if !sample.has_missing() {
            self.notices.push(Notice::info(
                "Measurements Updated",
                "Latest weight and height readings loaded.",
            ));
        }

        if self.state == WorkflowState::AwaitingReadings {
            self.transition(WorkflowState::Ready);
        }
        true
    }

    /// Submit an identity and wait for its readings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside
    /// [`WorkflowState::AwaitingIdentity`].
    pub async fn start(&mut self, identity: IdentityRecord) -> Result<ReadingSample> {
        let ticket = self.submit_identity(identity)?;
        let sample = self.fetch_readings(ticket).await;
        self.apply_readings(ticket, sample);
        Ok(sample)
    }

    /// Re-fetch readings and wait for them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside [`WorkflowState::Ready`].
    pub async fn refetch(&mut self) -> Result<ReadingSample> {
        let ticket = self.begin_refetch()?;
        let sample = self.fetch_readings(ticket).await;
        self.apply_readings(ticket, sample);
        Ok(sample)
    }

    fn confirm_blocker(&self, accept_zero: bool) -> Option<&'static str> {
        if self.in_flight {
            return Some("a fetch is still in flight");
        }
        match self.sample {
            None => Some("no readings have been obtained"),
            Some(sample) if sample.is_empty() && !accept_zero => {
                Some("both readings are zero; re-fetch or accept zero values")
            }
            Some(_) => None,
        }
    }

    /// Whether [`confirm`](Self::confirm) would be accepted right now.
    #[must_use]
    pub fn can_confirm(&self, accept_zero: bool) -> bool {
        self.state == WorkflowState::Ready && self.confirm_blocker(accept_zero).is_none()
    }

    /// Save the current identity and readings.
    ///
    /// The record is stored locally before the workflow reaches
    /// [`WorkflowState::Saved`]. QR encoding and the remote mirror are best
    /// effort: their failures become warnings. The mirror runs on the current
    /// Tokio runtime and is not awaited here. Mirrors that finished since the
    /// previous confirm are collected first, so only running ones are held.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside [`WorkflowState::Ready`]
    /// - [`Error::ConfirmBlocked`] while a fetch is in flight or both readings
    ///   are zero and `accept_zero` is false
    /// - [`Error::LocalPersist`] if the record could not be stored; the
    ///   workflow returns to [`WorkflowState::Ready`]
    pub fn confirm(&mut self, accept_zero: bool) -> Result<&SavedMeasurement> {
        if self.state != WorkflowState::Ready {
            return Err(self.invalid("confirm"));
        }
        if let Some(reason) = self.confirm_blocker(accept_zero) {
            return Err(Error::confirm_blocked(reason));
        }
        let (Some(identity), Some(sample)) = (self.identity.clone(), self.sample) else {
            return Err(Error::internal("ready without identity or readings"));
        };

        self.transition(WorkflowState::Saving);
        match self.save(&identity, sample) {
            Ok(saved) => {
                self.transition(WorkflowState::Saved);
                Ok(&*self.saved.insert(saved))
            }
            Err(e) => {
                self.transition(WorkflowState::Ready);
                Err(e)
            }
        }
    }

    fn save(&mut self, identity: &IdentityRecord, sample: ReadingSample) -> Result<SavedMeasurement> {
        let mut record = MeasurementRecord::new(identity, sample, Utc::now());
        while self
            .store
            .contains(&record.id)
            .map_err(|e| Error::local_persist(self.store.key(), e.to_string()))?
        {
            record.id = MeasurementRecord::generate_id();
        }

        let qr = match self.qr.encode(&record.qr_payload()) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Error generating QR code for {}: {}", record.id, e);
                self.notices.push(Notice::warning(
                    "QR Code Unavailable",
                    format!("The measurement will be saved without a QR code: {e}"),
                ));
                None
            }
        };

        self.store.append(&record)?;
        info!("Saved measurement {} for {}", record.id, record.name);

        if let Some(sink) = self.sink.clone() {
            self.mirror(sink, &record, qr.as_ref());
        }

        Ok(SavedMeasurement { record, qr })
    }

    fn mirror(&mut self, sink: Arc<dyn RemoteSink>, record: &MeasurementRecord, qr: Option<&QrImage>) {
        let row = match SinkRow::from_record(record, qr) {
            Ok(row) => row,
            Err(e) => {
                warn!("Error preparing remote row for {}: {}", record.id, e);
                self.notices.push(Notice::warning("Remote Sync Failed", e.to_string()));
                return;
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.reap_mirrors();
                self.mirrors.spawn_on(
                    async move {
                        let result = sink.append(&row).await;
                        if let Err(e) = &result {
                            warn!("Error syncing measurement to remote table: {}", e);
                        }
                        result
                    },
                    &handle,
                );
            }
            Err(_) => {
                warn!("No async runtime available; skipping remote sync for {}", record.id);
                self.notices.push(Notice::warning(
                    "Remote Sync Skipped",
                    "The measurement was saved locally only.",
                ));
            }
        }
    }

    /// Abandon the current identity and readings.
    ///
    /// Any fetch still in flight is discarded when it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside
    /// [`WorkflowState::AwaitingReadings`] and [`WorkflowState::Ready`].
    pub fn cancel(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            WorkflowState::AwaitingReadings | WorkflowState::Ready
        ) {
            return Err(self.invalid("cancel"));
        }
        self.reset();
        Ok(())
    }

    /// Leave the saved view and wait for the next identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside [`WorkflowState::Saved`].
    pub fn start_new(&mut self) -> Result<()> {
        if self.state != WorkflowState::Saved {
            return Err(self.invalid("start a new measurement"));
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.in_flight = false;
        self.identity = None;
        self.sample = None;
        self.saved = None;
        self.transition(WorkflowState::AwaitingIdentity);
    }

    /// Drain the notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        mem::take(&mut self.notices)
    }

    /// Number of remote mirrors not yet drained.
    #[must_use]
    pub fn pending_mirrors(&self) -> usize {
        self.mirrors.len()
    }

    fn reap_mirrors(&mut self) {
        while let Some(outcome) = self.mirrors.try_join_next() {
            self.settle_mirror(outcome);
        }
    }

    fn settle_mirror(&mut self, outcome: std::result::Result<Result<()>, JoinError>) {
        match outcome {
            Ok(Ok(())) => self.mirrored += 1,
            Ok(Err(e)) => {
                self.notices.push(Notice::warning(
                    "Remote Sync Failed",
                    format!("Saved locally, but the remote copy failed: {e}"),
                ));
            }
            Err(e) => {
                warn!("Remote sync task failed: {}", e);
                self.notices.push(Notice::warning("Remote Sync Failed", e.to_string()));
            }
        }
    }

    /// Wait up to `timeout` for outstanding remote mirrors.
    ///
    /// Failures become warning notices. Mirrors still running at the deadline
    /// are left running and reported once as pending. Returns the number of
    /// mirrors that completed successfully since the last drain.
    pub async fn drain_mirrors(&mut self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match tokio::time::timeout_at(deadline, self.mirrors.join_next()).await {
                Ok(Some(outcome)) => self.settle_mirror(outcome),
                Ok(None) => break,
                Err(_) => {
                    self.notices.push(Notice::warning(
                        "Remote Sync Pending",
                        format!(
                            "{} remote cop{} did not finish in time.",
                            self.mirrors.len(),
                            if self.mirrors.len() == 1 { "y" } else { "ies" }
                        ),
                    ));
                    break;
                }
            }
        }

        mem::take(&mut self.mirrored)
    }
}

impl Drop for MeasurementWorkflow {
    fn drop(&mut self) {
        // Mirrors outlive the workflow, as spawned tasks would.
        self.mirrors.detach_all();
    }
}
