use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::constants::{
    self, MAX_SEARCH_QUERY_LENGTH, MSG_JOURNAL_MEMO_UNAVAILABLE, MSG_NO_DATA_FOUND,
    MSG_SEARCH_FAILED, MSG_SEARCH_TERM_REQUIRED,
};
use crate::erp::{transfer_api::TransferApi, ErpClient};
use crate::models::form::{FormAction, FormView, TransferForm};
use crate::models::transfer::{TransferError, TransferSummary};
use crate::services::payload::build_transfer_request;
use crate::services::validation::{ensure_valid, FormRules};
use crate::utils::{local_today, parse_timezone};

/// Form behaviour settings loaded at startup
#[derive(Debug, Clone, Copy)]
pub struct FormSettings {
    pub rules: FormRules,
    pub timezone: Tz,
    pub session_idle_timeout: Duration,
}

impl FormSettings {
    pub fn from_env() -> Result<Self> {
        let timezone_name =
            env::var("APP_TIMEZONE").unwrap_or_else(|_| constants::DEFAULT_TIMEZONE.to_string());
        let timezone = parse_timezone(&timezone_name).context("Invalid APP_TIMEZONE")?;

        let require_remark = env::var("REQUIRE_TRANSFER_REMARK")
            .map(|value| parse_flag("REQUIRE_TRANSFER_REMARK", &value))
            .unwrap_or(false);

        let idle_secs = env::var("SESSION_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_SESSION_IDLE_TIMEOUT_SECS);

        Ok(Self {
            rules: FormRules { require_remark },
            timezone,
            session_idle_timeout: Duration::from_secs(idle_secs),
        })
    }

    pub fn today(&self) -> NaiveDate {
        local_today(self.timezone)
    }
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            rules: FormRules::default(),
            timezone: crate::utils::timezone::DEFAULT_TZ,
            session_idle_timeout: Duration::from_secs(constants::DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Boolean env flag; unrecognised values are logged and read as `false`
fn parse_flag(name: &str, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "" | "0" | "false" | "no" | "off" => false,
        other => {
            warn!("Unrecognised value '{other}' for {name}, treating it as false");
            false
        }
    }
}

/// Present for `null`, absent when the key is missing
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Partial draft update sent by the browser; only the keys present are applied
#[derive(Debug, Default, Deserialize)]
pub struct DraftPatch {
    pub from_warehouse: Option<String>,
    pub from_bin: Option<String>,
    pub to_warehouse: Option<String>,
    pub to_bin: Option<String>,
    /// `null` clears the quantity
    #[serde(default, deserialize_with = "deserialize_present")]
    pub quantity: Option<Option<f64>>,
    pub posting_date: Option<NaiveDate>,
    pub remark: Option<String>,
}

impl DraftPatch {
    /// Actions in dependency order: warehouses before the bins they filter
    pub fn into_actions(self, today: NaiveDate) -> Vec<FormAction> {
        let mut actions = Vec::new();
        if let Some(value) = self.from_warehouse {
            actions.push(FormAction::FromWarehouseSelected(value));
        }
        if let Some(value) = self.from_bin {
            actions.push(FormAction::FromBinSelected(value));
        }
        if let Some(value) = self.to_warehouse {
            actions.push(FormAction::ToWarehouseSelected(value));
        }
        if let Some(value) = self.to_bin {
            actions.push(FormAction::ToBinSelected(value));
        }
        if let Some(quantity) = self.quantity {
            actions.push(FormAction::QuantityChanged(quantity));
        }
        if let Some(date) = self.posting_date {
            actions.push(FormAction::PostingDateChanged { date, today });
        }
        if let Some(remark) = self.remark {
            actions.push(FormAction::RemarkChanged(remark));
        }
        actions
    }
}

struct FormSession {
    form: TransferForm,
    last_touched: Instant,
}

/// Open transfer forms keyed by session id
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, FormSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, form: TransferForm) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.insert(
            id,
            FormSession {
                form,
                last_touched: Instant::now(),
            },
        );
        id
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<TransferForm, TransferError> {
        self.inner
            .read()
            .await
            .get(&id)
            .map(|session| session.form.clone())
            .ok_or(TransferError::SessionNotFound(id))
    }

    /// Apply actions in order under one lock and return the resulting view
    pub async fn dispatch_all(
        &self,
        id: Uuid,
        actions: Vec<FormAction>,
    ) -> Result<FormView, TransferError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(TransferError::SessionNotFound(id))?;

        let mut form = std::mem::take(&mut session.form);
        for action in actions {
            form = form.reduce(action);
        }
        session.form = form;
        session.last_touched = Instant::now();
        Ok(session.form.view())
    }

    pub async fn dispatch(&self, id: Uuid, action: FormAction) -> Result<FormView, TransferError> {
        self.dispatch_all(id, vec![action]).await
    }

    /// Close the confirmation panel and hand back its summary with the form it was
    /// taken from. Only one caller gets a given summary.
    pub async fn take_pending(
        &self,
        id: Uuid,
    ) -> Result<(TransferSummary, TransferForm), TransferError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(TransferError::SessionNotFound(id))?;

        let summary = session
            .form
            .pending
            .take()
            .ok_or(TransferError::NoPendingTransfer)?;
        session.last_touched = Instant::now();
        Ok((summary, session.form.clone()))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop sessions untouched for longer than `idle`; returns how many were dropped
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_touched.elapsed() <= idle);
        before - sessions.len()
    }
}

/// Transfer form workflow: every user action maps to one method here
#[derive(Clone)]
pub struct TransferService {
    erp: ErpClient,
    sessions: SessionStore,
    settings: FormSettings,
}

impl TransferService {
    pub fn new(erp: ErpClient, settings: FormSettings) -> Self {
        Self {
            erp,
            sessions: SessionStore::new(),
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    pub fn erp_base_url(&self) -> &str {
        self.erp.base_url()
    }

    fn api(&self) -> TransferApi {
        TransferApi::new(self.erp.clone())
    }

    /// Start a form: load bin locations and the journal memo once.
    /// Failures are logged and leave the corresponding data empty.
    pub async fn open_session(&self) -> (Uuid, FormView) {
        let api = self.api();
        let mut form = TransferForm::new(self.settings.today());

        match api.fetch_bin_locations().await {
            Ok(locations) => form = form.reduce(FormAction::BinLocationsLoaded(locations)),
            Err(e) => error!("Error fetching bin locations: {e}"),
        }

        match api.next_journal_memo().await {
            Ok(memo) => form = form.reduce(FormAction::JournalMemoLoaded(memo)),
            Err(e) => error!("Error fetching NextJournalMemo: {e}"),
        }

        let view = form.view();
        let id = self.sessions.insert(form).await;
        info!(session_id = %id, "Transfer form session opened");
        (id, view)
    }

    pub async fn view(&self, id: Uuid) -> Result<FormView, TransferError> {
        self.sessions.snapshot(id).await.map(|form| form.view())
    }

    pub async fn close_session(&self, id: Uuid) -> Result<(), TransferError> {
        if self.sessions.remove(id).await {
            info!(session_id = %id, "Transfer form session closed");
            Ok(())
        } else {
            Err(TransferError::SessionNotFound(id))
        }
    }

    pub async fn search(&self, id: Uuid, search_term: &str) -> Result<FormView, TransferError> {
        let term = search_term.trim().to_string();

        if term.is_empty() {
            return self
                .sessions
                .dispatch_all(
                    id,
                    vec![
                        FormAction::SearchTermChanged(term),
                        FormAction::ErrorRaised(MSG_SEARCH_TERM_REQUIRED.to_string()),
                    ],
                )
                .await;
        }
        if term.chars().count() > MAX_SEARCH_QUERY_LENGTH {
            return self
                .sessions
                .dispatch(
                    id,
                    FormAction::ErrorRaised(format!(
                        "Search term must be at most {MAX_SEARCH_QUERY_LENGTH} characters."
                    )),
                )
                .await;
        }

        self.sessions
            .dispatch_all(
                id,
                vec![
                    FormAction::SearchTermChanged(term.clone()),
                    FormAction::SearchStarted,
                ],
            )
            .await?;

        // The lock is not held across the ERP call; the last search to finish wins
        let action = match self.api().search_batch(&term).await {
            Ok(records) => FormAction::SearchSucceeded(records),
            Err(TransferError::NotFound { search_term }) => {
                info!(%search_term, "No stock found for batch");
                FormAction::SearchFailed(MSG_NO_DATA_FOUND.to_string())
            }
            Err(e) => {
                error!("Error fetching batch data: {e}");
                FormAction::SearchFailed(MSG_SEARCH_FAILED.to_string())
            }
        };

        self.sessions.dispatch(id, action).await
    }

    pub async fn update_draft(&self, id: Uuid, patch: DraftPatch) -> Result<FormView, TransferError> {
        let actions = patch.into_actions(self.settings.today());
        self.sessions.dispatch_all(id, actions).await
    }

    /// Validate the draft and open the confirmation panel when it passes
    pub async fn request_transfer(&self, id: Uuid) -> Result<FormView, TransferError> {
        let view = self
            .sessions
            .dispatch(
                id,
                FormAction::TransferRequested {
                    today: self.settings.today(),
                    rules: self.settings.rules,
                },
            )
            .await?;

        if view.confirmation.is_none() {
            debug!(
                session_id = %id,
                fields = ?view.validation_messages.keys().collect::<Vec<_>>(),
                "Transfer draft failed validation"
            );
        }
        Ok(view)
    }

    pub async fn abort_transfer(&self, id: Uuid) -> Result<FormView, TransferError> {
        self.sessions.dispatch(id, FormAction::TransferAborted).await
    }

    pub async fn clear(&self, id: Uuid) -> Result<FormView, TransferError> {
        self.sessions
            .dispatch(
                id,
                FormAction::ClearAll {
                    today: self.settings.today(),
                },
            )
            .await
    }

    /// Post the confirmed transfer. Success and failure both reset the draft.
    pub async fn confirm_transfer(&self, id: Uuid) -> Result<FormView, TransferError> {
        let (summary, form) = self.sessions.take_pending(id).await?;
        // draft edits close the panel, so the draft still matches the summary here
        ensure_valid(
            &form.draft,
            form.available_quantity(),
            self.settings.today(),
            self.settings.rules,
        )?;

        let request = match build_transfer_request(
            &summary,
            &form.records,
            &form.bin_locations,
            form.journal_memo.as_deref(),
        ) {
            Ok(request) => request,
            Err(TransferError::MissingJournalMemo) => {
                warn!(session_id = %id, "Transfer confirmed without a journal memo");
                return self
                    .sessions
                    .dispatch(id, FormAction::ErrorRaised(MSG_JOURNAL_MEMO_UNAVAILABLE.to_string()))
                    .await;
            }
            Err(e) => {
                warn!(session_id = %id, "Could not build transfer request: {e}");
                return self
                    .sessions
                    .dispatch(id, FormAction::ErrorRaised(e.to_string()))
                    .await;
            }
        };

        let api = self.api();
        let today = self.settings.today();
        let (action, completed) = match api.post_stock_transfer(&request).await {
            Ok(response) => (
                FormAction::TransferCompleted {
                    doc_entry: response.doc_entry_display(),
                    today,
                },
                true,
            ),
            Err(e) => {
                error!("Transfer error: {e}");
                (FormAction::TransferFailed { today }, false)
            }
        };

        let view = self.sessions.dispatch(id, action).await?;
        if !completed {
            return Ok(view);
        }

        match api.next_journal_memo().await {
            Ok(memo) => self.sessions.dispatch(id, FormAction::JournalMemoLoaded(memo)).await,
            Err(e) => {
                error!("Error fetching NextJournalMemo: {e}");
                Ok(view)
            }
        }
    }
}

/// Periodically drop idle form sessions
pub async fn monitor_sessions(sessions: SessionStore, idle_timeout: Duration) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(constants::SESSION_SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        let evicted = sessions.evict_idle(idle_timeout).await;
        if evicted > 0 {
            let remaining = sessions.len().await;
            info!(evicted, remaining, "Evicted idle transfer form sessions");
        }
    }
}
