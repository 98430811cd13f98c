//! Composition root for one running client.
//!
//! [`Clinic`] owns the session, transport, auth, roster and view state and
//! routes user intents between them. It is also where the session-collapse
//! rule lives: any call that comes back 401/403 signs the user out, clears
//! the roster and closes any open form, whichever operation triggered it.

use std::cell::RefCell;
use std::rc::Rc;

use reqwest::Method;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::AuthController;
use crate::config::ClientConfig;
use crate::error::{ApiError, MechaLungError};
use crate::models::{Doctor, PatientDraft, PatientRecord, ServerStatus};
use crate::prompt::{BrowserPrompter, Prompter};
use crate::roster::RosterCache;
use crate::session::{LocalStorageSlot, SessionStore};
use crate::transport::{ApiClient, HttpBackend, ReqwestBackend};
use crate::view::{FormState, SubmitTarget, ViewController, ViewMode};

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this patient?";
pub const ADDED_NOTICE: &str = "Patient added successfully!";
pub const UPDATED_NOTICE: &str = "Patient updated successfully!";
pub const DELETED_NOTICE: &str = "Patient deleted successfully!";

/// Result of the liveness probe against `GET /`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerHealth {
    Unknown,
    Up(String),
    Down(String),
}

/// Plain-data copy of everything the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicSnapshot {
    pub principal: Option<Doctor>,
    pub roster: Vec<PatientRecord>,
    pub mode: ViewMode,
    pub form: Option<FormState>,
    pub error: Option<String>,
    pub server: ServerHealth,
    pub roster_loading: bool,
    /// Ids with a delete outstanding.
    pub deleting: Vec<i64>,
    pub signing_in: bool,
}

impl Default for ClinicSnapshot {
    fn default() -> Self {
        Self {
            principal: None,
            roster: Vec::new(),
            mode: ViewMode::List,
            form: None,
            error: None,
            server: ServerHealth::Unknown,
            roster_loading: false,
            deleting: Vec::new(),
            signing_in: false,
        }
    }
}

pub struct Clinic<B> {
    api: Rc<ApiClient<B>>,
    auth: AuthController<B>,
    roster: RosterCache<B>,
    view: RefCell<ViewController>,
    prompter: Box<dyn Prompter>,
    error: RefCell<Option<String>>,
    server: RefCell<ServerHealth>,
}

/// The client as wired up inside a browser tab.
pub type BrowserClinic = Clinic<ReqwestBackend>;

impl Clinic<ReqwestBackend> {
    pub fn for_browser(config: &ClientConfig) -> Result<Self, MechaLungError> {
        let session = SessionStore::new(LocalStorageSlot::new(config.session_key.clone()));
        let backend = ReqwestBackend::new(config.request_timeout())?;
        info!("API endpoint: {}", config.api_base_url);
        Ok(Self::new(&config.api_base_url, backend, session, BrowserPrompter))
    }
}

impl<B: HttpBackend> Clinic<B> {
    pub fn new(
        base_url: &Url,
        backend: B,
        session: SessionStore,
        prompter: impl Prompter + 'static,
    ) -> Self {
        let api = Rc::new(ApiClient::new(base_url, backend, Rc::new(session)));
        Self {
            auth: AuthController::new(Rc::clone(&api)),
            roster: RosterCache::new(Rc::clone(&api)),
            api,
            view: RefCell::new(ViewController::new()),
            prompter: Box::new(prompter),
            error: RefCell::new(None),
            server: RefCell::new(ServerHealth::Unknown),
        }
    }

    pub fn auth(&self) -> &AuthController<B> {
        &self.auth
    }

    pub fn roster(&self) -> &RosterCache<B> {
        &self.roster
    }

    pub fn api(&self) -> &ApiClient<B> {
        &self.api
    }

    pub fn mode(&self) -> ViewMode {
        self.view.borrow().mode().clone()
    }

    pub fn form(&self) -> Option<FormState> {
        self.view.borrow().form().cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub fn server(&self) -> ServerHealth {
        self.server.borrow().clone()
    }

    /// Startup: probe the server, revalidate any stored session and, if it
    /// holds, load the roster.
    pub async fn start(&self) {
        self.check_server().await;
        if self.auth.restore().await.is_some() {
            // Failures are already reflected in the banner or a collapse.
            let _ = self.load_roster().await;
        }
    }

    pub async fn check_server(&self) -> ServerHealth {
        let health = match self
            .api
            .public_request::<ServerStatus>(Method::GET, "/", None)
            .await
        {
            Ok(response) => ServerHealth::Up(response.data.message),
            Err(e) => ServerHealth::Down(e.to_string()),
        };
        *self.server.borrow_mut() = health.clone();
        health
    }

    pub async fn login(&self, user_name: &str, password: &str) -> Result<Doctor, MechaLungError> {
        self.dismiss_error();
        match self.auth.login(user_name, password).await {
            Ok(doctor) => {
                let _ = self.load_roster().await;
                Ok(doctor)
            }
            Err(e) => {
                if !matches!(e, MechaLungError::Busy(_) | MechaLungError::SignedOut(_)) {
                    self.set_error(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Sign out and discard every piece of session-scoped state.
    pub fn logout(&self) {
        self.auth.logout();
        self.roster.clear();
        self.view.borrow_mut().reset();
        self.dismiss_error();
    }

    pub async fn load_roster(&self) -> Result<usize, MechaLungError> {
        let epoch = self.roster.epoch();
        let result = self.roster.fetch_all().await;
        self.settle(epoch, result)
    }

    pub fn begin_create(&self) -> Result<(), MechaLungError> {
        self.require_session()?;
        self.view.borrow_mut().open_create()
    }

    pub fn begin_edit(&self, id: i64) -> Result<(), MechaLungError> {
        self.require_session()?;
        let record = self
            .roster
            .get(id)
            .ok_or(MechaLungError::UnknownPatient(id))?;
        self.view.borrow_mut().open_edit(record)
    }

    pub fn cancel_form(&self) -> Result<(), MechaLungError> {
        self.view.borrow_mut().cancel()
    }

    /// Submit the open form. The view stays on the form until the server
    /// answers; a failure leaves the form open with the message.
    pub async fn submit(&self, draft: PatientDraft) -> Result<PatientRecord, MechaLungError> {
        let target = self.view.borrow_mut().begin_submit(draft.clone())?;
        let epoch = self.roster.epoch();

        if let Err(message) = draft.validate() {
            self.view.borrow_mut().finish_submit(Some(message.clone()));
            return Err(MechaLungError::InvalidInput(message));
        }

        let outcome = match target {
            SubmitTarget::Create => self.roster.create(&draft).await,
            SubmitTarget::Update(id) => self.roster.update(id, &draft).await,
        };
        if self.roster.epoch() != epoch {
            // The form this submit belonged to was discarded with its session.
            debug!("Ignoring submit outcome from an ended session");
            return outcome;
        }

        match outcome {
            Ok(record) => {
                self.view.borrow_mut().finish_submit(None);
                self.prompter.notify(match target {
                    SubmitTarget::Create => ADDED_NOTICE,
                    SubmitTarget::Update(_) => UPDATED_NOTICE,
                });
                Ok(record)
            }
            Err(e) => {
                self.view.borrow_mut().finish_submit(Some(e.to_string()));
                if e.invalidates_session() {
                    self.collapse(&e);
                }
                Err(e)
            }
        }
    }

    /// Delete after confirmation. Returns `Ok(false)` if the user declined.
    pub async fn delete(&self, id: i64) -> Result<bool, MechaLungError> {
        self.require_session()?;
        if !self.prompter.confirm(DELETE_PROMPT) {
            debug!("Delete of patient {} declined", id);
            return Ok(false);
        }
        let epoch = self.roster.epoch();
        let result = self.roster.remove(id).await;
        self.settle(epoch, result)?;
        if self.roster.epoch() == epoch {
            self.prompter.notify(DELETED_NOTICE);
        }
        Ok(true)
    }

    /// Re-read one record from the server and show its summary.
    pub async fn view_patient(&self, id: i64) -> Result<PatientRecord, MechaLungError> {
        if self.roster.get(id).is_none() {
            return Err(MechaLungError::UnknownPatient(id));
        }
        let epoch = self.roster.epoch();
        let result = self.roster.refresh(id).await;
        let record = self.settle(epoch, result)?;
        if self.roster.epoch() == epoch {
            self.prompter.notify(&record.summary());
        }
        Ok(record)
    }

    pub fn dismiss_error(&self) {
        self.error.borrow_mut().take();
    }

    /// Copy of the current state. If the token vanished behind our back
    /// (another tab signed out), session-scoped state is discarded first.
    pub fn snapshot(&self) -> ClinicSnapshot {
        let principal = self.auth.principal();
        if principal.is_none() && (!self.roster.is_empty() || self.view.borrow().form().is_some()) {
            warn!("Session ended outside this client; discarding local state");
            self.roster.clear();
            self.view.borrow_mut().reset();
        }

        let roster = self.roster.records();
        let deleting = roster
            .iter()
            .map(|r| r.id)
            .filter(|id| self.roster.is_deleting(*id))
            .collect();
        let view = self.view.borrow();
        ClinicSnapshot {
            principal,
            roster,
            mode: view.mode().clone(),
            form: view.form().cloned(),
            error: self.error(),
            server: self.server(),
            roster_loading: self.roster.is_loading(),
            deleting,
            signing_in: self.auth.is_signing_in(),
        }
    }

    fn require_session(&self) -> Result<(), MechaLungError> {
        if self.auth.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::NoCredential.into())
        }
    }

    fn set_error(&self, message: String) {
        *self.error.borrow_mut() = Some(message);
    }

    /// Route a failed operation to the right place: session collapse for
    /// rejected credentials, the banner for everything else. Failures of
    /// operations started under an earlier session (`epoch`) are only logged.
    fn settle<T>(&self, epoch: u64, result: Result<T, MechaLungError>) -> Result<T, MechaLungError> {
        if let Err(e) = &result {
            if self.roster.epoch() != epoch {
                debug!("Ignoring failure from an ended session: {}", e);
            } else if e.invalidates_session() {
                self.collapse(e);
            } else if matches!(e, MechaLungError::Busy(_)) {
                debug!("{}", e);
            } else {
                self.set_error(e.to_string());
            }
        }
        result
    }

    fn collapse(&self, cause: &MechaLungError) {
        warn!("Session rejected by server: {}", cause);
        self.logout();
        self.set_error(cause.to_string());
    }
}
