use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use mecha_lung::clinic::{Clinic, ServerHealth, DELETED_NOTICE, DELETE_PROMPT};
use mecha_lung::models::{PatientDraft, RiskBand, RiskFactor};
use mecha_lung::prompt::Prompter;
use mecha_lung::session::{MemorySlot, SessionStore};
use mecha_lung::transport::{HttpBackend, HttpRequest, HttpResponse};
use mecha_lung::view::ViewMode;
use mecha_lung::{ApiError, MechaLungError};

const PASSWORD: &str = "secret";

fn fixture_patients() -> Vec<Value> {
    serde_json::from_str(include_str!("fixtures/patients.json"))
        .expect("Failed to parse patients fixture")
}

/// In-memory stand-in for the MECHA-LUNG API.
struct FakeApi {
    patients: RefCell<Vec<Value>>,
    next_id: Cell<i64>,
    token: RefCell<Option<String>>,
    issued: Cell<u32>,
    calls: RefCell<Vec<String>>,
}

impl FakeApi {
    fn new() -> Self {
        let patients = fixture_patients();
        let next_id = patients.iter().filter_map(|p| p["id"].as_i64()).max().unwrap_or(0) + 1;
        Self {
            patients: RefCell::new(patients),
            next_id: Cell::new(next_id),
            token: RefCell::new(None),
            issued: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn with_session(token: &str) -> Self {
        let api = Self::new();
        *api.token.borrow_mut() = Some(token.to_string());
        api
    }

    /// Server-side expiry: the current token stops working.
    fn revoke(&self) {
        self.token.borrow_mut().take();
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let path = request.url.path().to_string();
        let method = request.method.clone();

        if method == Method::GET && path == "/" {
            return ok(&json!({"message": "MECHA-LUNG API is running", "status": "success"}));
        }
        if method == Method::POST && path == "/api/doctors/login" {
            return self.login(request.body.as_ref());
        }

        let authorised = matches!(
            (request.bearer.as_deref(), self.token.borrow().as_deref()),
            (Some(sent), Some(current)) if sent == current
        );
        if !authorised {
            return HttpResponse::json(401, &json!({"detail": "Could not validate credentials"}));
        }

        if path == "/api/doctors/me" {
            return ok(&doctor());
        }
        if path == "/api/patients" {
            return if method == Method::GET {
                ok(&Value::Array(self.patients.borrow().clone()))
            } else if method == Method::POST {
                self.create(request.body.as_ref())
            } else {
                not_found()
            };
        }

        let Some(id) = path
            .strip_prefix("/api/patients/")
            .and_then(|raw| raw.parse::<i64>().ok())
        else {
            return not_found();
        };
        let position = self.patients.borrow().iter().position(|p| p["id"] == id);
        let Some(index) = position else {
            return HttpResponse::json(404, &json!({"detail": "Patient not found"}));
        };

        if method == Method::GET {
            ok(&self.patients.borrow()[index])
        } else if method == Method::PUT {
            let Some(body) = request.body.as_ref() else {
                return unprocessable("body required");
            };
            let created_at = self.patients.borrow()[index]["created_at"].clone();
            let record = predict(id, body, created_at);
            self.patients.borrow_mut()[index] = record.clone();
            ok(&record)
        } else if method == Method::DELETE {
            self.patients.borrow_mut().remove(index);
            ok(&json!({"message": "Patient deleted successfully"}))
        } else {
            not_found()
        }
    }

    fn login(&self, body: Option<&Value>) -> HttpResponse {
        let password = body.and_then(|b| b["password"].as_str());
        if password != Some(PASSWORD) {
            return HttpResponse::json(401, &json!({"detail": "Invalid credentials"}));
        }
        self.issued.set(self.issued.get() + 1);
        let token = format!("tok-{}", self.issued.get());
        *self.token.borrow_mut() = Some(token.clone());
        ok(&json!({"access_token": token, "token_type": "bearer", "user": doctor()}))
    }

    fn create(&self, body: Option<&Value>) -> HttpResponse {
        let Some(body) = body else {
            return unprocessable("body required");
        };
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let record = predict(id, body, json!("2024-06-10T08:00:00"));
        self.patients.borrow_mut().insert(0, record.clone());
        ok(&record)
    }
}

impl HttpBackend for FakeApi {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", request.method, request.url.path()));
        let reply = self.route(&request);
        tokio::task::yield_now().await;
        Ok(reply)
    }
}

fn ok(body: &Value) -> HttpResponse {
    HttpResponse::json(200, body)
}

fn not_found() -> HttpResponse {
    HttpResponse::json(404, &json!({"detail": "Not Found"}))
}

fn unprocessable(msg: &str) -> HttpResponse {
    HttpResponse::json(422, &json!({"detail": [{"loc": ["body"], "msg": msg}]}))
}

fn doctor() -> Value {
    json!({"id": 1, "user_name": "drsmith", "created_at": "2024-01-15T08:30:00", "is_active": true})
}

/// Echo the draft back with a toy prediction: the share of risk factors present.
fn predict(id: i64, draft: &Value, created_at: Value) -> Value {
    let present = RiskFactor::ALL
        .iter()
        .filter(|f| draft[f.key()].as_bool().unwrap_or(false))
        .count();
    let confidence = present as f64 / RiskFactor::ALL.len() as f64;
    let mut record = draft.clone();
    record["id"] = json!(id);
    record["lung_cancer"] = json!(confidence >= 0.5);
    record["prediction_confidence"] = json!(confidence);
    record["created_at"] = created_at;
    record
}

#[derive(Default)]
struct Prompts {
    confirm_answer: Cell<bool>,
    confirms: RefCell<Vec<String>>,
    notices: RefCell<Vec<String>>,
}

struct SharedPrompts(Rc<Prompts>);

impl Prompter for SharedPrompts {
    fn confirm(&self, message: &str) -> bool {
        self.0.confirms.borrow_mut().push(message.to_string());
        self.0.confirm_answer.get()
    }

    fn notify(&self, message: &str) {
        self.0.notices.borrow_mut().push(message.to_string());
    }
}

fn clinic_with(api: FakeApi, session: SessionStore) -> (Clinic<FakeApi>, Rc<Prompts>) {
    let prompts = Rc::new(Prompts::default());
    prompts.confirm_answer.set(true);
    let base = Url::parse("http://localhost:8000").expect("valid base URL");
    let clinic = Clinic::new(&base, api, session, SharedPrompts(Rc::clone(&prompts)));
    (clinic, prompts)
}

fn roster_ids(clinic: &Clinic<FakeApi>) -> Vec<i64> {
    clinic.roster().records().iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let (clinic, prompts) = clinic_with(FakeApi::new(), SessionStore::in_memory());

    clinic.start().await;
    assert_eq!(clinic.server(), ServerHealth::Up("MECHA-LUNG API is running".into()));
    assert_eq!(clinic.api().backend().calls(), vec!["GET /"]);
    assert_eq!(clinic.snapshot().principal, None);

    // Wrong password
    let err = clinic.login("drsmith", "hunter2").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(clinic.error().as_deref(), Some("Invalid credentials"));
    assert!(!clinic.api().session().has_token());

    // Correct password loads the roster in server order
    clinic.login("drsmith", PASSWORD).await.expect("login should succeed");
    assert_eq!(clinic.error(), None);
    assert_eq!(clinic.api().session().get().as_deref(), Some("tok-1"));
    assert_eq!(roster_ids(&clinic), vec![2, 1]);
    assert_eq!(clinic.roster().get(2).unwrap().risk_band(), RiskBand::High);

    // Create
    clinic.begin_create().unwrap();
    let draft = PatientDraft::new("Jane Doe", 54)
        .with_factor(RiskFactor::Smoking)
        .with_factor(RiskFactor::Coughing);
    let created = clinic.submit(draft).await.expect("create should succeed");
    assert_eq!(created.id, 3);
    assert_eq!(roster_ids(&clinic), vec![3, 2, 1]);
    assert_eq!(clinic.mode(), ViewMode::List);

    // Edit
    clinic.begin_edit(3).unwrap();
    let mut edited = clinic.form().unwrap().draft;
    assert_eq!(edited.name, "Jane Doe");
    edited.age = 55;
    clinic.submit(edited).await.expect("update should succeed");
    assert_eq!(clinic.roster().get(3).unwrap().details.age, 55);
    assert_eq!(roster_ids(&clinic), vec![3, 2, 1]);

    // View and delete
    let viewed = clinic.view_patient(3).await.unwrap();
    assert_eq!(viewed.details.age, 55);
    assert!(clinic.delete(3).await.unwrap());
    assert_eq!(roster_ids(&clinic), vec![2, 1]);
    assert_eq!(*prompts.confirms.borrow(), vec![DELETE_PROMPT.to_string()]);
    assert_eq!(
        prompts.notices.borrow().last().map(String::as_str),
        Some(DELETED_NOTICE)
    );
    assert_eq!(prompts.notices.borrow().len(), 4);

    // Reload agrees with the local mirror
    clinic.load_roster().await.unwrap();
    assert_eq!(roster_ids(&clinic), vec![2, 1]);

    clinic.logout();
    assert!(!clinic.api().session().has_token());
    assert!(clinic.roster().is_empty());
}

#[tokio::test]
async fn test_stored_token_restores_session() {
    let session = SessionStore::new(MemorySlot::with_token("tok-9"));
    let (clinic, _prompts) = clinic_with(FakeApi::with_session("tok-9"), session);

    clinic.start().await;

    let snapshot = clinic.snapshot();
    assert_eq!(snapshot.principal.map(|d| d.user_name), Some("drsmith".to_string()));
    assert_eq!(snapshot.roster.len(), 2);
    assert_eq!(
        clinic.api().backend().calls(),
        vec!["GET /", "GET /api/doctors/me", "GET /api/patients"]
    );
}

#[tokio::test]
async fn test_stale_token_is_discarded_silently() {
    let session = SessionStore::new(MemorySlot::with_token("expired"));
    let (clinic, _prompts) = clinic_with(FakeApi::new(), session);

    clinic.start().await;

    assert_eq!(clinic.snapshot().principal, None);
    assert!(!clinic.api().session().has_token());
    assert_eq!(clinic.error(), None);
}

#[tokio::test]
async fn test_revoked_token_collapses_session_mid_edit() {
    let (clinic, _prompts) = clinic_with(FakeApi::new(), SessionStore::in_memory());
    clinic.login("drsmith", PASSWORD).await.unwrap();
    clinic.begin_edit(1).unwrap();

    clinic.api().backend().revoke();
    let mut draft = clinic.form().unwrap().draft;
    draft.set_factor(RiskFactor::Smoking, true);
    let err = clinic.submit(draft).await.unwrap_err();

    assert!(err.invalidates_session());
    let snapshot = clinic.snapshot();
    assert_eq!(snapshot.principal, None);
    assert!(snapshot.roster.is_empty());
    assert_eq!(snapshot.mode, ViewMode::List);
    assert_eq!(snapshot.error.as_deref(), Some("Could not validate credentials"));

    // Signing in again starts clean
    clinic.login("drsmith", PASSWORD).await.unwrap();
    assert_eq!(clinic.api().session().get().as_deref(), Some("tok-2"));
    assert_eq!(roster_ids(&clinic), vec![2, 1]);
    assert_eq!(clinic.error(), None);
}

#[tokio::test]
async fn test_deleting_unknown_patient_keeps_session() {
    let (clinic, _prompts) = clinic_with(FakeApi::new(), SessionStore::in_memory());
    clinic.login("drsmith", PASSWORD).await.unwrap();

    let err = clinic.delete(42).await.unwrap_err();

    assert!(matches!(
        err,
        MechaLungError::Api(ApiError::Rejected { status: 404, .. })
    ));
    assert!(clinic.auth().is_authenticated());
    assert_eq!(roster_ids(&clinic), vec![2, 1]);
    assert_eq!(clinic.error().as_deref(), Some("Patient not found"));
}
