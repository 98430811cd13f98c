//! Scripted collaborators shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::error::ApiError;
use crate::prompt::Prompter;
use crate::transport::{HttpBackend, HttpRequest, HttpResponse};

/// Backend that replays queued responses in order and records every request.
///
/// Each call yields to the executor once before answering, so two futures
/// joined together genuinely overlap.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: RefCell<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(&self, status: u16, body: serde_json::Value) {
        self.responses
            .borrow_mut()
            .push_back(Ok(HttpResponse::json(status, &body)));
    }

    pub fn respond_empty(&self, status: u16) {
        self.responses
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, "")));
    }

    pub fn fail(&self, error: ApiError) {
        self.responses.borrow_mut().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl HttpBackend for ScriptedBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.borrow_mut().push(request);
        // Bind the reply now so concurrent requests get replies in send order.
        let reply = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("no scripted response".to_string())));
        tokio::task::yield_now().await;
        reply
    }
}

/// Prompter that records notifications and answers confirmations from a fixed value.
pub struct RecordingPrompter {
    answer: Cell<bool>,
    pub confirms: RefCell<Vec<String>>,
    pub notices: RefCell<Vec<String>>,
}

impl RecordingPrompter {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer: Cell::new(answer),
            confirms: RefCell::new(Vec::new()),
            notices: RefCell::new(Vec::new()),
        }
    }
}

impl Prompter for RecordingPrompter {
    fn confirm(&self, message: &str) -> bool {
        self.confirms.borrow_mut().push(message.to_string());
        self.answer.get()
    }

    fn notify(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }
}

/// Server-shaped patient JSON with a handful of flags set.
pub fn patient_json(id: i64, name: &str, confidence: f64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "age": 54,
        "biological_gender": false,
        "smoking": true,
        "yellow_fingers": false,
        "anxiety": false,
        "peer_pressure": false,
        "chronic_disease": false,
        "fatigue": false,
        "allergy": false,
        "wheezing": false,
        "alcohol": false,
        "coughing": true,
        "shortness_of_breath": false,
        "swallowing_difficulty": false,
        "chest_pain": false,
        "lung_cancer": confidence >= 0.5,
        "prediction_confidence": confidence,
        "created_at": "2024-05-01T10:00:00"
    })
}

pub fn doctor_json(user_name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "user_name": user_name,
        "created_at": "2024-01-15T08:30:00",
        "is_active": true
    })
}

pub fn login_json(token: &str, user_name: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "token_type": "bearer",
        "user": doctor_json(user_name)
    })
}
