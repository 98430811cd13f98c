//! Wire types for the MECHA-LUNG API.
//!
//! Field names match the server's JSON exactly. Every type decoded from a
//! response implements [`WireContract`], which the transport runs after
//! deserialization so out-of-range values surface as malformed responses.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Confidence above which a classification is considered firm.
pub const FIRM_CONFIDENCE: f64 = 0.8;

/// Oldest age the intake form accepts.
pub const MAX_AGE: u32 = 120;

/// Post-decode checks for a response payload.
pub trait WireContract {
    fn verify(&self) -> Result<(), String> {
        Ok(())
    }
}

impl WireContract for serde_json::Value {}

impl<T: WireContract> WireContract for Vec<T> {
    fn verify(&self) -> Result<(), String> {
        self.iter().try_for_each(WireContract::verify)
    }
}

/// Payload of the `GET /` liveness probe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerStatus {
    pub message: String,
    pub status: String,
}

impl WireContract for ServerStatus {}

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Doctor {
    pub id: i64,
    pub user_name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub is_active: bool,
}

impl Doctor {
    /// Calendar date the account was created, if the server supplied a parseable one.
    pub fn member_since(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

impl WireContract for Doctor {
    fn verify(&self) -> Result<(), String> {
        if self.user_name.is_empty() {
            return Err("doctor has an empty user_name".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: Doctor,
}

impl WireContract for LoginResponse {
    fn verify(&self) -> Result<(), String> {
        if self.access_token.is_empty() {
            return Err("login response carried an empty access_token".to_string());
        }
        if !self.token_type.eq_ignore_ascii_case("bearer") {
            return Err(format!("unsupported token_type '{}'", self.token_type));
        }
        self.user.verify()
    }
}

/// One of the boolean risk factors or symptoms recorded on intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskFactor {
    Smoking,
    YellowFingers,
    Anxiety,
    PeerPressure,
    ChronicDisease,
    Fatigue,
    Allergy,
    Wheezing,
    Alcohol,
    Coughing,
    ShortnessOfBreath,
    SwallowingDifficulty,
    ChestPain,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 13] = [
        RiskFactor::Smoking,
        RiskFactor::YellowFingers,
        RiskFactor::Anxiety,
        RiskFactor::PeerPressure,
        RiskFactor::ChronicDisease,
        RiskFactor::Fatigue,
        RiskFactor::Allergy,
        RiskFactor::Wheezing,
        RiskFactor::Alcohol,
        RiskFactor::Coughing,
        RiskFactor::ShortnessOfBreath,
        RiskFactor::SwallowingDifficulty,
        RiskFactor::ChestPain,
    ];

    /// JSON field name.
    pub fn key(self) -> &'static str {
        match self {
            RiskFactor::Smoking => "smoking",
            RiskFactor::YellowFingers => "yellow_fingers",
            RiskFactor::Anxiety => "anxiety",
            RiskFactor::PeerPressure => "peer_pressure",
            RiskFactor::ChronicDisease => "chronic_disease",
            RiskFactor::Fatigue => "fatigue",
            RiskFactor::Allergy => "allergy",
            RiskFactor::Wheezing => "wheezing",
            RiskFactor::Alcohol => "alcohol",
            RiskFactor::Coughing => "coughing",
            RiskFactor::ShortnessOfBreath => "shortness_of_breath",
            RiskFactor::SwallowingDifficulty => "swallowing_difficulty",
            RiskFactor::ChestPain => "chest_pain",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskFactor::Smoking => "Smoking",
            RiskFactor::YellowFingers => "Yellow Fingers",
            RiskFactor::Anxiety => "Anxiety",
            RiskFactor::PeerPressure => "Peer Pressure",
            RiskFactor::ChronicDisease => "Chronic Disease",
            RiskFactor::Fatigue => "Fatigue",
            RiskFactor::Allergy => "Allergy",
            RiskFactor::Wheezing => "Wheezing",
            RiskFactor::Alcohol => "Alcohol",
            RiskFactor::Coughing => "Coughing",
            RiskFactor::ShortnessOfBreath => "Shortness of Breath",
            RiskFactor::SwallowingDifficulty => "Swallowing Difficulty",
            RiskFactor::ChestPain => "Chest Pain",
        }
    }
}

/// Client-composed patient data for a create or update call.
///
/// Identity and the prediction outcome are absent; the server assigns both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatientDraft {
    pub name: String,
    pub age: u32,
    /// `true` = male.
    pub biological_gender: bool,
    pub smoking: bool,
    pub yellow_fingers: bool,
    pub anxiety: bool,
    pub peer_pressure: bool,
    pub chronic_disease: bool,
    pub fatigue: bool,
    pub allergy: bool,
    pub wheezing: bool,
    pub alcohol: bool,
    pub coughing: bool,
    pub shortness_of_breath: bool,
    pub swallowing_difficulty: bool,
    pub chest_pain: bool,
}

impl PatientDraft {
    pub fn new(name: impl Into<String>, age: u32) -> Self {
        Self {
            name: name.into(),
            age,
            ..Self::default()
        }
    }

    pub fn factor(&self, factor: RiskFactor) -> bool {
        match factor {
            RiskFactor::Smoking => self.smoking,
            RiskFactor::YellowFingers => self.yellow_fingers,
            RiskFactor::Anxiety => self.anxiety,
            RiskFactor::PeerPressure => self.peer_pressure,
            RiskFactor::ChronicDisease => self.chronic_disease,
            RiskFactor::Fatigue => self.fatigue,
            RiskFactor::Allergy => self.allergy,
            RiskFactor::Wheezing => self.wheezing,
            RiskFactor::Alcohol => self.alcohol,
            RiskFactor::Coughing => self.coughing,
            RiskFactor::ShortnessOfBreath => self.shortness_of_breath,
            RiskFactor::SwallowingDifficulty => self.swallowing_difficulty,
            RiskFactor::ChestPain => self.chest_pain,
        }
    }

    pub fn set_factor(&mut self, factor: RiskFactor, present: bool) {
        let slot = match factor {
            RiskFactor::Smoking => &mut self.smoking,
            RiskFactor::YellowFingers => &mut self.yellow_fingers,
            RiskFactor::Anxiety => &mut self.anxiety,
            RiskFactor::PeerPressure => &mut self.peer_pressure,
            RiskFactor::ChronicDisease => &mut self.chronic_disease,
            RiskFactor::Fatigue => &mut self.fatigue,
            RiskFactor::Allergy => &mut self.allergy,
            RiskFactor::Wheezing => &mut self.wheezing,
            RiskFactor::Alcohol => &mut self.alcohol,
            RiskFactor::Coughing => &mut self.coughing,
            RiskFactor::ShortnessOfBreath => &mut self.shortness_of_breath,
            RiskFactor::SwallowingDifficulty => &mut self.swallowing_difficulty,
            RiskFactor::ChestPain => &mut self.chest_pain,
        };
        *slot = present;
    }

    pub fn with_factor(mut self, factor: RiskFactor) -> Self {
        self.set_factor(factor, true);
        self
    }

    /// Factors flagged on this draft, in form order.
    pub fn present_factors(&self) -> Vec<RiskFactor> {
        RiskFactor::ALL
            .into_iter()
            .filter(|f| self.factor(*f))
            .collect()
    }

    /// Form-level checks run before anything is sent to the server.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Patient name is required".to_string());
        }
        if self.age > MAX_AGE {
            return Err(format!("Age must be between 0 and {}", MAX_AGE));
        }
        Ok(())
    }

    pub fn sex_label(&self) -> &'static str {
        if self.biological_gender {
            "Male"
        } else {
            "Female"
        }
    }
}

/// A patient record as stored by the server, including its prediction.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatientRecord {
    pub id: i64,
    #[serde(flatten)]
    pub details: PatientDraft,
    pub lung_cancer: bool,
    /// Absent on rows stored before the model ran.
    pub prediction_confidence: Option<f64>,
    pub created_at: Option<String>,
}

impl PatientRecord {
    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::classify(self.lung_cancer, self.prediction_confidence)
    }

    pub fn added_on(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Confidence as a percentage with one decimal, e.g. `"92.0%"`, or
    /// `"--"` when the server has none.
    pub fn confidence_percent(&self) -> String {
        match self.prediction_confidence {
            Some(c) => format!("{:.1}%", c * 100.0),
            None => "--".to_string(),
        }
    }

    /// Short text shown when a record is opened for viewing.
    pub fn summary(&self) -> String {
        format!(
            "Viewing patient: {}\nRisk: {}\nConfidence: {}",
            self.details.name,
            if self.lung_cancer { "High" } else { "Low" },
            self.confidence_percent()
        )
    }
}

impl WireContract for PatientRecord {
    fn verify(&self) -> Result<(), String> {
        let Some(c) = self.prediction_confidence else {
            return Ok(());
        };
        if !(0.0..=1.0).contains(&c) {
            return Err(format!(
                "patient {} has prediction_confidence {} outside [0, 1]",
                self.id, c
            ));
        }
        Ok(())
    }
}

/// A full roster listing. Ids must be unique.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PatientList(pub Vec<PatientRecord>);

impl WireContract for PatientList {
    fn verify(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.0.len());
        for record in &self.0 {
            if !seen.insert(record.id) {
                return Err(format!("patient id {} listed more than once", record.id));
            }
            record.verify()?;
        }
        Ok(())
    }
}

/// Display classification of a server prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    High,
    Medium,
    Low,
    Uncertain,
}

impl RiskBand {
    pub fn classify(lung_cancer: bool, confidence: Option<f64>) -> Self {
        match (lung_cancer, confidence.is_some_and(|c| c > FIRM_CONFIDENCE)) {
            (true, true) => RiskBand::High,
            (true, false) => RiskBand::Medium,
            (false, true) => RiskBand::Low,
            (false, false) => RiskBand::Uncertain,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::High => "High Risk",
            RiskBand::Medium => "Medium Risk",
            RiskBand::Low => "Low Risk",
            RiskBand::Uncertain => "Uncertain",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            RiskBand::High => "risk-badge risk-high",
            RiskBand::Medium => "risk-badge risk-medium",
            RiskBand::Low => "risk-badge risk-low",
            RiskBand::Uncertain => "risk-badge risk-uncertain",
        }
    }
}

/// The server emits naive ISO-8601 timestamps; accept RFC 3339 too.
fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .ok()
}
