use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use reqwest::Method;
use tracing::{debug, info};

use crate::error::{ApiError, MechaLungError};
use crate::models::{PatientDraft, PatientList, PatientRecord};
use crate::transport::{encode_body, ApiClient, HttpBackend};

const PATIENTS_PATH: &str = "/api/patients";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Pending {
    Fetch,
    Create,
    Refresh(i64),
    Update(i64),
    Remove(i64),
}

impl Pending {
    fn describe(self) -> String {
        match self {
            Pending::Fetch => "Loading patients".to_string(),
            Pending::Create => "Adding a patient".to_string(),
            Pending::Refresh(id) => format!("Reloading patient {}", id),
            Pending::Update(id) => format!("Updating patient {}", id),
            Pending::Remove(id) => format!("Deleting patient {}", id),
        }
    }
}

/// Clears its slot in the pending set when the operation resolves, unless
/// [`RosterCache::clear`] already handed the slot to a newer session.
struct PendingGuard<'a> {
    pending: &'a RefCell<HashMap<Pending, u64>>,
    op: Pending,
    epoch: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.borrow_mut();
        if pending.get(&self.op) == Some(&self.epoch) {
            pending.remove(&self.op);
        }
    }
}

/// Local mirror of the doctor's patient records.
///
/// Every mutation is a round trip: the roster only changes after the server
/// answers, and then only to the record the server returned. Results that
/// arrive after [`RosterCache::clear`] are dropped so a signed-out roster
/// stays empty.
pub struct RosterCache<B> {
    api: Rc<ApiClient<B>>,
    records: RefCell<Vec<PatientRecord>>,
    /// In-flight operations, tagged with the epoch they started in.
    pending: RefCell<HashMap<Pending, u64>>,
    epoch: Cell<u64>,
}

impl<B: HttpBackend> RosterCache<B> {
    pub fn new(api: Rc<ApiClient<B>>) -> Self {
        Self {
            api,
            records: RefCell::new(Vec::new()),
            pending: RefCell::new(HashMap::new()),
            epoch: Cell::new(0),
        }
    }

    pub fn records(&self) -> Vec<PatientRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn get(&self, id: i64) -> Option<PatientRecord> {
        self.records.borrow().iter().find(|r| r.id == id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.borrow().contains_key(&Pending::Fetch)
    }

    pub fn is_deleting(&self, id: i64) -> bool {
        self.pending.borrow().contains_key(&Pending::Remove(id))
    }

    /// Session generation; changes on every [`clear`](RosterCache::clear).
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Replace the roster with the server's full list, in server order.
    pub async fn fetch_all(&self) -> Result<usize, MechaLungError> {
        let _guard = self.begin(Pending::Fetch)?;
        let epoch = self.epoch.get();

        let response = self
            .api
            .authenticated_request::<PatientList>(Method::GET, PATIENTS_PATH, None)
            .await?;

        let PatientList(list) = response.data;
        let count = list.len();
        if self.apply(epoch, |records| *records = list) {
            info!("Loaded {} patients", count);
        }
        Ok(count)
    }

    /// Create a record and put the server's copy at the head of the roster.
    pub async fn create(&self, draft: &PatientDraft) -> Result<PatientRecord, MechaLungError> {
        let _guard = self.begin(Pending::Create)?;
        let epoch = self.epoch.get();
        let body = encode_body(draft)?;

        let response = self
            .api
            .authenticated_request::<PatientRecord>(Method::POST, PATIENTS_PATH, Some(body))
            .await?;

        let created = response.data;
        let applied = self.apply(epoch, |records| {
            records.retain(|r| r.id != created.id);
            records.insert(0, created.clone());
        });
        if applied {
            info!("Created patient {}", created.id);
        }
        Ok(created)
    }

    /// Update a record in place with the server's returned copy.
    pub async fn update(
        &self,
        id: i64,
        draft: &PatientDraft,
    ) -> Result<PatientRecord, MechaLungError> {
        let _guard = self.begin(Pending::Update(id))?;
        let epoch = self.epoch.get();
        let body = encode_body(draft)?;

        let response = self
            .api
            .authenticated_request::<PatientRecord>(Method::PUT, &patient_path(id), Some(body))
            .await?;

        let updated = expect_id(id, response.data, response.status)?;
        if self.apply(epoch, |records| upsert(records, updated.clone())) {
            info!("Updated patient {}", id);
        }
        Ok(updated)
    }

    /// Delete a record; it leaves the roster only once the server confirms.
    pub async fn remove(&self, id: i64) -> Result<(), MechaLungError> {
        let _guard = self.begin(Pending::Remove(id))?;
        let epoch = self.epoch.get();

        self.api
            .authenticated_request::<serde_json::Value>(Method::DELETE, &patient_path(id), None)
            .await?;

        if self.apply(epoch, |records| records.retain(|r| r.id != id)) {
            info!("Deleted patient {}", id);
        }
        Ok(())
    }

    /// Re-read a single record from the server.
    pub async fn refresh(&self, id: i64) -> Result<PatientRecord, MechaLungError> {
        let _guard = self.begin(Pending::Refresh(id))?;
        let epoch = self.epoch.get();

        let response = self
            .api
            .authenticated_request::<PatientRecord>(Method::GET, &patient_path(id), None)
            .await?;

        let record = expect_id(id, response.data, response.status)?;
        self.apply(epoch, |records| upsert(records, record.clone()));
        Ok(record)
    }

    /// Drop every record. Responses to requests issued before this call are
    /// ignored, and those requests no longer block new ones.
    pub fn clear(&self) {
        self.epoch.set(self.epoch.get() + 1);
        self.records.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        debug!("Roster cleared");
    }

    fn begin(&self, op: Pending) -> Result<PendingGuard<'_>, MechaLungError> {
        let epoch = self.epoch.get();
        let mut pending = self.pending.borrow_mut();
        if pending.contains_key(&op) {
            return Err(MechaLungError::Busy(op.describe()));
        }
        pending.insert(op, epoch);
        Ok(PendingGuard {
            pending: &self.pending,
            op,
            epoch,
        })
    }

    fn apply(&self, epoch: u64, change: impl FnOnce(&mut Vec<PatientRecord>)) -> bool {
        if self.epoch.get() != epoch {
            debug!("Discarding roster change from a previous session");
            return false;
        }
        change(&mut self.records.borrow_mut());
        true
    }
}

fn patient_path(id: i64) -> String {
    format!("{}/{}", PATIENTS_PATH, id)
}

fn expect_id(
    id: i64,
    record: PatientRecord,
    status: u16,
) -> Result<PatientRecord, MechaLungError> {
    if record.id != id {
        return Err(ApiError::Malformed {
            status,
            reason: format!("asked for patient {} but received {}", id, record.id),
        }
        .into());
    }
    Ok(record)
}

/// Replace the record with the same id in place, or put it first if absent.
fn upsert(records: &mut Vec<PatientRecord>, record: PatientRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(slot) => *slot = record,
        None => records.insert(0, record),
    }
}
