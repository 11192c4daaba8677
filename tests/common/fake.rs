use jira_worklog_import::model::{RemoteWorklog, WorklogPayload};
use jira_worklog_import::tracker::{TrackerError, WorklogGateway};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// In-memory tracker.
///
/// Created worklogs show up in later `get_worklogs` calls, so a second import
/// run sees the tags written by the first one.
#[derive(Default)]
pub struct FakeTracker {
    pub worklogs: RefCell<HashMap<String, Vec<RemoteWorklog>>>,
    pub created: RefCell<Vec<(String, WorklogPayload)>>,
    pub deleted: RefCell<Vec<(String, String)>>,
    pub list_calls: Cell<usize>,
    pub create_calls: Cell<usize>,
    /// Errors returned by the next create calls, in order.
    pub create_failures: RefCell<VecDeque<TrackerError>>,
    /// Worklog ids whose deletion fails.
    pub undeletable: RefCell<Vec<String>>,
    pub list_unavailable: Cell<bool>,
    next_id: Cell<u64>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_creates(&self, errors: impl IntoIterator<Item = TrackerError>) {
        self.create_failures.borrow_mut().extend(errors);
    }

    pub fn created_payloads(&self) -> Vec<WorklogPayload> {
        self.created.borrow().iter().map(|(_, p)| p.clone()).collect()
    }
}

impl WorklogGateway for FakeTracker {
    fn issue_exists(&self, issue_key: &str) -> bool {
        self.worklogs.borrow().contains_key(issue_key)
    }

    fn create_worklog(
        &self,
        issue_key: &str,
        payload: &WorklogPayload,
    ) -> Result<String, TrackerError> {
        self.create_calls.set(self.create_calls.get() + 1);
        if let Some(err) = self.create_failures.borrow_mut().pop_front() {
            return Err(err);
        }

        self.next_id.set(self.next_id.get() + 1);
        let id = (10_000 + self.next_id.get()).to_string();
        self.created
            .borrow_mut()
            .push((issue_key.to_string(), payload.clone()));
        self.worklogs
            .borrow_mut()
            .entry(issue_key.to_string())
            .or_default()
            .push(RemoteWorklog {
                id: id.clone(),
                comment: Some(serde_json::Value::String(payload.comment.clone())),
            });
        Ok(id)
    }

    fn get_worklogs(&self, issue_key: &str) -> Result<Vec<RemoteWorklog>, TrackerError> {
        self.list_calls.set(self.list_calls.get() + 1);
        if self.list_unavailable.get() {
            return Err(TrackerError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        Ok(self
            .worklogs
            .borrow()
            .get(issue_key)
            .cloned()
            .unwrap_or_default())
    }

    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> Result<(), TrackerError> {
        if self.undeletable.borrow().iter().any(|id| id == worklog_id) {
            return Err(TrackerError::Status {
                status: 404,
                body: "Worklog does not exist".to_string(),
            });
        }
        self.deleted
            .borrow_mut()
            .push((issue_key.to_string(), worklog_id.to_string()));
        if let Some(list) = self.worklogs.borrow_mut().get_mut(issue_key) {
            list.retain(|w| w.id != worklog_id);
        }
        Ok(())
    }
}
