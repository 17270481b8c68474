//! Recording matching client.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::MatchingError;
use crate::matching::{AddActivityTaskRequest, AddDecisionTaskRequest, MatchingClient};

#[derive(Default)]
pub struct MockMatchingClient {
    activity: Mutex<Vec<AddActivityTaskRequest>>,
    decision: Mutex<Vec<AddDecisionTaskRequest>>,
}

impl MockMatchingClient {
    pub fn activity_requests(&self) -> Vec<AddActivityTaskRequest> {
        self.activity.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn decision_requests(&self) -> Vec<AddDecisionTaskRequest> {
        self.decision.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MatchingClient for MockMatchingClient {
    async fn add_activity_task(
        &self,
        request: AddActivityTaskRequest,
    ) -> Result<(), MatchingError> {
        self.activity
            .lock()
            .map_err(|_| MatchingError::Rpc("mock poisoned".to_string()))?
            .push(request);
        Ok(())
    }

    async fn add_decision_task(
        &self,
        request: AddDecisionTaskRequest,
    ) -> Result<(), MatchingError> {
        self.decision
            .lock()
            .map_err(|_| MatchingError::Rpc("mock poisoned".to_string()))?
            .push(request);
        Ok(())
    }
}
