use std::sync::{Arc, RwLock};

use sponsorkit_common::{Result, SessionEpoch, SessionTicket, SponsorError, Task, TaskId, TaskStatus};
use tracing::{debug, info, warn};

use crate::relay::RelayClient;

/// Ordered list of relay tasks submitted during the current session.
pub struct TransactionTracker {
    relay: Arc<dyn RelayClient>,
    epoch: SessionEpoch,
    tasks: RwLock<Vec<Task>>,
}

impl TransactionTracker {
    pub fn new(relay: Arc<dyn RelayClient>, epoch: SessionEpoch) -> Self {
        Self {
            relay,
            epoch,
            tasks: RwLock::new(Vec::new()),
        }
    }

    /// Append a submitted task as pending. A task equal to the most recent
    /// entry is not appended twice. Returns whether the list changed.
    pub fn record(&self, ticket: &SessionTicket, task_id: TaskId) -> Result<bool> {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        if !ticket.is_current() {
            debug!(%task_id, "Dropping task submitted by an ended session");
            return Err(SponsorError::SessionExpired);
        }
        if tasks.last().is_some_and(|t| t.id == task_id) {
            return Ok(false);
        }
        info!(%task_id, "Tracking relay task");
        tasks.push(Task::pending(task_id));
        Ok(true)
    }

    /// Snapshot in submission order.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| !t.status.is_terminal())
            .count()
    }

    /// Poll the relay for every pending task and apply terminal outcomes.
    ///
    /// Tasks already `Successful` or `Failed` are never queried again. A
    /// failed query leaves its task pending. Results are discarded when the
    /// session ended while the queries were in flight. Returns the number of
    /// tasks that changed state.
    pub async fn refresh(&self) -> usize {
        let ticket = self.epoch.ticket();
        let pending: Vec<TaskId> = self
            .tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.id.clone())
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let mut outcomes: Vec<(TaskId, TaskStatus)> = Vec::new();
        for task_id in pending {
            match self.relay.task_state(&task_id).await {
                Ok(state) if state.is_terminal() => outcomes.push((task_id, state.task_status())),
                Ok(state) => debug!(%task_id, ?state, "Task still pending"),
                Err(e) => warn!(%task_id, error = %e, "Task status query failed"),
            }
        }

        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        if !ticket.is_current() {
            debug!("Discarding task refresh from an ended session");
            return 0;
        }
        let mut changed = 0;
        for (task_id, status) in outcomes {
            if let Some(task) = tasks
                .iter_mut()
                .find(|t| t.id == task_id && t.status == TaskStatus::Pending)
            {
                task.status = status;
                changed += 1;
                info!(%task_id, ?status, "Relay task settled");
            }
        }
        changed
    }

    pub fn clear(&self) {
        self.tasks.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
