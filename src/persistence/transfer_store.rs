//! Read contract for persisted transfer tasks.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::persistence::transfer_task::TransferTask;

/// One page of transfer tasks.
#[derive(Debug, Clone, Default)]
pub struct TransferTaskPage {
    /// Tasks ordered by `task_id`, all within `(read_level, max_read_level]`.
    pub tasks: Vec<TransferTask>,
    /// Whether more tasks remain below `max_read_level`.
    pub has_more: bool,
}

/// Paginated read access to the shard's transfer queue.
#[async_trait]
pub trait TransferTaskStore: Send + Sync {
    /// Read up to `batch_size` tasks with `read_level < task_id <=
    /// max_read_level`, in task-id order.
    async fn get_transfer_tasks(
        &self,
        read_level: i64,
        max_read_level: i64,
        batch_size: usize,
    ) -> Result<TransferTaskPage, PersistenceError>;
}
