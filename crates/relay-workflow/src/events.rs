//! Workflow event emission, built on the same publish/subscribe broker
//! the rest of the system uses for in-process notifications.

use relay_kernel::MessageBroker;
use serde_json::json;

pub async fn emit_workflow(broker: &MessageBroker, workflow_id: &str, event: &str) {
    broker
        .publish(format!("workflow.{event}"), json!({"workflow_id": workflow_id}), workflow_id)
        .await;
}

pub async fn emit_task(broker: &MessageBroker, workflow_id: &str, task_id: &str, event: &str) {
    broker
        .publish(format!("task.{event}"), json!({"workflow_id": workflow_id, "task_id": task_id}), workflow_id)
        .await;
}
