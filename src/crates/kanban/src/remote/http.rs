//! HTTP implementation of the task service

use crate::error::Result;
use crate::models::{Board, BoardInput, Task, TaskId, TaskInput};
use crate::remote::RemoteTaskService;
use async_trait::async_trait;
use tracing::debug;
use utils::{ClientConfig, HttpClient};

/// Task service reached over JSON/HTTP.
///
/// Routes: `/tasks`, `/tasks/{id}`, `/boards`, `/boards/{id}`.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: HttpClient,
}

impl HttpTaskService {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }

    pub fn from_client(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }
}

#[async_trait]
impl RemoteTaskService for HttpTaskService {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        debug!("GET /tasks");
        Ok(self.client.get_json("/tasks").await?)
    }

    async fn get_task(&self, id: TaskId) -> Result<Task> {
        Ok(self.client.get_json(&format!("/tasks/{}", id)).await?)
    }

    async fn create_task(&self, input: &TaskInput) -> Result<Task> {
        debug!(title = %input.title, board_id = input.board_id, "POST /tasks");
        Ok(self.client.post_json("/tasks", input).await?)
    }

    async fn update_task(&self, id: TaskId, input: &TaskInput) -> Result<Option<Task>> {
        debug!(task_id = %id, "PUT /tasks/{{id}}");
        Ok(self.client.put_json(&format!("/tasks/{}", id), input).await?)
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        debug!(task_id = %id, "DELETE /tasks/{{id}}");
        Ok(self.client.delete(&format!("/tasks/{}", id)).await?)
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        Ok(self.client.get_json("/boards").await?)
    }

    async fn get_board(&self, id: i64) -> Result<Board> {
        Ok(self.client.get_json(&format!("/boards/{}", id)).await?)
    }

    async fn create_board(&self, input: &BoardInput) -> Result<Board> {
        Ok(self.client.post_json("/boards", input).await?)
    }

    async fn update_board(&self, id: i64, input: &BoardInput) -> Result<Option<Board>> {
        Ok(self.client.put_json(&format!("/boards/{}", id), input).await?)
    }

    async fn delete_board(&self, id: i64) -> Result<()> {
        Ok(self.client.delete(&format!("/boards/{}", id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KanbanError;
    use std::time::Duration;

    #[test]
    fn test_new_rejects_empty_base_url() {
        let result = HttpTaskService::new(ClientConfig::new(""));
        assert!(matches!(result, Err(KanbanError::Other(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_maps_to_network_error() {
        let service = HttpTaskService::new(
            ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let err = service.list_tasks().await.unwrap_err();
        assert!(matches!(err, KanbanError::Network(_)));
        assert!(err.is_retryable());
    }
}
