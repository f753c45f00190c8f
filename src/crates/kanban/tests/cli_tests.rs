//! CLI handler tests over the in-memory service

use kanban::cli::{board, task, AppContext};
use kanban::testing::{fixtures, Failure, InMemoryTaskService, Operation};
use kanban::{KanbanConfig, TaskFilter, TaskId, TaskPatch, TaskStatus};
use std::sync::Arc;

fn context() -> (Arc<InMemoryTaskService>, AppContext) {
    let service = Arc::new(InMemoryTaskService::with_default_board());
    let ctx = AppContext::with_remote(KanbanConfig::default(), service.clone());
    (service, ctx)
}

#[tokio::test]
async fn test_create_then_move() {
    let (service, ctx) = context();

    task::handle_create(&ctx, fixtures::task_input("From the CLI"))
        .await
        .expect("create");
    task::handle_move(&ctx, 1, TaskStatus::InProgress)
        .await
        .expect("move");

    assert_eq!(
        service.task(TaskId(1)).map(|t| t.status),
        Some(TaskStatus::InProgress)
    );
}

#[tokio::test]
async fn test_move_unknown_task_fails() {
    let (_, ctx) = context();
    let err = task::handle_move(&ctx, 42, TaskStatus::Done).await.unwrap_err();
    assert!(err.to_string().contains("42"));
}

#[tokio::test]
async fn test_empty_update_is_a_no_op() {
    let (service, ctx) = context();
    service.seed_task(fixtures::task_input("Unchanged"));

    task::handle_update(&ctx, 1, TaskPatch::default())
        .await
        .expect("no-op");
    assert_eq!(service.mutation_calls(), 0);
}

#[tokio::test]
async fn test_failed_delete_surfaces_message() {
    let (service, ctx) = context();
    service.seed_task(fixtures::task_input("Sticky"));
    service.fail_next(Operation::DeleteTask, Failure::Server(503));

    let err = task::handle_delete(&ctx, 1).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to delete task"));
    assert!(service.task(TaskId(1)).is_some());
}

#[tokio::test]
async fn test_board_commands() {
    let (service, ctx) = context();

    board::handle_create(&ctx, "Roadmap".to_string())
        .await
        .expect("create board");
    board::handle_rename(&ctx, 2, "Roadmap 2025".to_string())
        .await
        .expect("rename board");
    board::handle_list(&ctx).await.expect("list boards");
    board::handle_show(&ctx, TaskFilter::default())
        .await
        .expect("show board");

    let err = board::handle_create(&ctx, "x".repeat(201)).await.unwrap_err();
    assert!(err.to_string().contains("create board"));
    assert_eq!(service.calls(Operation::CreateBoard), 1);
}
