//! Optimistic mutation tests
//!
//! Drive the mutation coordinator against the in-memory service and check
//! what the cache shows before, during and after each call settles.

mod common;

use common::{setup, setup_with, setup_with_titles};
use futures::future::join_all;
use kanban::testing::{fixtures, Failure, Operation};
use kanban::{
    MutationEvent, MutationKind, QueryKey, TaskId, TaskPatch, TaskPriority, TaskStatus,
    NETWORK_ERROR_MESSAGE,
};

#[tokio::test]
async fn test_successful_sequence_matches_service() {
    let h = setup_with_titles(&["Plan", "Build", "Ship"]).await;

    let draft = h
        .coordinator
        .create_task(fixtures::task_input("Draft"))
        .await
        .expect("create");
    h.coordinator
        .update_task(TaskId(1), TaskPatch::default().with_title("Plan sprint"))
        .await
        .expect("rename");
    h.coordinator.delete_task(TaskId(2)).await.expect("delete");
    h.coordinator
        .update_task(draft.id, TaskPatch::status(TaskStatus::Done))
        .await
        .expect("finish draft");

    assert_eq!(h.cached_tasks(), h.service.tasks());
}

#[tokio::test]
async fn test_concurrent_mutations_on_different_tasks() {
    let h = setup_with_titles(&["a", "b", "c", "d"]).await;

    let updates = (1..=4).map(|id| {
        h.coordinator.update_task(
            TaskId(id),
            TaskPatch::status(TaskStatus::InProgress).with_priority(TaskPriority::High),
        )
    });
    let creates = ["e", "f"].map(|t| h.coordinator.create_task(fixtures::task_input(t)));

    let (updated, created) = futures::join!(join_all(updates), join_all(creates));
    assert!(updated.iter().all(|r| r.is_ok()));
    assert!(created.iter().all(|r| r.is_ok()));

    let cached = h.cached_tasks();
    assert_eq!(cached, h.service.tasks());
    assert_eq!(cached.len(), 6);
    assert!(cached.iter().all(|t| !t.id.is_optimistic()));
}

#[tokio::test]
async fn test_optimistic_create_visible_before_settlement() {
    let h = setup_with_titles(&["Existing"]).await;
    let gate = h.service.gate(Operation::CreateTask);

    let coordinator = h.coordinator.clone();
    let pending =
        tokio::spawn(async move { coordinator.create_task(fixtures::task_input("Draft")).await });
    gate.entered().await;

    let cached = h.cache.read_tasks().expect("list cached");
    assert_eq!(cached.len(), 2);
    let draft = cached.iter().find(|t| t.title == "Draft").expect("draft shown");
    assert!(draft.id.is_optimistic());
    assert!(h.service.tasks().iter().all(|t| t.id != draft.id));

    gate.open();
    let created = pending.await.expect("join").expect("create");

    let cached = h.cached_tasks();
    assert_eq!(cached.len(), 2);
    assert!(cached.contains(&created));
    assert!(cached.iter().all(|t| !t.id.is_optimistic()));
}

#[tokio::test]
async fn test_offline_create_shows_then_reverts() {
    let h = setup_with_titles(&["Existing"]).await;
    let before = h.cache.read(QueryKey::Tasks);
    let mut events = h.coordinator.subscribe();

    h.service.set_offline(true);
    let gate = h.service.gate(Operation::CreateTask);
    let coordinator = h.coordinator.clone();
    let pending =
        tokio::spawn(async move { coordinator.create_task(fixtures::task_input("Offline")).await });
    gate.entered().await;

    let during = h.cache.read_tasks().expect("list cached");
    assert!(during.iter().any(|t| t.title == "Offline"));

    gate.open();
    let err = pending.await.expect("join").unwrap_err();
    assert_eq!(err.kind, MutationKind::CreateTask);
    assert!(err.user_message().contains("create"));
    assert!(err.user_message().contains(NETWORK_ERROR_MESSAGE));
    assert_eq!(h.cache.read(QueryKey::Tasks), before);

    assert!(matches!(events.recv().await, Ok(MutationEvent::Applied { .. })));
    match events.recv().await {
        Ok(MutationEvent::RolledBack { kind, error, .. }) => {
            assert_eq!(kind, MutationKind::CreateTask);
            assert_eq!(error, NETWORK_ERROR_MESSAGE);
        }
        other => panic!("expected rollback event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_update_restores_exact_snapshot() {
    let h = setup_with(vec![
        fixtures::task_input("Report")
            .with_description("Quarterly")
            .with_priority(TaskPriority::High)
            .with_due_date(fixtures::date(2024, 6, 14)),
        fixtures::task_input("Other"),
    ])
    .await;
    let before = h.cache.read(QueryKey::Tasks);

    h.service
        .fail_next(Operation::UpdateTask, Failure::Server(500));
    let err = h
        .coordinator
        .update_task(
            TaskId(1),
            TaskPatch::status(TaskStatus::Done).with_due_date(None),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, MutationKind::UpdateTask);
    assert_eq!(h.cache.read(QueryKey::Tasks), before);
    assert!(!h.cache.is_stale(QueryKey::Tasks));
    assert_eq!(h.service.task(TaskId(1)).map(|t| t.status), Some(TaskStatus::Todo));
}

#[tokio::test]
async fn test_rejected_update_message_names_operation() {
    let h = setup_with_titles(&["Keep"]).await;
    let err = h
        .coordinator
        .update_task(TaskId(1), TaskPatch::default().with_title("   "))
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Failed to update task: Title is required");
    assert_eq!(h.cached_tasks()[0].title, "Keep");
}

#[tokio::test]
async fn test_delete_of_missing_task_resyncs() {
    let h = setup_with_titles(&["Gone"]).await;
    h.service.fail_next(Operation::DeleteTask, Failure::NotFound);

    let err = h.coordinator.delete_task(TaskId(1)).await.unwrap_err();

    assert!(err.source.is_not_found());
    assert_eq!(h.cached_tasks().len(), 1);
    assert!(h.cache.is_stale(QueryKey::Tasks));
}

#[tokio::test]
async fn test_update_without_response_body_keeps_merged_task() {
    let h = setup_with(vec![fixtures::task_input("Quiet").with_description("no body")]).await;
    h.service.respond_without_body_on_update(true);

    let task = h
        .coordinator
        .update_task(TaskId(1), TaskPatch::status(TaskStatus::InProgress))
        .await
        .expect("update");

    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.description.as_deref(), Some("no body"));
    assert_eq!(h.cached_tasks(), h.service.tasks());
}

#[tokio::test]
async fn test_board_delete_drops_its_tasks() {
    let h = setup();
    let side = h.service.seed_board("Side");
    h.service.seed_task(fixtures::task_input("main"));
    h.service.seed_task(kanban::TaskInput::new("side", side.id));
    h.cache.fetch(QueryKey::Tasks).await.expect("load");

    h.coordinator.delete_board(side.id).await.expect("delete board");
    assert!(h.cache.is_stale(QueryKey::Tasks));

    h.cache.fetch(QueryKey::Tasks).await.expect("reload");
    let titles: Vec<_> = h.cached_tasks().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["main".to_string()]);
}

#[tokio::test]
async fn test_overlapping_creates_with_mixed_outcomes_leave_no_temporary_task() {
    let h = setup_with_titles(&["Existing"]).await;
    assert_eq!(h.cache.subscriber_count(QueryKey::Tasks), 0);

    let first_gate = h.service.gate(Operation::CreateTask);
    let coordinator = h.coordinator.clone();
    let first =
        tokio::spawn(async move { coordinator.create_task(fixtures::task_input("A")).await });
    first_gate.entered().await;

    let second_gate = h.service.gate(Operation::CreateTask);
    let coordinator = h.coordinator.clone();
    let second =
        tokio::spawn(async move { coordinator.create_task(fixtures::task_input("B")).await });
    second_gate.entered().await;

    first_gate.open();
    let created = first.await.expect("join").expect("first create");
    assert_eq!(created.id, TaskId(2));

    h.service.fail_next(Operation::CreateTask, Failure::Network);
    second_gate.open();
    assert!(second.await.expect("join").is_err());

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while h.cached_tasks() != h.service.tasks() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("cache resyncs with the service");

    let cached = h.cached_tasks();
    assert!(cached.iter().all(|t| !t.id.is_optimistic()));
    assert_eq!(
        cached.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
        vec!["Existing", "A"]
    );
}
