mod common;

use common::setup;
use tasksync_core::{domain::NewTask, PortError};

#[tokio::test]
async fn create_and_delete_keep_the_owner_sequence_dense() {
    let h = setup().await;
    h.register("alice").await;

    let milk = h.create("alice", "Buy milk").await;
    let rent = h.create("alice", "Pay rent").await;
    let _ = h.create("alice", "Call mom").await;
    assert_eq!(h.positions("alice").await, vec![1, 2, 3]);

    h.service().delete_task("alice", milk).await.unwrap();
    h.assert_dense("alice").await;
    assert_eq!(h.titles("alice").await, vec!["Pay rent", "Call mom"]);

    let rent_task = h
        .tasks("alice")
        .await
        .into_iter()
        .find(|t| t.id == rent)
        .unwrap();
    assert_eq!(rent_task.order, 1);
}

#[tokio::test]
async fn create_at_a_position_shifts_the_rest() {
    let h = setup().await;
    h.register("alice").await;
    h.create("alice", "first").await;
    h.create("alice", "second").await;

    h.service()
        .create_task(
            "alice",
            NewTask {
                title: "urgent".to_string(),
                position: Some(1),
                ..NewTask::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(h.titles("alice").await, vec!["urgent", "first", "second"]);
    h.assert_dense("alice").await;
}

#[tokio::test]
async fn create_outside_the_sequence_is_rejected() {
    let h = setup().await;
    h.register("alice").await;
    h.create("alice", "only").await;

    for position in [0, 3] {
        let result = h
            .service()
            .create_task(
                "alice",
                NewTask {
                    title: "misplaced".to_string(),
                    position: Some(position),
                    ..NewTask::default()
                },
            )
            .await;
        assert!(matches!(result, Err(PortError::Validation(_))));
    }
    assert_eq!(h.titles("alice").await, vec!["only"]);
}

#[tokio::test]
async fn empty_title_is_rejected() {
    let h = setup().await;
    h.register("alice").await;
    let result = h
        .service()
        .create_task(
            "alice",
            NewTask {
                title: "   ".to_string(),
                ..NewTask::default()
            },
        )
        .await;
    assert!(matches!(result, Err(PortError::Validation(_))));
    assert!(h.tasks("alice").await.is_empty());
}

#[tokio::test]
async fn swap_exchanges_neighbours_only() {
    let h = setup().await;
    h.register("alice").await;
    let a = h.create("alice", "a").await;
    let b = h.create("alice", "b").await;
    let c = h.create("alice", "c").await;

    h.service().swap_order("alice", a, b).await.unwrap();
    assert_eq!(h.titles("alice").await, vec!["b", "a", "c"]);

    let result = h.service().swap_order("alice", b, c).await;
    assert!(matches!(result, Err(PortError::Validation(_))));
    assert_eq!(h.titles("alice").await, vec!["b", "a", "c"]);

    let result = h.service().swap_order("alice", a, a).await;
    assert!(matches!(result, Err(PortError::Validation(_))));
    h.assert_dense("alice").await;
}

#[tokio::test]
async fn swap_of_a_task_outside_the_list_is_not_found() {
    let h = setup().await;
    h.register("alice").await;
    h.register("bob").await;
    let a = h.create("alice", "a").await;
    let theirs = h.create("bob", "theirs").await;

    let result = h.service().swap_order("alice", a, theirs).await;
    assert!(matches!(result, Err(PortError::NotFound(_))));
}

#[tokio::test]
async fn move_task_reorders_across_any_distance() {
    let h = setup().await;
    h.register("alice").await;
    let a = h.create("alice", "a").await;
    h.create("alice", "b").await;
    h.create("alice", "c").await;
    let d = h.create("alice", "d").await;

    h.service().move_task("alice", a, 4).await.unwrap();
    assert_eq!(h.titles("alice").await, vec!["b", "c", "d", "a"]);

    h.service().move_task("alice", d, 1).await.unwrap();
    assert_eq!(h.titles("alice").await, vec!["d", "b", "c", "a"]);

    let result = h.service().move_task("alice", d, 5).await;
    assert!(matches!(result, Err(PortError::Validation(_))));
    h.assert_dense("alice").await;
}

#[tokio::test]
async fn share_appends_after_the_recipients_own_tasks() {
    let h = setup().await;
    h.register("alice").await;
    h.register("bob").await;
    h.create("bob", "bob 1").await;
    h.create("bob", "bob 2").await;
    let shared = h.create("alice", "from alice").await;

    h.service().share_task("alice", shared, "bob").await.unwrap();
    assert_eq!(
        h.titles("bob").await,
        vec!["bob 1", "bob 2", "from alice"]
    );
    h.assert_dense("bob").await;

    // The recipient's position is independent of the owner's.
    let as_seen_by_alice = h.tasks("alice").await;
    assert_eq!(as_seen_by_alice[0].order, 1);
}

#[tokio::test]
async fn unshare_and_delete_close_the_recipients_gap() {
    let h = setup().await;
    h.register("alice").await;
    h.register("bob").await;
    let first = h.create("alice", "first").await;
    let second = h.create("alice", "second").await;
    h.create("bob", "bob own").await;

    h.service().share_task("alice", first, "bob").await.unwrap();
    h.service().share_task("alice", second, "bob").await.unwrap();
    assert_eq!(h.positions("bob").await, vec![1, 2, 3]);

    h.service().unshare_task("alice", first, "bob").await.unwrap();
    h.assert_dense("bob").await;
    assert_eq!(h.titles("bob").await, vec!["bob own", "second"]);

    h.service().delete_task("alice", second).await.unwrap();
    h.assert_dense("bob").await;
    h.assert_dense("alice").await;
    assert_eq!(h.titles("bob").await, vec!["bob own"]);
}
