mod common;

use common::setup;
use tasksync_core::{
    domain::{CategoryDraft, NewTask, TaskChanges},
    PortError,
};

fn draft(name: &str) -> CategoryDraft {
    CategoryDraft {
        name: name.to_string(),
        color_header: "#123456".to_string(),
        color_body: "#abcdef".to_string(),
    }
}

#[tokio::test]
async fn deleting_a_category_moves_its_tasks_to_default() {
    let h = setup().await;
    h.register("alice").await;
    let work = h
        .service()
        .create_category("alice", draft("work"))
        .await
        .unwrap();

    for title in ["report", "slides"] {
        h.service()
            .create_task(
                "alice",
                NewTask {
                    title: title.to_string(),
                    category_id: Some(work),
                    ..NewTask::default()
                },
            )
            .await
            .unwrap();
    }
    h.create("alice", "groceries").await;

    let tasks = h.service().delete_category("alice", work).await.unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.category.is_default && t.category.id != work));

    let categories = h.service().categories_for_user("alice").await.unwrap();
    assert_eq!(categories.len(), 1);
    assert!(categories[0].is_default);
}

#[tokio::test]
async fn the_default_category_cannot_be_deleted() {
    let h = setup().await;
    h.register("alice").await;
    let default = h.service().categories_for_user("alice").await.unwrap()[0].id;

    let result = h.service().delete_category("alice", default).await;
    assert!(matches!(result, Err(PortError::Validation(_))));
}

#[tokio::test]
async fn categories_are_private_to_their_owner() {
    let h = setup().await;
    h.register("alice").await;
    h.register("bob").await;
    let bobs = h
        .service()
        .create_category("bob", draft("bob only"))
        .await
        .unwrap();

    let create = h
        .service()
        .create_task(
            "alice",
            NewTask {
                title: "sneaky".to_string(),
                category_id: Some(bobs),
                ..NewTask::default()
            },
        )
        .await;
    assert!(matches!(create, Err(PortError::NotFound(_))));

    let rename = h
        .service()
        .update_category("alice", bobs, draft("stolen"))
        .await;
    assert!(matches!(rename, Err(PortError::NotFound(_))));

    let delete = h.service().delete_category("alice", bobs).await;
    assert!(matches!(delete, Err(PortError::NotFound(_))));

    let names: Vec<String> = h
        .service()
        .categories_for_user("bob")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["default", "bob only"]);
}

#[tokio::test]
async fn owner_can_recategorise_a_task() {
    let h = setup().await;
    h.register("alice").await;
    let home = h
        .service()
        .create_category("alice", draft("home"))
        .await
        .unwrap();
    let id = h.create("alice", "dishes").await;

    h.service()
        .update_task(
            "alice",
            TaskChanges {
                id,
                title: "dishes".to_string(),
                description: "after dinner".to_string(),
                is_done: false,
                category_id: home,
            },
        )
        .await
        .unwrap();

    let task = h.tasks("alice").await.remove(0);
    assert_eq!(task.category.name, "home");
    assert_eq!(task.description, "after dinner");
}

#[tokio::test]
async fn updated_category_is_visible_on_its_tasks() {
    let h = setup().await;
    h.register("alice").await;
    let errands = h
        .service()
        .create_category("alice", draft("errands"))
        .await
        .unwrap();
    h.service()
        .create_task(
            "alice",
            NewTask {
                title: "post office".to_string(),
                category_id: Some(errands),
                ..NewTask::default()
            },
        )
        .await
        .unwrap();

    h.service()
        .update_category("alice", errands, draft("chores"))
        .await
        .unwrap();
    assert_eq!(h.tasks("alice").await[0].category.name, "chores");

    let empty = h.service().create_category("alice", draft(" ")).await;
    assert!(matches!(empty, Err(PortError::Validation(_))));
}
