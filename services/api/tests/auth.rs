mod common;

use chrono::{Duration, Utc};
use common::setup;
use tasksync_core::{PortError, UserStore};

#[tokio::test]
async fn tokens_resolve_until_they_expire_or_log_out() {
    let h = setup().await;
    h.register("alice").await;
    let users = &h.state.users;

    users
        .create_auth_session("fresh", "alice", Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    users
        .create_auth_session("stale", "alice", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(users.validate_auth_session("fresh").await.unwrap(), "alice");
    assert!(matches!(
        users.validate_auth_session("stale").await,
        Err(PortError::Unauthorized)
    ));
    assert!(matches!(
        users.validate_auth_session("unknown").await,
        Err(PortError::Unauthorized)
    ));

    users.delete_auth_session("fresh").await.unwrap();
    assert!(matches!(
        users.validate_auth_session("fresh").await,
        Err(PortError::Unauthorized)
    ));
}

#[tokio::test]
async fn names_are_unique() {
    let h = setup().await;
    h.register("alice").await;

    let again = h.service().register_user("alice", "other-hash").await;
    assert!(matches!(again, Err(PortError::Conflict(_))));

    let blank = h.service().register_user("  ", "hash").await;
    assert!(matches!(blank, Err(PortError::Validation(_))));

    // The failed registration must not leave a second default category behind.
    let categories = h.service().categories_for_user("alice").await.unwrap();
    assert_eq!(categories.len(), 1);
}

#[tokio::test]
async fn credentials_are_stored_for_login() {
    let h = setup().await;
    h.register("alice").await;

    let credentials = h.state.users.get_user_credentials("alice").await.unwrap();
    assert_eq!(credentials.password_hash, "not-a-real-hash");
    assert!(matches!(
        h.state.users.get_user_credentials("bob").await,
        Err(PortError::NotFound(_))
    ));
}
