// Delete-authorization flow through the resolver, which is the actual
// guard in front of the comment store.


use test_utils::*;

use commentsback::{
    error::AppError,
    model::{Identity, Requester},
};
use time::macros::datetime;

fn identity(name: &str, email: &str) -> Requester {
    Requester::Identity(Identity {
        name: name.to_string(),
        email: email.to_string(),
    })
}

#[tokio::test]
async fn owner_can_delete_non_owner_cannot_admin_always_can() {
    let ctx = TestContext::new();
    let now = datetime!(2026-08-29 12:00 UTC);

    let lee = ctx
        .gate
        .submit("post-1", payload("Lee", "lee@x.com", "mine"), now)
        .await
        .unwrap();

    // Wrong email blocks the action entirely; the comment stays.
    match ctx.resolver.delete(lee.id, &identity("Lee", "other@x.com")).await {
        Err(AppError::Unauthorized) => {}
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    assert_eq!(ctx.gate.list("post-1").await.unwrap().len(), 1);

    // Exact match succeeds.
    ctx.resolver
        .delete(lee.id, &identity("Lee", "lee@x.com"))
        .await
        .expect("owner delete should succeed");
    assert!(ctx.gate.list("post-1").await.unwrap().is_empty());

    // Admin deletes regardless of the author fields.
    let kim = ctx
        .gate
        .submit("post-1", payload("Kim", "kim@x.com", "hers"), now)
        .await
        .unwrap();
    ctx.resolver
        .delete(kim.id, &Requester::Admin)
        .await
        .expect("admin delete should succeed");
    assert!(ctx.gate.list("post-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_of_missing_comment_is_not_found() {
    let ctx = TestContext::new();
    match ctx.resolver.delete(uuid::Uuid::new_v4(), &Requester::Admin).await {
        Err(AppError::NotFound) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn can_delete_by_id_drives_button_visibility() {
    let ctx = TestContext::new();
    let now = datetime!(2026-08-29 12:00 UTC);
    let lee = ctx
        .gate
        .submit("post-1", payload("Lee", "lee@x.com", "mine"), now)
        .await
        .unwrap();

    assert!(ctx
        .resolver
        .can_delete_by_id(lee.id, &identity("Lee", "lee@x.com"))
        .await
        .unwrap());
    assert!(!ctx
        .resolver
        .can_delete_by_id(lee.id, &identity("Lee", "other@x.com"))
        .await
        .unwrap());
    assert!(ctx
        .resolver
        .can_delete_by_id(lee.id, &Requester::Admin)
        .await
        .unwrap());

    // The visibility check is only a convenience: a forged delete with a
    // non-matching identity is still refused at the resolver.
    match ctx.resolver.delete(lee.id, &identity("Mallory", "lee@x.com")).await {
        Err(AppError::Unauthorized) => {}
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}
