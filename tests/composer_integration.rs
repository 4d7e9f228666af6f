//! Composer service integration tests
//!
//! Drive whole composition workflows through `ComposerService` against the
//! in-memory backend, including the concurrent paths (overlapping count
//! requests, double confirmation).

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_test::{assert_err, assert_ok};

use carryofy_broadcast::auth::AdminSession;
use carryofy_broadcast::backend::{BackendError, BackendOperation, MemoryBackend};
use carryofy_broadcast::broadcast::{
    AudienceCountState, AudienceRole, BroadcastStatus, BroadcastType, Channels, DraftUpdate,
    ReviewError, Scheduling, WizardError, WizardStep,
};
use carryofy_broadcast::composer::{ComposerError, ComposerService};
use carryofy_broadcast::config::ComposerConfig;

fn admin() -> AdminSession {
    AdminSession::new("admin-42", vec!["ADMIN".to_string()], "test-token")
}

fn setup() -> (Arc<ComposerService>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::with_sample_data());
    let service = Arc::new(ComposerService::new(backend.clone(), ComposerConfig::default()));
    (service, backend)
}

fn complete_update() -> DraftUpdate {
    DraftUpdate {
        broadcast_type: Some(Some(BroadcastType::OperationalNotice)),
        audience: Some([AudienceRole::Seller, AudienceRole::Rider].into_iter().collect()),
        channels: Some(Channels {
            email: false,
            in_app: true,
        }),
        body: Some("<p>Pickup windows change on Monday</p>".to_string()),
        ..Default::default()
    }
}

async fn walk_to_review(service: &ComposerService, admin: &AdminSession) -> uuid::Uuid {
    let id = service.create(admin).id;
    assert_ok!(service.update_draft(admin, id, complete_update()).await);
    while service.snapshot(admin, id).await.unwrap().step != WizardStep::Review {
        assert_ok!(service.next(admin, id).await);
    }
    id
}

#[tokio::test]
async fn test_stale_audience_count_is_discarded() {
    let (service, backend) = setup();
    let admin = admin();
    let id = service.create(&admin).id;

    // Slow request for buyers
    assert_ok!(
        service
            .update_draft(
                &admin,
                id,
                DraftUpdate {
                    audience: Some([AudienceRole::Buyer].into_iter().collect()),
                    ..Default::default()
                },
            )
            .await
    );
    backend.set_delay(Duration::from_millis(300));
    let slow = {
        let service = service.clone();
        let admin = admin.clone();
        tokio::spawn(async move { service.refresh_audience_count(&admin, id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Fast request after switching to sellers
    backend.set_delay(Duration::ZERO);
    let snapshot = service
        .update_draft(
            &admin,
            id,
            DraftUpdate {
                audience: Some([AudienceRole::Seller].into_iter().collect()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(snapshot.audience_count, AudienceCountState::Ready { .. }));

    assert_ok!(slow.await.unwrap());

    match service.snapshot(&admin, id).await.unwrap().audience_count {
        AudienceCountState::Ready { count } => {
            assert_eq!(count.seller, Some(1_325));
            assert_eq!(count.buyer, None);
        }
        other => panic!("unexpected count state: {:?}", other),
    }
}

#[tokio::test]
async fn test_second_confirm_rejected_while_sending() {
    let (service, backend) = setup();
    let admin = admin();
    let id = walk_to_review(&service, &admin).await;

    assert_ok!(service.submit(&admin, id).await);
    assert_ok!(service.acknowledge(&admin, id, true).await);

    backend.set_delay(Duration::from_millis(300));
    let first = {
        let service = service.clone();
        let admin = admin.clone();
        tokio::spawn(async move { service.confirm(&admin, id, None).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = service.confirm(&admin, id, None).await;
    assert!(matches!(
        second,
        Err(ComposerError::Wizard(WizardError::Review(ReviewError::AlreadySending)))
    ));

    // Edits are refused while the send is in flight
    let edit = service
        .update_draft(
            &admin,
            id,
            DraftUpdate {
                subject: Some("too late".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(edit, Err(ComposerError::Wizard(WizardError::SendInFlight))));
    assert_eq!(service.cleanup_idle(), 0);

    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.receipt.status, BroadcastStatus::Sent);
    assert_eq!(backend.call_count(BackendOperation::CreateBroadcast), 1);
}

#[tokio::test]
async fn test_dropped_confirm_still_settles_the_send() {
    let (service, backend) = setup();
    let admin = admin();
    let id = walk_to_review(&service, &admin).await;

    assert_ok!(service.submit(&admin, id).await);
    assert_ok!(service.acknowledge(&admin, id, true).await);

    // The caller gives up long before the backend answers
    backend.set_delay(Duration::from_millis(300));
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), service.confirm(&admin, id, None)).await;
    assert_err!(abandoned);

    tokio::time::sleep(Duration::from_millis(400)).await;
    backend.set_delay(Duration::ZERO);

    let snapshot = service.snapshot(&admin, id).await.unwrap();
    assert!(!snapshot.sending);
    assert_eq!(snapshot.step, WizardStep::Audience);
    assert_eq!(
        snapshot.last_receipt.map(|receipt| receipt.status),
        Some(BroadcastStatus::Sent)
    );
    assert_eq!(backend.broadcasts().len(), 1);

    // The session is usable again
    assert_ok!(service.update_draft(&admin, id, complete_update()).await);
    assert_ok!(service.discard(&admin, id).await);
}

#[tokio::test]
async fn test_dropped_confirm_with_failed_create_reopens_gate() {
    let (service, backend) = setup();
    let admin = admin();
    let id = walk_to_review(&service, &admin).await;

    assert_ok!(service.submit(&admin, id).await);
    assert_ok!(service.acknowledge(&admin, id, true).await);

    backend.set_delay(Duration::from_millis(300));
    backend.fail_next(BackendOperation::CreateBroadcast, BackendError::Timeout);
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), service.confirm(&admin, id, None)).await;
    assert_err!(abandoned);

    tokio::time::sleep(Duration::from_millis(400)).await;
    backend.set_delay(Duration::ZERO);

    let snapshot = service.snapshot(&admin, id).await.unwrap();
    assert!(!snapshot.sending);
    assert_eq!(snapshot.step, WizardStep::Review);
    assert!(backend.broadcasts().is_empty());

    // Retrying from the reopened gate goes through
    let outcome = service.confirm(&admin, id, None).await.unwrap();
    assert_eq!(outcome.receipt.status, BroadcastStatus::Sent);
    assert_eq!(backend.broadcasts().len(), 1);
}

#[tokio::test]
async fn test_scheduled_broadcast_flow() {
    let (service, backend) = setup();
    let admin = admin();
    let id = service.create(&admin).id;

    let mut update = complete_update();
    update.scheduling = Some(Scheduling {
        send_now: false,
        scheduled_for: Some(Utc::now() + ChronoDuration::hours(6)),
        timezone: None,
    });
    assert_ok!(service.update_draft(&admin, id, update).await);
    for _ in 0..4 {
        assert_ok!(service.next(&admin, id).await);
    }

    let snapshot = service.submit(&admin, id).await.unwrap();
    let review = snapshot.review.unwrap();
    assert!(!review.summary().send_now);
    assert_eq!(review.summary().timezone.as_deref(), Some("Africa/Lagos"));
    assert_eq!(review.summary().estimated_email_cost_kobo, Some(0));

    assert_ok!(service.acknowledge(&admin, id, true).await);
    let outcome = service.confirm(&admin, id, None).await.unwrap();
    assert_eq!(outcome.receipt.status, BroadcastStatus::Scheduled);

    let sent = backend.broadcasts();
    assert_eq!(sent[0].payload.audience, vec![AudienceRole::Seller, AudienceRole::Rider]);
    assert!(sent[0].payload.product_ids.is_empty());
}

#[tokio::test]
async fn test_past_schedule_blocks_channels_step() {
    let (service, _) = setup();
    let admin = admin();
    let id = service.create(&admin).id;

    let mut update = complete_update();
    update.scheduling = Some(Scheduling {
        send_now: false,
        scheduled_for: Some(Utc::now() - ChronoDuration::minutes(5)),
        timezone: None,
    });
    assert_ok!(service.update_draft(&admin, id, update).await);
    assert_ok!(service.next(&admin, id).await);
    assert_ok!(service.next(&admin, id).await);

    let err = assert_err!(service.next(&admin, id).await);
    assert_eq!(err.to_string(), "Scheduled time must be in the future");
    assert_eq!(
        service.snapshot(&admin, id).await.unwrap().step,
        WizardStep::Channels
    );
}

#[tokio::test]
async fn test_edit_after_submit_closes_review() {
    let (service, _) = setup();
    let admin = admin();
    let id = walk_to_review(&service, &admin).await;

    assert!(service.submit(&admin, id).await.unwrap().review.is_some());

    let snapshot = service
        .update_draft(
            &admin,
            id,
            DraftUpdate {
                body: Some("<p>Pickup windows change on Tuesday</p>".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(snapshot.review.is_none());

    let confirm = service.confirm(&admin, id, None).await;
    assert!(matches!(confirm, Err(ComposerError::Wizard(WizardError::NoReviewOpen))));
}

#[tokio::test]
async fn test_discard_removes_session() {
    let (service, _) = setup();
    let admin = admin();
    let id = service.create(&admin).id;

    assert_ok!(service.discard(&admin, id).await);
    assert!(matches!(
        service.snapshot(&admin, id).await,
        Err(ComposerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_products_use_default_limit() {
    let (service, backend) = setup();
    let admin = admin();
    let id = service.create(&admin).id;

    let products = service.products(&admin, id, Default::default()).await.unwrap();
    assert_eq!(products.len(), 3);

    backend.fail_next(
        BackendOperation::Products,
        BackendError::Rejected {
            status: 403,
            message: "Forbidden resource".to_string(),
        },
    );
    let err = assert_err!(service.products(&admin, id, Default::default()).await);
    assert!(matches!(err, ComposerError::Backend(BackendError::Rejected { status: 403, .. })));
}
