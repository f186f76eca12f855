mod common;

use common::TestApp;
use supply_hub_api::{
    auth::Role,
    entities::item::{self, ItemStatus},
    entities::request::{RequestKind, RequestStatus},
    errors::ServiceError,
    services::items::CreateItemInput,
    services::requests::{CreateRequestInput, CreateRequestLine, Decision},
};
use uuid::Uuid;

async fn seed_item(app: &TestApp, name: &str, quantity: i32, reorder_point: i32) -> item::Model {
    app.state
        .services
        .items
        .create_item(CreateItemInput {
            name: name.to_string(),
            quantity,
            unit: "pc".to_string(),
            reorder_point,
            image_url: None,
        })
        .await
        .expect("item should insert")
}

fn request_input(
    requester_email: &str,
    kind: RequestKind,
    lines: Vec<(Uuid, i32)>,
) -> CreateRequestInput {
    CreateRequestInput {
        requester_name: "J. Cruz".to_string(),
        requester_email: requester_email.to_string(),
        division: "HRDO".to_string(),
        section: "Records".to_string(),
        kind,
        notes: None,
        items: lines
            .into_iter()
            .map(|(item_id, quantity)| CreateRequestLine { item_id, quantity })
            .collect(),
    }
}

async fn fetch_item(app: &TestApp, id: Uuid) -> item::Model {
    app.state
        .services
        .items
        .get_item(id)
        .await
        .expect("lookup should succeed")
        .expect("item should exist")
}

#[tokio::test]
async fn approving_supply_out_decrements_stock_exactly() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;

    let paper = seed_item(&app, "Bond paper", 10, 3).await;
    let stapler = seed_item(&app, "Stapler", 6, 5).await;

    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyOut,
            vec![(paper.id, 4), (stapler.id, 2)],
        ))
        .await
        .unwrap();
    assert_eq!(created.request.status, RequestStatus::Pending);

    let outcome = app
        .state
        .services
        .requests
        .decide(
            created.request.id,
            Decision::Approve,
            &TestApp::auth_user_for(&approver),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, RequestStatus::Approved);
    assert_eq!(outcome.approver_id, approver.id);

    let paper = fetch_item(&app, paper.id).await;
    assert_eq!(paper.quantity, 6);
    assert_eq!(paper.status, ItemStatus::Available);

    // 6 - 2 = 4 is at the reorder point of 5, so the status flips.
    let stapler = fetch_item(&app, stapler.id).await;
    assert_eq!(stapler.quantity, 4);
    assert_eq!(stapler.status, ItemStatus::ForReorder);
}

#[tokio::test]
async fn approving_supply_in_increments_stock() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;

    let toner = seed_item(&app, "Toner", 0, 2).await;
    assert_eq!(toner.status, ItemStatus::OutOfStock);

    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyIn,
            vec![(toner.id, 5)],
        ))
        .await
        .unwrap();

    app.state
        .services
        .requests
        .decide(
            created.request.id,
            Decision::Approve,
            &TestApp::auth_user_for(&approver),
        )
        .await
        .unwrap();

    let toner = fetch_item(&app, toner.id).await;
    assert_eq!(toner.quantity, 5);
    assert_eq!(toner.status, ItemStatus::Available);
}

#[tokio::test]
async fn insufficient_stock_aborts_without_partial_mutation() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;

    let plenty = seed_item(&app, "Bond paper", 10, 3).await;
    let scarce = seed_item(&app, "Stapler", 1, 0).await;

    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyOut,
            vec![(plenty.id, 2), (scarce.id, 5)],
        ))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .requests
        .decide(
            created.request.id,
            Decision::Approve,
            &TestApp::auth_user_for(&approver),
        )
        .await
        .unwrap_err();

    match err {
        ServiceError::InsufficientStock(shortages) => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].item_id, scarce.id);
            assert_eq!(shortages[0].item_name, "Stapler");
            assert_eq!(shortages[0].requested, 5);
            assert_eq!(shortages[0].available, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Nothing moved: not even the line that could have been satisfied.
    assert_eq!(fetch_item(&app, plenty.id).await.quantity, 10);
    assert_eq!(fetch_item(&app, scarce.id).await.quantity, 1);

    let reloaded = app
        .state
        .services
        .requests
        .get_request(created.request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.request.status, RequestStatus::Pending);
    assert_eq!(reloaded.request.approver_id, None);
}

#[tokio::test]
async fn deciding_a_settled_request_fails_with_invalid_state() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;

    let paper = seed_item(&app, "Bond paper", 10, 3).await;
    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyOut,
            vec![(paper.id, 1)],
        ))
        .await
        .unwrap();

    let actor = TestApp::auth_user_for(&approver);
    app.state
        .services
        .requests
        .decide(created.request.id, Decision::Approve, &actor)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .requests
        .decide(created.request.id, Decision::Reject, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // The settled request is untouched and stock is not adjusted twice.
    let reloaded = app
        .state
        .services
        .requests
        .get_request(created.request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.request.status, RequestStatus::Approved);
    assert_eq!(fetch_item(&app, paper.id).await.quantity, 9);
}

#[tokio::test]
async fn concurrent_approvals_have_exactly_one_winner() {
    let app = TestApp::new().await;
    let first = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;
    let second = app
        .seed_user("B. Santos", "bsantos@example.com", Role::Approver)
        .await;

    let paper = seed_item(&app, "Bond paper", 10, 3).await;
    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyOut,
            vec![(paper.id, 4)],
        ))
        .await
        .unwrap();

    let service = app.state.services.requests.clone();
    let request_id = created.request.id;
    let actor_a = TestApp::auth_user_for(&first);
    let actor_b = TestApp::auth_user_for(&second);

    let (a, b) = tokio::join!(
        service.decide(request_id, Decision::Approve, &actor_a),
        service.decide(request_id, Decision::Approve, &actor_b),
    );

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one approver must win: {a:?} / {b:?}");
    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(loser, ServiceError::InvalidState(_)));

    // Stock was adjusted exactly once.
    assert_eq!(fetch_item(&app, paper.id).await.quantity, 6);
}

#[tokio::test]
async fn receipt_of_supply_out_is_reserved_for_the_requester() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;
    let requester = app
        .seed_user("J. Cruz", "jcruz@example.com", Role::User)
        .await;

    let paper = seed_item(&app, "Bond paper", 10, 3).await;
    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            &requester.email,
            RequestKind::SupplyOut,
            vec![(paper.id, 2)],
        ))
        .await
        .unwrap();

    let approver_actor = TestApp::auth_user_for(&approver);
    app.state
        .services
        .requests
        .decide(created.request.id, Decision::Approve, &approver_actor)
        .await
        .unwrap();

    // The approver issued the goods; only the requester may confirm receipt.
    let err = app
        .state
        .services
        .requests
        .mark_received(created.request.id, &approver_actor)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let reloaded = app
        .state
        .services
        .requests
        .get_request(created.request.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!reloaded.request.is_received);

    let requester_actor = TestApp::auth_user_for(&requester);
    let receipt = app
        .state
        .services
        .requests
        .mark_received(created.request.id, &requester_actor)
        .await
        .unwrap();
    assert!(receipt.is_received);
    let first_received_at = receipt.received_at;

    // Re-marking is a no-op, not an error.
    let again = app
        .state
        .services
        .requests
        .mark_received(created.request.id, &requester_actor)
        .await
        .unwrap();
    assert!(again.is_received);
    assert_eq!(again.received_at, first_received_at);
}

#[tokio::test]
async fn receipt_of_supply_in_is_reserved_for_the_approver() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;
    let requester = app
        .seed_user("J. Cruz", "jcruz@example.com", Role::User)
        .await;

    let toner = seed_item(&app, "Toner", 0, 2).await;
    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            &requester.email,
            RequestKind::SupplyIn,
            vec![(toner.id, 3)],
        ))
        .await
        .unwrap();

    let approver_actor = TestApp::auth_user_for(&approver);
    app.state
        .services
        .requests
        .decide(created.request.id, Decision::Approve, &approver_actor)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .requests
        .mark_received(created.request.id, &TestApp::auth_user_for(&requester))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let receipt = app
        .state
        .services
        .requests
        .mark_received(created.request.id, &approver_actor)
        .await
        .unwrap();
    assert!(receipt.is_received);
}

#[tokio::test]
async fn receipt_requires_prior_approval() {
    let app = TestApp::new().await;
    let requester = app
        .seed_user("J. Cruz", "jcruz@example.com", Role::User)
        .await;

    let paper = seed_item(&app, "Bond paper", 10, 3).await;
    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            &requester.email,
            RequestKind::SupplyOut,
            vec![(paper.id, 1)],
        ))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .requests
        .mark_received(created.request.id, &TestApp::auth_user_for(&requester))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn rejecting_leaves_stock_untouched() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;

    let paper = seed_item(&app, "Bond paper", 10, 3).await;
    let created = app
        .state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyOut,
            vec![(paper.id, 4)],
        ))
        .await
        .unwrap();

    let outcome = app
        .state
        .services
        .requests
        .decide(
            created.request.id,
            Decision::Reject,
            &TestApp::auth_user_for(&approver),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, RequestStatus::Rejected);

    assert_eq!(fetch_item(&app, paper.id).await.quantity, 10);
}

#[tokio::test]
async fn summary_projection_aggregates_approved_requests_per_item() {
    let app = TestApp::new().await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;
    let actor = TestApp::auth_user_for(&approver);

    let paper = seed_item(&app, "Bond paper", 100, 3).await;
    let stapler = seed_item(&app, "Stapler", 50, 5).await;

    for lines in [vec![(paper.id, 4)], vec![(paper.id, 6), (stapler.id, 2)]] {
        let created = app
            .state
            .services
            .requests
            .create_request(request_input(
                "jcruz@example.com",
                RequestKind::SupplyOut,
                lines,
            ))
            .await
            .unwrap();
        app.state
            .services
            .requests
            .decide(created.request.id, Decision::Approve, &actor)
            .await
            .unwrap();
    }

    // A still-pending request must not contribute to the summary.
    app.state
        .services
        .requests
        .create_request(request_input(
            "jcruz@example.com",
            RequestKind::SupplyOut,
            vec![(paper.id, 99)],
        ))
        .await
        .unwrap();

    let summary = app
        .state
        .services
        .requests
        .summarize_approved(Some(RequestKind::SupplyOut))
        .await
        .unwrap();

    let paper_row = summary
        .iter()
        .find(|row| row.item_id == paper.id)
        .expect("paper should be summarized");
    assert_eq!(paper_row.total_requested, 10);
    assert_eq!(paper_row.request_count, 2);
    assert_eq!(paper_row.item_name, "Bond paper");

    let stapler_row = summary
        .iter()
        .find(|row| row.item_id == stapler.id)
        .expect("stapler should be summarized");
    assert_eq!(stapler_row.total_requested, 2);
    assert_eq!(stapler_row.request_count, 1);
}
