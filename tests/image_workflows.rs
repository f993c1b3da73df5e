//! End-to-end image and billing workflows
//!
//! Runs background replacement, saving, searching, deletion and credit
//! purchases against the in-memory store and mock providers.

use imaginarium::services::testing::{MockHosting, MockPayments, MockRemover};
use imaginarium::services::CollectingNotifier;
use imaginarium::store::SIGNUP_CREDITS;
use imaginarium::{
    BillingService, DocumentStore, ImageAsset, ImageData, ImageService, ImaginariumError,
    InputChange, MemoryStore, PreviewSession, TransformationKind, UserRecord,
};
use std::sync::Arc;

struct World {
    store: Arc<MemoryStore>,
    hosting: Arc<MockHosting>,
    remover: Arc<MockRemover>,
    images: ImageService,
    billing: BillingService,
}

fn asset(public_id: &str, width: u32, height: u32) -> ImageAsset {
    ImageAsset {
        public_id: public_id.to_string(),
        width,
        height,
        secure_url: format!("https://images.test/upload/{public_id}"),
    }
}

async fn world() -> World {
    let store = Arc::new(MemoryStore::new());
    store.put_user(UserRecord::new("alice", "Alice", "Liddell")).await.unwrap();
    store.put_user(UserRecord::new("bob", "Bob", "Builder")).await.unwrap();

    let hosting = Arc::new(
        MockHosting::new()
            .with_asset(asset("imaginarium/beach", 1920, 1280))
            .with_asset(asset("imaginarium/dog", 800, 600)),
    );
    let remover = Arc::new(MockRemover::new(613, 407));
    let payments = Arc::new(MockPayments::new());

    let images = ImageService::new(store.clone(), hosting.clone(), remover.clone());
    let billing = BillingService::new(payments, store.clone());
    World {
        store,
        hosting,
        remover,
        images,
        billing,
    }
}

async fn balance(world: &World, user_id: &str) -> i64 {
    world.store.get_user(user_id).await.unwrap().unwrap().credit_balance
}

#[tokio::test]
async fn test_background_replacement_workflow() {
    let w = world().await;
    let original = asset("imaginarium/dog", 800, 600);

    // Cut out the subject and host it
    let transparent = w.images.remove_background(&original).await.unwrap();
    assert_eq!((transparent.width, transparent.height), (613, 407));
    assert_eq!(w.remover.calls(), vec![original.secure_url.clone()]);
    assert_eq!(w.hosting.upload_count(), 1);

    // Preview it over the beach
    let notifier = CollectingNotifier::new();
    let session = PreviewSession::new(
        w.hosting.clone(),
        Arc::new(notifier.clone()),
        imaginarium::CompositionInputs::new(asset("imaginarium/beach", 1920, 1280), transparent.clone()),
    );
    session.update(InputChange::OffsetX(-30));
    let preview = session.change(InputChange::Scale(1.2)).await.unwrap().unwrap();
    assert!(preview.url.starts_with("https://images.test/upload/c_scale,w_1280,h_853/"));
    assert!(preview.url.contains("l_imaginarium:upload_1"));
    assert!(preview.url.contains("g_north_east"));
    assert!(notifier.is_empty());

    // Save it; background replacement costs five credits
    let mut data = ImageData::new(
        "Dog at the beach",
        TransformationKind::RemoveBackground,
        original.public_id.clone(),
        original.secure_url.clone(),
    );
    data.transparent_public_id = Some(transparent.public_id.clone());
    data.background_public_id = Some("imaginarium/beach".to_string());
    data.transformation_url = Some(preview.url.clone());

    let created = w.images.add_image("alice", data).await.unwrap();
    assert_eq!(created.credit_balance, SIGNUP_CREDITS - 5);
    assert_eq!(balance(&w, "alice").await, SIGNUP_CREDITS - 5);

    // Deleting removes the record and every hosted asset behind it
    let deleted = w.images.delete_image("alice", created.image.id).await.unwrap();
    assert_eq!(deleted.id, created.image.id);
    let mut removed = w.hosting.deleted();
    removed.sort();
    assert_eq!(
        removed,
        vec![
            "imaginarium/beach".to_string(),
            "imaginarium/dog".to_string(),
            "imaginarium/upload_1".to_string(),
        ]
    );
    assert!(matches!(
        w.images.get_image_by_id(created.image.id).await.unwrap_err(),
        ImaginariumError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_credits_run_out_then_purchase() {
    let w = world().await;
    for n in 0..SIGNUP_CREDITS {
        let data = ImageData::new(
            format!("Restored {n}"),
            TransformationKind::Restore,
            format!("imaginarium/photo_{n}"),
            format!("https://images.test/upload/imaginarium/photo_{n}"),
        );
        w.images.add_image("bob", data).await.unwrap();
    }
    assert_eq!(balance(&w, "bob").await, 0);

    let extra = ImageData::new(
        "One too many",
        TransformationKind::Fill,
        "imaginarium/photo_x",
        "https://images.test/upload/imaginarium/photo_x",
    );
    let err = w.images.add_image("bob", extra.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        ImaginariumError::InsufficientCredits { required: 1, available: 0 }
    ));

    // Pro Package: 10 USD for 50 credits
    let order = w.billing.create_order("10", "bob").await.unwrap();
    let outcome = w.billing.capture_order(&order.id, "bob").await.unwrap();
    assert!(outcome.order.is_completed());
    assert_eq!(outcome.plan.map(|plan| plan.credits), Some(50));
    assert_eq!(outcome.wallet, 50);

    let created = w.images.add_image("bob", extra).await.unwrap();
    assert_eq!(created.credit_balance, 49);

    let page = w.images.get_user_images("bob", 1, None).await.unwrap();
    assert_eq!(page.data.len(), 9);
    assert_eq!(page.total_pages, 2);
}

#[tokio::test]
async fn test_free_plan_cannot_be_bought() {
    let w = world().await;
    let err = w.billing.create_order("0", "alice").await.unwrap_err();
    assert!(matches!(err, ImaginariumError::InvalidRequest(_)));

    let err = w.billing.create_order("10", "nobody").await.unwrap_err();
    assert!(matches!(err, ImaginariumError::NotFound(_)));
}

#[tokio::test]
async fn test_search_is_scoped_to_folder() {
    let w = world().await;
    for public_id in ["imaginarium/beach", "imaginarium/dog"] {
        let data = ImageData::new(
            public_id,
            TransformationKind::Fill,
            public_id,
            format!("https://images.test/upload/{public_id}"),
        );
        w.images.add_image("alice", data).await.unwrap();
    }

    let page = w.images.get_all_images(1, None, Some("dog")).await.unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].data.public_id, "imaginarium/dog");
    assert_eq!(page.saved_images, Some(2));
    assert_eq!(w.hosting.searches(), vec!["folder=imaginarium AND dog".to_string()]);

    // Blank search skips the host entirely
    let page = w.images.get_all_images(1, None, Some("   ")).await.unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(w.hosting.searches().len(), 1);
}

#[tokio::test]
async fn test_other_users_cannot_delete() {
    let w = world().await;
    let data = ImageData::new(
        "Mine",
        TransformationKind::Recolor,
        "imaginarium/dog",
        "https://images.test/upload/imaginarium/dog",
    );
    let created = w.images.add_image("alice", data).await.unwrap();

    let err = w.images.delete_image("bob", created.image.id).await.unwrap_err();
    assert!(matches!(err, ImaginariumError::Unauthorized(_)));
    assert!(w.hosting.deleted().is_empty());
    assert!(w.images.get_image_by_id(created.image.id).await.is_ok());
}

#[tokio::test]
async fn test_removal_failure_uploads_nothing() {
    let w = world().await;
    w.remover.set_failing(true);

    let err = w
        .images
        .remove_background(&asset("imaginarium/dog", 800, 600))
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(w.hosting.upload_count(), 0);
}
