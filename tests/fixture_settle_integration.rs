//! Integration tests for mounting fixtures and waiting for a settled DOM

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use vdiff::dom::{
    ElementRef, MemoryElement, PendingRequests, SettleError, SettleOptions, TokioHost,
    structural_snapshot, wait_until_settled,
};
use vdiff::fixture::{Fixture, FixtureError, FixtureOptions, MediaType, MemoryPage};

fn host() -> Arc<TokioHost> {
    Arc::new(TokioHost::new(Duration::from_millis(16)))
}

/// A card whose shadow tree holds a slot projecting a light-DOM button
fn card() -> (Arc<MemoryElement>, ElementRef) {
    let button = Arc::new(MemoryElement::new("d2l-button").with_text("Save").with_updates([true]));
    let slot = MemoryElement::new("slot").with_assigned(vec![button.clone() as ElementRef]);
    let card = MemoryElement::new("d2l-card")
        .with_updates([true])
        .with_shadow(vec![slot.into_ref()])
        .with_child(button.clone() as ElementRef)
        .into_ref();
    (button, card)
}

#[tokio::test(start_paused = true)]
async fn test_fixture_mounts_and_settles_nested_tree() {
    let page = Arc::new(MemoryPage::new());
    let mut fixture = Fixture::new(page.clone(), host());
    let (button, card) = card();

    let options = FixtureOptions::default().rtl(true).viewport(1024, 768);
    let mounted = fixture.mount(card.clone(), &options).await.unwrap();

    assert!(Arc::ptr_eq(&mounted, &card));
    assert!(button.update_calls() >= 2, "Slotted button not awaited");
    assert_eq!(page.document_attribute("dir").as_deref(), Some("rtl"));
    assert_eq!(page.document_attribute("lang").as_deref(), Some("en"));
    assert_eq!(page.viewport().map(|v| (v.width, v.height)), Some((1024, 768)));
    assert!(page.mounted_html().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_second_fixture_only_applies_changes() {
    let page = Arc::new(MemoryPage::new());
    let mut fixture = Fixture::new(page.clone(), host());

    fixture
        .mount(MemoryElement::new("div").into_ref(), &FixtureOptions::default())
        .await
        .unwrap();
    page.clear_operations();

    fixture
        .mount(
            MemoryElement::new("div").into_ref(),
            &FixtureOptions::default().media(MediaType::Print),
        )
        .await
        .unwrap();

    assert_eq!(page.operations(), vec!["media".to_string()]);
    assert_eq!(page.media(), Some(MediaType::Print));
}

#[tokio::test(start_paused = true)]
async fn test_fixture_waits_for_loading() {
    let page = Arc::new(MemoryPage::new());
    let mut fixture = Fixture::new(page, host());
    let image = Arc::new(MemoryElement::new("d2l-image").with_loading());

    let loader = image.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        loader.finish_loading();
    });

    let started = tokio::time::Instant::now();
    fixture
        .mount(image.clone() as ElementRef, &FixtureOptions::default())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_restless_element_times_out() {
    let page = Arc::new(MemoryPage::new());
    let mut fixture = Fixture::new(page, host());

    let options = FixtureOptions::default()
        .settle(SettleOptions::default().timeout(Duration::from_millis(200)));
    let err = fixture
        .mount(MemoryElement::new("d2l-spinner").restless().into_ref(), &options)
        .await
        .err().unwrap();

    assert!(matches!(
        err,
        FixtureError::Settle(SettleError::Timeout(t)) if t == Duration::from_millis(200)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_for_request_queue() {
    let requests = Arc::new(PendingRequests::new());
    let host = TokioHost::new(Duration::from_millis(16)).with_queue(requests.clone());
    let element = MemoryElement::new("d2l-list").into_ref();

    requests.begin();
    let finisher = requests.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        finisher.finish();
    });

    let started = tokio::time::Instant::now();
    wait_until_settled(&host, &element, &SettleOptions::default())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[test]
fn test_snapshot_covers_shadow_roots() {
    let (_, card) = card();
    let snapshot = structural_snapshot(&card);

    assert_eq!(snapshot.len(), 2);
    assert!(snapshot[0].starts_with("<d2l-card>"));
    assert_eq!(snapshot[1], "<slot></slot>");
}
