mod common;

use common::{mock_sdk, ready, recording_config, settle};
use paybind::provider::CheckoutState;
use paybind::{
    BindingConfig, CheckoutProvider, InitializationFailure, Options, ProviderConfig,
    ProviderStatus, SdkError, SessionShape,
};
use paybind_mock::{CheckoutOutcome, MockCheckoutActions};
use serde_json::json;

fn options(value: serde_json::Value) -> Options {
    Options::from_json(value).unwrap()
}

#[tokio::test]
async fn test_initializes_and_loads_actions_once() {
    let sdk = mock_sdk();
    let source = ready(&sdk);
    let opts = options(json!({"clientSecret": "cs_1"}));
    let provider =
        CheckoutProvider::checkout(source.clone(), opts.clone(), ProviderConfig::default())
            .unwrap();
    assert!(matches!(provider.status(), ProviderStatus::InitializingSecondary));

    for _ in 0..4 {
        provider.render(source.clone(), opts.clone()).unwrap();
    }
    settle().await;

    assert!(provider.status().is_ready());
    assert_eq!(sdk.init_checkout_calls(), vec![opts]);
    let session = sdk.last_checkout().unwrap();
    assert_eq!(session.load_actions_calls(), 1);

    let state: CheckoutState = provider.current().derived;
    let actions = state.actions().unwrap();
    assert!(actions.as_any().downcast_ref::<MockCheckoutActions>().is_some());
    assert_eq!(state.view().get("id"), Some(&json!("cs_mock")));
}

#[tokio::test]
async fn test_session_changes_are_republished() {
    let sdk = mock_sdk();
    let provider = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    settle().await;

    let mut context = provider.context();
    let session = sdk.last_checkout().unwrap();
    assert_eq!(session.change_listener_count(), 1);

    session.emit_change(&json!({"id": "cs_mock", "total": {"total": 2500}}));
    assert!(context.changed().await);
    assert_eq!(
        context.derived().session()["total"]["total"],
        json!(2500)
    );
}

#[tokio::test]
async fn test_unmount_releases_the_change_subscription() {
    let sdk = mock_sdk();
    let provider = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    settle().await;
    let context = provider.context();
    let session = sdk.last_checkout().unwrap();

    provider.unmount();
    assert_eq!(session.change_listener_count(), 0);
    session.emit_change(&json!({"id": "late"}));
    assert_eq!(context.derived().session()["id"], json!("cs_mock"));
}

#[tokio::test]
async fn test_appearance_and_fonts_use_distinct_calls() {
    let (config, sink) = recording_config();
    let sdk = mock_sdk();
    let source = ready(&sdk);
    let provider = CheckoutProvider::checkout(
        source.clone(),
        options(json!({
            "clientSecret": "cs_1",
            "elementsOptions": {"appearance": {"theme": "stripe"}, "fonts": []}
        })),
        config,
    )
    .unwrap();
    settle().await;
    let session = sdk.last_checkout().unwrap();

    provider
        .render(
            source.clone(),
            options(json!({
                "clientSecret": "cs_1",
                "elementsOptions": {"appearance": {"theme": "night"}, "fonts": []}
            })),
        )
        .unwrap();
    assert_eq!(session.appearance_calls(), vec![json!({"theme": "night"})]);
    assert!(session.font_calls().is_empty());

    provider
        .render(
            source,
            options(json!({
                "clientSecret": "cs_2",
                "elementsOptions": {"appearance": {"theme": "night"}, "fonts": [{"cssSrc": "f.css"}]}
            })),
        )
        .unwrap();
    assert_eq!(session.appearance_calls().len(), 1);
    assert_eq!(session.font_calls(), vec![json!([{"cssSrc": "f.css"}])]);
    assert_eq!(sink.count_for_option("clientSecret"), 1);
}

#[tokio::test]
async fn test_appearance_changed_during_initialization_is_applied_after() {
    let sdk = mock_sdk();
    let gate = sdk.gate_checkout();
    let source = ready(&sdk);
    let provider = CheckoutProvider::checkout(
        source.clone(),
        options(json!({"clientSecret": "cs_1", "elementsOptions": {"appearance": {"theme": "stripe"}}})),
        ProviderConfig::default(),
    )
    .unwrap();
    provider
        .render(
            source,
            options(json!({"clientSecret": "cs_1", "elementsOptions": {"appearance": {"theme": "flat"}}})),
        )
        .unwrap();

    gate.send(()).unwrap();
    settle().await;
    let session = sdk.last_checkout().unwrap();
    assert_eq!(session.appearance_calls(), vec![json!({"theme": "flat"})]);
    assert_eq!(sdk.init_checkout_calls().len(), 1);
}

#[tokio::test]
async fn test_error_payload_is_published_as_failure() {
    let sdk = mock_sdk();
    sdk.set_checkout_outcome(CheckoutOutcome::ErrorPayload(json!({"message": "expired"})));
    let provider = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    settle().await;

    match provider.status() {
        ProviderStatus::Failed(InitializationFailure::Payload { payload, .. }) => {
            assert_eq!(payload["message"], json!("expired"));
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert!(provider.current().secondary.is_none());
}

#[tokio::test]
async fn test_rejected_initialization_is_not_retried() {
    let sdk = mock_sdk();
    sdk.set_checkout_outcome(CheckoutOutcome::Rejected(SdkError::new("network")));
    let source = ready(&sdk);
    let provider = CheckoutProvider::checkout(
        source.clone(),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    settle().await;
    provider
        .render(source, options(json!({"clientSecret": "cs_1"})))
        .unwrap();
    settle().await;

    assert!(matches!(
        provider.status(),
        ProviderStatus::Failed(InitializationFailure::Rejected { .. })
    ));
    assert_eq!(sdk.init_checkout_calls().len(), 1);
}

#[tokio::test]
async fn test_nested_session_shape() {
    let sdk = mock_sdk();
    let config = ProviderConfig::new(BindingConfig::default().with_session_shape(SessionShape::Nested));
    let provider =
        CheckoutProvider::checkout(ready(&sdk), options(json!({"clientSecret": "cs_1"})), config)
            .unwrap();
    settle().await;

    let view = provider.current().derived.view();
    assert_eq!(view.len(), 1);
    assert_eq!(view["session"]["id"], json!("cs_mock"));
}
