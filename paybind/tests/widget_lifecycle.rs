mod common;

use std::sync::{Arc, Mutex};

use common::{deferred, mock_sdk, ready, recording_config, settle};
use paybind::error::WidgetError;
use paybind::widget::EventArgument;
use paybind::{
    BindingError, CheckoutProvider, DomNode, ElementEvent, ElementKind, ElementsProvider, Options,
    ProviderConfig, Scope, WidgetController, WidgetProps, WidgetStatus,
};
use paybind_mock::{MockElement, MockElements, MockSdk};
use serde_json::json;

fn options(value: serde_json::Value) -> Options {
    Options::from_json(value).unwrap()
}

struct Fixture {
    sdk: Arc<MockSdk>,
    provider: ElementsProvider,
    scope: Scope,
}

impl Fixture {
    fn new(config: ProviderConfig) -> Self {
        let sdk = mock_sdk();
        let provider = ElementsProvider::elements(ready(&sdk), Options::new(), config).unwrap();
        let scope = Scope::root().with_elements(provider.context());
        Self {
            sdk,
            provider,
            scope,
        }
    }

    fn group(&self) -> Arc<MockElements> {
        self.sdk.last_elements().unwrap()
    }

    fn widget(&self, kind: ElementKind) -> Arc<MockElement> {
        self.group().element(kind).unwrap()
    }
}

/// Records the labels of invoked callbacks.
#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn recorder(&self, label: &str) -> impl Fn(EventArgument) + Send + Sync + 'static {
        let log = Arc::clone(&self.0);
        let label = label.to_owned();
        move |_| log.lock().unwrap().push(label.clone())
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[test]
fn test_widget_is_created_and_destroyed_once() {
    let fixture = Fixture::new(ProviderConfig::default());
    let controller = WidgetController::new(
        &fixture.scope,
        ElementKind::Card,
        WidgetProps::new().with_options(options(json!({"hidePostalCode": true}))),
    )
    .unwrap();
    controller.attach(DomNode::new("card"));
    assert!(matches!(controller.status(), WidgetStatus::Mounted));

    for size in ["12px", "14px", "14px", "16px"] {
        controller.render(
            WidgetProps::new().with_options(options(json!({"hidePostalCode": true, "style": {"base": {"fontSize": size}}}))),
        );
    }

    let group = fixture.group();
    assert_eq!(group.created().len(), 1);
    let card = fixture.widget(ElementKind::Card);
    assert_eq!(card.mounts()[0].id(), "card");
    assert_eq!(
        card.updates(),
        vec![
            options(json!({"style": {"base": {"fontSize": "12px"}}})),
            options(json!({"style": {"base": {"fontSize": "14px"}}})),
            options(json!({"style": {"base": {"fontSize": "16px"}}})),
        ]
    );

    controller.unmount();
    drop(controller);
    assert_eq!(card.destroy_count(), 1);
    assert!(fixture.provider.status().is_ready());
}

#[test]
fn test_latest_callback_receives_events() {
    let fixture = Fixture::new(ProviderConfig::default());
    let log = Log::default();
    let controller = WidgetController::new(
        &fixture.scope,
        ElementKind::Card,
        WidgetProps::new().on(ElementEvent::Change, log.recorder("f1")),
    )
    .unwrap();
    controller.attach(DomNode::new("card"));
    controller.render(WidgetProps::new().on(ElementEvent::Change, log.recorder("f2")));

    let card = fixture.widget(ElementKind::Card);
    card.emit(ElementEvent::Change, &json!({"complete": true}));
    assert_eq!(log.entries(), vec!["f2"]);
    assert_eq!(card.listener_count(ElementEvent::Change), 1);
}

#[test]
fn test_handler_swaps_do_not_churn_listeners() {
    let fixture = Fixture::new(ProviderConfig::default());
    let log = Log::default();
    let controller = WidgetController::new(&fixture.scope, ElementKind::Payment, WidgetProps::new())
        .unwrap();
    controller.attach(DomNode::new("payment"));
    let payment = fixture.widget(ElementKind::Payment);
    assert_eq!(payment.total_listeners(), 0);

    for label in ["a", "b", "c"] {
        controller.render(
            WidgetProps::new()
                .on(ElementEvent::Focus, log.recorder(label))
                .on(ElementEvent::Blur, log.recorder(label)),
        );
        assert_eq!(payment.listener_count(ElementEvent::Focus), 1);
        assert_eq!(payment.listener_count(ElementEvent::Blur), 1);
    }

    controller.render(WidgetProps::new().on(ElementEvent::Blur, log.recorder("d")));
    assert_eq!(payment.listener_count(ElementEvent::Focus), 0);
    payment.emit(ElementEvent::Focus, &json!({}));
    payment.emit(ElementEvent::Blur, &json!({}));
    assert_eq!(log.entries(), vec!["d"]);
}

#[test]
fn test_immutable_widget_option_is_not_sent() {
    let (config, sink) = recording_config();
    let fixture = Fixture::new(config);
    let controller = WidgetController::new(
        &fixture.scope,
        ElementKind::PaymentRequestButton,
        WidgetProps::new().with_options(options(json!({"paymentRequest": {"id": "pr_1"}}))),
    )
    .unwrap();
    controller.attach(DomNode::new("prb"));

    controller.render(
        WidgetProps::new().with_options(options(json!({"paymentRequest": {"id": "pr_2"}}))),
    );

    let button = fixture.widget(ElementKind::PaymentRequestButton);
    assert!(button.updates().is_empty());
    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].owner, "PaymentRequestButtonElement");
    assert_eq!(warnings[0].option_key(), Some("paymentRequest"));
}

#[tokio::test]
async fn test_widget_waits_for_the_provider() {
    let sdk = mock_sdk();
    let (source, tx) = deferred();
    let provider =
        ElementsProvider::elements(source, Options::new(), ProviderConfig::default()).unwrap();
    let scope = Scope::root().with_elements(provider.context());
    let controller = WidgetController::new(&scope, ElementKind::Iban, WidgetProps::new()).unwrap();
    assert!(matches!(controller.status(), WidgetStatus::Detached));

    controller.attach(DomNode::new("iban"));
    assert!(matches!(controller.status(), WidgetStatus::Waiting));
    assert!(controller.element().is_none());

    tx.send(Some(Arc::clone(&sdk))).unwrap();
    settle().await;

    assert!(matches!(controller.status(), WidgetStatus::Mounted));
    let group = sdk.last_elements().unwrap();
    assert_eq!(group.created().len(), 1);
    assert!(group.element(ElementKind::Iban).is_some());
}

#[test]
fn test_key_change_remounts_in_the_same_node() {
    let fixture = Fixture::new(ProviderConfig::default());
    let controller =
        WidgetController::new(&fixture.scope, ElementKind::CardNumber, WidgetProps::new()).unwrap();
    controller.set_key("a");
    controller.attach(DomNode::new("number"));
    controller.set_key("a");
    assert_eq!(fixture.group().created().len(), 1);

    controller.set_key("b");
    let created = fixture.group().created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].destroy_count(), 1);
    assert_eq!(created[1].mounts()[0].id(), "number");
    assert!(matches!(controller.status(), WidgetStatus::Mounted));
}

#[test]
fn test_destroy_failure_is_swallowed() {
    let fixture = Fixture::new(ProviderConfig::default());
    let controller =
        WidgetController::new(&fixture.scope, ElementKind::Card, WidgetProps::new()).unwrap();
    controller.attach(DomNode::new("card"));
    let card = fixture.widget(ElementKind::Card);
    card.fail_destroy();

    controller.unmount();
    controller.unmount();
    assert!(matches!(controller.status(), WidgetStatus::Destroyed));
    assert_eq!(card.destroy_count(), 1);
}

#[test]
fn test_creation_failure_is_reported_in_status() {
    let fixture = Fixture::new(ProviderConfig::default());
    fixture.group().fail_create();
    let controller =
        WidgetController::new(&fixture.scope, ElementKind::Card, WidgetProps::new()).unwrap();
    controller.attach(DomNode::new("card"));

    match controller.status() {
        WidgetStatus::Failed(WidgetError::Create { kind, error }) => {
            assert_eq!(kind, ElementKind::Card);
            assert!(error.message.contains("card"));
        }
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn test_ready_callback_receives_the_widget() {
    let fixture = Fixture::new(ProviderConfig::default());
    let received = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&received);
    let controller = WidgetController::new(
        &fixture.scope,
        ElementKind::Card,
        WidgetProps::new().on(ElementEvent::Ready, move |argument| {
            *slot.lock().unwrap() = Some(argument);
        }),
    )
    .unwrap();
    controller.attach(DomNode::new("card"));

    fixture
        .widget(ElementKind::Card)
        .emit(ElementEvent::Ready, &json!({"elementType": "card"}));
    let argument = received.lock().unwrap().take().unwrap();
    assert!(matches!(argument, EventArgument::Widget(_)));
}

#[tokio::test]
async fn test_checkout_widgets_use_session_factories() {
    let sdk = mock_sdk();
    let provider = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    settle().await;
    let scope = Scope::root().with_checkout(provider.context());

    let address = WidgetController::new(
        &scope,
        ElementKind::Address,
        WidgetProps::new().with_options(options(json!({"mode": "shipping", "display": {"name": "full"}}))),
    )
    .unwrap();
    address.attach(DomNode::new("address"));
    let payment = WidgetController::new(&scope, ElementKind::Payment, WidgetProps::new()).unwrap();
    payment.attach(DomNode::new("payment"));

    let session = sdk.last_checkout().unwrap();
    let calls = session.factory_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "shippingAddress");
    assert_eq!(calls[0].1, options(json!({"display": {"name": "full"}})));
    assert_eq!(calls[1].0, "payment");
    assert!(matches!(address.status(), WidgetStatus::Mounted));
}

#[tokio::test]
async fn test_checkout_address_mode_is_fixed() {
    let (config, sink) = recording_config();
    let sdk = mock_sdk();
    let provider = CheckoutProvider::checkout(ready(&sdk), options(json!({"clientSecret": "cs_1"})), config)
        .unwrap();
    settle().await;
    let scope = Scope::root().with_checkout(provider.context());
    let address = WidgetController::new(
        &scope,
        ElementKind::Address,
        WidgetProps::new().with_options(options(json!({"mode": "billing"}))),
    )
    .unwrap();
    address.attach(DomNode::new("address"));

    address.render(WidgetProps::new().with_options(options(json!({"mode": "shipping"}))));
    let widget = sdk.last_checkout().unwrap().created()[0].clone();
    assert_eq!(widget.label(), "billingAddress");
    assert!(widget.updates().is_empty());
    assert_eq!(sink.count_for_option("mode"), 1);
}

#[tokio::test]
async fn test_checkout_express_ready_receives_the_event() {
    let sdk = mock_sdk();
    let provider = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    settle().await;
    let scope = Scope::root().with_checkout(provider.context());
    let received = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&received);
    let express = WidgetController::new(
        &scope,
        ElementKind::ExpressCheckout,
        WidgetProps::new().on(ElementEvent::Ready, move |argument| {
            *slot.lock().unwrap() = Some(argument);
        }),
    )
    .unwrap();
    express.attach(DomNode::new("express"));

    let widget = sdk.last_checkout().unwrap().created()[0].clone();
    widget.emit(ElementEvent::Ready, &json!({"availablePaymentMethods": {"link": true}}));
    let argument = received.lock().unwrap().take().unwrap();
    assert_eq!(
        argument.payload(),
        Some(&json!({"availablePaymentMethods": {"link": true}}))
    );
}

#[tokio::test]
async fn test_checkout_rejects_unsupported_widgets() {
    let sdk = mock_sdk();
    let provider = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    let scope = Scope::root().with_checkout(provider.context());

    let err = WidgetController::new(&scope, ElementKind::Card, WidgetProps::new()).unwrap_err();
    assert!(matches!(
        err,
        BindingError::Widget(WidgetError::UnsupportedInCheckout("CardElement"))
    ));

    let err = WidgetController::new(&scope, ElementKind::Address, WidgetProps::new()).unwrap_err();
    assert!(matches!(err, BindingError::Widget(WidgetError::MissingAddressMode)));

    let err = WidgetController::new(
        &scope,
        ElementKind::Address,
        WidgetProps::new().with_options(options(json!({"mode": "pickup"}))),
    )
    .unwrap_err();
    assert!(matches!(err, BindingError::Widget(WidgetError::InvalidAddressMode(_))));
}

#[tokio::test]
async fn test_widget_requires_exactly_one_provider() {
    let err = WidgetController::new(&Scope::root(), ElementKind::Card, WidgetProps::new()).unwrap_err();
    assert!(matches!(err, BindingError::MissingProvider(_)));
    assert!(err.to_string().contains("mounts <CardElement>"));

    let sdk = mock_sdk();
    let elements =
        ElementsProvider::elements(ready(&sdk), Options::new(), ProviderConfig::default()).unwrap();
    let checkout = CheckoutProvider::checkout(
        ready(&sdk),
        options(json!({"clientSecret": "cs_1"})),
        ProviderConfig::default(),
    )
    .unwrap();
    let scope = Scope::root()
        .with_elements(elements.context())
        .with_checkout(checkout.context());
    let err = WidgetController::new(&scope, ElementKind::Payment, WidgetProps::new()).unwrap_err();
    assert!(matches!(err, BindingError::ConflictingProvider(_)));
}
