//! Widget variants.
//!
//! Per-variant behavior lives in one table instead of being spread across call
//! sites: the SDK type name, the component name used in messages, what the
//! ready callback receives, and which session factory creates the widget under
//! a checkout provider.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{SdkError, WidgetError};
use crate::options::Options;
use crate::sdk::{CheckoutSession, Element};

/// Option keys no widget accepts after creation.
pub const IMMUTABLE_WIDGET_OPTIONS: [&str; 1] = ["paymentRequest"];

/// SDK widget variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum ElementKind {
    AuBankAccount,
    Card,
    CardNumber,
    CardExpiry,
    CardCvc,
    FpxBank,
    Iban,
    IdealBank,
    P24Bank,
    EpsBank,
    Payment,
    ExpressCheckout,
    PaymentRequestButton,
    LinkAuthentication,
    Address,
    ShippingAddress,
    PaymentMethodMessaging,
    AffirmMessage,
    AfterpayClearpayMessage,
    CurrencySelector,
    TaxId,
    IssuingCardNumberDisplay,
    IssuingCardCvcDisplay,
    IssuingCardExpiryDisplay,
    IssuingCardPinDisplay,
    IssuingCardCopyButton,
}

/// What the ready callback is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyArgument {
    /// The SDK widget object.
    Widget,
    /// The SDK event payload.
    Event,
}

/// Session factory family used under a checkout provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckoutSupport {
    None,
    Payment,
    Address,
    ExpressCheckout,
    CurrencySelector,
    TaxId,
}

struct Variant {
    kind: ElementKind,
    sdk_type: &'static str,
    component: &'static str,
    ready: ReadyArgument,
    checkout: CheckoutSupport,
}

const fn variant(
    kind: ElementKind,
    sdk_type: &'static str,
    component: &'static str,
    checkout: CheckoutSupport,
) -> Variant {
    Variant {
        kind,
        sdk_type,
        component,
        ready: ReadyArgument::Widget,
        checkout,
    }
}

use CheckoutSupport as C;
use ElementKind as K;

static VARIANTS: [Variant; 26] = [
    variant(K::AuBankAccount, "auBankAccount", "AuBankAccountElement", C::None),
    variant(K::Card, "card", "CardElement", C::None),
    variant(K::CardNumber, "cardNumber", "CardNumberElement", C::None),
    variant(K::CardExpiry, "cardExpiry", "CardExpiryElement", C::None),
    variant(K::CardCvc, "cardCvc", "CardCvcElement", C::None),
    variant(K::FpxBank, "fpxBank", "FpxBankElement", C::None),
    variant(K::Iban, "iban", "IbanElement", C::None),
    variant(K::IdealBank, "idealBank", "IdealBankElement", C::None),
    variant(K::P24Bank, "p24Bank", "P24BankElement", C::None),
    variant(K::EpsBank, "epsBank", "EpsBankElement", C::None),
    variant(K::Payment, "payment", "PaymentElement", C::Payment),
    Variant {
        ready: ReadyArgument::Event,
        ..variant(
            K::ExpressCheckout,
            "expressCheckout",
            "ExpressCheckoutElement",
            C::ExpressCheckout,
        )
    },
    variant(K::PaymentRequestButton, "paymentRequestButton", "PaymentRequestButtonElement", C::None),
    variant(K::LinkAuthentication, "linkAuthentication", "LinkAuthenticationElement", C::None),
    variant(K::Address, "address", "AddressElement", C::Address),
    variant(K::ShippingAddress, "shippingAddress", "ShippingAddressElement", C::None),
    variant(K::PaymentMethodMessaging, "paymentMethodMessaging", "PaymentMethodMessagingElement", C::None),
    variant(K::AffirmMessage, "affirmMessage", "AffirmMessageElement", C::None),
    variant(K::AfterpayClearpayMessage, "afterpayClearpayMessage", "AfterpayClearpayMessageElement", C::None),
    variant(K::CurrencySelector, "currencySelector", "CurrencySelectorElement", C::CurrencySelector),
    variant(K::TaxId, "taxId", "TaxIdElement", C::TaxId),
    variant(K::IssuingCardNumberDisplay, "issuingCardNumberDisplay", "IssuingCardNumberDisplayElement", C::None),
    variant(K::IssuingCardCvcDisplay, "issuingCardCvcDisplay", "IssuingCardCvcDisplayElement", C::None),
    variant(K::IssuingCardExpiryDisplay, "issuingCardExpiryDisplay", "IssuingCardExpiryDisplayElement", C::None),
    variant(K::IssuingCardPinDisplay, "issuingCardPinDisplay", "IssuingCardPinDisplayElement", C::None),
    variant(K::IssuingCardCopyButton, "issuingCardCopyButton", "IssuingCardCopyButtonElement", C::None),
];

impl ElementKind {
    fn variant(self) -> &'static Variant {
        &VARIANTS[self as usize]
    }

    /// Type name the SDK's `create` expects.
    #[must_use]
    pub fn sdk_type(self) -> &'static str {
        self.variant().sdk_type
    }

    /// Component name, used as the owner in warnings.
    #[must_use]
    pub fn component_name(self) -> &'static str {
        self.variant().component
    }

    /// What the ready callback receives for this variant.
    #[must_use]
    pub fn ready_argument(self) -> ReadyArgument {
        self.variant().ready
    }

    /// Returns `true` if a checkout session can create this variant.
    #[must_use]
    pub fn supported_in_checkout(self) -> bool {
        self.variant().checkout != CheckoutSupport::None
    }

    /// Selects the checkout session factory for this variant.
    ///
    /// Address widgets pick the billing or shipping factory from
    /// `options.mode`, which is removed from the returned options.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError`] if the variant has no checkout factory or the
    /// address mode is missing or unknown.
    pub fn checkout_factory(self, options: &Options) -> Result<(CheckoutFactory, Options), WidgetError> {
        let factory = match self.variant().checkout {
            CheckoutSupport::None => {
                return Err(WidgetError::UnsupportedInCheckout(self.component_name()));
            }
            CheckoutSupport::Payment => CheckoutFactory::Payment,
            CheckoutSupport::ExpressCheckout => CheckoutFactory::ExpressCheckout,
            CheckoutSupport::CurrencySelector => CheckoutFactory::CurrencySelector,
            CheckoutSupport::TaxId => CheckoutFactory::TaxId,
            CheckoutSupport::Address => {
                let factory = match options.get("mode") {
                    None => return Err(WidgetError::MissingAddressMode),
                    Some(mode) => match mode.as_str() {
                        Some("billing") => CheckoutFactory::BillingAddress,
                        Some("shipping") => CheckoutFactory::ShippingAddress,
                        _ => {
                            return Err(WidgetError::InvalidAddressMode(mode.to_json().to_string()));
                        }
                    },
                };
                return Ok((factory, options.without("mode")));
            }
        };
        Ok((factory, options.clone()))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component_name())
    }
}

/// A widget factory on a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFactory {
    /// `create_payment_element`.
    Payment,
    /// `create_billing_address_element`.
    BillingAddress,
    /// `create_shipping_address_element`.
    ShippingAddress,
    /// `create_express_checkout_element`.
    ExpressCheckout,
    /// `create_currency_selector_element`.
    CurrencySelector,
    /// `create_tax_id_element`.
    TaxId,
}

impl CheckoutFactory {
    /// Calls the factory on `session`.
    ///
    /// # Errors
    ///
    /// Returns the SDK's error if creation fails.
    pub fn create(
        self,
        session: &dyn CheckoutSession,
        options: &Options,
    ) -> Result<Arc<dyn Element>, SdkError> {
        match self {
            Self::Payment => session.create_payment_element(options),
            Self::BillingAddress => session.create_billing_address_element(options),
            Self::ShippingAddress => session.create_shipping_address_element(options),
            Self::ExpressCheckout => session.create_express_checkout_element(options),
            Self::CurrencySelector => session.create_currency_selector_element(),
            Self::TaxId => session.create_tax_id_element(options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_is_indexed_by_discriminant() {
        for (index, variant) in VARIANTS.iter().enumerate() {
            assert_eq!(variant.kind as usize, index, "{}", variant.component);
        }
    }

    #[test]
    fn test_sdk_type_matches_serde_name() {
        for variant in &VARIANTS {
            assert_eq!(
                serde_json::to_value(variant.kind).unwrap(),
                json!(variant.sdk_type)
            );
        }
    }

    #[test]
    fn test_only_express_checkout_readies_with_event() {
        let event_ready: Vec<_> = VARIANTS
            .iter()
            .filter(|v| v.ready == ReadyArgument::Event)
            .map(|v| v.kind)
            .collect();
        assert_eq!(event_ready, vec![ElementKind::ExpressCheckout]);
    }

    #[test]
    fn test_card_is_rejected_under_checkout() {
        let err = ElementKind::Card.checkout_factory(&Options::new()).unwrap_err();
        assert!(matches!(err, WidgetError::UnsupportedInCheckout("CardElement")));
    }

    #[test]
    fn test_address_mode_selects_factory_and_is_stripped() {
        let options = Options::new().with("mode", "shipping").with("autocomplete", "off");
        let (factory, options) = ElementKind::Address.checkout_factory(&options).unwrap();
        assert_eq!(factory, CheckoutFactory::ShippingAddress);
        assert!(!options.contains_key("mode"));
        assert!(options.contains_key("autocomplete"));
    }

    #[test]
    fn test_address_mode_is_validated() {
        assert!(matches!(
            ElementKind::Address.checkout_factory(&Options::new()),
            Err(WidgetError::MissingAddressMode)
        ));
        assert!(matches!(
            ElementKind::Address.checkout_factory(&Options::new().with("mode", "both")),
            Err(WidgetError::InvalidAddressMode(_))
        ));
    }
}
