//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use paybind::diagnostics::RecordingSink;
use paybind::{HandleSource, ProviderConfig, SdkError, SdkHandle};
use paybind_mock::MockSdk;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Lets spawned continuations run to completion.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// A fresh mock SDK.
pub fn mock_sdk() -> Arc<MockSdk> {
    init_tracing();
    Arc::new(MockSdk::new())
}

/// A ready source for `sdk`.
pub fn ready(sdk: &Arc<MockSdk>) -> HandleSource {
    HandleSource::ready(Arc::clone(sdk) as SdkHandle)
}

/// A deferred source resolved by the returned sender.
pub fn deferred() -> (HandleSource, oneshot::Sender<Option<Arc<MockSdk>>>) {
    let (tx, rx) = oneshot::channel::<Option<Arc<MockSdk>>>();
    let source = HandleSource::deferred(async move {
        match rx.await {
            Ok(sdk) => Ok(sdk.map(|sdk| sdk as SdkHandle)),
            Err(_) => Err(SdkError::new("loader dropped")),
        }
    });
    (source, tx)
}

/// Provider configuration recording warnings into the returned sink.
pub fn recording_config() -> (ProviderConfig, Arc<RecordingSink>) {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let config = ProviderConfig::default().with_diagnostics(sink.clone());
    (config, sink)
}
