mod common;

use axum::http::StatusCode;
use common::*;
use std::fmt;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Collects the `request_id` field of every `http_request` span
#[derive(Clone, Default)]
struct RequestIdSpans(Arc<Mutex<Vec<String>>>);

struct RequestIdVisitor(Option<String>);

impl Visit for RequestIdVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "request_id" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

impl<S: Subscriber> Layer<S> for RequestIdSpans {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() != "http_request" {
            return;
        }
        let mut visitor = RequestIdVisitor(None);
        attrs.record(&mut visitor);
        if let Some(id) = visitor.0 {
            self.0.lock().unwrap().push(id);
        }
    }
}

#[tokio::test]
async fn test_request_span_carries_generated_and_client_ids() {
    let spans = RequestIdSpans::default();
    let subscriber = tracing_subscriber::registry().with(spans.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let staging = tempfile::tempdir().unwrap();
    let app = test_app(RecordingStore::new(), test_config(staging.path()));

    let response = app.clone().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let generated = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(generated, "unknown");

    let mut request = get_request("/health");
    request
        .headers_mut()
        .insert("x-request-id", "client-42".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "client-42");

    let recorded = spans.0.lock().unwrap().clone();
    assert_eq!(recorded, vec![generated, "client-42".to_string()]);
}
