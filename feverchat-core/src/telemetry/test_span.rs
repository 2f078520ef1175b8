#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{Subscriber, span};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry;
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

#[derive(Default, Debug)]
pub struct SpanData {
    pub name: String,
    pub fields: Mutex<HashMap<String, String>>,
}

impl SpanData {
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.lock().unwrap().get(name).cloned()
    }
}

#[derive(Default, Debug)]
pub struct SpanStore {
    spans: Mutex<Vec<Arc<SpanData>>>,
    by_id: Mutex<HashMap<span::Id, Arc<SpanData>>>,
}

impl SpanStore {
    /// Spans with the given name, in creation order.
    pub fn named(&self, name: &str) -> Vec<Arc<SpanData>> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

#[derive(Clone)]
pub struct CaptureLayer {
    store: Arc<SpanStore>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _ctx: Context<'_, S>) {
        let data = Arc::new(SpanData {
            name: attrs.metadata().name().to_string(),
            ..Default::default()
        });
        attrs.record(&mut FieldVisitor(&mut data.fields.lock().unwrap()));
        self.store.spans.lock().unwrap().push(data.clone());
        self.store.by_id.lock().unwrap().insert(id.clone(), data);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        if let Some(data) = self.store.by_id.lock().unwrap().get(id) {
            values.record(&mut FieldVisitor(&mut data.fields.lock().unwrap()));
        }
    }
}

/// Capture spans on the current thread until the guard drops.
pub fn install_capture() -> (Arc<SpanStore>, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(SpanStore::default());
    let layer = CaptureLayer {
        store: store.clone(),
    };
    let subscriber = registry::Registry::default().with(layer);
    (store, tracing::subscriber::set_default(subscriber))
}
