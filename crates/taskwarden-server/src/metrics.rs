use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug, Default)]
pub struct Metrics {
    request_total: AtomicU64,
    request_success: AtomicU64,
    request_error: AtomicU64,
    decisions_allowed: AtomicU64,
    decisions_denied: AtomicU64,
    not_found_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.request_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.request_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_allowed(&self) {
        self.decisions_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.decisions_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_total(&self) -> u64 {
        self.request_total.load(Ordering::Relaxed)
    }

    pub fn request_success(&self) -> u64 {
        self.request_success.load(Ordering::Relaxed)
    }

    pub fn request_error(&self) -> u64 {
        self.request_error.load(Ordering::Relaxed)
    }

    pub fn decisions_allowed(&self) -> u64 {
        self.decisions_allowed.load(Ordering::Relaxed)
    }

    pub fn decisions_denied(&self) -> u64 {
        self.decisions_denied.load(Ordering::Relaxed)
    }

    pub fn not_found_total(&self) -> u64 {
        self.not_found_total.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            (
                "taskwarden_requests_total",
                "Total number of requests.",
                self.request_total(),
            ),
            (
                "taskwarden_requests_success_total",
                "Total successful requests.",
                self.request_success(),
            ),
            (
                "taskwarden_requests_error_total",
                "Total failed requests.",
                self.request_error(),
            ),
            (
                "taskwarden_decisions_allowed_total",
                "Authorization decisions that allowed the operation.",
                self.decisions_allowed(),
            ),
            (
                "taskwarden_decisions_denied_total",
                "Authorization decisions that denied the operation.",
                self.decisions_denied(),
            ),
            (
                "taskwarden_not_found_total",
                "Operations rejected because the target did not exist.",
                self.not_found_total(),
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {name} {help}\n"));
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {value}\n"));
        }
        output
    }
}

pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}
