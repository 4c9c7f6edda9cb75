//! Crash reporting for unhandled handler faults.
//!
//! When `email_errors` is enabled the resource hands a [`CrashReport`] to its
//! [`CrashReporter`] before deciding whether to surface the fault. Delivery
//! (mail, paging, error trackers) belongs to the reporter; it is fire-and-forget
//! and must not fail the request.

use serde::Serialize;

use crate::ids::RequestId;

/// Everything an operator needs to look into one crash.
#[derive(Debug, Clone, Serialize)]
pub struct CrashReport {
    pub request_id: RequestId,
    pub method: String,
    pub path: String,
    /// CRUD operation that raised the fault, if one had been selected
    pub handler_method: Option<String>,
    /// Top level fault message
    pub message: String,
    /// Full cause chain, one cause per line
    pub traceback: String,
}

impl CrashReport {
    /// Mail-style subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("brrtresource crash report: {} {}", self.method, self.path)
    }
}

/// Receives crash reports. Implementations swallow their own failures.
pub trait CrashReporter: Send + Sync {
    fn report(&self, report: &CrashReport);
}

/// Default reporter: writes the report as an `error!` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCrashReporter;

impl CrashReporter for TracingCrashReporter {
    fn report(&self, report: &CrashReport) {
        tracing::error!(
            request_id = %report.request_id,
            method = %report.method,
            path = %report.path,
            handler_method = ?report.handler_method,
            message = %report.message,
            traceback = %report.traceback,
            "{}",
            report.subject()
        );
    }
}
