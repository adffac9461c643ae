//! Diagnostics engine interface
//!
//! Triggering diagnostics only flips the line into `Running` and hands a
//! request to the runner. The runner executes the line tests in its own
//! context and reports back through
//! [`MtaDevice::report_diagnostics`](crate::MtaDevice::report_diagnostics).

/// A line-test request handed to the diagnostics engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsRequest {
    pub line_instance: u32,
    pub line_number: u32,
}

/// Trait for diagnostics engine implementations
///
/// `launch` is called after the line has entered `Running` and after the
/// line lock has been released. It must not block; queue the work and
/// return.
pub trait DiagnosticsRunner: Send + Sync {
    fn launch(&self, request: DiagnosticsRequest);
}
