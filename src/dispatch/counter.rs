//! In-flight HTLC gauge guard.

/// RAII guard raising the in-flight gauge on creation and lowering it on drop.
///
/// The guard moves into the handler task, so the gauge falls even when the
/// task unwinds.
pub(super) struct InFlightHtlc;

impl InFlightHtlc {
    pub(super) fn new() -> Self {
        crate::metrics::inc_in_flight();
        Self
    }
}

impl Drop for InFlightHtlc {
    fn drop(&mut self) { crate::metrics::dec_in_flight(); }
}
