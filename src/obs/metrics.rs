// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oidc_token_keeper_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Reports that a stored record was unreadable and treated as absent.
///
/// `backend` names the store (`cookie`, `sql`) and `reason` is a stable error label such as
/// `tamper` or `structure`. Neither value ever carries token material.
pub fn record_discard(backend: &'static str, reason: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(backend, reason, "Discarding unreadable token record.");
	}

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oidc_token_keeper_discard_total",
			"backend" => backend,
			"reason" => reason
		)
		.increment(1);
	}

	#[cfg(not(any(feature = "tracing", feature = "metrics")))]
	{
		let _ = (backend, reason);
	}
}
