//! Ais Event

use crate::ais::{ResourceKind, ResourceRef};

#[derive(Debug, Clone)]
pub enum AisEvent {
	// -- Reconciliation Events
	ResourceFound(ResourceRef),
	ResourceCreating {
		kind: ResourceKind,
		name: String,
	},
	ResourceCreated(ResourceRef),

	// -- Deletion Events
	ResourceDeleted(ResourceRef),
	ResourceCantDelete {
		res_ref: ResourceRef,
		cause: String,
	},

	// -- Progress Events
	RunStatus {
		run_id: String,
		status: String,
	},
	FineTuneJobStatus {
		job_id: String,
		status: String,
	},
}
