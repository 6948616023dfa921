// SPDX-License-Identifier: MIT

//! Strongly-typed identifiers threaded through every subsystem.

use crate::define_id;

define_id! {
    /// Identifies a module step's agent within a workflow template.
    pub struct AgentId("agt-");
}

define_id! {
    /// Identifies a single engine-CLI invocation (one process spawn).
    pub struct SessionId("sess");
}

define_id! {
    /// Identifies the monitoring/log stream a step's invocation is recorded
    /// under, stable across a crash-resume even when the session id changes.
    pub struct MonitoringId("mon-");
}

define_id! {
    /// Identifies one end-to-end run of `run_workflow`.
    pub struct WorkflowRunId("wfr-");
}
