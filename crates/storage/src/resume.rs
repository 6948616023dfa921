// SPDX-License-Identifier: MIT

//! Resume-index computation: the first rule that matches wins.

use crate::model::TemplateTracking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Start fresh at index 0.
    FromScratch,
    /// Resume a step whose chained-prompt queue was left mid-way.
    ResumeChain { module_index: usize, from_chain: usize },
    /// Resume at the lowest not-yet-completed index.
    ResumeIncomplete { module_index: usize },
    /// Resume one past the highest completed index.
    Advance { module_index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeInfo {
    pub start_index: usize,
    pub decision: ResumeDecision,
}

/// Applies the five-rule resume policy against a tracking document's
/// current state. Rule order is significant; the first match wins.
pub fn compute_resume_info(tracking: &TemplateTracking) -> ResumeInfo {
    // Rule 1.
    if !tracking.resume_from_last_step {
        return ResumeInfo { start_index: 0, decision: ResumeDecision::FromScratch };
    }

    // Rule 2: any StepData has non-empty completed_chains and no completed_at.
    if let Some((idx, data)) = tracking
        .completed_steps
        .iter()
        .find(|(_, data)| data.has_partial_chains())
    {
        let from_chain = data.completed_chains.as_ref().map(|c| c.iter().copied().max().unwrap_or(0) + 1).unwrap_or(0);
        return ResumeInfo {
            start_index: *idx,
            decision: ResumeDecision::ResumeChain { module_index: *idx, from_chain },
        };
    }

    // Rule 3: not_completed_steps non-empty -> its minimum.
    if let Some(min) = tracking.not_completed_steps.iter().copied().min() {
        return ResumeInfo {
            start_index: min,
            decision: ResumeDecision::ResumeIncomplete { module_index: min },
        };
    }

    // Rule 4: completed_steps has entries with completed_at set -> one past the max.
    if let Some(max) = tracking
        .completed_steps
        .iter()
        .filter(|(_, data)| data.is_complete())
        .map(|(idx, _)| *idx)
        .max()
    {
        return ResumeInfo {
            start_index: max + 1,
            decision: ResumeDecision::Advance { module_index: max + 1 },
        };
    }

    // Rule 5.
    ResumeInfo { start_index: 0, decision: ResumeDecision::FromScratch }
}
