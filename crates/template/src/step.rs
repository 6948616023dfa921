// SPDX-License-Identifier: MIT

//! Workflow template data model.

use codemachine_core::AgentId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tri-state interactivity flag. `None` is treated as "has chained prompts"
/// by the scenario matrix (§4.H of the workflow engine's component design).
pub type InteractiveFlag = Option<bool>;

/// One entry in a workflow template's ordered step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Module(ModuleStep),
    Separator,
}

impl Step {
    pub fn as_module(&self) -> Option<&ModuleStep> {
        match self {
            Step::Module(m) => Some(m),
            Step::Separator => None,
        }
    }
}

/// A step that invokes an agent via an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStep {
    pub agent_id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(default)]
    pub execute_once: bool,
    #[serde(default)]
    pub interactive: InteractiveFlag,
    pub prompt_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained_prompts_path: Option<PathBuf>,
}

impl ModuleStep {
    /// `interactive == None` is treated as "has chained prompts" — the
    /// caller must still check whether the loaded chain is non-empty.
    pub fn effective_interactive(&self, has_chained_prompts: bool) -> bool {
        self.interactive.unwrap_or(has_chained_prompts)
    }
}

/// `{name, label, content, conditions?, track?}` — one turn in a step's
/// multi-turn conversation with a single engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedPrompt {
    pub name: String,
    pub label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
}

/// A fully loaded workflow template: the ordered step list plus every
/// module step's (unfiltered) chained-prompt chain, keyed by module index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub steps: Vec<Step>,
    #[serde(default)]
    pub chained_prompts: std::collections::HashMap<usize, Vec<ChainedPrompt>>,
}

impl Template {
    /// The index among module-typed steps only — the indexing scheme used
    /// by `template.json`'s `completed_steps` map.
    pub fn module_steps(&self) -> impl Iterator<Item = (usize, &ModuleStep)> {
        self.steps.iter().filter_map(Step::as_module).enumerate()
    }

    pub fn module_step_count(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s, Step::Module(_))).count()
    }

    pub fn module_step_at(&self, module_index: usize) -> Option<&ModuleStep> {
        self.module_steps().find(|(i, _)| *i == module_index).map(|(_, m)| m)
    }

    pub fn chained_prompts_for(&self, module_index: usize) -> &[ChainedPrompt] {
        self.chained_prompts.get(&module_index).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> ModuleStep {
        ModuleStep {
            agent_id: AgentId::new(),
            name: name.to_string(),
            engine_override: None,
            model: None,
            tracks: None,
            conditions: None,
            execute_once: false,
            interactive: None,
            prompt_paths: vec![],
            chained_prompts_path: None,
        }
    }

    #[test]
    fn module_index_counts_only_module_steps() {
        let template = Template {
            steps: vec![
                Step::Module(module("a")),
                Step::Separator,
                Step::Module(module("b")),
            ],
            chained_prompts: Default::default(),
        };
        let indices: Vec<usize> = template.module_steps().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(template.module_step_count(), 2);
    }

    #[test]
    fn effective_interactive_falls_back_to_has_chained_prompts() {
        let step = module("a");
        assert!(step.effective_interactive(true));
        assert!(!step.effective_interactive(false));
    }
}
