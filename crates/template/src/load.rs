// SPDX-License-Identifier: MIT

//! Loads a [`Template`] from disk.
//!
//! The on-disk template format is an external interface the workflow
//! engine only consumes; this loader implements one concrete encoding
//! (TOML) sufficient to exercise the engine end to end, and filters
//! chained prompts by the caller's track/condition selection at load time.

use crate::filter::{matches_conditions, matches_track};
use crate::step::{ChainedPrompt, ModuleStep, Step, Template};
use codemachine_core::AgentId;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse template {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
    #[error("prompt file not found for step {step_name:?}: {path}")]
    PromptMissing { step_name: String, path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    #[serde(default)]
    step: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawKind {
    Module,
    Separator,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    kind: RawKind,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    engine: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tracks: Option<Vec<String>>,
    #[serde(default)]
    conditions: Option<Vec<String>>,
    #[serde(default)]
    execute_once: bool,
    #[serde(default)]
    interactive: Option<bool>,
    #[serde(default)]
    prompts: Vec<PathBuf>,
    #[serde(default)]
    chained_prompts: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawChainFile {
    #[serde(default)]
    prompt: Vec<ChainedPrompt>,
}

/// Loads `template.toml` (and any referenced chained-prompt files) rooted
/// at `dir`, filtering chained prompts by `selected_track`/`selected_conditions`.
pub fn load_template(
    dir: &Path,
    selected_track: Option<&str>,
    selected_conditions: Option<&[String]>,
) -> Result<Template, TemplateError> {
    let manifest_path = dir.join("template.toml");
    if !manifest_path.exists() {
        return Err(TemplateError::NotFound(manifest_path));
    }
    let raw_text = std::fs::read_to_string(&manifest_path)
        .map_err(|source| TemplateError::Read { path: manifest_path.clone(), source })?;
    let raw: RawTemplate = toml::from_str(&raw_text)
        .map_err(|source| TemplateError::Parse { path: manifest_path.clone(), source })?;

    let mut steps = Vec::with_capacity(raw.step.len());
    let mut chained_prompts = HashMap::new();
    let mut module_index = 0usize;

    for raw_step in raw.step {
        match raw_step.kind {
            RawKind::Separator => steps.push(Step::Separator),
            RawKind::Module => {
                let name = raw_step.name.unwrap_or_default();
                for prompt_path in &raw_step.prompts {
                    let resolved = dir.join(prompt_path);
                    if !resolved.exists() {
                        return Err(TemplateError::PromptMissing {
                            step_name: name.clone(),
                            path: resolved,
                        });
                    }
                }
                let module = ModuleStep {
                    agent_id: raw_step
                        .agent_id
                        .map(AgentId::from_string)
                        .unwrap_or_default(),
                    name,
                    engine_override: raw_step.engine,
                    model: raw_step.model,
                    tracks: raw_step.tracks,
                    conditions: raw_step.conditions,
                    execute_once: raw_step.execute_once,
                    interactive: raw_step.interactive,
                    prompt_paths: raw_step.prompts.iter().map(|p| dir.join(p)).collect(),
                    chained_prompts_path: raw_step.chained_prompts.clone(),
                };

                if let Some(chain_path) = &raw_step.chained_prompts {
                    let resolved = dir.join(chain_path);
                    let filtered =
                        load_chained_prompts(&resolved, selected_track, selected_conditions)?;
                    if !filtered.is_empty() {
                        chained_prompts.insert(module_index, filtered);
                    }
                }

                steps.push(Step::Module(module));
                module_index += 1;
            }
        }
    }

    Ok(Template { steps, chained_prompts })
}

fn load_chained_prompts(
    path: &Path,
    selected_track: Option<&str>,
    selected_conditions: Option<&[String]>,
) -> Result<Vec<ChainedPrompt>, TemplateError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|source| TemplateError::Read { path: path.to_path_buf(), source })?;
    let raw: RawChainFile = toml::from_str(&text)
        .map_err(|source| TemplateError::Parse { path: path.to_path_buf(), source })?;

    Ok(raw
        .prompt
        .into_iter()
        .filter(|p| {
            matches_track(p.track.as_ref().map(std::slice::from_ref), selected_track)
                && matches_conditions(p.conditions.as_deref(), selected_conditions)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write fixture");
    }

    #[test]
    fn loads_module_and_separator_steps_in_order() {
        let dir = tempdir().expect("tempdir");
        write(dir.path(), "prompt.md", "do the thing");
        write(
            dir.path(),
            "template.toml",
            r#"
            [[step]]
            kind = "module"
            name = "plan"
            prompts = ["prompt.md"]

            [[step]]
            kind = "separator"

            [[step]]
            kind = "module"
            name = "implement"
            prompts = ["prompt.md"]
            "#,
        );

        let template = load_template(dir.path(), None, None).expect("loads");
        assert_eq!(template.steps.len(), 3);
        assert_eq!(template.module_step_count(), 2);
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        write(
            dir.path(),
            "template.toml",
            r#"
            [[step]]
            kind = "module"
            name = "plan"
            prompts = ["missing.md"]
            "#,
        );

        let err = load_template(dir.path(), None, None).expect_err("should fail");
        assert!(matches!(err, TemplateError::PromptMissing { .. }));
    }

    #[test]
    fn chained_prompts_filtered_by_track() {
        let dir = tempdir().expect("tempdir");
        write(dir.path(), "prompt.md", "go");
        write(
            dir.path(),
            "chain.toml",
            r#"
            [[prompt]]
            name = "p1"
            label = "First"
            content = "do one"
            track = "fast"

            [[prompt]]
            name = "p2"
            label = "Second"
            content = "do two"
            track = "slow"
            "#,
        );
        write(
            dir.path(),
            "template.toml",
            r#"
            [[step]]
            kind = "module"
            name = "plan"
            prompts = ["prompt.md"]
            chained_prompts = "chain.toml"
            "#,
        );

        let template = load_template(dir.path(), Some("fast"), None).expect("loads");
        let chain = template.chained_prompts_for(0);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name, "p1");
    }
}
