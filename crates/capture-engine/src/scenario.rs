//! Scenario contract and declarative scenario scripts.
//!
//! A scenario is anything that drives the [`Stage`] instrumentation API.
//! Rust callers implement [`Scenario`] directly; the CLI loads a
//! declarative JSON step list ([`ScriptScenario`]) so demos can be authored
//! without recompiling.

use std::path::Path;

use async_trait::async_trait;
use demoreel_common::error::{DemoreelError, DemoreelResult};
use demoreel_timeline_model::event::SlideConfig;
use demoreel_timeline_model::manifest::TransitionKind;
use demoreel_timeline_model::timeline::ViewportSize;
use serde::{Deserialize, Serialize};

use crate::stage::{ActionOptions, SceneOptions, Stage, TransitionOptions};

/// A recordable scenario.
///
/// The same scenario runs twice per compose: once against the dry-run stage
/// (narration collection) and once against the recording stage. Scenarios
/// whose narration sequence differs between the two passes are rejected.
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Scenario name; used for the output directory.
    fn name(&self) -> &str;

    /// Drive one pass of the scenario.
    async fn run(&self, stage: &mut Stage) -> DemoreelResult<()>;
}

/// Execute `scenario` against a dry-run stage and return the narration
/// texts it emits, in order.
pub async fn collect_narrations(
    scenario: &dyn Scenario,
    viewport: ViewportSize,
) -> DemoreelResult<Vec<String>> {
    let mut stage = Stage::dry_run(viewport);
    scenario.run(&mut stage).await?;
    Ok(stage.collected_narrations().to_vec())
}

/// One step of a declarative scenario script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    #[serde(rename_all = "camelCase")]
    Scene {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        slide: Option<SlideConfig>,
    },
    #[serde(rename_all = "camelCase")]
    Navigate {
        url: String,
        #[serde(default)]
        narration: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Click {
        selector: String,
        #[serde(default)]
        narration: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Dblclick {
        selector: String,
        #[serde(default)]
        narration: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Hover {
        selector: String,
        #[serde(default)]
        narration: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Press {
        selector: String,
        key: String,
        #[serde(default)]
        narration: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        narration: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Wait { ms: i64 },
    #[serde(rename_all = "camelCase")]
    Narrate { text: String },
    #[serde(rename_all = "camelCase")]
    Transition {
        #[serde(default)]
        kind: Option<TransitionKind>,
        #[serde(default)]
        duration_ms: Option<f64>,
    },
}

/// A scenario loaded from a JSON step list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptScenario {
    /// Scenario name; defaults to the file stem when loaded from disk.
    pub name: String,

    /// Ordered steps.
    pub steps: Vec<Step>,
}

impl ScriptScenario {
    /// Load a scenario script from disk.
    pub fn load(path: impl AsRef<Path>) -> DemoreelResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut script: ScriptScenario = serde_json::from_str(&raw).map_err(|e| {
            DemoreelError::invalid_argument(format!(
                "invalid scenario script {}: {e}",
                path.display()
            ))
        })?;
        if script.name.is_empty() {
            script.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scenario".to_string());
        }
        if script.steps.is_empty() {
            return Err(DemoreelError::invalid_argument(format!(
                "scenario script {} has no steps",
                path.display()
            )));
        }
        Ok(script)
    }
}

#[async_trait]
impl Scenario for ScriptScenario {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, stage: &mut Stage) -> DemoreelResult<()> {
        for step in &self.steps {
            match step.clone() {
                Step::Scene {
                    title,
                    description,
                    slide,
                } => {
                    stage
                        .scene(&title, SceneOptions { description, slide })
                        .await?
                }
                Step::Navigate { url, narration } => {
                    stage.navigate(&url, ActionOptions { narration }).await?
                }
                Step::Click {
                    selector,
                    narration,
                } => stage.click(&selector, ActionOptions { narration }).await?,
                Step::Dblclick {
                    selector,
                    narration,
                } => {
                    stage
                        .dblclick(&selector, ActionOptions { narration })
                        .await?
                }
                Step::Hover {
                    selector,
                    narration,
                } => stage.hover(&selector, ActionOptions { narration }).await?,
                Step::Press {
                    selector,
                    key,
                    narration,
                } => {
                    stage
                        .press(&selector, &key, ActionOptions { narration })
                        .await?
                }
                Step::Fill {
                    selector,
                    value,
                    narration,
                } => {
                    stage
                        .fill(&selector, &value, ActionOptions { narration })
                        .await?
                }
                Step::Wait { ms } => stage.wait(ms).await?,
                Step::Narrate { text } => stage.narrate(&text).await?,
                Step::Transition { kind, duration_ms } => {
                    stage.transition(TransitionOptions { kind, duration_ms }).await?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "name": "checkout",
        "steps": [
            {"op": "scene", "title": "Checkout", "slide": {"durationMs": 1500, "narrate": "Meet the new checkout."}},
            {"op": "navigate", "url": "http://localhost:3000", "narration": "We start on the storefront."},
            {"op": "click", "selector": "#add-to-cart"},
            {"op": "fill", "selector": "#email", "value": "ada@example.com"},
            {"op": "wait", "ms": 500},
            {"op": "transition", "kind": "slide-up", "durationMs": 600},
            {"op": "navigate", "url": "http://localhost:3000/done"},
            {"op": "narrate", "text": "And the order is in."}
        ]
    }"##;

    #[test]
    fn sample_script_parses() {
        let script: ScriptScenario = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(script.name, "checkout");
        assert_eq!(script.steps.len(), 8);
        assert!(matches!(
            script.steps[5],
            Step::Transition {
                kind: Some(TransitionKind::SlideUp),
                ..
            }
        ));
    }

    #[test]
    fn unknown_op_is_rejected() {
        let raw = r##"{"name":"x","steps":[{"op":"teleport","selector":"#a"}]}"##;
        assert!(serde_json::from_str::<ScriptScenario>(raw).is_err());
    }

    #[tokio::test]
    async fn dry_run_collects_script_narrations() {
        let script: ScriptScenario = serde_json::from_str(SAMPLE).unwrap();
        let texts = collect_narrations(
            &script,
            ViewportSize {
                width: 1280,
                height: 720,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            texts,
            [
                "Meet the new checkout.",
                "We start on the storefront.",
                "And the order is in."
            ]
        );
    }

    #[test]
    fn load_defaults_name_from_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tour.json");
        std::fs::write(
            &path,
            r#"{"name":"","steps":[{"op":"wait","ms":100}]}"#,
        )
        .unwrap();
        let script = ScriptScenario::load(&path).unwrap();
        assert_eq!(script.name, "tour");
    }
}
