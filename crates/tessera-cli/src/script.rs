use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tessera_engine::Framework;

use crate::commands::report_outputs;

/// One algorithm invocation in a script file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub algorithm: String,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default = "empty_object")]
    pub properties: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

pub fn load(path: &Path) -> Result<Vec<Step>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid script", path.display()))
}

/// Runs `steps` in order, stopping at the first failure.
pub fn run(framework: &Framework, steps: &[Step], out: &mut dyn Write) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        let label = format!("step {} ({})", index + 1, step.algorithm);
        let mut instance = framework
            .create_unmanaged(&step.algorithm, step.version)
            .with_context(|| format!("{label} failed"))?;
        instance.set_rethrows(true);
        instance
            .set_properties_json(&step.properties)
            .with_context(|| format!("{label} has invalid properties"))?;
        instance.run().with_context(|| format!("{label} failed"))?;
        tracing::info!(step = index + 1, algorithm = %step.algorithm, "script step finished");
        writeln!(out, "{label}")?;
        report_outputs(&instance, out)?;
    }
    Ok(())
}
