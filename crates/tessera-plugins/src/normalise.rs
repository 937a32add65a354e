use std::sync::Arc;

use anyhow::{bail, Context};
use tessera_engine::prelude::*;
use tessera_kernel::PropertyError;

use crate::workspace::{Workspace2D, WORKSPACE_2D};

const INPUT: &str = "InputWorkspace";
const OUTPUT: &str = "OutputWorkspace";

/// Divides every count by the total number of counts in the workspace.
///
/// Runs `Integration` over the first half of its progress range to find the
/// total, then `Scale` over the second half.
#[derive(Debug, Default)]
pub struct NormaliseToTotal;

impl Algorithm for NormaliseToTotal {
    fn name(&self) -> &str {
        "NormaliseToTotal"
    }

    fn category(&self) -> &str {
        "CorrectionFunctions\\NormalisationCorrections"
    }

    fn summary(&self) -> &str {
        "Normalises a workspace so that its counts sum to one."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::workspace(INPUT, Direction::Input).with_workspace_type(WORKSPACE_2D),
        )?;
        properties.declare(Property::workspace(OUTPUT, Direction::Output))
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let input = ctx.input_workspace(INPUT)?;

        let mut integration = ctx.create_child_algorithm("Integration", 0.0, 0.5)?;
        integration.set_workspace(INPUT, Arc::clone(&input))?;
        integration.run().context("integrating the input")?;
        let sums = integration.output_as::<Workspace2D>(OUTPUT)?;
        let total: f64 = sums.spectra().iter().map(|spectrum| spectrum.total()).sum();
        if total == 0.0 || !total.is_finite() {
            bail!("cannot normalise: total counts are {total}");
        }
        ctx.logger().debug(format_args!("total counts {total}"));

        let mut scale = ctx.create_child_algorithm("Scale", 0.5, 1.0)?;
        scale.set_workspace(INPUT, input)?;
        scale.set_property("Factor", 1.0 / total)?;
        scale.set_property("Operation", "Multiply")?;
        scale.run().context("scaling by the total")?;

        ctx.set_output_workspace(OUTPUT, scale.output_workspace(OUTPUT)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_engine::AlgorithmEvent;

    use super::*;
    use crate::testing::{add_workspace, framework};

    #[test]
    fn counts_sum_to_one_afterwards() {
        let framework = framework();
        add_workspace(&framework, "raw", &[1.0, 3.0], &[1.0, 1.0]);
        let mut normalise = framework.create_unmanaged("NormaliseToTotal", None).unwrap();
        normalise.set_property_value(INPUT, "raw").unwrap();
        normalise.set_property_value(OUTPUT, "norm").unwrap();
        let events = normalise.subscribe();
        assert!(normalise.execute().unwrap());

        let norm = framework
            .data_service()
            .retrieve_as::<Workspace2D>("norm")
            .unwrap();
        assert_eq!(norm.spectrum(0).unwrap().y(), [0.25, 0.75]);
        assert_eq!(framework.data_service().names(), ["norm", "raw"]);

        let sources: Vec<_> = events
            .try_iter()
            .filter_map(|event| match event {
                AlgorithmEvent::Progress { algorithm, .. } => Some(algorithm),
                _ => None,
            })
            .collect();
        assert_eq!(sources.first().map(String::as_str), Some("NormaliseToTotal.Integration"));
        assert_eq!(sources.last().map(String::as_str), Some("NormaliseToTotal.Scale"));

        let history = normalise.history().unwrap();
        let children: Vec<_> = history.children.iter().map(|child| child.name.as_str()).collect();
        assert_eq!(children, ["Integration", "Scale"]);
    }

    #[test]
    fn empty_workspaces_cannot_be_normalised() {
        let framework = framework();
        add_workspace(&framework, "raw", &[0.0, 0.0], &[0.0, 0.0]);
        let mut normalise = framework.create_unmanaged("NormaliseToTotal", None).unwrap();
        normalise.set_property_value(INPUT, "raw").unwrap();
        normalise.set_property_value(OUTPUT, "norm").unwrap();
        assert!(!normalise.execute().unwrap());
        assert!(!framework.data_service().contains("norm"));
    }
}
