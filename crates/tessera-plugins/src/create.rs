use tessera_engine::prelude::*;
use tessera_kernel::PropertyError;

use crate::workspace::Workspace2D;

const DATA_X: &str = "DataX";
const DATA_Y: &str = "DataY";
const DATA_E: &str = "DataE";
const NSPEC: &str = "NSpec";
const UNIT_X: &str = "UnitX";
const TITLE: &str = "Title";
const OUTPUT: &str = "OutputWorkspace";

/// Builds a [`Workspace2D`] from flat x, y and error arrays.
#[derive(Debug, Default)]
pub struct CreateWorkspace;

impl Algorithm for CreateWorkspace {
    fn name(&self) -> &str {
        "CreateWorkspace"
    }

    fn category(&self) -> &str {
        "Utility\\Workspaces"
    }

    fn summary(&self) -> &str {
        "Creates a workspace from flat data arrays."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::double_array(DATA_X)
                .mandatory()
                .with_documentation("X values, shared by all spectra or given per spectrum"),
        )?;
        properties.declare(
            Property::double_array(DATA_Y)
                .mandatory()
                .with_documentation("Counts for every spectrum, concatenated"),
        )?;
        properties.declare(
            Property::double_array(DATA_E).with_documentation("Errors on DataY; zero if empty"),
        )?;
        properties.declare(
            Property::int(NSPEC, 1).with_validator(BoundedValidator::at_least(1.0)),
        )?;
        properties.declare(Property::string(UNIT_X, ""))?;
        properties.declare(Property::string(TITLE, ""))?;
        properties.declare(Property::workspace(OUTPUT, Direction::Output))
    }

    fn validate_inputs(&self, properties: &PropertyManager) -> Vec<(String, String)> {
        let mut failures = Vec::new();
        let (Ok(x), Ok(y), Ok(e), Ok(nspec)) = (
            properties.get::<Vec<f64>>(DATA_X),
            properties.get::<Vec<f64>>(DATA_Y),
            properties.get::<Vec<f64>>(DATA_E),
            properties.get::<usize>(NSPEC),
        ) else {
            return failures;
        };
        if nspec == 0 {
            return failures;
        }

        if y.len() % nspec != 0 {
            failures.push((
                DATA_Y.to_string(),
                format!("{} values cannot be split into {nspec} spectra", y.len()),
            ));
            return failures;
        }
        let per_spectrum = y.len() / nspec;
        let accepted = [
            per_spectrum,
            per_spectrum + 1,
            per_spectrum * nspec,
            (per_spectrum + 1) * nspec,
        ];
        if !accepted.contains(&x.len()) {
            failures.push((
                DATA_X.to_string(),
                format!(
                    "expected {} or {} values (or that many per spectrum), found {}",
                    per_spectrum,
                    per_spectrum + 1,
                    x.len()
                ),
            ));
        }
        if !e.is_empty() && e.len() != y.len() {
            failures.push((
                DATA_E.to_string(),
                format!("must be empty or match DataY ({} values)", y.len()),
            ));
        }
        failures
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let x: Vec<f64> = ctx.get(DATA_X)?;
        let y: Vec<f64> = ctx.get(DATA_Y)?;
        let e: Vec<f64> = ctx.get(DATA_E)?;
        let nspec: usize = ctx.get(NSPEC)?;

        let errors = (!e.is_empty()).then_some(e.as_slice());
        let workspace = Workspace2D::from_flat(&x, &y, errors, nspec)?
            .with_title(ctx.get::<String>(TITLE)?)
            .with_unit_x(ctx.get::<String>(UNIT_X)?);
        ctx.logger().debug(format_args!(
            "created {} spectra of {} bins",
            workspace.num_spectra(),
            y.len() / nspec.max(1)
        ));
        ctx.set_output(OUTPUT, workspace)?;
        Ok(())
    }
}
