use std::str::FromStr;

use anyhow::anyhow;
use tessera_engine::prelude::*;
use tessera_kernel::PropertyError;

use crate::workspace::{Workspace2D, WORKSPACE_2D};

const INPUT: &str = "InputWorkspace";
const OUTPUT: &str = "OutputWorkspace";
const FACTOR: &str = "Factor";
const OPERATION: &str = "Operation";
const INCLUDE_ERRORS: &str = "IncludeErrors";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Multiply,
    Add,
}

impl Operation {
    pub const NAMES: [&'static str; 2] = ["Multiply", "Add"];

    fn apply(self, factor: f64, include_errors: bool, y: &mut [f64], e: &mut [f64]) {
        match self {
            Operation::Multiply => {
                y.iter_mut().for_each(|value| *value *= factor);
                if include_errors {
                    e.iter_mut().for_each(|error| *error *= factor.abs());
                }
            }
            // A constant offset carries no uncertainty.
            Operation::Add => y.iter_mut().for_each(|value| *value += factor),
        }
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "Multiply" => Ok(Operation::Multiply),
            "Add" => Ok(Operation::Add),
            other => Err(anyhow!("unknown operation {other:?}")),
        }
    }
}

/// Multiplies or offsets every count in a workspace by a constant.
///
/// Version 2 adds `IncludeErrors`, which lets callers leave the errors
/// untouched when multiplying.
#[derive(Debug)]
pub struct Scale {
    version: u32,
}

impl Scale {
    pub fn v1() -> Self {
        Self { version: 1 }
    }

    pub fn v2() -> Self {
        Self { version: 2 }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::v2()
    }
}

impl Algorithm for Scale {
    fn name(&self) -> &str {
        "Scale"
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn category(&self) -> &str {
        "Arithmetic"
    }

    fn summary(&self) -> &str {
        "Scales or offsets the counts of a workspace by a constant."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::workspace(INPUT, Direction::Input).with_workspace_type(WORKSPACE_2D),
        )?;
        properties.declare(Property::workspace(OUTPUT, Direction::Output))?;
        properties.declare(
            Property::double(FACTOR, 1.0).with_documentation("The value to scale by"),
        )?;
        properties.declare(
            Property::string(OPERATION, "Multiply")
                .with_validator(ListValidator::new(Operation::NAMES)),
        )?;
        if self.version >= 2 {
            properties.declare(
                Property::bool(INCLUDE_ERRORS, true)
                    .with_documentation("Scale the errors alongside the counts"),
            )?;
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let input = ctx.input_as::<Workspace2D>(INPUT)?;
        let factor: f64 = ctx.get(FACTOR)?;
        let operation: Operation = ctx.get::<String>(OPERATION)?.parse()?;
        let include_errors = if self.version >= 2 {
            ctx.get::<bool>(INCLUDE_ERRORS)?
        } else {
            true
        };
        if ctx.is_in_place(INPUT, OUTPUT) {
            ctx.logger().debug("result replaces the input workspace");
        }

        let mut spectra = input.spectra().to_vec();
        let progress = ctx.progress(0.0, 1.0, spectra.len());
        ctx.parallel()
            .for_each_mut(&mut spectra, ctx.cancellation(), |_, spectrum| {
                let (y, e) = spectrum.data_mut();
                operation.apply(factor, include_errors, y, e);
                progress.report()?;
                Ok(())
            })?;

        ctx.set_output(OUTPUT, input.with_spectra(spectra))?;
        Ok(())
    }
}
