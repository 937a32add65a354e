//! Algorithms that manage workspaces in the data service rather than
//! transform their contents.

use std::sync::Arc;

use anyhow::bail;
use tessera_engine::prelude::*;
use tessera_kernel::{downcast_workspace, PropertyError};

use crate::workspace::Workspace2D;

const INPUT: &str = "InputWorkspace";
const OUTPUT: &str = "OutputWorkspace";
const WORKSPACE: &str = "Workspace";

/// Copies a workspace under a new name.
#[derive(Debug, Default)]
pub struct CloneWorkspace;

impl Algorithm for CloneWorkspace {
    fn name(&self) -> &str {
        "CloneWorkspace"
    }

    fn category(&self) -> &str {
        "Utility\\Workspaces"
    }

    fn summary(&self) -> &str {
        "Copies an existing workspace into a new one."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::workspace(INPUT, Direction::Input))?;
        properties.declare(Property::workspace(OUTPUT, Direction::Output))
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let input = ctx.input_workspace(INPUT)?;
        let copy: WorkspaceHandle = match downcast_workspace::<Workspace2D>(&input) {
            Some(workspace) => Arc::new(Workspace2D::clone(&workspace)),
            // Workspaces are never mutated in place, so sharing is a valid copy.
            None => {
                ctx.logger().debug(format_args!(
                    "sharing {} payload instead of copying it",
                    input.id()
                ));
                input
            }
        };
        ctx.set_output_workspace(OUTPUT, copy)?;
        Ok(())
    }
}

/// Removes a workspace from the data service.
#[derive(Debug, Default)]
pub struct DeleteWorkspace;

impl Algorithm for DeleteWorkspace {
    fn name(&self) -> &str {
        "DeleteWorkspace"
    }

    fn category(&self) -> &str {
        "Utility\\Workspaces"
    }

    fn summary(&self) -> &str {
        "Removes a workspace from memory."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::workspace(WORKSPACE, Direction::Input)
                .with_documentation("Name of the workspace to delete"),
        )
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let name = ctx.property_value(WORKSPACE)?;
        let removed = ctx.data_service().remove(&name)?;
        ctx.logger().debug(format_args!(
            "freed {} bytes held by {name}",
            removed.memory_size()
        ));
        Ok(())
    }
}

/// Moves a workspace to a new name in the data service.
#[derive(Debug, Default)]
pub struct RenameWorkspace;

impl Algorithm for RenameWorkspace {
    fn name(&self) -> &str {
        "RenameWorkspace"
    }

    fn category(&self) -> &str {
        "Utility\\Workspaces"
    }

    fn summary(&self) -> &str {
        "Renames a workspace."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::workspace(INPUT, Direction::Input))?;
        properties.declare(Property::workspace(OUTPUT, Direction::Output))
    }

    fn validate_inputs(&self, properties: &PropertyManager) -> Vec<(String, String)> {
        match (
            properties.property_value(INPUT),
            properties.property_value(OUTPUT),
        ) {
            (Ok(input), Ok(output)) if !input.is_empty() && input == output => vec![(
                OUTPUT.to_string(),
                "Input and output workspace names must be different".to_string(),
            )],
            _ => Vec::new(),
        }
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let from = ctx.property_value(INPUT)?;
        let to = ctx.property_value(OUTPUT)?;
        if ctx.data_service().contains(&to) {
            bail!("a workspace called {to} already exists");
        }
        let workspace = ctx.input_workspace(INPUT)?;
        ctx.data_service().rename(&from, &to)?;
        // Publishing finds the same handle under the new name and skips it.
        ctx.set_output_workspace(OUTPUT, workspace)?;
        Ok(())
    }
}
