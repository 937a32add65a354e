#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use tessera_engine::prelude::*;
use tessera_engine::{AlgorithmFactory, Framework, FrameworkConfig};
use tessera_kernel::PropertyError;

#[derive(Debug, Clone, PartialEq)]
pub struct Numbers(pub Vec<f64>);

impl Workspace for Numbers {
    fn id(&self) -> &'static str {
        "Numbers"
    }

    fn memory_size(&self) -> usize {
        self.0.len() * std::mem::size_of::<f64>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub fn numbers(values: &[f64]) -> WorkspaceHandle {
    Arc::new(Numbers(values.to_vec()))
}

pub fn framework() -> Framework {
    framework_with(FrameworkConfig {
        workers: 2,
        progress_notify_step: 0.0,
        ..FrameworkConfig::default()
    })
}

pub fn framework_with(config: FrameworkConfig) -> Framework {
    let framework = Framework::new(config).expect("framework");
    register(framework.factory());
    framework
}

pub fn register(factory: &AlgorithmFactory) {
    factory.subscribe_type::<Foo>().unwrap();
    factory
        .subscribe("Foo", 2, || Box::new(Foo { v2: true }) as Box<dyn Algorithm>)
        .unwrap();
    factory.subscribe_type::<Convert>().unwrap();
    factory.subscribe_type::<AddOne>().unwrap();
    factory.subscribe_type::<Failing>().unwrap();
    factory.subscribe_type::<ReportHalf>().unwrap();
    factory.subscribe_type::<Nested>().unwrap();
    factory.subscribe_type::<StopsMidway>().unwrap();
    factory.subscribe_type::<Stubborn>().unwrap();
    factory.subscribe_type::<AwaitsCancel>().unwrap();
    factory.subscribe_type::<RunsFailing>().unwrap();
}

#[derive(Default)]
pub struct Foo {
    pub v2: bool,
}

impl Algorithm for Foo {
    fn name(&self) -> &str {
        "Foo"
    }

    fn version(&self) -> u32 {
        if self.v2 {
            2
        } else {
            1
        }
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::int("Value", 0))
    }

    fn exec(&mut self, _ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Doubles a non-negative fixed energy; `Lower` must not exceed `Upper`.
#[derive(Default)]
pub struct Convert;

impl Algorithm for Convert {
    fn name(&self) -> &str {
        "Convert"
    }

    fn category(&self) -> &str {
        "Units"
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::double("EFixed", 0.0).with_validator(BoundedValidator::at_least(0.0)),
        )?;
        properties.declare(Property::new("Lower", PropertyKind::Double))?;
        properties.declare(Property::new("Upper", PropertyKind::Double))?;
        properties.declare(Property::double("Energy", 0.0).with_direction(Direction::Output))
    }

    fn validate_inputs(&self, properties: &PropertyManager) -> Vec<(String, String)> {
        let lower = properties.get_optional::<f64>("Lower").ok().flatten();
        let upper = properties.get_optional::<f64>("Upper").ok().flatten();
        match (lower, upper) {
            (Some(lower), Some(upper)) if lower > upper => {
                vec![("Lower".to_string(), "Lower must not exceed Upper".to_string())]
            }
            _ => Vec::new(),
        }
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let efixed: f64 = ctx.get("EFixed")?;
        ctx.set_property("Energy", efixed * 2.0)?;
        Ok(())
    }
}

/// Adds one to every value, in parallel.
#[derive(Default)]
pub struct AddOne;

impl Algorithm for AddOne {
    fn name(&self) -> &str {
        "AddOne"
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::workspace("InputWorkspace", Direction::Input).with_workspace_type("Numbers"),
        )?;
        properties.declare(Property::workspace("OutputWorkspace", Direction::Output))
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let input = ctx.input_as::<Numbers>("InputWorkspace")?;
        let mut values = input.0.clone();
        let progress = ctx.progress(0.0, 1.0, values.len());
        ctx.parallel()
            .for_each_mut(&mut values, ctx.cancellation(), |_, value| {
                *value += 1.0;
                progress.report()?;
                Ok(())
            })?;
        ctx.set_output("OutputWorkspace", Numbers(values))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct Failing;

impl Algorithm for Failing {
    fn name(&self) -> &str {
        "Failing"
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::workspace("OutputWorkspace", Direction::Output).optional())
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        ctx.set_output("OutputWorkspace", Numbers(vec![0.0]))?;
        bail!("detector file is corrupt")
    }
}

/// Reports half of its range once.
#[derive(Default)]
pub struct ReportHalf;

impl Algorithm for ReportHalf {
    fn name(&self) -> &str {
        "ReportHalf"
    }

    fn init(&mut self, _properties: &mut PropertyManager) -> Result<(), PropertyError> {
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        ctx.report_progress(0.5, Some("half"))?;
        Ok(())
    }
}

/// Runs `ReportHalf` on `[0.2, 0.6]`, then two `AddOne` children.
#[derive(Default)]
pub struct Nested;

impl Algorithm for Nested {
    fn name(&self) -> &str {
        "Nested"
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::workspace("InputWorkspace", Direction::Input))?;
        properties.declare(Property::workspace("OutputWorkspace", Direction::Output))
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        ctx.create_child_algorithm("ReportHalf", 0.2, 0.6)?.run()?;

        let mut first = ctx.create_child_algorithm("AddOne", 0.6, 0.8)?;
        first.set_workspace("InputWorkspace", ctx.input_workspace("InputWorkspace")?)?;
        first.run()?;

        let mut second = ctx.create_child_algorithm("AddOne", 0.8, 1.0)?;
        second.set_workspace("InputWorkspace", first.output_workspace("OutputWorkspace")?)?;
        second.set_property_value("OutputWorkspace", "nested_intermediate")?;
        second.run()?;

        ctx.set_output_workspace("OutputWorkspace", second.output_workspace("OutputWorkspace")?)?;
        Ok(())
    }
}

/// Cancels its own token from inside a parallel region.
#[derive(Default)]
pub struct StopsMidway;

impl Algorithm for StopsMidway {
    fn name(&self) -> &str {
        "StopsMidway"
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::workspace("OutputWorkspace", Direction::Output))
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let token = ctx.cancellation().clone();
        ctx.parallel().for_each_index(100, ctx.cancellation(), |index| {
            if index == 10 {
                token.cancel();
            }
            Ok(())
        })?;
        ctx.interruption_point()?;
        ctx.set_output("OutputWorkspace", Numbers(vec![1.0]))?;
        Ok(())
    }
}

/// Fails to release its resources.
#[derive(Default)]
pub struct Stubborn;

impl Algorithm for Stubborn {
    fn name(&self) -> &str {
        "Stubborn"
    }

    fn init(&mut self, _properties: &mut PropertyManager) -> Result<(), PropertyError> {
        Ok(())
    }

    fn exec(&mut self, _ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        bail!("device busy")
    }
}

/// Holds every worker of a parallel region until its run is cancelled, then
/// publishes only if no request arrived within ten seconds.
#[derive(Default)]
pub struct AwaitsCancel;

impl Algorithm for AwaitsCancel {
    fn name(&self) -> &str {
        "AwaitsCancel"
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(Property::workspace("OutputWorkspace", Direction::Output))
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let token = ctx.cancellation().clone();
        let deadline = Instant::now() + Duration::from_secs(10);
        ctx.parallel().for_each_index(4, ctx.cancellation(), |_| {
            while !token.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            token.interruption_point()?;
            Ok(())
        })?;
        ctx.set_output("OutputWorkspace", Numbers(vec![1.0]))?;
        Ok(())
    }
}

/// Runs a `Failing` child through `run()`.
#[derive(Default)]
pub struct RunsFailing;

impl Algorithm for RunsFailing {
    fn name(&self) -> &str {
        "RunsFailing"
    }

    fn init(&mut self, _properties: &mut PropertyManager) -> Result<(), PropertyError> {
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        ctx.create_child_algorithm("Failing", 0.0, 1.0)?.run()?;
        Ok(())
    }
}
