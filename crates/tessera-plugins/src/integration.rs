use parking_lot::Mutex;
use tessera_engine::prelude::*;
use tessera_kernel::PropertyError;

use crate::workspace::{Spectrum, Workspace2D, WORKSPACE_2D};

const INPUT: &str = "InputWorkspace";
const OUTPUT: &str = "OutputWorkspace";
const RANGE_LOWER: &str = "RangeLower";
const RANGE_UPPER: &str = "RangeUpper";

/// Sums the counts of each spectrum into a single bin.
#[derive(Debug, Default)]
pub struct Integration;

#[derive(Debug, Clone, Copy)]
struct Range {
    lower: Option<f64>,
    upper: Option<f64>,
}

impl Range {
    fn contains(&self, start: f64, end: f64) -> bool {
        self.lower.map_or(true, |lower| start >= lower)
            && self.upper.map_or(true, |upper| end <= upper)
    }

    /// Sum and propagated error of the bins (or points) inside the range,
    /// or `None` when nothing falls inside it.
    fn integrate(&self, spectrum: &Spectrum) -> Option<(f64, f64)> {
        let x = spectrum.x();
        let mut selected = false;
        let mut sum = 0.0;
        let mut variance = 0.0;
        for (index, (y, e)) in spectrum.y().iter().zip(spectrum.e()).enumerate() {
            let (start, end) = if spectrum.is_histogram() {
                (x[index], x[index + 1])
            } else {
                (x[index], x[index])
            };
            if self.contains(start, end) {
                selected = true;
                sum += y;
                variance += e * e;
            }
        }
        selected.then(|| (sum, variance.sqrt()))
    }

    fn edges(&self, spectrum: &Spectrum) -> Vec<f64> {
        let first = spectrum.x().first().copied().unwrap_or(0.0);
        let last = spectrum.x().last().copied().unwrap_or(first);
        vec![self.lower.unwrap_or(first), self.upper.unwrap_or(last)]
    }
}

impl Algorithm for Integration {
    fn name(&self) -> &str {
        "Integration"
    }

    fn category(&self) -> &str {
        "Arithmetic\\Integration"
    }

    fn summary(&self) -> &str {
        "Integrates each spectrum over an optional x range."
    }

    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError> {
        properties.declare(
            Property::workspace(INPUT, Direction::Input).with_workspace_type(WORKSPACE_2D),
        )?;
        properties.declare(Property::workspace(OUTPUT, Direction::Output))?;
        properties.declare(
            Property::new(RANGE_LOWER, PropertyKind::Double)
                .with_documentation("Lowest x to include; unset means the first x value"),
        )?;
        properties.declare(
            Property::new(RANGE_UPPER, PropertyKind::Double)
                .with_documentation("Highest x to include; unset means the last x value"),
        )
    }

    fn validate_inputs(&self, properties: &PropertyManager) -> Vec<(String, String)> {
        let lower = properties.get_optional::<f64>(RANGE_LOWER).ok().flatten();
        let upper = properties.get_optional::<f64>(RANGE_UPPER).ok().flatten();
        match (lower, upper) {
            (Some(lower), Some(upper)) if lower > upper => vec![(
                RANGE_LOWER.to_string(),
                format!("{RANGE_LOWER} ({lower}) is above {RANGE_UPPER} ({upper})"),
            )],
            _ => Vec::new(),
        }
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()> {
        let input = ctx.input_as::<Workspace2D>(INPUT)?;
        let range = Range {
            lower: ctx.get_optional(RANGE_LOWER)?,
            upper: ctx.get_optional(RANGE_UPPER)?,
        };

        let empty = Mutex::new(Vec::new());
        let progress = ctx.progress(0.0, 1.0, input.num_spectra());
        let spectra = ctx.parallel().map_collect(
            input.num_spectra(),
            ctx.cancellation(),
            |index| {
                let spectrum = &input.spectra()[index];
                let (sum, error) = range.integrate(spectrum).unwrap_or_else(|| {
                    empty.lock().push(index);
                    (0.0, 0.0)
                });
                progress.report()?;
                Ok(Spectrum::new(range.edges(spectrum), vec![sum], vec![error])?)
            },
        )?;

        let mut empty = empty.into_inner();
        if !empty.is_empty() {
            empty.sort_unstable();
            ctx.logger().warn(format_args!(
                "{} spectra had no data in the integration range: {empty:?}",
                empty.len()
            ));
        }
        ctx.set_output(OUTPUT, input.with_spectra(spectra))?;
        Ok(())
    }
}
