use std::io::Write;

use anyhow::{Context, Result};
use tessera_engine::kernel::{Direction, PropertyKind, Workspace};
use tessera_engine::{AlgorithmInstance, Framework};

/// Splits a `Key=Value` argument at the first `=`.
pub fn parse_assignment(text: &str) -> Result<(String, String), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected Key=Value, found `{text}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing property name in `{text}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn list(framework: &Framework, out: &mut dyn Write) -> Result<()> {
    let factory = framework.factory();
    for name in factory.names() {
        let versions = factory
            .versions(&name)
            .iter()
            .map(|version| format!("v{version}"))
            .collect::<Vec<_>>()
            .join(", ");
        let category = factory
            .create(&name, None)
            .map(|algorithm| algorithm.category().to_string())
            .unwrap_or_default();
        writeln!(out, "{name:<24} {versions:<10} {category}")?;
    }
    Ok(())
}

pub fn describe(
    framework: &Framework,
    name: &str,
    version: Option<u32>,
    out: &mut dyn Write,
) -> Result<()> {
    let instance = framework.create_unmanaged(name, version)?;
    writeln!(out, "{} v{} [{}]", instance.name(), instance.version(), instance.category())?;
    if !instance.summary().is_empty() {
        writeln!(out, "  {}", instance.summary())?;
    }
    for property in instance.properties().properties() {
        let default = property.default_value();
        write!(
            out,
            "  {} ({}, {})",
            property.name(),
            property.kind().type_name(),
            property.direction()
        )?;
        if !default.is_empty() {
            write!(out, " default={default}")?;
        }
        let allowed = property.allowed_values();
        if !allowed.is_empty() {
            write!(out, " allowed=[{}]", allowed.join(", "))?;
        }
        writeln!(out)?;
        if !property.documentation().is_empty() {
            writeln!(out, "      {}", property.documentation())?;
        }
    }
    Ok(())
}

pub fn run(
    framework: &Framework,
    name: &str,
    version: Option<u32>,
    assignments: &[(String, String)],
    out: &mut dyn Write,
) -> Result<()> {
    let mut instance = framework.create_unmanaged(name, version)?;
    instance.set_rethrows(true);
    for (key, value) in assignments {
        instance
            .set_property_value(key, value)
            .with_context(|| format!("cannot set {key}"))?;
    }
    instance.run()?;
    report_outputs(&instance, out)
}

/// Prints output values and the history line of a finished run.
pub(crate) fn report_outputs(instance: &AlgorithmInstance, out: &mut dyn Write) -> Result<()> {
    for property in instance.properties().properties() {
        if !property.direction().publishes() {
            continue;
        }
        let value = property.value();
        if value.is_empty() {
            continue;
        }
        if property.kind() == PropertyKind::Workspace {
            let workspace = instance.output_workspace(property.name())?;
            writeln!(
                out,
                "  {} -> {value} ({}, {} bytes)",
                property.name(),
                workspace.id(),
                workspace.memory_size()
            )?;
        } else if property.direction() == Direction::Output {
            writeln!(out, "  {} = {value}", property.name())?;
        }
    }
    if let Some(history) = instance.history() {
        writeln!(out, "  {}", history.to_command_line())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_engine::FrameworkConfig;

    use super::*;

    fn framework() -> Framework {
        let framework = Framework::new(FrameworkConfig {
            workers: 1,
            ..FrameworkConfig::default()
        })
        .unwrap();
        tessera_plugins::register_builtin_algorithms(framework.factory()).unwrap();
        framework
    }

    fn output(body: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        body(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn assignments_split_at_the_first_equals_sign() {
        assert_eq!(
            parse_assignment("Title=a=b").unwrap(),
            ("Title".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_assignment("DataE=").unwrap(),
            ("DataE".to_string(), String::new())
        );
        assert!(parse_assignment("Factor").is_err());
        assert!(parse_assignment("=2").is_err());
    }

    #[test]
    fn list_shows_versions_and_categories() {
        let framework = framework();
        let text = output(|out| list(&framework, out));
        let scale = text.lines().find(|line| line.starts_with("Scale")).unwrap();
        assert!(scale.contains("v1, v2"), "{scale}");
        assert!(scale.ends_with("Arithmetic"), "{scale}");
    }

    #[test]
    fn describe_lists_properties_in_declaration_order() {
        let framework = framework();
        let text = output(|out| describe(&framework, "Scale", Some(1), out));
        let names: Vec<_> = text
            .lines()
            .skip(2)
            .filter(|line| line.starts_with("  ") && !line.starts_with("      "))
            .map(|line| line.trim().split(' ').next().unwrap_or_default())
            .collect();
        assert_eq!(names, ["InputWorkspace", "OutputWorkspace", "Factor", "Operation"]);
        assert!(text.contains("allowed=[Multiply, Add]"));
    }

    #[test]
    fn run_publishes_and_prints_the_history_line() {
        let framework = framework();
        let assignments = [
            ("DataX".to_string(), "0,1".to_string()),
            ("DataY".to_string(), "4".to_string()),
            ("OutputWorkspace".to_string(), "ws".to_string()),
        ];
        let text = output(|out| run(&framework, "CreateWorkspace", None, &assignments, out));
        assert!(framework.data_service().contains("ws"));
        assert!(text.contains("OutputWorkspace -> ws (Workspace2D"));
        assert!(text.contains("CreateWorkspace(DataX='0,1', DataY='4', OutputWorkspace='ws')"));
    }

    #[test]
    fn run_reports_unknown_properties() {
        let framework = framework();
        let assignments = [("Bogus".to_string(), "1".to_string())];
        let err = run(&framework, "Scale", None, &assignments, &mut std::io::sink()).unwrap_err();
        assert!(format!("{err:#}").contains("cannot set Bogus"));
    }
}
