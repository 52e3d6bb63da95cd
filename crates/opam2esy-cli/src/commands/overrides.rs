use super::{json_pretty, EXIT_SUCCESS};
use opam2esy_core::{ConversionConfig, Override};
use std::collections::BTreeMap;

fn describe(o: &Override) -> String {
    match o {
        Override::StripVersionMarker { marker } => format!("strip '{marker}' from version"),
        Override::BuildScript { commands } => format!("{} build command(s)", commands.len()),
        Override::ExcludeDependencies { names } => {
            names.iter().cloned().collect::<Vec<_>>().join(", ")
        }
        Override::ExportedEnv { entries } => entries.keys().cloned().collect::<Vec<_>>().join(", "),
    }
}

fn selected<'a>(
    config: &'a ConversionConfig,
    package: Option<&str>,
) -> BTreeMap<&'a str, &'a [Override]> {
    config
        .overrides
        .iter()
        .filter(|(name, _)| package.is_none_or(|p| p == name.as_str()))
        .map(|(name, list)| (name.as_str(), list.as_slice()))
        .collect()
}

pub fn run(config: &ConversionConfig, package: Option<&str>, json: bool) -> Result<u8, String> {
    let overrides = selected(config, package);

    if json {
        println!("{}", json_pretty(&overrides)?);
    } else if overrides.is_empty() {
        println!("no overrides");
    } else {
        println!("{:<28} {:<22} DETAIL", "PACKAGE", "KIND");
        for (name, list) in &overrides {
            for o in *list {
                println!("{name:<28} {:<22} {}", o.kind(), describe(o));
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
