use super::{conversion_error, json_pretty, package_identity, write_atomic, EXIT_SUCCESS};
use opam2esy_core::{Converter, PackageSource};
use std::path::Path;

pub fn run(
    converter: &Converter,
    dir: &Path,
    name: Option<&str>,
    version: Option<&str>,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let (name, version) = package_identity(dir, name, version)?;
    let manifest = converter
        .convert(&name, &version, &PackageSource::from_dir(dir))
        .map_err(|e| conversion_error(&e))?;
    let rendered = json_pretty(&manifest)?;

    let Some(output) = output else {
        println!("{rendered}");
        return Ok(EXIT_SUCCESS);
    };

    write_atomic(output, &format!("{rendered}\n"))?;
    if json {
        let summary = serde_json::json!({
            "name": manifest.name.as_str(),
            "version": manifest.version,
            "output": output.display().to_string(),
        });
        println!("{}", json_pretty(&summary)?);
    } else {
        println!(
            "converted {name}.{version} -> {} ({})",
            output.display(),
            manifest.name
        );
    }
    Ok(EXIT_SUCCESS)
}
