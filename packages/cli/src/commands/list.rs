use anyhow::Result;
use colored::Colorize;
use lyx2lyx_converter::registry;

/// Print every supported format range with the releases that wrote it.
pub fn list() -> Result<i32> {
    let registry = registry()?;

    println!("{}", "Supported file formats:".bold());
    for relation in registry.relations() {
        let (first, last) = (relation.first_format(), relation.last_format());
        let formats = if first == last {
            first.to_string()
        } else {
            format!("{}-{}", first, last)
        };
        println!(
            "  {:<6} {:>9}  {}",
            relation.name(),
            formats,
            relation.versions.join(", ")
        );
    }
    Ok(0)
}
