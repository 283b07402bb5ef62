//! `list` subcommand — animations available in the catalog.

use std::path::Path;

use glyph_lib::script::Catalog;

use super::{ListOutput, Result, Section, SectionJson, print_json};

fn collect(catalog: &Catalog) -> Vec<SectionJson> {
    Section::SEARCH_ORDER
        .iter()
        .map(|&section| SectionJson {
            section,
            animations: catalog.list(section),
        })
        .collect()
}

pub(super) fn cmd_list(json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path);
    let catalog = Catalog::new(config.animations_path());
    let sections = collect(&catalog);

    if json {
        let output = ListOutput {
            animations_dir: catalog.root().display().to_string(),
            sections,
        };
        return print_json(&output);
    }

    println!("Animations in {}:", catalog.root().display());
    for s in &sections {
        println!();
        println!("{}:", s.section);
        if s.animations.is_empty() {
            println!("  (none)");
        }
        for name in &s.animations {
            println!("  {name}");
        }
    }
    Ok(())
}
