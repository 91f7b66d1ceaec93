//! Render command - fills a template from key=value pairs

use std::collections::HashMap;

use clap::Args;

use crate::domain::{extract_placeholders, render_template};

/// Arguments for the render command
#[derive(Args, Clone, Debug)]
pub struct RenderArgs {
    /// Template text containing `{{name}}` placeholders
    #[arg(long)]
    pub template: String,

    /// Placeholder value, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = super::parse_key_value)]
    pub vars: Vec<(String, String)>,
}

pub async fn run(args: RenderArgs) -> anyhow::Result<()> {
    let values: HashMap<String, String> = args.vars.into_iter().collect();

    let unresolved: Vec<String> = extract_placeholders(&args.template)
        .into_iter()
        .filter(|name| values.get(name).is_none_or(|v| v.is_empty()))
        .collect();

    if !unresolved.is_empty() {
        eprintln!("note: rendered blank: {}", unresolved.join(", "));
    }

    println!("{}", render_template(&args.template, &values));
    Ok(())
}
