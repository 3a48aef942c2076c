//! `toolweave tools` — List the built-in tools.

use toolweave_core::state::StateCell;
use toolweave_core::tool::render_descriptions;

pub fn run(json: bool) -> anyhow::Result<()> {
    let registry = toolweave_tools::default_registry(StateCell::new())?;
    let descriptions = registry.describe_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptions)?);
    } else {
        println!("{} tool(s) registered:\n", descriptions.len());
        print!("{}", render_descriptions(&descriptions));
    }
    Ok(())
}
