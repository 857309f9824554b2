use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

/// Built-in reasoning template: tools, instructions, tool_names, input, agent_scratchpad
pub const REACT_TEMPLATE: &str = include_str!("prompts/react.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Read a template override from disk
pub fn read_prompt_file(template_file: impl Into<PathBuf>) -> Result<String, TeraError> {
    let template_path = template_file.into();
    fs::read_to_string(&template_path).map_err(|e| {
        TeraError::chain(
            format!("Failed to read template file {}", template_path.display()),
            e,
        )
    })
}
