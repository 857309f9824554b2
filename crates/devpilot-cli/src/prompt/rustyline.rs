use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use devpilot::agent::AgentStep;

use super::{classify, thinking::get_random_thinking_message, Input, InputType, Prompt, Theme};

const PROMPT: &str = "You: ";

pub struct RustylinePrompt {
    spinner: cliclack::ProgressBar,
    editor: rustyline::DefaultEditor,
    theme: Theme,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            spinner: spinner(),
            editor: rustyline::DefaultEditor::new()?,
            theme: Theme::Dark,
        })
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    // Fall back to plain output when the terminal can't be highlighted
    if printed.is_err() {
        println!("{}", content);
    }
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, text: &str) {
        print!("{} ", style("AI:").cyan().bold());
        print_markdown(text, self.theme_name());
        println!();
        let _ = io::stdout().flush();
    }

    fn render_error(&mut self, text: &str) {
        println!("{}", style(text).red());
    }

    fn render_step(&mut self, step: &AgentStep) {
        println!(
            "─── {} | {} ───",
            style(&step.action.tool),
            style("action").magenta().dim()
        );
        println!("{}: {}", style("input").dim(), style(&step.action.tool_input).green());
        print_markdown(&step.observation, self.theme_name());
        println!();
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner
            .start(format!("{}...", get_random_thinking_message()));
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let line = match self.editor.readline(PROMPT) {
            Ok(text) => text,
            Err(e) => {
                match e {
                    rustyline::error::ReadlineError::Interrupted
                    | rustyline::error::ReadlineError::Eof => (),
                    _ => eprintln!("Input error: {}", e),
                }
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                });
            }
        };

        if line.trim().eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            return Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            });
        }

        let input = classify(&line);
        if matches!(input.input_type, InputType::Message) {
            let _ = self.editor.add_history_entry(line.trim());
        }
        Ok(input)
    }

    fn close(&self) {
        // No cleanup required
    }

    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any {
        panic!("Not implemented");
    }
}
