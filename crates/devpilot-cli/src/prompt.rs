use anyhow::Result;
use devpilot::agent::AgentStep;

pub mod rustyline;
pub mod thinking;

pub const SEPARATOR_WIDTH: usize = 60;

pub trait Prompt {
    /// Show an assistant reply
    fn render(&mut self, text: &str);
    fn render_error(&mut self, text: &str);
    /// Show one tool call the agent made on the way to its answer
    fn render_step(&mut self, step: &AgentStep);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn goodbye(&mut self) {
        println!("Goodbye!");
    }
    fn separator(&self) {
        println!("{}", "-".repeat(SEPARATOR_WIDTH));
    }
    fn assistant_ready(&self) {
        println!("{}", "=".repeat(SEPARATOR_WIDTH));
        println!("CLI Assistant is ready! Welcome to your GitHub & Supabase AI.");
        println!("Type your requests below, or 'exit' to quit.");
        self.separator();
    }
    // Used for testing. Allows us to downcast to any type.
    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any;
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // None when the user is issuing a command, eg. Exit
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}

/// Map a raw input line onto what the session should do with it
pub fn classify(line: &str) -> Input {
    let text = line.trim();
    if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
        Input {
            input_type: InputType::Exit,
            content: None,
        }
    } else if text.is_empty() {
        Input {
            input_type: InputType::AskAgain,
            content: None,
        }
    } else {
        Input {
            input_type: InputType::Message,
            content: Some(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words_any_case() {
        for word in ["exit", "QUIT", " Exit ", "quit"] {
            assert!(matches!(classify(word).input_type, InputType::Exit));
        }
    }

    #[test]
    fn test_blank_line_asks_again() {
        assert!(matches!(classify("   ").input_type, InputType::AskAgain));
    }

    #[test]
    fn test_message_is_trimmed() {
        let input = classify("  list my repos \n");
        assert!(matches!(input.input_type, InputType::Message));
        assert_eq!(input.content.as_deref(), Some("list my repos"));
    }

    #[test]
    fn test_exit_needs_whole_word() {
        assert!(matches!(
            classify("exit the repo").input_type,
            InputType::Message
        ));
    }
}
