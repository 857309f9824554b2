use anyhow::Result;

use crate::prompt::{InputType, Prompt};
use devpilot::chat::ChatSession;

pub struct Session<'a> {
    chat: ChatSession,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> Session<'a> {
    pub fn new(chat: ChatSession, prompt: Box<impl Prompt + 'a>) -> Self {
        Session { chat, prompt }
    }

    /// Run the read-eval-print loop until the user leaves
    pub async fn start(&mut self) -> Result<()> {
        if !self.chat.is_ready() {
            anyhow::bail!("the assistant could not be started, check the logs above");
        }
        self.prompt.assistant_ready();

        loop {
            let input = self.prompt.get_input()?;
            let line = match input.input_type {
                InputType::Message => match input.content {
                    Some(content) => content,
                    None => continue,
                },
                InputType::Exit => {
                    self.prompt.goodbye();
                    break;
                }
                InputType::AskAgain => continue,
            };

            self.prompt.show_busy();
            let reply = self.chat.respond(&line).await;
            self.prompt.hide_busy();

            match reply {
                Ok(output) => self.prompt.render(&output),
                Err(e) => {
                    tracing::error!("turn failed: {:#}", e);
                    self.prompt
                        .render_error(&format!("An unexpected error occurred: {}", e));
                }
            }
            self.prompt.separator();
        }
        self.prompt.close();
        Ok(())
    }

    /// Answer a single request without entering the loop, optionally showing
    /// the tool steps first
    pub async fn headless_start(&mut self, request: &str, show_steps: bool) -> Result<String> {
        let response = self.chat.exchange(request).await?;
        if show_steps {
            for step in &response.intermediate_steps {
                self.prompt.render_step(step);
            }
        }
        Ok(response.output)
    }
}
