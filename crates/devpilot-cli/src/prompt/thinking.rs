use rand::seq::SliceRandom;

const THINKING_MESSAGES: &[&str] = &[
    "Thinking",
    "Checking the repositories",
    "Reading the tables",
    "Asking the model",
    "Weighing the next action",
    "Looking through commits",
    "Counting rows",
    "Consulting the tools",
];

pub fn get_random_thinking_message() -> &'static str {
    THINKING_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Thinking")
}
