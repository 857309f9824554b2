//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai-compatible chat messages, sent from the agent to the LLM
//! - ReAct text (Thought / Action / Action Input / Final Answer), returned by the LLM
//! - tool calls, sent from the agent to the systems providing capabilities
//! - transcript entries, shown by the chat shells
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers, so the rest of the crate never deals with raw JSON payloads.
pub mod message;
pub mod role;
pub mod tool;
