//! The lodging-search agent loop.
//!
//! The agent follows an **Ask → Act → Observe** cycle:
//!
//! 1. **Discover** the tools offered by the tool server
//! 2. **Send** the prompt and tool catalog to the LLM
//! 3. **If a tool is requested**: dispatch the first request, append the
//!    request and its result to the conversation, loop back to step 2
//! 4. **If text only**: return that text as the final answer
//!
//! The loop also stops when the tool-call budget is spent or the LLM stays
//! unreachable after one retry.

pub mod catalog;
pub mod dispatcher;
pub mod loop_runner;
pub mod selection;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatcher::dispatch;
pub use loop_runner::{AgentLoop, RunOutcome, run_agent};
pub use selection::select_tool_call;
