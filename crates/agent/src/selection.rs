//! Which tool request to act on in a round.

use roomscout_core::provider::{ContentBlock, ToolUse};

/// Pick the tool call to dispatch from one LLM response.
///
/// Returns the **first** tool-use block. Any further tool-use blocks in the
/// same response are ignored for this round; at most one call is ever
/// dispatched per round. `None` means the LLM is done requesting tools.
pub fn select_tool_call(blocks: &[ContentBlock]) -> Option<&ToolUse> {
    blocks.iter().find_map(ContentBlock::as_tool_use)
}
