//! Token estimation for transcripts.
//!
//! Mirrors the chat-format accounting: 3 tokens of framing per message,
//! plus the encoded length of every non-empty field value, plus 3 for the
//! reply preamble. Encoded length is approximated: ASCII runs cost ~4
//! bytes per token and every non-ASCII character (Hangul, emoji) costs one.

use smartday_core::message::Turn;

const TOKENS_PER_MESSAGE: usize = 3;
const REPLY_PRIMING: usize = 3;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    let (ascii, other) = text
        .chars()
        .fold((0usize, 0usize), |(a, o), c| if c.is_ascii() { (a + 1, o) } else { (a, o + 1) });
    ascii.div_ceil(4) + other
}

/// Tokens for one turn including framing.
pub fn estimate_turn_tokens(turn: &Turn) -> usize {
    let mut total = TOKENS_PER_MESSAGE + estimate_tokens(turn.role());
    total += estimate_tokens(&turn.rendered_content());
    match turn {
        Turn::Tool {
            tool_call_id,
            tool_name,
            ..
        } => {
            total += estimate_tokens(tool_call_id) + estimate_tokens(tool_name);
        }
        Turn::Assistant { tool_calls, .. } => {
            for call in tool_calls {
                total += estimate_tokens(&call.id)
                    + estimate_tokens(&call.name)
                    + estimate_tokens(&call.arguments);
            }
        }
        _ => {}
    }
    total
}

/// Tokens for a whole request's turn list.
pub fn estimate_transcript_tokens(turns: &[Turn]) -> usize {
    turns.iter().map(estimate_turn_tokens).sum::<usize>() + REPLY_PRIMING
}
