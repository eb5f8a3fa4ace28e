//! Fixed prompts and the tool definition used by every timed request.
//!
//! The prompts are deliberately constant so results stay comparable across
//! providers and sessions.

use serde_json::json;

use crate::api::{FunctionDef, Tool};

/// Default streaming prompt: short enough to finish quickly, long enough to
/// measure sustained generation.
pub const STORY_PROMPT: &str = "You are a helpful assistant. Please write a short, 150-word story \
     about a curious robot exploring an ancient, overgrown library on a forgotten planet.";

/// Tool-calling prompt that reliably triggers multiple tool invocations.
pub const WEATHER_PROMPT: &str = "What's the weather like in San Francisco, Tokyo, and London? \
     Please check all three cities and tell me which one has the best weather for outdoor \
     activities today.";

/// System prompt for the long-story variant.
pub const LONG_STORY_SYSTEM_PROMPT: &str = "You are a professional creative writer. You write vivid, well-paced prose and \
     always complete the story you are asked for without cutting it short.";

/// User prompt for the long-story variant. Drives a much longer completion
/// than the default prompt, which is useful for sustained-throughput runs.
pub const LONG_STORY_USER_PROMPT: &str = "You are an amazing and talented fantasy fiction writer. Write a complete short \
     story of roughly two thousand words based on the following premise. \
     A young dragon rider discovers their dragon is the last of an ancient bloodline, \
     and the kingdom that trained them both has been hunting that bloodline to extinction \
     for a century. Cover the discovery, the flight from the kingdom, and a final choice \
     that costs the rider something permanent. Use concrete sensory detail, keep the \
     pacing tight, and end on a resolved note rather than a cliffhanger. \
     Write the story now:";

/// The weather lookup tool attached to tool-calling requests.
#[must_use]
pub fn weather_tool() -> Tool {
    Tool {
        kind: "function".to_owned(),
        function: FunctionDef {
            name: "get_weather".to_owned(),
            description: "Get the current weather in a given location".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city and state, e.g. San Francisco, CA"
                    },
                    "unit": {
                        "type": "string",
                        "enum": ["celsius", "fahrenheit"]
                    }
                },
                "required": ["location"]
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_story_prompts_keep_their_anchors() {
        assert!(LONG_STORY_SYSTEM_PROMPT.contains("You are a professional creative writer"));
        assert!(
            LONG_STORY_USER_PROMPT.contains("You are an amazing and talented fantasy fiction writer")
        );
        assert!(LONG_STORY_USER_PROMPT.contains(
            "A young dragon rider discovers their dragon is the last of an ancient bloodline"
        ));
        assert!(LONG_STORY_USER_PROMPT.ends_with("Write the story now:"));
    }

    #[test]
    fn weather_tool_declares_required_location() {
        let tool = weather_tool();
        assert_eq!(tool.kind, "function");
        assert_eq!(tool.function.name, "get_weather");
        assert_eq!(tool.function.parameters["required"][0], "location");
    }
}
