//! Tool manifest for agent frameworks that discover tools over HTTP

use serde_json::{json, Value};

pub const ENTER_TOOL: &str = "headlock-enter_headlock";
pub const CONTINUE_TOOL: &str = "headlock-continue_headlock";

pub fn tool_manifest() -> Value {
    json!({
        "name": "headlock",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Hand control of an agent loop to a human operator, one instruction at a time",
        "tools": [
            {
                "name": ENTER_TOOL,
                "description": "Enter headlock mode and block until the operator sends the first instruction. \
                    Returns { session_id, instruction, should_terminate }. Execute the instruction, then call \
                    continue_headlock with the result; repeat until should_terminate is true.",
                "endpoint": "/headlock/enter-headlock",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "session_id": {
                            "type": "string",
                            "description": "Session ID (optional - a new session is created if omitted)"
                        },
                        "context": {
                            "type": "string",
                            "description": "Initial context shown to the operator"
                        }
                    },
                    "required": []
                }
            },
            {
                "name": CONTINUE_TOOL,
                "description": "Report the result of the last instruction and block for the next one. \
                    Keep calling until should_terminate is true.",
                "endpoint": "/headlock/continue-headlock",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "session_id": {
                            "type": "string",
                            "description": "Session ID returned by enter_headlock"
                        },
                        "context": {
                            "type": "string",
                            "description": "Summary of what was just completed"
                        }
                    },
                    "required": ["session_id"]
                }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lists_both_tools() {
        let manifest = tool_manifest();
        let names: Vec<&str> = manifest["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec![ENTER_TOOL, CONTINUE_TOOL]);
        assert_eq!(
            manifest["tools"][1]["parameters"]["required"],
            json!(["session_id"])
        );
    }
}
