/// Prefix of a diagnostic log block the GraphRAG CLI interleaves with its answer.
const INFO_PREFIX: &str = "INFO:";
/// Prefix of the status line announcing the response.
const SUCCESS_PREFIX: &str = "SUCCESS:";

fn brace_balance(line: &str) -> i64 {
    line.matches('{').count() as i64 - line.matches('}').count() as i64
}

/// Strip GraphRAG log blocks and status lines from captured stdout, leaving
/// only the answer text.
///
/// Every `INFO:` line opens a block. The block always takes at least the
/// following line and runs until the running brace balance drops to zero, so
/// multi-line JSON dumps after the log line are dropped with it.
pub fn clean_cli_output(stdout: &str) -> String {
    let mut answer_lines = Vec::new();
    let mut balance: i64 = 0;
    let mut in_info_block = false;

    for line in stdout.lines() {
        if line.starts_with(INFO_PREFIX) {
            balance = brace_balance(line);
            in_info_block = true;
            continue;
        }

        if in_info_block {
            balance += brace_balance(line);
            if balance <= 0 {
                in_info_block = false;
            }
            continue;
        }

        if line.starts_with(SUCCESS_PREFIX) {
            continue;
        }

        answer_lines.push(line);
    }

    answer_lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_balanced_info_block_and_success_marker() {
        let output = "INFO: Vector Store Args: {\n    \"default_vector_store\": {\n        \"type\": \"lancedb\"\n    }\n}\n\nStudents graduate after passing the diploma exam.\n\nSUCCESS: DRIFT Search Response";

        assert_eq!(
            clean_cli_output(output),
            "Students graduate after passing the diploma exam."
        );
    }

    #[test]
    fn test_info_without_brace_swallows_next_line() {
        let output = "INFO: Reading settings from settings.yaml\nfollowing line\nAnswer";
        assert_eq!(clean_cli_output(output), "Answer");

        let output = "INFO: Reading settings from settings.yaml\nSUCCESS: Local Search Response:\nAnswer line one\nAnswer line two";
        assert_eq!(clean_cli_output(output), "Answer line one\nAnswer line two");
    }

    #[test]
    fn test_info_closing_line_is_dropped_with_block() {
        let output = "INFO: done }\nstill log\nAnswer";
        assert_eq!(clean_cli_output(output), "Answer");
    }

    #[test]
    fn test_consecutive_info_blocks() {
        let output = "INFO: a {\n}\nINFO: b {\n {\n }\n}\n## Heading\n- point {x}";
        assert_eq!(clean_cli_output(output), "## Heading\n- point {x}");
    }

    #[test]
    fn test_info_inside_answer_only_at_line_start() {
        let output = "The INFO: prefix only matters at line start.";
        assert_eq!(clean_cli_output(output), output);
    }

    #[test]
    fn test_unterminated_block_drops_rest() {
        let output = "Answer first\nINFO: dump {\n\"never\": \"closed\"";
        assert_eq!(clean_cli_output(output), "Answer first");
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(clean_cli_output(""), "");
        assert_eq!(clean_cli_output("SUCCESS: done\n\n"), "");
    }
}
