//! Step outputs
//!
//! Steps publish outputs either with the legacy `::set-output name=N::V`
//! marker on stdout or by appending `N=V` lines to the file named by
//! `$GITHUB_OUTPUT`. The same file format is used for `$GITHUB_ENV`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static SET_OUTPUT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*::set-output name=([^:\r\n]+)::([^\r\n]*)\r?$").unwrap()
});

/// Table of captured step outputs, keyed by `steps.<id>.outputs.<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutputs {
    values: HashMap<String, String>,
}

/// Build the table key for a step output
pub fn output_key(step_id: &str, name: &str) -> String {
    format!("steps.{}.outputs.{}", step_id, name)
}

impl StepOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one output of a step
    pub fn record(&mut self, step_id: &str, name: &str, value: impl Into<String>) {
        self.values.insert(output_key(step_id, name), value.into());
    }

    /// Look up one output of a step
    pub fn get(&self, step_id: &str, name: &str) -> Option<&str> {
        self.get_key(&output_key(step_id, name))
    }

    /// Look up by the full `steps.<id>.outputs.<name>` key
    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

/// Parse `::set-output` markers from step output text
pub fn parse_set_output_markers(text: &str) -> Vec<(String, String)> {
    SET_OUTPUT_REGEX
        .captures_iter(text)
        .map(|caps| (caps[1].trim().to_string(), unescape_command_value(&caps[2])))
        .collect()
}

/// Parse the contents of a `$GITHUB_OUTPUT` or `$GITHUB_ENV` file
///
/// Supports `NAME=VALUE` lines and the multiline form:
///
/// ```text
/// NAME<<DELIMITER
/// line one
/// line two
/// DELIMITER
/// ```
///
/// Lines that match neither form are skipped. A heredoc that is never closed
/// takes the rest of the file.
pub fn parse_key_value_file(contents: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut lines = contents.lines();

    while let Some(line) = lines.next() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let heredoc = line.find("<<");
        let equals = line.find('=');

        match (heredoc, equals) {
            (Some(h), eq) if eq.map_or(true, |e| h < e) => {
                let name = line[..h].trim().to_string();
                let delimiter = line[h + 2..].trim();
                let mut body = Vec::new();
                for body_line in lines.by_ref() {
                    let body_line = body_line.trim_end_matches('\r');
                    if body_line == delimiter {
                        break;
                    }
                    body.push(body_line);
                }
                if !name.is_empty() {
                    pairs.push((name, body.join("\n")));
                }
            }
            (_, Some(e)) => {
                let name = line[..e].trim();
                if !name.is_empty() {
                    pairs.push((name.to_string(), line[e + 1..].to_string()));
                }
            }
            _ => {}
        }
    }

    pairs
}

/// Undo workflow-command escaping of `%`, CR and LF
fn unescape_command_value(value: &str) -> String {
    value
        .replace("%0D", "\r")
        .replace("%0A", "\n")
        .replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key() {
        assert_eq!(output_key("s1", "x"), "steps.s1.outputs.x");
    }

    #[test]
    fn test_record_and_get() {
        let mut outputs = StepOutputs::new();
        outputs.record("build", "version", "1.2.3");
        assert_eq!(outputs.get("build", "version"), Some("1.2.3"));
        assert_eq!(outputs.get_key("steps.build.outputs.version"), Some("1.2.3"));
        assert_eq!(outputs.get("build", "missing"), None);
    }

    #[test]
    fn test_parse_set_output_markers() {
        let text = "building\n::set-output name=sha::abc123\nok\n  ::set-output name=msg::a%0Ab\n";
        let pairs = parse_set_output_markers(text);
        assert_eq!(
            pairs,
            vec![
                ("sha".to_string(), "abc123".to_string()),
                ("msg".to_string(), "a\nb".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_key_value_lines() {
        let pairs = parse_key_value_file("x=5\nurl=http://a/b?c=d\n\nnot a pair\n");
        assert_eq!(
            pairs,
            vec![
                ("x".to_string(), "5".to_string()),
                ("url".to_string(), "http://a/b?c=d".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_heredoc() {
        let contents = "notes<<EOF\nline one\nline=two\nEOF\nafter=1\n";
        let pairs = parse_key_value_file(contents);
        assert_eq!(
            pairs,
            vec![
                ("notes".to_string(), "line one\nline=two".to_string()),
                ("after".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_value() {
        let pairs = parse_key_value_file("empty=\n");
        assert_eq!(pairs, vec![("empty".to_string(), String::new())]);
    }
}
