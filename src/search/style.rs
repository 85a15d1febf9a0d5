use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PersonaConfig;
use crate::search::vector::VectorMatch;

/// `[2024-05-01T20:14:00] sophia: omg no way` -> ("sophia", "omg no way")
static SPEAKER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[[^\]]*\]\s*([^:\n]+?):\s?(.*)$").unwrap());

/// Pull style snippets out of vector matches, best match first.
///
/// Takes the `text` metadata field of each match, optionally strips speaker
/// labels, drops anything left blank and caps the result at
/// `persona.snippet_limit`.
pub fn extract_style_snippets(matches: &[VectorMatch], persona: &PersonaConfig) -> Vec<String> {
    matches
        .iter()
        .filter_map(|m| m.metadata_str("text"))
        .map(|text| {
            if persona.strip_labels {
                strip_speaker_labels(text, persona.author.as_deref())
            } else {
                text.trim().to_string()
            }
        })
        .filter(|s| !s.is_empty())
        .take(persona.snippet_limit)
        .collect()
}

/// Remove `[ts] author:` prefixes from each transcript line.
///
/// With `author` set, labelled lines by anyone else are dropped
/// (case-insensitive match). Unlabelled lines are kept verbatim.
pub fn strip_speaker_labels(text: &str, author: Option<&str>) -> String {
    text.lines()
        .filter_map(|line| match SPEAKER_LINE.captures(line) {
            Some(caps) => {
                let speaker = caps.get(1).map_or("", |m| m.as_str()).trim();
                let content = caps.get(2).map_or("", |m| m.as_str()).trim();
                match author {
                    Some(a) if !speaker.eq_ignore_ascii_case(a.trim()) => None,
                    _ => Some(content.to_string()),
                }
            }
            None => Some(line.trim().to_string()),
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_match(id: &str, text: Option<&str>) -> VectorMatch {
        let metadata = text.map(|t| {
            json!({ "text": t, "size": 6 })
                .as_object()
                .cloned()
                .unwrap()
        });
        VectorMatch {
            id: id.into(),
            score: 0.8,
            metadata,
        }
    }

    fn persona(author: Option<&str>, strip: bool, limit: usize) -> PersonaConfig {
        PersonaConfig {
            name: "Sophia".into(),
            author: author.map(Into::into),
            snippet_limit: limit,
            strip_labels: strip,
        }
    }

    #[test]
    fn test_strip_labels_keeps_content() {
        let text = "[2024-01-01 10:00] sophia: bruh\n[2024-01-01 10:01] alex: what";
        assert_eq!(strip_speaker_labels(text, None), "bruh\nwhat");
    }

    #[test]
    fn test_strip_labels_filters_by_author() {
        let text = "[t1] Sophia: omg slay\n[t2] alex: ok\n[t3] sophia: fr fr";
        assert_eq!(strip_speaker_labels(text, Some("sophia")), "omg slay\nfr fr");
    }

    #[test]
    fn test_strip_labels_keeps_colons_in_content() {
        let text = "[12:00:01] sophia: time check: 67";
        assert_eq!(strip_speaker_labels(text, None), "time check: 67");
    }

    #[test]
    fn test_strip_labels_passes_unlabelled_lines() {
        let text = "just vibes\n\n[t] sophia: chill";
        assert_eq!(strip_speaker_labels(text, None), "just vibes\nchill");
    }

    #[test]
    fn test_extract_skips_missing_and_blank_text() {
        let matches = vec![
            make_match("a", Some("hello")),
            make_match("b", None),
            make_match("c", Some("   ")),
            make_match("d", Some("world")),
        ];
        let out = extract_style_snippets(&matches, &persona(None, false, 6));
        assert_eq!(out, vec!["hello", "world"]);
    }

    #[test]
    fn test_extract_caps_count_in_match_order() {
        let matches: Vec<_> = (0..10)
            .map(|i| make_match(&i.to_string(), Some(&format!("snippet {i}"))))
            .collect();
        let out = extract_style_snippets(&matches, &persona(None, false, 6));
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], "snippet 0");
        assert_eq!(out[5], "snippet 5");
    }

    #[test]
    fn test_extract_drops_snippets_without_persona_lines() {
        let matches = vec![
            make_match("a", Some("[t] alex: nothing from her")),
            make_match("b", Some("[t] sophia: dang")),
        ];
        let out = extract_style_snippets(&matches, &persona(Some("sophia"), true, 6));
        assert_eq!(out, vec!["dang"]);
    }
}
