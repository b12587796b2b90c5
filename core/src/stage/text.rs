// agentline/src/stage/text.rs

//! Line-oriented helpers the default stage logic uses to pull structure out of free text.

use regex::Regex;

const BULLET_CHARS: [char; 3] = ['-', '*', '•'];

pub fn is_bullet(line: &str) -> bool {
  line.trim_start().starts_with(BULLET_CHARS)
}

/// Strips bullet markers and surrounding blanks from both ends of a line.
pub fn strip_bullet(line: &str) -> &str {
  line.trim_matches(|c: char| c == ' ' || c == '\t' || BULLET_CHARS.contains(&c))
}

/// Like `strip_bullet`, also removing enumeration digits and dots (`1.`, `2.`).
pub fn strip_enumeration(line: &str) -> &str {
  line.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_digit() || c == '.' || BULLET_CHARS.contains(&c))
}

/// Bulleted lines longer than `min_len` characters, at most `limit` of them.
pub fn bullets(text: &str, min_len: usize, limit: usize) -> Vec<String> {
  text
    .lines()
    .filter(|line| is_bullet(line))
    .map(strip_bullet)
    .filter(|item| item.chars().count() > min_len)
    .take(limit)
    .map(str::to_string)
    .collect()
}

/// Lines containing any of `keywords` (case-insensitive), stripped, longer than `min_len`.
pub fn keyword_lines(text: &str, keywords: &[&str], min_len: usize, limit: usize) -> Vec<String> {
  text
    .lines()
    .filter(|line| {
      let lower = line.to_lowercase();
      keywords.iter().any(|k| lower.contains(k))
    })
    .map(strip_bullet)
    .filter(|item| !item.is_empty() && item.chars().count() > min_len)
    .take(limit)
    .map(str::to_string)
    .collect()
}

/// Bullets following a header line that mentions one of `headers`.
///
/// The section ends at the first non-blank line that is neither a bullet nor indented.
pub fn section_items(text: &str, headers: &[&str], limit: usize) -> Vec<String> {
  let mut items = Vec::new();
  let mut in_section = false;
  for line in text.lines() {
    let lower = line.to_lowercase();
    if headers.iter().any(|h| lower.contains(h)) {
      in_section = true;
      continue;
    }
    if !in_section {
      continue;
    }
    if is_bullet(line) {
      let item = strip_bullet(line);
      if !item.is_empty() {
        items.push(item.to_string());
      }
    } else if !line.trim().is_empty() && !line.starts_with([' ', '\t']) {
      in_section = false;
    }
  }
  items.truncate(limit);
  items
}

/// First number following `label` (case-insensitive), e.g. `Accuracy: 0.8` or `Accuracy - 8`.
/// Scores above 1 are read as out of ten; the result is capped at 1.
pub fn labelled_score(text: &str, label: &str) -> Option<f64> {
  let pattern = format!(r"(?i){}[:\-\s]+(\d+\.?\d*)", regex::escape(label));
  let re = Regex::new(&pattern).ok()?;
  let raw: f64 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
  Some(normalize_score(raw))
}

pub fn normalize_score(raw: f64) -> f64 {
  let score = if raw > 1.0 { raw / 10.0 } else { raw };
  score.min(1.0)
}

/// First `max_chars` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
  text.chars().take(max_chars).collect()
}

/// Opening lines (skipping blanks and headings) joined until they pass `min_chars`.
pub fn leading_summary(text: &str, scan_lines: usize, min_chars: usize) -> String {
  let mut picked: Vec<&str> = Vec::new();
  for line in text.lines().take(scan_lines) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    picked.push(line);
    if picked.join(" ").chars().count() > min_chars {
      break;
    }
  }
  if picked.is_empty() {
    truncate_chars(text, min_chars)
  } else {
    picked.join(" ")
  }
}
