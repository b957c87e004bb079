//! Unified line-diff generation
//!
//! Produces unified diff output for the diff-patch trim policy and artifact
//! delta commits:
//! ```text
//! @@ -start,count +start,count @@
//!  context line
//! -removed line
//! +added line
//! ```

const CONTEXT_LINES: usize = 3;

/// Generate a unified diff between two strings. Identical inputs produce an
/// empty string.
pub fn unified_diff(old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let ops = edit_ops(&old_lines, &new_lines);
    format_hunks(&old_lines, &new_lines, &ops)
}

/// Edit operations, each carrying the 0-based line position it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditOp {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Compute edit operations via an LCS table.
fn edit_ops(old: &[&str], new: &[&str]) -> Vec<EditOp> {
    let mut lcs = vec![vec![0u32; new.len() + 1]; old.len() + 1];
    for (i, old_line) in old.iter().enumerate() {
        for (j, new_line) in new.iter().enumerate() {
            lcs[i + 1][j + 1] = if old_line == new_line {
                lcs[i][j] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (old.len(), new.len());
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            ops.push(EditOp::Equal(i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || lcs[i][j - 1] >= lcs[i - 1][j]) {
            ops.push(EditOp::Insert(j - 1));
            j -= 1;
        } else {
            ops.push(EditOp::Delete(i - 1));
            i -= 1;
        }
    }
    ops.reverse();
    ops
}

fn is_change(op: &EditOp) -> bool {
    !matches!(op, EditOp::Equal(_, _))
}

/// Group ops into hunks with surrounding context and render them.
fn format_hunks(old: &[&str], new: &[&str], ops: &[EditOp]) -> String {
    // Ranges of op indices to include: each change padded by context,
    // overlapping ranges merged.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, op) in ops.iter().enumerate() {
        if is_change(op) {
            let start = idx.saturating_sub(CONTEXT_LINES);
            let end = (idx + CONTEXT_LINES + 1).min(ops.len());
            match ranges.last_mut() {
                Some((_, prev_end)) if start <= *prev_end => *prev_end = (*prev_end).max(end),
                _ => ranges.push((start, end)),
            }
        }
    }

    let mut out = String::new();
    for (start, end) in ranges {
        let hunk = &ops[start..end];
        let old_count = hunk
            .iter()
            .filter(|op| matches!(op, EditOp::Equal(_, _) | EditOp::Delete(_)))
            .count();
        let new_count = hunk
            .iter()
            .filter(|op| matches!(op, EditOp::Equal(_, _) | EditOp::Insert(_)))
            .count();
        let old_start = hunk
            .iter()
            .find_map(|op| match op {
                EditOp::Equal(i, _) | EditOp::Delete(i) => Some(i + 1),
                EditOp::Insert(_) => None,
            })
            .unwrap_or(1);
        let new_start = hunk
            .iter()
            .find_map(|op| match op {
                EditOp::Equal(_, j) | EditOp::Insert(j) => Some(j + 1),
                EditOp::Delete(_) => None,
            })
            .unwrap_or(1);

        out.push_str(&format!(
            "@@ -{old_start},{old_count} +{new_start},{new_count} @@\n"
        ));
        for op in hunk {
            match op {
                EditOp::Equal(i, _) => {
                    out.push(' ');
                    out.push_str(old[*i]);
                }
                EditOp::Delete(i) => {
                    out.push('-');
                    out.push_str(old[*i]);
                }
                EditOp::Insert(j) => {
                    out.push('+');
                    out.push_str(new[*j]);
                }
            }
            out.push('\n');
        }
    }
    // No trailing newline on the final line.
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_inputs_empty_diff() {
        assert_eq!(unified_diff("a\nb", "a\nb"), "");
    }

    #[test]
    fn test_single_line_change() {
        let diff = unified_diff("hello world", "hello rust");
        assert!(diff.starts_with("@@ -1,1 +1,1 @@"));
        assert!(diff.contains("-hello world"));
        assert!(diff.contains("+hello rust"));
    }

    #[test]
    fn test_context_surrounds_change() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh";
        let new = "a\nb\nc\nd\ne\nX\ng\nh";
        let diff = unified_diff(old, new);
        assert!(diff.contains(" e"));
        assert!(diff.contains("-f"));
        assert!(diff.contains("+X"));
        assert!(diff.contains(" g"));
        // The first two lines are beyond the context window.
        assert!(!diff.contains(" a"));
        assert!(!diff.contains(" b"));
    }

    #[test]
    fn test_pure_insertion() {
        let diff = unified_diff("a\nb", "a\nb\nc");
        assert!(diff.contains("+c"));
        assert!(!diff.contains("\n-"), "no deletion lines expected");
    }

    #[test]
    fn test_distant_changes_make_separate_hunks() {
        let old: Vec<String> = (0..20).map(|i| format!("line{i}")).collect();
        let mut new = old.clone();
        new[1] = "changed-early".to_string();
        new[18] = "changed-late".to_string();
        let diff = unified_diff(&old.join("\n"), &new.join("\n"));
        assert_eq!(diff.matches("@@ -").count(), 2);
    }
}
