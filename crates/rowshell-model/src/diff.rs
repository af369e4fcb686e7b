//! Strict application of a restricted unified diff.
//!
//! Only ` `, `-` and `+` lines carry meaning. File headers (`---`, `+++`) and
//! hunk headers (`@@`) are dropped, as is any other line. A single cursor
//! walks the original text:
//!
//! - a context line must equal the original line at the cursor; it is
//!   emitted and the cursor advances
//! - a deletion line must equal the original line at the cursor; the cursor
//!   advances without output
//! - an addition line is emitted; the cursor stays
//!
//! Whatever follows the cursor once the diff is exhausted is appended as is.
//! Any mismatch rejects the whole diff; there is no partial result.

/// Apply `diff` to `original`. `None` means the diff does not apply.
pub fn apply_unified_diff(original: &str, diff: &str) -> Option<String> {
    let source: Vec<&str> = original.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(source.len());
    let mut cursor = 0usize;

    for line in diff.split('\n').filter(|l| !is_header(l)) {
        if let Some(ctx) = line.strip_prefix(' ') {
            if source.get(cursor) != Some(&ctx) {
                return None;
            }
            out.push(ctx);
            cursor += 1;
        } else if let Some(del) = line.strip_prefix('-') {
            if source.get(cursor) != Some(&del) {
                return None;
            }
            cursor += 1;
        } else if let Some(add) = line.strip_prefix('+') {
            out.push(add);
        }
    }

    out.extend_from_slice(&source[cursor.min(source.len())..]);
    Some(out.join("\n"))
}

fn is_header(line: &str) -> bool {
    line.starts_with("@@") || line.starts_with("---") || line.starts_with("+++")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Full-context line diff (LCS based), the shape external tools emit
    /// with unlimited context.
    fn make_diff(a: &str, b: &str) -> String {
        let a: Vec<&str> = a.split('\n').collect();
        let b: Vec<&str> = b.split('\n').collect();
        let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
        for i in (0..a.len()).rev() {
            for j in (0..b.len()).rev() {
                lcs[i][j] = if a[i] == b[j] {
                    lcs[i + 1][j + 1] + 1
                } else {
                    lcs[i + 1][j].max(lcs[i][j + 1])
                };
            }
        }
        let mut out = vec!["--- a/component".to_string(), "+++ b/component".to_string()];
        out.push(format!("@@ -1,{} +1,{} @@", a.len(), b.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i] == b[j] {
                out.push(format!(" {}", a[i]));
                i += 1;
                j += 1;
            } else if lcs[i + 1][j] >= lcs[i][j + 1] {
                out.push(format!("-{}", a[i]));
                i += 1;
            } else {
                out.push(format!("+{}", b[j]));
                j += 1;
            }
        }
        out.extend(a[i..].iter().map(|l| format!("-{l}")));
        out.extend(b[j..].iter().map(|l| format!("+{l}")));
        out.join("\n")
    }

    #[test]
    fn replaces_middle_line() {
        assert_eq!(
            apply_unified_diff("a\nb\nc", " a\n-b\n+B\n c").as_deref(),
            Some("a\nB\nc")
        );
    }

    #[test]
    fn mismatched_context_is_rejected() {
        assert_eq!(apply_unified_diff("x\ny", " z\n+W"), None);
    }

    #[test]
    fn mismatched_deletion_is_rejected() {
        assert_eq!(apply_unified_diff("x\ny", "-y"), None);
    }

    #[test]
    fn context_past_end_is_rejected() {
        assert_eq!(apply_unified_diff("x", " x\n y"), None);
    }

    #[test]
    fn trailing_lines_are_preserved() {
        assert_eq!(
            apply_unified_diff("a\nb\nc\nd", "@@ -1,2 +1,2 @@\n a\n-b\n+beta").as_deref(),
            Some("a\nbeta\nc\nd")
        );
    }

    #[test]
    fn headers_are_ignored() {
        let diff = "--- a/x\n+++ b/x\n@@ -1 +1,2 @@\n+first\n a";
        assert_eq!(apply_unified_diff("a", diff).as_deref(), Some("first\na"));
    }

    #[test]
    fn empty_diff_is_identity() {
        assert_eq!(apply_unified_diff("a\nb", "").as_deref(), Some("a\nb"));
    }

    fn text() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-d ]{0,3}", 0..12).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn generated_diff_round_trips(a in text(), b in text()) {
            let diff = make_diff(&a, &b);
            prop_assert_eq!(apply_unified_diff(&a, &diff), Some(b));
        }

        #[test]
        fn foreign_context_never_yields_partial_output(a in text()) {
            let diff = " \u{1}not-in-source\n+x";
            prop_assert_eq!(apply_unified_diff(&a, diff), None);
        }
    }
}
