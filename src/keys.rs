//! Deterministic identity keys derived from entity content.

use md5::{Digest, Md5};

/// Lowercase hex MD5 of `input`.
pub fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Strip comments and all whitespace outside quoted literals.
///
/// Two statements that differ only in formatting or comments normalize to the
/// same text. Quoted literals (`'...'`, `"..."`, `` `...` ``) are kept verbatim,
/// including doubled-quote escapes.
pub fn normalize_sql(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let quote = c;
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == quote {
                        if chars.get(i + 1) == Some(&quote) {
                            out.push(quote);
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            c if c.is_whitespace() => i += 1,
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Key of a SQL statement: MD5 of its normalized text.
pub fn sql_hash(sql: &str) -> String {
    md5_hex(&normalize_sql(sql))
}

/// Order-independent hash over a set of table keys.
pub fn table_set_hash<S: AsRef<str>>(table_keys: &[S]) -> String {
    let mut keys: Vec<&str> = table_keys.iter().map(AsRef::as_ref).collect();
    keys.sort_unstable();
    md5_hex(&keys.concat())
}

/// Append a path segment to a parent key.
pub fn child_key(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent, segment)
}

/// Whether a join with this type and operator is commutative and gets canonicalized.
pub fn is_commutative_join(join_type: &str, operator: &str) -> bool {
    operator.trim() == "=" && join_type.trim().eq_ignore_ascii_case("inner join")
}

/// Whether the two sides of a join must be swapped to reach canonical order.
///
/// Only commutative joins are reordered, and only by table key.
pub fn should_swap_join_sides(
    left_table_key: &str,
    right_table_key: &str,
    operator: &str,
    join_type: &str,
) -> bool {
    is_commutative_join(join_type, operator) && right_table_key < left_table_key
}

/// Key of a join between two columns. Callers canonicalize the sides first.
pub fn join_key(
    join_type: &str,
    left_column_key: &str,
    operator: &str,
    right_column_key: &str,
) -> String {
    format!(
        "{}-{}-{}-{}",
        join_type.trim().to_lowercase(),
        left_column_key,
        operator.trim(),
        right_column_key
    )
}
