//! Named-placeholder binding.
//!
//! Statements are written with `@name` placeholders. Before execution the
//! binder rewrites the text to the driver's positional `$N` form, assigning
//! indices in first-appearance order and reusing the index for repeated
//! names, then lines the bound values up in that order.
//!
//! The rewriter walks the text with a small state machine so placeholders
//! inside string literals (with `''` escapes), quoted identifiers, line and
//! nested block comments, and dollar-quoted blocks are left alone. `@` not
//! followed by an identifier start (`@>`, `<@`, `@@`) passes through
//! untouched.

use std::borrow::Cow;
use std::collections::HashMap;

mod scanner;

use scanner::{
    State, is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    scan_digits, scan_identifier, try_start_dollar_quote,
};

use crate::error::DbError;
use crate::value::DbValue;

/// SQL text rewritten to positional form, plus the placeholder names in
/// index order (`names[0]` is `$1`).
#[derive(Debug)]
pub(crate) struct RewrittenSql<'a> {
    pub sql: Cow<'a, str>,
    pub names: Vec<String>,
}

/// A statement ready for the driver: positional SQL and the values aligned
/// with `$1..$N`.
#[derive(Debug, Clone)]
pub(crate) struct BoundStatement {
    pub sql: String,
    pub names: Vec<String>,
    pub values: Vec<DbValue>,
}

/// Rewrite `@name` placeholders to `$N`.
///
/// Returns a borrowed `Cow` when the text contains no placeholders. Bare
/// positional placeholders (`$1`) in the text are rejected; this crate's
/// parameter surface is named-only.
pub(crate) fn rewrite_placeholders(sql: &str) -> Result<RewrittenSql<'_>, DbError> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    // Bytes before `copied` are already flushed into `out`.
    let mut copied = 0;
    let mut state = State::Normal;
    let mut names: Vec<String> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if b == b'\'' {
                    state = State::SingleQuoted;
                } else if b == b'"' {
                    state = State::DoubleQuoted;
                } else if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                    idx += 1;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(1);
                    idx += 1;
                } else if b == b'$' {
                    if let Some((tag, close)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    } else if let Some((_, digits)) = scan_digits(bytes, idx + 1) {
                        return Err(DbError::Parameter(format!(
                            "positional placeholder `${digits}` is not supported; use `@name`"
                        )));
                    }
                } else if b == b'@'
                    && let Some((end, name)) = scan_identifier(bytes, idx + 1)
                {
                    let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
                    buf.push_str(&sql[copied..idx]);
                    let position = *index_of.entry(name.to_string()).or_insert_with(|| {
                        names.push(name.to_string());
                        names.len()
                    });
                    buf.push('$');
                    buf.push_str(&position.to_string());
                    copied = end;
                    idx = end;
                    continue;
                }
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 2;
                    state = State::Normal;
                    continue;
                }
            }
        }

        idx += 1;
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    Ok(RewrittenSql { sql, names })
}

/// Match ordered named bindings against the placeholders in `sql` and
/// produce the positional form the driver wants.
///
/// # Errors
///
/// `Parameter` when a name is bound twice (after sigil normalization), a
/// placeholder has no binding, a binding has no placeholder, or the text
/// carries positional `$N` placeholders.
pub(crate) fn bind_statement(
    sql: &str,
    bindings: &[(String, DbValue)],
) -> Result<BoundStatement, DbError> {
    let rewritten = rewrite_placeholders(sql)?;

    let mut by_name: HashMap<&str, &DbValue> = HashMap::with_capacity(bindings.len());
    for (raw, value) in bindings {
        let name = normalize_name(raw)?;
        if by_name.insert(name, value).is_some() {
            return Err(DbError::Parameter(format!(
                "parameter `{name}` bound more than once"
            )));
        }
    }

    let mut values = Vec::with_capacity(rewritten.names.len());
    for name in &rewritten.names {
        match by_name.remove(name.as_str()) {
            Some(value) => values.push(value.clone()),
            None => {
                return Err(DbError::Parameter(format!(
                    "placeholder `@{name}` has no bound value"
                )));
            }
        }
    }

    // Report leftovers in binding order, not map order.
    if !by_name.is_empty() {
        for (raw, _) in bindings {
            let name = normalize_name(raw)?;
            if by_name.contains_key(name) {
                return Err(DbError::Parameter(format!(
                    "binding `{name}` does not appear in the statement"
                )));
            }
        }
    }

    Ok(BoundStatement {
        sql: rewritten.sql.into_owned(),
        names: rewritten.names,
        values,
    })
}

/// A leading `@` on the binding side is accepted and ignored, so
/// `bind("@x", ..)` and `bind("x", ..)` address the same placeholder.
fn normalize_name(raw: &str) -> Result<&str, DbError> {
    let name = raw.strip_prefix('@').unwrap_or(raw);
    if name.is_empty() {
        return Err(DbError::Parameter("empty parameter name".to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(name: &str, v: i64) -> (String, DbValue) {
        (name.to_string(), DbValue::Long(v))
    }

    #[test]
    fn rewrites_named_to_positional() {
        let r = rewrite_placeholders("select * from t where a = @a and b = @b").unwrap();
        assert_eq!(r.sql, "select * from t where a = $1 and b = $2");
        assert_eq!(r.names, vec!["a", "b"]);
    }

    #[test]
    fn repeated_name_reuses_the_index() {
        let r = rewrite_placeholders("update t set a = @v, b = @v where c = @w").unwrap();
        assert_eq!(r.sql, "update t set a = $1, b = $1 where c = $2");
        assert_eq!(r.names, vec!["v", "w"]);
    }

    #[test]
    fn indices_follow_first_appearance_in_text() {
        let r = rewrite_placeholders("select @b, @a").unwrap();
        assert_eq!(r.sql, "select $1, $2");
        assert_eq!(r.names, vec!["b", "a"]);
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '@a', @a -- @b\n/* @c */ from t where x = @a";
        let r = rewrite_placeholders(sql).unwrap();
        assert_eq!(r.sql, "select '@a', $1 -- @b\n/* @c */ from t where x = $1");
        assert_eq!(r.names, vec!["a"]);
    }

    #[test]
    fn escaped_quotes_stay_inside_the_literal() {
        let r = rewrite_placeholders("select 'it''s @a', @a").unwrap();
        assert_eq!(r.sql, "select 'it''s @a', $1");
    }

    #[test]
    fn skips_quoted_identifiers() {
        let r = rewrite_placeholders(r#"select "col@x" from t where id = @id"#).unwrap();
        assert_eq!(r.sql, r#"select "col@x" from t where id = $1"#);
        assert_eq!(r.names, vec!["id"]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let r = rewrite_placeholders("$fn$ body with @x $fn$ where a = @x").unwrap();
        assert_eq!(r.sql, "$fn$ body with @x $fn$ where a = $1");
    }

    #[test]
    fn anonymous_dollar_quotes_are_skipped_too() {
        let r = rewrite_placeholders("$$ @inside $$ select @out").unwrap();
        assert_eq!(r.sql, "$$ @inside $$ select $1");
        assert_eq!(r.names, vec!["out"]);
    }

    #[test]
    fn nested_block_comments() {
        let r = rewrite_placeholders("/* outer /* inner @x */ still */ select @x").unwrap();
        assert_eq!(r.sql, "/* outer /* inner @x */ still */ select $1");
    }

    #[test]
    fn at_operators_pass_through() {
        let sql = "select * from t where tags @> @tags and loc <@ @area and doc @@ @q";
        let r = rewrite_placeholders(sql).unwrap();
        assert_eq!(
            r.sql,
            "select * from t where tags @> $1 and loc <@ $2 and doc @@ $3"
        );
        assert_eq!(r.names, vec!["tags", "area", "q"]);
    }

    #[test]
    fn trailing_at_sign_is_left_alone() {
        let r = rewrite_placeholders("select @").unwrap();
        assert_eq!(r.sql, "select @");
        assert!(r.names.is_empty());
    }

    #[test]
    fn positional_placeholders_are_rejected() {
        let err = rewrite_placeholders("select * from t where a = $1").unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));
        assert!(err.to_string().contains("$1"));
    }

    #[test]
    fn digit_initial_dollar_tags_are_not_quote_openers() {
        // `$1$x$` reads as the positional placeholder `$1`, not as a
        // dollar quote tagged `1`.
        let err = rewrite_placeholders("select $1$x$").unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));
    }

    #[test]
    fn non_ascii_text_survives_rewriting() {
        let r = rewrite_placeholders("select @a as r\u{e9}sultat, 'caf\u{e9}'").unwrap();
        assert_eq!(r.sql, "select $1 as r\u{e9}sultat, 'caf\u{e9}'");
    }

    #[test]
    fn no_placeholders_borrows_the_input() {
        let r = rewrite_placeholders("select 1").unwrap();
        assert!(matches!(r.sql, Cow::Borrowed(_)));
    }

    #[test]
    fn bind_orders_values_by_text_position() {
        let b = bind_statement(
            "select @second, @first",
            &[bound("first", 1), bound("second", 2)],
        )
        .unwrap();
        assert_eq!(b.sql, "select $1, $2");
        assert_eq!(b.values, vec![DbValue::Long(2), DbValue::Long(1)]);
    }

    #[test]
    fn binding_sigil_is_optional() {
        let b = bind_statement("select @x", &[bound("@x", 5)]).unwrap();
        assert_eq!(b.values, vec![DbValue::Long(5)]);
    }

    #[test]
    fn duplicate_binding_is_an_error_even_across_sigils() {
        let err = bind_statement("select @x", &[bound("x", 1), bound("@x", 2)]).unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));
        assert!(err.to_string().contains("bound more than once"));
    }

    #[test]
    fn missing_binding_names_the_placeholder() {
        let err = bind_statement("select @a, @b", &[bound("a", 1)]).unwrap_err();
        assert!(err.to_string().contains("@b"));
    }

    #[test]
    fn unused_binding_names_the_binding() {
        let err = bind_statement("select @a", &[bound("a", 1), bound("stray", 2)]).unwrap_err();
        assert!(err.to_string().contains("stray"));
    }

    #[test]
    fn empty_binding_name_is_rejected() {
        let err = bind_statement("select 1", &[bound("@", 1)]).unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));
    }

    #[test]
    fn statement_without_parameters_binds_empty() {
        let b = bind_statement("create table t (id int)", &[]).unwrap();
        assert!(b.values.is_empty());
        assert!(b.names.is_empty());
    }
}
