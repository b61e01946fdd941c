//! Stdin template rendering: `{{var}}` substitution plus `read_file`/
//! `include_file` helpers, built the way the rest of this crate builds
//! text — by hand, with `format!` and string slicing, not a templating
//! dependency.

use std::collections::HashMap;
use std::path::Path;

use crate::error::DirorchError;

pub fn render(
    template: &str,
    context: &HashMap<String, String>,
    root: &Path,
) -> Result<String, DirorchError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| DirorchError::Template("unterminated '{{' block".to_string()))?;
        let expr = after[..end].trim();
        out.push_str(&render_expr(expr, context, root)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_expr(
    expr: &str,
    context: &HashMap<String, String>,
    root: &Path,
) -> Result<String, DirorchError> {
    if let Some(arg) = strip_call(expr, "read_file").or_else(|| strip_call(expr, "include_file")) {
        let path = resolve_path(arg, root);
        return std::fs::read_to_string(&path).map_err(|e| {
            DirorchError::Template(format!("read_file('{}') failed: {}", path.display(), e))
        });
    }

    context
        .get(expr)
        .cloned()
        .ok_or_else(|| DirorchError::Template(format!("unknown template variable '{}'", expr)))
}

fn strip_call<'a>(expr: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("{}(", name);
    if expr.starts_with(&prefix) && expr.ends_with(')') {
        Some(expr[prefix.len()..expr.len() - 1].trim().trim_matches('"'))
    } else {
        None
    }
}

fn resolve_path(arg: &str, root: &Path) -> std::path::PathBuf {
    let p = Path::new(arg);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
