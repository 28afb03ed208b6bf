//! MIR type to emitted-JS-shape mapping, and the kebab-case rule for
//! CSS-backed struct fields (spec §4.12).

use cm_hir::Type;

/// A default-value expression for declaring a local up front, matching
/// the interpreter's `Value::default_for` (spec §4.12 parity note).
pub fn default_expr(ty: &Type) -> String {
    match ty {
        Type::Bool => "false".to_string(),
        Type::Int | Type::Float => "0".to_string(),
        Type::Char => "'\\0'".to_string(),
        Type::String => "\"\"".to_string(),
        Type::Array(elem, n) => {
            let e = default_expr(elem);
            format!("Array.from({{length: {n}}}, () => ({e}))")
        }
        Type::Slice(_) => "[]".to_string(),
        Type::Struct(_) => "{}".to_string(),
        _ => "undefined".to_string(),
    }
}

/// snake_case/camelCase field name -> kebab-case, for fields flagged
/// `css_field` (spec §4.12: "fields are emitted in kebab-case and read
/// with bracket notation").
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c == '_' {
            out.push('-');
        } else if c.is_uppercase() {
            if i != 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_handles_snake_and_camel() {
        assert_eq!(to_kebab_case("background_color"), "background-color");
        assert_eq!(to_kebab_case("backgroundColor"), "background-color");
        assert_eq!(to_kebab_case("color"), "color");
    }
}
