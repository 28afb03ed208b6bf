//! The format-spec grammar shared by the interpreter's `__cm_format`
//! builtin and the JS emitter's runtime helper of the same name
//! (spec §6, grounded on the original `FormatStringParser`).
//!
//! Grammar: `{" "}` placeholders of shape `{index|name[:[fill][align]
//! [width][.precision][type]]}` where `type` is one of
//! `x X b o e E f F c` (hex/upper-hex/binary/octal/exponential/
//! upper-exponential/fixed/upper-fixed/char).

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecType {
    Default,
    Hex,
    HexUpper,
    Binary,
    Octal,
    Exp,
    ExpUpper,
    Fixed,
    FixedUpper,
    Char,
}

#[derive(Debug, Clone)]
pub enum Placeholder {
    Positional(usize),
    Named(String),
}

#[derive(Debug, Clone)]
pub struct FormatSpec {
    pub placeholder: Placeholder,
    pub fill: char,
    pub align: Option<Align>,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub ty: SpecType,
}

impl Default for FormatSpec {
    fn default() -> Self {
        FormatSpec {
            placeholder: Placeholder::Positional(0),
            fill: ' ',
            align: None,
            width: None,
            precision: None,
            ty: SpecType::Default,
        }
    }
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Spec(FormatSpec),
}

/// Parses a format string into literal/placeholder parts. Malformed
/// placeholders degrade to a literal copy of their source text rather
/// than failing the whole format call.
fn parse(format_str: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = format_str.chars().peekable();
    let mut auto_index = 0usize;

    while let Some(c) = chars.next() {
        if c == '{' {
            if chars.peek() == Some(&'{') {
                chars.next();
                literal.push('{');
                continue;
            }
            let mut body = String::new();
            let mut closed = false;
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    closed = true;
                    break;
                }
                body.push(c2);
            }
            if !closed {
                literal.push('{');
                literal.push_str(&body);
                continue;
            }
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Part::Spec(parse_placeholder(&body, &mut auto_index)));
        } else if c == '}' && chars.peek() == Some(&'}') {
            chars.next();
            literal.push('}');
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    parts
}

fn parse_placeholder(body: &str, auto_index: &mut usize) -> FormatSpec {
    let (name_part, spec_part) = match body.split_once(':') {
        Some((n, s)) => (n, Some(s)),
        None => (body, None),
    };

    let placeholder = if name_part.is_empty() {
        let idx = *auto_index;
        *auto_index += 1;
        Placeholder::Positional(idx)
    } else if let Ok(idx) = name_part.parse::<usize>() {
        Placeholder::Positional(idx)
    } else {
        Placeholder::Named(name_part.to_string())
    };

    let mut spec = FormatSpec { placeholder, ..Default::default() };
    if let Some(s) = spec_part {
        apply_spec(s, &mut spec);
    }
    spec
}

fn apply_spec(s: &str, spec: &mut FormatSpec) {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;

    // [fill][align]: align char at position 0 or 1.
    if chars.len() >= 2 && is_align(chars[1]) {
        spec.fill = chars[0];
        spec.align = align_of(chars[1]);
        i = 2;
    } else if !chars.is_empty() && is_align(chars[0]) {
        spec.align = align_of(chars[0]);
        i = 1;
    }

    // [width]
    let width_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i > width_start {
        spec.width = chars[width_start..i].iter().collect::<String>().parse().ok();
    }

    // [.precision]
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let prec_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        spec.precision = chars[prec_start..i].iter().collect::<String>().parse().ok();
    }

    // [type]
    if i < chars.len() {
        spec.ty = match chars[i] {
            'x' => SpecType::Hex,
            'X' => SpecType::HexUpper,
            'b' => SpecType::Binary,
            'o' => SpecType::Octal,
            'e' => SpecType::Exp,
            'E' => SpecType::ExpUpper,
            'f' => SpecType::Fixed,
            'F' => SpecType::FixedUpper,
            'c' => SpecType::Char,
            _ => SpecType::Default,
        };
    }
}

fn is_align(c: char) -> bool {
    matches!(c, '<' | '>' | '^')
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        _ => None,
    }
}

fn format_value(value: &Value, spec: &FormatSpec) -> String {
    let rendered = match spec.ty {
        SpecType::Hex => value.as_i64().map(|i| format!("{i:x}")).unwrap_or_default(),
        SpecType::HexUpper => value.as_i64().map(|i| format!("{i:X}")).unwrap_or_default(),
        SpecType::Binary => value.as_i64().map(|i| format!("{i:b}")).unwrap_or_default(),
        SpecType::Octal => value.as_i64().map(|i| format!("{i:o}")).unwrap_or_default(),
        SpecType::Exp => value.as_f64().map(|f| format!("{f:e}")).unwrap_or_default(),
        SpecType::ExpUpper => value.as_f64().map(|f| format!("{f:E}")).unwrap_or_default(),
        SpecType::Fixed | SpecType::FixedUpper => {
            let prec = spec.precision.unwrap_or(6);
            value.as_f64().map(|f| format!("{f:.prec$}")).unwrap_or_default()
        }
        SpecType::Char => match value {
            Value::Char(c) => c.to_string(),
            Value::Int(i) => char::from_u32(*i as u32).map(|c| c.to_string()).unwrap_or_default(),
            other => other.to_string(),
        },
        SpecType::Default => {
            if let (Some(prec), Value::Float(f)) = (spec.precision, value) {
                format!("{f:.prec$}")
            } else {
                value.to_string()
            }
        }
    };

    apply_align(&rendered, spec)
}

fn apply_align(s: &str, spec: &FormatSpec) -> String {
    let Some(width) = spec.width else { return s.to_string() };
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let pad = width - len;
    match spec.align.unwrap_or(Align::Right) {
        Align::Left => format!("{s}{}", spec.fill.to_string().repeat(pad)),
        Align::Right => format!("{}{s}", spec.fill.to_string().repeat(pad)),
        Align::Center => {
            let left = pad / 2;
            let right = pad - left;
            format!("{}{s}{}", spec.fill.to_string().repeat(left), spec.fill.to_string().repeat(right))
        }
    }
}

/// Renders `format_str` against positional args; named placeholders are
/// resolved from `named`.
pub fn format(format_str: &str, args: &[Value], named: &[(String, Value)]) -> String {
    let parts = parse(format_str);
    let mut out = String::new();
    for part in parts {
        match part {
            Part::Literal(lit) => out.push_str(&lit),
            Part::Spec(spec) => {
                let value = match &spec.placeholder {
                    Placeholder::Positional(i) => args.get(*i),
                    Placeholder::Named(name) => named.iter().find(|(n, _)| n == name).map(|(_, v)| v),
                };
                match value {
                    Some(v) => out.push_str(&format_value(v, &spec)),
                    None => {}
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_and_auto_placeholders() {
        let out = format("{} and {}", &[Value::Int(1), Value::Int(2)], &[]);
        assert_eq!(out, "1 and 2");
    }

    #[test]
    fn width_and_right_align_pads_with_fill() {
        let mut args = vec![Value::Int(5)];
        let out = format("{:*>4}", &args, &[]);
        assert_eq!(out, "***5");
        args.clear();
    }

    #[test]
    fn hex_and_precision_types() {
        assert_eq!(format("{:x}", &[Value::Int(255)], &[]), "ff");
        assert_eq!(format("{:.2}", &[Value::Float(1.005)], &[]), "1.00");
    }

    #[test]
    fn named_placeholder_resolves_from_named_args() {
        let out = format("{name}!", &[], &[("name".to_string(), Value::String("hi".into()))]);
        assert_eq!(out, "hi!");
    }
}
