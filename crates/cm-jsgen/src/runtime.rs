//! The `__cm_*` runtime helper table (spec §4.12): small JS snippets the
//! emitted module calls into, pulled in only when referenced, with
//! transitive dependency expansion so a helper that calls another
//! helper never ships without it.

use cm_util::FxHashSet;

struct Helper {
    name: &'static str,
    source: &'static str,
    deps: &'static [&'static str],
}

const HELPERS: &[Helper] = &[
    Helper {
        name: "__cm_format",
        source: "function __cm_format(spec, args) {\n  let out = '';\n  let auto = 0;\n  let i = 0;\n  while (i < spec.length) {\n    const c = spec[i];\n    if (c === '{' && spec[i + 1] === '{') { out += '{'; i += 2; continue; }\n    if (c === '}' && spec[i + 1] === '}') { out += '}'; i += 2; continue; }\n    if (c === '{') {\n      const end = spec.indexOf('}', i);\n      const body = spec.slice(i + 1, end);\n      const colon = body.indexOf(':');\n      const namePart = colon === -1 ? body : body.slice(0, colon);\n      const specPart = colon === -1 ? '' : body.slice(colon + 1);\n      const idx = namePart === '' ? auto++ : parseInt(namePart, 10);\n      out += __cm_format_value(args[idx], specPart);\n      i = end + 1;\n      continue;\n    }\n    out += c;\n    i += 1;\n  }\n  return out;\n}",
        deps: &["__cm_format_value"],
    },
    Helper {
        name: "__cm_format_value",
        source: "function __cm_format_value(value, specPart) {\n  const chars = specPart.split('');\n  let fill = ' ';\n  let align = null;\n  let width = null;\n  let precision = null;\n  let ty = null;\n  let i = 0;\n  const isAlign = (ch) => ch === '<' || ch === '>' || ch === '^';\n  if (chars.length >= 2 && isAlign(chars[1])) { fill = chars[0]; align = chars[1]; i = 2; }\n  else if (chars.length >= 1 && isAlign(chars[0])) { align = chars[0]; i = 1; }\n  const widthStart = i;\n  while (i < chars.length && chars[i] >= '0' && chars[i] <= '9') { i += 1; }\n  if (i > widthStart) { width = parseInt(chars.slice(widthStart, i).join(''), 10); }\n  if (i < chars.length && chars[i] === '.') {\n    i += 1;\n    const precStart = i;\n    while (i < chars.length && chars[i] >= '0' && chars[i] <= '9') { i += 1; }\n    precision = parseInt(chars.slice(precStart, i).join(''), 10);\n  }\n  if (i < chars.length) { ty = chars[i]; }\n\n  const n = typeof value === 'number' ? value : Number(value);\n  let rendered;\n  switch (ty) {\n    case 'x': rendered = (n >>> 0).toString(16); break;\n    case 'X': rendered = (n >>> 0).toString(16).toUpperCase(); break;\n    case 'b': rendered = (n >>> 0).toString(2); break;\n    case 'o': rendered = (n >>> 0).toString(8); break;\n    case 'e': rendered = n.toExponential(); break;\n    case 'E': rendered = n.toExponential().toUpperCase(); break;\n    case 'f': case 'F': rendered = n.toFixed(precision === null ? 6 : precision); break;\n    case 'c': rendered = typeof value === 'number' ? String.fromCharCode(value) : String(value); break;\n    default:\n      rendered = (precision !== null && typeof value === 'number') ? n.toFixed(precision) : __cm_display(value);\n  }\n  return __cm_format_align(rendered, fill, align, width);\n}",
        deps: &["__cm_format_align", "__cm_display"],
    },
    Helper {
        name: "__cm_format_align",
        source: "function __cm_format_align(s, fill, align, width) {\n  if (width === null) { return s; }\n  const len = Array.from(s).length;\n  if (len >= width) { return s; }\n  const pad = width - len;\n  const a = align || '>';\n  if (a === '<') { return s + fill.repeat(pad); }\n  if (a === '^') { const left = Math.floor(pad / 2); const right = pad - left; return fill.repeat(left) + s + fill.repeat(right); }\n  return fill.repeat(pad) + s;\n}",
        deps: &[],
    },
    Helper {
        name: "__cm_display",
        source: "function __cm_display(v) {\n  if (v === null || v === undefined) return '()';\n  if (Array.isArray(v)) return '[' + v.map(__cm_display).join(', ') + ']';\n  return String(v);\n}",
        deps: &[],
    },
    Helper {
        name: "__cm_clone",
        source: "function __cm_clone(v) {\n  if (Array.isArray(v)) return v.map(__cm_clone);\n  if (v !== null && typeof v === 'object') return Object.assign({}, v);\n  return v;\n}",
        deps: &[],
    },
    Helper {
        name: "__cm_box",
        source: "function __cm_box(v) { return { v }; }",
        deps: &[],
    },
    Helper {
        name: "__cm_panic",
        source: "function __cm_panic(msg) { throw new Error(msg); }",
        deps: &[],
    },
];

fn find(name: &str) -> Option<&'static Helper> {
    HELPERS.iter().find(|h| h.name == name)
}

/// Expands `wanted` to include every helper it transitively depends on,
/// then renders them in a stable, dependency-respecting order.
pub fn render_needed(wanted: &FxHashSet<String>) -> String {
    let mut closure: FxHashSet<&'static str> = FxHashSet::default();
    let mut stack: Vec<&'static str> = Vec::new();
    for name in wanted {
        if let Some(h) = find(name) {
            stack.push(h.name);
        }
    }
    while let Some(name) = stack.pop() {
        if !closure.insert(name) {
            continue;
        }
        if let Some(h) = find(name) {
            for dep in h.deps {
                stack.push(dep);
            }
        }
    }

    let mut ordered: Vec<&'static Helper> = HELPERS.iter().filter(|h| closure.contains(h.name)).collect();
    ordered.sort_by_key(|h| h.name);
    ordered.iter().map(|h| h.source).collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_helper_pulls_in_display_dependency() {
        let mut wanted = FxHashSet::default();
        wanted.insert("__cm_format".to_string());
        let rendered = render_needed(&wanted);
        assert!(rendered.contains("function __cm_format"));
        assert!(rendered.contains("function __cm_display"));
    }

    #[test]
    fn format_helper_pulls_in_the_full_spec_grammar() {
        let mut wanted = FxHashSet::default();
        wanted.insert("__cm_format".to_string());
        let rendered = render_needed(&wanted);
        assert!(rendered.contains("function __cm_format_value"));
        assert!(rendered.contains("function __cm_format_align"));
        assert!(rendered.contains("toString(16)"));
        assert!(rendered.contains("toFixed("));
    }
}
