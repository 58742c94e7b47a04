//! Declaration parsing: variable types, attribute lists, and the splitting
//! of one declaration statement into individual variables.

use smol_str::SmolStr;

use crate::model::entity::{ParsedType, Variable};
use crate::model::{Permission, Ref};
use crate::reader::text::{leading_parens, paren_split, unmask_strings};

use super::patterns::{
    ATTRIBSPLIT_RE, DOUBLE_CMPLX_RE, DOUBLE_PREC_RE, KIND_RE, LEN_RE, PROTO_RE, VARKIND_RE,
};

/// Legacy implicit typing: names starting with `i` through `n` are
/// integers, everything else is real.
pub fn implicit_type(name: &str) -> ParsedType {
    let vartype = match name.chars().next() {
        Some(c) if matches!(c.to_ascii_lowercase(), 'i'..='n') => "integer",
        _ => "real",
    };
    ParsedType {
        vartype: vartype.into(),
        ..ParsedType::default()
    }
}

/// The type descriptor extracted from the front of a declaration, plus the
/// remainder of the statement (attributes and declared names).
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub parsed: ParsedType,
    pub rest: String,
}

/// Extract the variable type, kind/length parameters, and derived-type or
/// procedure prototype from the front of a declaration statement. The
/// statement must already match [`VARIABLE_RE`]'s leading keyword; returns
/// `None` for malformed parameter lists.
///
/// [`VARIABLE_RE`]: super::patterns::VARIABLE_RE
pub fn parse_type(statement: &str, strings: &[String]) -> Option<TypeSpec> {
    let caps = super::patterns::VARIABLE_RE.captures(statement)?;
    let keyword = caps.name("vartype")?.as_str();

    let mut vartype = keyword.to_ascii_lowercase();
    if DOUBLE_PREC_RE.is_match(&vartype) {
        vartype = "double precision".into();
    } else if DOUBLE_CMPLX_RE.is_match(&vartype) {
        vartype = "double complex".into();
    }

    let after = statement[caps.name("vartype")?.end()..].trim_start();
    let kindstr = leading_parens(after);
    let rest = after[kindstr.len()..].trim().to_string();

    // No parameter list at all, e.g. `integer :: i` or bare `character c`
    if kindstr.len() < 3
        && !matches!(vartype.as_str(), "type" | "class" | "character")
        && !kindstr.starts_with('*')
    {
        return Some(TypeSpec {
            parsed: ParsedType {
                vartype: vartype.into(),
                ..ParsedType::default()
            },
            rest,
        });
    }

    let Some(kind_caps) = VARKIND_RE.captures(kindstr) else {
        if vartype == "character" {
            return Some(TypeSpec {
                parsed: ParsedType {
                    vartype: vartype.into(),
                    strlen: Some("1".into()),
                    ..ParsedType::default()
                },
                rest,
            });
        }
        return None;
    };

    let (star, raw_args) = match kind_caps.name("parens") {
        Some(m) => (false, m.as_str().trim()),
        None => {
            let m = kind_caps.name("star")?;
            let s = m.as_str().trim();
            (true, s.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(s))
        }
    };
    let args: String = raw_args.chars().filter(|c| !c.is_whitespace()).collect();

    let parsed = match vartype.as_str() {
        "type" | "class" | "procedure" => {
            let proto_caps = PROTO_RE.captures(&args)?;
            let proto_name = proto_caps.name("name")?.as_str();
            ParsedType {
                vartype: vartype.into(),
                proto: Some(Ref::unresolved(proto_name)),
                ..ParsedType::default()
            }
        }
        "character" => parse_character(&vartype, star, &args, strings)?,
        _ => {
            let kind = KIND_RE
                .captures(&args)
                .and_then(|c| c.name("kind"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| args.clone());
            ParsedType {
                vartype: vartype.into(),
                kind: Some(kind),
                ..ParsedType::default()
            }
        }
    };

    Some(TypeSpec { parsed, rest })
}

/// `character` takes `len` and `kind` parameters, positionally or by
/// keyword in either order.
fn parse_character(
    vartype: &str,
    star: bool,
    args: &str,
    strings: &[String],
) -> Option<ParsedType> {
    if star {
        return Some(ParsedType {
            vartype: vartype.into(),
            strlen: Some(args.to_string()),
            ..ParsedType::default()
        });
    }

    let parts: Vec<&str> = args.split(',').collect();
    if parts.len() > 2 {
        return None;
    }

    let mut length: Option<String> = None;
    let mut kind: Option<String> = None;
    for part in parts {
        if length.is_none() {
            if let Some(caps) = LEN_RE.captures(part) {
                let m = caps.name("spec").or_else(|| caps.name("bare"));
                if let Some(m) = m {
                    length = Some(m.as_str().to_string());
                    continue;
                }
            }
        }
        if kind.is_none() {
            if let Some(caps) = KIND_RE.captures(part) {
                kind = Some(unmask_strings(&caps["kind"], strings));
                continue;
            }
        }
        if length.is_none() {
            length = Some(part.to_string());
        } else if kind.is_none() {
            kind = Some(part.to_string());
        }
    }

    Some(ParsedType {
        vartype: vartype.into(),
        kind,
        strlen: Some(length.unwrap_or_else(|| "1".into())),
        ..ParsedType::default()
    })
}

/// One declared variable: its name and the model payload, with string
/// literals in the initializer restored.
pub type DeclaredVariable = (SmolStr, Variable);

/// Split a masked declaration statement into its individual variables,
/// applying the shared attribute list to each. Returns `None` when the
/// statement does not parse as a declaration.
pub fn parse_variables(
    statement: &str,
    strings: &[String],
    ambient: Permission,
) -> Option<(Vec<DeclaredVariable>, Vec<Permission>)> {
    let spec = parse_type(statement, strings)?;

    let mut attribs: Vec<SmolStr> = Vec::new();
    let mut intent: Option<SmolStr> = None;
    let mut optional = false;
    let mut parameter = false;
    let mut pointer = false;
    let mut permission = ambient;

    let declarestr = if let Some(caps) = ATTRIBSPLIT_RE.captures(&spec.rest) {
        for attrib in paren_split(&caps["attribs"], ',') {
            let folded: String = attrib
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            match folded.as_str() {
                "" => {}
                "public" => permission = Permission::Public,
                "private" => permission = Permission::Private,
                "protected" => permission = Permission::Protected,
                "optional" => optional = true,
                "parameter" => parameter = true,
                "pointer" => pointer = true,
                "intent(in)" => intent = Some("in".into()),
                "intent(out)" => intent = Some("out".into()),
                "intent(inout)" => intent = Some("inout".into()),
                _ => attribs.push(SmolStr::new(attrib.trim())),
            }
        }
        caps["decls"].to_string()
    } else {
        // No attribute block: `integer i, j` or `integer :: i, j`
        spec.rest
            .trim_start()
            .trim_start_matches("::")
            .trim()
            .to_string()
    };

    let mut out = Vec::new();
    let mut permissions = Vec::new();
    for dec in paren_split(&declarestr, ',') {
        let dec: String = dec.chars().filter(|c| !c.is_whitespace()).collect();
        if dec.is_empty() {
            continue;
        }
        let split = paren_split(&dec, '=');
        let (name_part, initial) = if split.len() > 1 {
            // `=> target` pointer init keeps the arrow off the expression
            let value = split[1..].join("=");
            let value = value.strip_prefix('>').unwrap_or(&value);
            (split[0].clone(), Some(unmask_strings(value, strings)))
        } else {
            (dec.clone(), None)
        };

        // Per-name array spec, `x(3,3)`
        let (name, dimension) = match name_part.find('(') {
            Some(i) => (name_part[..i].to_string(), Some(name_part[i..].to_string())),
            None => (name_part, None),
        };

        let mut var = Variable::new(spec.parsed.clone());
        var.attribs = attribs.clone();
        var.intent = intent.clone();
        var.optional = optional;
        var.parameter = parameter;
        var.pointer = pointer;
        var.dimension = dimension;
        var.initial = initial;
        out.push((SmolStr::new(&name), var));
        permissions.push(permission);
    }

    Some((out, permissions))
}
