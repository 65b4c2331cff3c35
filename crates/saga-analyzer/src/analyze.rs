//! Single-pass traversal from the parsed AST to an [`Analysis`] record.
//!
//! The enclosing-class context is threaded down as an explicit parameter,
//! so a call is reentrant and leaves no state behind. Function bodies are
//! scanned for yields and raises but not for declarations: a def nested
//! inside a function is part of that function's implementation, not of the
//! module's surface.

use crate::ast::{CmpOp, Expr, ParamKind, Stmt};
use crate::parse;
use crate::record::{
    Analysis, ArgInfo, ArgKind, AttributeInfo, ClassInfo, ConstantInfo, Failure, FunctionInfo,
    ImportInfo, ImportKind,
};
use std::collections::BTreeSet;

/// Statement nesting deeper than this trips the internal-failure guard
/// instead of recursing further.
const MAX_DEPTH: usize = 128;

/// Top-level modules shipped with the language runtime; imports of these
/// are not external dependencies.
const STDLIB_MODULES: &[&str] = &[
    "abc",
    "argparse",
    "ast",
    "asyncio",
    "base64",
    "collections",
    "concurrent",
    "contextlib",
    "copy",
    "dataclasses",
    "datetime",
    "decimal",
    "enum",
    "functools",
    "hashlib",
    "http",
    "importlib",
    "inspect",
    "io",
    "itertools",
    "json",
    "logging",
    "math",
    "os",
    "pathlib",
    "pickle",
    "re",
    "shutil",
    "socket",
    "sqlite3",
    "subprocess",
    "sys",
    "tempfile",
    "threading",
    "time",
    "traceback",
    "typing",
    "unittest",
    "urllib",
    "uuid",
    "warnings",
    "weakref",
];

fn is_stdlib(module: &str) -> bool {
    STDLIB_MODULES.binary_search(&module).is_ok()
}

/// Analyze one file's source text. Total: parse failures and traversal
/// faults come back inside the record, never as an error.
pub fn analyze(path: &str, content: &str) -> Analysis {
    let mut analysis = Analysis::empty(path, content.lines().count());

    let stmts = match parse::parse_module(content) {
        Ok(stmts) => stmts,
        Err(e) => {
            tracing::warn!("syntax error in {path}: {e}");
            analysis.failure = Some(Failure::Parse(e.to_string()));
            return analysis;
        }
    };

    if let Some(Stmt::Expr {
        value: Expr::Str(s),
        ..
    }) = stmts.first()
    {
        analysis.module_docstring = Some(cleandoc(s));
    }

    match walk_body(&stmts, &mut analysis, None, true, 0) {
        Ok(()) => analysis.complexity = complexity(&analysis),
        Err(message) => {
            tracing::error!("analysis of {path} failed: {message}");
            let loc = analysis.loc;
            analysis = Analysis::empty(path, loc);
            analysis.failure = Some(Failure::Internal(message));
        }
    }
    analysis
}

/// 5 per class, 1 per method, 2 per top-level function, 1 per distinct
/// decorator seen anywhere in the file.
fn complexity(analysis: &Analysis) -> u32 {
    let mut score = 0u32;
    for class in &analysis.classes {
        score += 5;
        score += class.methods.len() as u32;
    }
    score += analysis.functions.len() as u32 * 2;
    score += analysis.decorators_used.len() as u32;
    score
}

fn walk_body(
    stmts: &[Stmt],
    out: &mut Analysis,
    mut class_ctx: Option<&mut ClassInfo>,
    top_level: bool,
    depth: usize,
) -> Result<(), String> {
    if depth > MAX_DEPTH {
        return Err("statement nesting exceeds supported depth".to_string());
    }
    for stmt in stmts {
        match stmt {
            Stmt::Import { names, line } => {
                for alias in names {
                    out.imports.push(ImportInfo {
                        kind: ImportKind::Import,
                        module: alias.name.clone(),
                        name: None,
                        alias: alias.alias.clone(),
                        line: *line,
                        level: 0,
                    });
                    let base = alias.name.split('.').next().unwrap_or("");
                    if !base.is_empty() && !is_stdlib(base) {
                        out.dependencies.insert(base.to_string());
                    }
                }
            }
            Stmt::FromImport {
                module,
                level,
                names,
                line,
            } => {
                for alias in names {
                    out.imports.push(ImportInfo {
                        kind: ImportKind::From,
                        module: module.clone(),
                        name: Some(alias.name.clone()),
                        alias: alias.alias.clone(),
                        line: *line,
                        level: *level,
                    });
                }
                if *level == 0 && !module.is_empty() {
                    let base = module.split('.').next().unwrap_or("");
                    if !base.is_empty() && !is_stdlib(base) {
                        out.dependencies.insert(base.to_string());
                    }
                }
            }
            Stmt::ClassDef {
                name,
                bases,
                keywords,
                decorators,
                body,
                line,
            } => {
                let decorator_names: Vec<String> =
                    decorators.iter().map(render_decorator).collect();
                for d in &decorator_names {
                    out.decorators_used.insert(d.clone());
                }
                let mut info = ClassInfo {
                    name: name.clone(),
                    line: *line,
                    docstring: body_docstring(body),
                    bases: bases
                        .iter()
                        .map(|b| render_name(b).unwrap_or_else(|| "<expr>".to_string()))
                        .collect(),
                    decorators: decorator_names,
                    methods: Vec::new(),
                    attributes: Vec::new(),
                    is_exception: bases.iter().any(|b| {
                        render_name(b)
                            .is_some_and(|n| n.contains("Exception") || n.contains("Error"))
                    }),
                    metaclass: keywords
                        .iter()
                        .find(|(k, _)| k == "metaclass")
                        .and_then(|(_, v)| render_name(v)),
                };
                walk_body(body, out, Some(&mut info), false, depth + 1)?;
                out.classes.push(info);
            }
            Stmt::FunctionDef {
                name,
                params,
                returns,
                decorators,
                body,
                is_async,
                line,
            } => {
                let is_method = class_ctx.is_some();
                let info = function_info(
                    name, params, returns, decorators, body, *is_async, *line, is_method, out,
                );
                match class_ctx.as_deref_mut() {
                    Some(ctx) => ctx.methods.push(info),
                    None => out.functions.push(info),
                }
            }
            Stmt::If {
                test, body, orelse, ..
            } => {
                if top_level && is_main_guard(test) {
                    out.has_main = true;
                }
                walk_body(body, out, class_ctx.as_deref_mut(), false, depth + 1)?;
                walk_body(orelse, out, class_ctx.as_deref_mut(), false, depth + 1)?;
            }
            Stmt::Assign { targets, value, line } => {
                if class_ctx.is_none() {
                    for target in targets {
                        if let Expr::Name(name) = target {
                            if is_constant_name(name) {
                                out.constants.push(ConstantInfo {
                                    name: name.clone(),
                                    line: *line,
                                    value_kind: value_kind(value).to_string(),
                                });
                            }
                        }
                    }
                }
            }
            Stmt::AnnAssign {
                target,
                annotation,
                has_value,
                line,
                ..
            } => {
                if let Some(ctx) = class_ctx.as_deref_mut() {
                    if let Expr::Name(name) = target {
                        ctx.attributes.push(AttributeInfo {
                            name: name.clone(),
                            type_annotation: render_annotation(annotation),
                            line: *line,
                            has_default: *has_value,
                        });
                    }
                }
            }
            Stmt::Compound { body, .. } => {
                walk_body(body, out, class_ctx.as_deref_mut(), false, depth + 1)?;
            }
            Stmt::Raise { .. }
            | Stmt::AugAssign { .. }
            | Stmt::Return { .. }
            | Stmt::Expr { .. }
            | Stmt::Pass { .. } => {}
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn function_info(
    name: &str,
    params: &[crate::ast::Param],
    returns: &Option<Expr>,
    decorators: &[Expr],
    body: &[Stmt],
    is_async: bool,
    line: usize,
    is_method: bool,
    out: &mut Analysis,
) -> FunctionInfo {
    let decorator_names: Vec<String> = decorators.iter().map(render_decorator).collect();
    for d in &decorator_names {
        out.decorators_used.insert(d.clone());
    }

    let args = params
        .iter()
        .filter_map(|p| {
            let kind = match p.kind {
                ParamKind::Positional => ArgKind::Positional,
                ParamKind::VarArg => ArgKind::VarArg,
                ParamKind::KwArg => ArgKind::KwArg,
                ParamKind::PositionalOnly | ParamKind::KeywordOnly => return None,
            };
            Some(ArgInfo {
                name: p.name.clone(),
                kind,
                annotation: p.annotation.as_ref().map(render_annotation),
                has_default: p.has_default,
            })
        })
        .collect();

    let mut raises = BTreeSet::new();
    collect_raises(body, &mut raises);

    FunctionInfo {
        name: name.to_string(),
        line,
        docstring: body_docstring(body),
        is_classmethod: decorator_names.iter().any(|d| d == "classmethod"),
        is_staticmethod: decorator_names.iter().any(|d| d == "staticmethod"),
        is_property: decorator_names.iter().any(|d| d == "property"),
        decorators: decorator_names,
        args,
        returns: returns.as_ref().map(render_annotation),
        is_async,
        is_generator: body_has_yield(body),
        raises: raises.into_iter().collect(),
        is_method,
    }
}

/// `if __name__ == "__main__":` with the name on the left, single equality.
fn is_main_guard(test: &Expr) -> bool {
    match test {
        Expr::Compare { left, ops } => {
            matches!(&**left, Expr::Name(n) if n == "__name__")
                && ops.len() == 1
                && ops[0].0 == CmpOp::Eq
                && matches!(&ops[0].1, Expr::Str(s) if s == "__main__")
        }
        _ => false,
    }
}

/// UPPER_CASE with at least one underscore and no lowercase letters.
fn is_constant_name(name: &str) -> bool {
    name.contains('_')
        && name.chars().any(|c| c.is_uppercase())
        && !name.chars().any(|c| c.is_lowercase())
}

fn body_docstring(body: &[Stmt]) -> Option<String> {
    match body.first() {
        Some(Stmt::Expr {
            value: Expr::Str(s),
            ..
        }) => Some(cleandoc(s)),
        _ => None,
    }
}

/// Normalize a docstring the way documentation tools do: strip the first
/// line's leading whitespace, remove the common indentation of the rest,
/// drop blank edge lines.
fn cleandoc(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim_start().to_string());
        } else {
            let cut = margin.min(line.len() - line.trim_start().len());
            cleaned.push(line[cut..].trim_end().to_string());
        }
    }
    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

// ── Rendering ──

/// Dotted-name rendering for bases, metaclasses, and raise targets.
/// Returns `None` for shapes that do not reduce to a simple name.
fn render_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(n) => Some(n.clone()),
        Expr::Attribute { value, attr } => render_name(value).map(|v| format!("{v}.{attr}")),
        Expr::Str(s) => Some(s.clone()),
        Expr::Bool(true) => Some("True".to_string()),
        Expr::Bool(false) => Some("False".to_string()),
        Expr::NoneLit => Some("None".to_string()),
        _ => None,
    }
}

/// Decorator name: the decorated callable's dotted name, with call
/// parentheses stripped (`@app.route("/")` renders as `app.route`).
fn render_decorator(expr: &Expr) -> String {
    match expr {
        Expr::Call { func, .. } => render_decorator(func),
        _ => render_name(expr).unwrap_or_else(|| "<expr>".to_string()),
    }
}

/// Canonical annotation string: subscripted generics as `Base[inner]`,
/// tuple-shaped inners joined with ", ".
fn render_annotation(expr: &Expr) -> String {
    match expr {
        Expr::Subscript { value, slice } => {
            format!("{}[{}]", render_annotation(value), render_annotation(slice))
        }
        Expr::Tuple(elements) => elements
            .iter()
            .map(render_annotation)
            .collect::<Vec<_>>()
            .join(", "),
        _ => render_name(expr).unwrap_or_else(|| "<expr>".to_string()),
    }
}

/// Rough runtime category of an assigned value.
fn value_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Str(_) => "str",
        Expr::FString => "str",
        Expr::Int(_) => "int",
        Expr::Float(_) => "float",
        Expr::Bool(_) => "bool",
        Expr::NoneLit => "none",
        Expr::List(_) => "list",
        Expr::Dict(_) => "dict",
        Expr::Set(_) => "set",
        Expr::Tuple(_) => "tuple",
        Expr::Call { .. } => "call",
        Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. } => "name",
        Expr::Lambda { .. } => "lambda",
        Expr::Comprehension { .. } => "comprehension",
        _ => "expr",
    }
}

// ── Body scans ──

/// Any yield or yield-from anywhere in the body, nested scopes included.
fn body_has_yield(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_has_yield)
}

fn stmt_has_yield(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr { value, .. } | Stmt::Return { value: Some(value), .. } => {
            expr_has_yield(value)
        }
        Stmt::Assign { targets, value, .. } => {
            expr_has_yield(value) || targets.iter().any(expr_has_yield)
        }
        Stmt::AugAssign { value, .. } => expr_has_yield(value),
        Stmt::AnnAssign { value: Some(value), .. } => expr_has_yield(value),
        Stmt::Raise { exc: Some(exc), .. } => expr_has_yield(exc),
        Stmt::If {
            test, body, orelse, ..
        } => expr_has_yield(test) || body_has_yield(body) || body_has_yield(orelse),
        Stmt::Compound { header, body, .. } => {
            header.iter().any(expr_has_yield) || body_has_yield(body)
        }
        Stmt::FunctionDef { body, .. } | Stmt::ClassDef { body, .. } => body_has_yield(body),
        _ => false,
    }
}

fn expr_has_yield(expr: &Expr) -> bool {
    match expr {
        Expr::Yield { .. } | Expr::YieldFrom { .. } => true,
        Expr::Attribute { value, .. }
        | Expr::Await { value }
        | Expr::Starred { value }
        | Expr::UnaryOp { operand: value }
        | Expr::Lambda { body: value } => expr_has_yield(value),
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            expr_has_yield(func)
                || args.iter().any(expr_has_yield)
                || keywords.iter().any(|(_, v)| expr_has_yield(v))
        }
        Expr::Subscript { value, slice } => expr_has_yield(value) || expr_has_yield(slice),
        Expr::Tuple(items) | Expr::List(items) | Expr::Set(items) | Expr::Dict(items) => {
            items.iter().any(expr_has_yield)
        }
        Expr::BoolOp { values } => values.iter().any(expr_has_yield),
        Expr::BinOp { left, right } => expr_has_yield(left) || expr_has_yield(right),
        Expr::Compare { left, ops } => {
            expr_has_yield(left) || ops.iter().any(|(_, r)| expr_has_yield(r))
        }
        Expr::IfExp { body, test, orelse } => {
            expr_has_yield(body) || expr_has_yield(test) || expr_has_yield(orelse)
        }
        Expr::Comprehension { element, parts } => {
            expr_has_yield(element) || parts.iter().any(expr_has_yield)
        }
        Expr::Slice { parts } => parts.iter().any(expr_has_yield),
        Expr::NamedExpr { target, value } => expr_has_yield(target) || expr_has_yield(value),
        _ => false,
    }
}

/// Exception names from raise statements anywhere in the body: bare names
/// and calls to named constructors; anything else is omitted.
fn collect_raises(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Raise { exc: Some(exc), .. } => match exc {
                Expr::Name(n) => {
                    out.insert(n.clone());
                }
                Expr::Call { func, .. } => {
                    if let Some(name) = render_name(func) {
                        out.insert(name);
                    }
                }
                _ => {}
            },
            Stmt::If { body, orelse, .. } => {
                collect_raises(body, out);
                collect_raises(orelse, out);
            }
            Stmt::Compound { body, .. }
            | Stmt::FunctionDef { body, .. }
            | Stmt::ClassDef { body, .. } => collect_raises(body, out),
            _ => {}
        }
    }
}
