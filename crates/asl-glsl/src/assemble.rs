//! Final source assembly.
//!
//! A single linear pass: version, extensions, stage pragmas, constants,
//! structs, uniforms, inputs, outputs, globals, then functions with callees
//! before callers and the entry point last. Sections are separated by one
//! blank line.

use std::collections::HashMap;

use asl_core::{AslError, AslResult, Construct};

use crate::codegen::GeneratedFunction;
use crate::model::{Layout, ShaderInterface, ShaderStruct, ShaderUnit, ShaderVariable, StageLayout};

/// Join non-empty sections with a blank line between each.
pub fn render_source<'a>(sections: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for section in sections.into_iter().filter(|s| !s.is_empty()) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(section);
        if !section.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Everything above the first function.
pub fn declarations(unit: &ShaderUnit, interface: &ShaderInterface, indent: &str) -> AslResult<String> {
    let mut sections = vec![format!("#version {}\n", unit.version)];

    if !unit.extensions.is_empty() {
        let mut section = String::new();
        for extension in &unit.extensions {
            if extension.contains(':') {
                section.push_str(&format!("#extension {}\n", extension));
            } else {
                section.push_str(&format!("#extension {} : enable\n", extension));
            }
        }
        sections.push(section);
    }

    sections.push(stage_pragmas(&unit.stage_layout));
    sections.push(variables(&interface.constants));
    for s in dedup_structs(&interface.structs)? {
        sections.push(structure(s, indent));
    }
    sections.push(variables(&interface.uniforms));
    sections.push(variables(&interface.inputs));
    sections.push(variables(&interface.outputs));
    sections.push(variables(&interface.globals));

    Ok(render_source(sections.iter().map(String::as_str)))
}

fn pragma(params: Vec<(&str, Option<String>)>, direction: &str) -> String {
    let mut layout = Layout::default();
    for (key, value) in params {
        layout.push(key, value);
    }
    format!("{} {};\n", layout, direction)
}

fn stage_pragmas(layout: &StageLayout) -> String {
    match layout {
        StageLayout::None => String::new(),
        StageLayout::Geometry {
            input,
            invocations,
            output,
            max_vertices,
        } => {
            let mut inputs = vec![(input.as_str(), None)];
            if let Some(n) = invocations {
                inputs.push(("invocations", Some(n.to_string())));
            }
            let mut outputs = vec![(output.as_str(), None)];
            if let Some(n) = max_vertices {
                outputs.push(("max_vertices", Some(n.to_string())));
            }
            pragma(inputs, "in") + &pragma(outputs, "out")
        }
        StageLayout::TessControl { vertices } => {
            pragma(vec![("vertices", Some(vertices.to_string()))], "out")
        }
        StageLayout::TessEvaluation {
            primitive,
            spacing,
            winding,
        } => {
            let mut params = vec![(primitive.as_str(), None)];
            params.extend(spacing.as_deref().map(|s| (s, None)));
            params.extend(winding.as_deref().map(|w| (w, None)));
            pragma(params, "in")
        }
    }
}

/// One declaration line per variable, each optionally preceded by its comment.
pub(crate) fn variables(vars: &[ShaderVariable]) -> String {
    let mut out = String::new();
    for var in vars {
        if let Some(comment) = &var.comment {
            out.push_str(&format!("// {}\n", comment));
        }
        out.push_str(&declaration(var));
        out.push('\n');
    }
    out
}

/// `layout(..) uniform vec3 lights[4] = ...; // Class.member`
fn declaration(var: &ShaderVariable) -> String {
    let mut parts = Vec::new();
    if !var.layout.is_empty() {
        parts.push(var.layout.to_string());
    }
    if var.is_const {
        parts.push("const".to_string());
    }
    if let Some(qualifier) = var.qualifier {
        parts.push(qualifier.keyword().to_string());
    }
    parts.push(var.ty.clone());
    parts.push(var.declarator());
    let mut line = parts.join(" ");
    if let Some(init) = &var.initializer {
        line.push_str(" = ");
        line.push_str(init);
    }
    line.push(';');
    if let Some(debug) = &var.debug_comment {
        line.push_str(" // ");
        line.push_str(debug);
    }
    line
}

fn structure(s: &ShaderStruct, indent: &str) -> String {
    let mut out = String::new();
    if let Some(comment) = &s.comment {
        out.push_str(&format!("// {}\n", comment));
    }
    match s.block {
        Some(qualifier) => {
            if !s.layout.is_empty() {
                out.push_str(&format!("{} ", s.layout));
            }
            out.push_str(&format!("{} {} {{\n", qualifier.keyword(), s.name));
        }
        None => out.push_str(&format!("struct {} {{\n", s.name)),
    }
    for member in &s.members {
        if let Some(comment) = &member.comment {
            out.push_str(&format!("{}// {}\n", indent, comment));
        }
        let mut plain = member.clone();
        plain.comment = None;
        plain.qualifier = None;
        out.push_str(indent);
        out.push_str(&declaration(&plain));
        out.push('\n');
    }
    match &s.instance_name {
        Some(instance) if s.is_interface_block() => out.push_str(&format!("}} {};\n", instance)),
        _ => out.push_str("};\n"),
    }
    out
}

/// Drop repeated structs with identical definitions; differing ones conflict.
fn dedup_structs(structs: &[ShaderStruct]) -> AslResult<Vec<&ShaderStruct>> {
    let mut kept: Vec<&ShaderStruct> = Vec::new();
    for s in structs {
        match kept.iter().find(|k| k.name == s.name) {
            Some(existing) if *existing == s => {}
            Some(_) => {
                return Err(AslError::InterfaceBlock(format!(
                    "struct '{}' is declared twice with different definitions",
                    s.name
                )))
            }
            None => kept.push(s),
        }
    }
    Ok(kept)
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Pending,
    Active,
    Done,
}

/// Order functions so every callee precedes its callers; entry points last.
///
/// Calls are resolved by name, so every overload of a called name counts as
/// a callee.
pub fn order_functions(functions: Vec<GeneratedFunction>, owner: &str) -> AslResult<Vec<GeneratedFunction>> {
    if let Some(caller) = functions.iter().find(|f| f.calls.iter().any(|c| c == "main")) {
        return Err(AslError::InvalidArgument(format!(
            "'{}.{}' calls the entry point main",
            owner, caller.name
        )));
    }
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, f) in functions.iter().enumerate() {
        by_name.entry(f.name.as_str()).or_default().push(i);
    }

    let mut states = vec![Visit::Pending; functions.len()];
    let mut order = Vec::with_capacity(functions.len());
    let (entries, others): (Vec<usize>, Vec<usize>) =
        (0..functions.len()).partition(|i| functions[*i].is_entry_point);
    for i in others.into_iter().chain(entries) {
        visit(i, &functions, &by_name, &mut states, &mut order, owner)?;
    }

    let mut slots: Vec<Option<GeneratedFunction>> = functions.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

fn visit(
    i: usize,
    functions: &[GeneratedFunction],
    by_name: &HashMap<&str, Vec<usize>>,
    states: &mut [Visit],
    order: &mut Vec<usize>,
    owner: &str,
) -> AslResult<()> {
    match states[i] {
        Visit::Done => return Ok(()),
        Visit::Active => {
            return Err(AslError::unsupported(
                Construct::Recursion,
                format!("'{}.{}' calls itself, directly or indirectly", owner, functions[i].name),
            ))
        }
        Visit::Pending => {}
    }
    states[i] = Visit::Active;
    for callee in &functions[i].calls {
        for &j in by_name.get(callee.as_str()).into_iter().flatten() {
            visit(j, functions, by_name, states, order, owner)?;
        }
    }
    states[i] = Visit::Done;
    order.push(i);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Qualifier;
    use asl_core::Stage;

    fn unit(stage_layout: StageLayout) -> ShaderUnit {
        ShaderUnit {
            name: "T".into(),
            stage: Stage::Vertex,
            version: "430".into(),
            debug: false,
            extensions: vec!["GL_ARB_a".into(), "GL_ARB_b : require".into()],
            stage_layout,
        }
    }

    fn function(name: &str, calls: &[&str]) -> GeneratedFunction {
        GeneratedFunction {
            name: name.into(),
            is_entry_point: name == "main",
            arity: 0,
            text: format!("void {}() {{\n}}\n", name),
            dependencies: Vec::new(),
            calls: calls.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_section_order() {
        let mut interface = ShaderInterface::default();
        let mut k = ShaderVariable::new("int", "COUNT");
        k.is_const = true;
        k.initializer = Some("4".into());
        interface.constants.push(k);
        let mut u = ShaderVariable::new("mat4", "viewProjection");
        u.qualifier = Some(Qualifier::Uniform);
        u.debug_comment = Some("T.viewProjection".into());
        interface.uniforms.push(u);
        let mut i = ShaderVariable::new("vec3", "position");
        i.qualifier = Some(Qualifier::Input);
        i.layout.push("location", Some("0".into()));
        i.comment = Some("object space".into());
        interface.inputs.push(i);
        interface.structs.push(ShaderStruct {
            name: "Camera".into(),
            block: Some(Qualifier::Uniform),
            instance_name: Some("camera".into()),
            members: vec![ShaderVariable::new("mat4", "view")],
            layout: {
                let mut l = Layout::default();
                l.push("std140", None);
                l
            },
            comment: None,
        });

        let text = declarations(&unit(StageLayout::None), &interface, "    ").unwrap();
        assert_eq!(
            text,
            "#version 430\n\
             \n\
             #extension GL_ARB_a : enable\n\
             #extension GL_ARB_b : require\n\
             \n\
             const int COUNT = 4;\n\
             \n\
             layout(std140) uniform Camera {\n    mat4 view;\n} camera;\n\
             \n\
             uniform mat4 viewProjection; // T.viewProjection\n\
             \n\
             // object space\n\
             layout(location = 0) in vec3 position;\n"
        );
    }

    #[test]
    fn test_stage_pragmas() {
        let geometry = StageLayout::Geometry {
            input: "triangles".into(),
            invocations: Some(2),
            output: "triangle_strip".into(),
            max_vertices: Some(3),
        };
        assert_eq!(
            stage_pragmas(&geometry),
            "layout(triangles, invocations = 2) in;\nlayout(triangle_strip, max_vertices = 3) out;\n"
        );
        assert_eq!(
            stage_pragmas(&StageLayout::TessControl { vertices: 4 }),
            "layout(vertices = 4) out;\n"
        );
        let tess = StageLayout::TessEvaluation {
            primitive: "quads".into(),
            spacing: None,
            winding: Some("cw".into()),
        };
        assert_eq!(stage_pragmas(&tess), "layout(quads, cw) in;\n");
    }

    #[test]
    fn test_plain_struct_and_conflicts() {
        let plain = ShaderStruct {
            name: "Light".into(),
            block: None,
            instance_name: None,
            members: vec![ShaderVariable::new("vec3", "color")],
            layout: Layout::default(),
            comment: None,
        };
        assert_eq!(structure(&plain, "  "), "struct Light {\n  vec3 color;\n};\n");

        let same = vec![plain.clone(), plain.clone()];
        assert_eq!(dedup_structs(&same).unwrap().len(), 1);

        let mut other = plain.clone();
        other.members.push(ShaderVariable::new("float", "range"));
        assert!(matches!(dedup_structs(&[plain, other]), Err(AslError::InterfaceBlock(_))));
    }

    #[test]
    fn test_callees_first_main_last() {
        let ordered = order_functions(
            vec![
                function("main", &["shade"]),
                function("shade", &["fresnel"]),
                function("fresnel", &[]),
                function("unused", &[]),
            ],
            "T",
        )
        .unwrap();
        let names: Vec<_> = ordered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["fresnel", "shade", "unused", "main"]);
    }

    #[test]
    fn test_recursion_rejected() {
        let err = order_functions(vec![function("a", &["b"]), function("b", &["a"]), function("main", &["a"])], "T")
            .unwrap_err();
        assert_eq!(err.construct(), Some(Construct::Recursion));

        let err = order_functions(vec![function("helper", &["main"]), function("main", &[])], "T").unwrap_err();
        assert!(matches!(err, AslError::InvalidArgument(_)));
    }

    #[test]
    fn test_render_source_skips_empty() {
        assert_eq!(render_source(["a\n", "", "b"]), "a\n\nb\n");
    }
}
