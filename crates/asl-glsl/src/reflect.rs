//! Metadata reflection: class declaration → shader unit + interface.
//!
//! Fields are classified by their declarative qualifier and kept in
//! declaration order; that order is the emission order.

use asl_core::{AslConfig, AslError, AslResult, Construct, Stage};
use asl_lang::ast::{AttrValue, Attribute, AttributeArg, ClassDecl, FieldDecl, StructDecl};

use crate::codegen;
use crate::layout::{self, LayoutRole};
use crate::model::{
    default_instance_name, Layout, Qualifier, ShaderInterface, ShaderStruct, ShaderUnit,
    ShaderVariable, StageLayout,
};
use crate::typing::{ClassContext, ValueType};

/// Everything reflection learns about one shader class.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub unit: ShaderUnit,
    pub interface: ShaderInterface,
}

const GEOMETRY_INPUTS: &[&str] = &[
    "points",
    "lines",
    "lines_adjacency",
    "triangles",
    "triangles_adjacency",
];
const GEOMETRY_OUTPUTS: &[&str] = &["points", "line_strip", "triangle_strip"];
const TESS_PRIMITIVES: &[&str] = &["triangles", "quads", "isolines"];
const TESS_SPACINGS: &[&str] = &[
    "equal_spacing",
    "fractional_even_spacing",
    "fractional_odd_spacing",
];
const TESS_WINDINGS: &[&str] = &["cw", "ccw"];

/// Reflect a shader class.
pub fn reflect(class: &ClassDecl, ctx: &ClassContext, config: &AslConfig) -> AslResult<Reflection> {
    let stage = class.stage().ok_or_else(|| {
        AslError::InvalidArgument(format!(
            "'{}' is a library class; only shader classes can be compiled",
            class.name
        ))
    })?;
    let unit = reflect_unit(class, stage, config)?;
    let mut reflector = Reflector {
        class: &class.name,
        stage,
        ctx,
        debug: unit.debug,
        require_locations: config.compile.require_locations,
        interface: ShaderInterface::default(),
    };
    for decl in &class.structs {
        let reflected = reflector.structure(decl)?;
        reflector.interface.structs.push(reflected);
    }
    for field in &class.fields {
        reflector.field(field)?;
    }
    let interface = reflector.interface;
    tracing::debug!(
        class = %class.name,
        %stage,
        uniforms = interface.uniforms.len(),
        inputs = interface.inputs.len(),
        outputs = interface.outputs.len(),
        structs = interface.structs.len(),
        "reflected shader class"
    );
    Ok(Reflection { unit, interface })
}

fn attribute_error(attribute: &Attribute, target: &str) -> AslError {
    AslError::Attribute(format!(
        "attribute '{}' (line {}) is not valid on {}",
        attribute.name, attribute.span.line, target
    ))
}

fn first_text(attribute: &Attribute) -> Option<String> {
    attribute.positional().next().map(AttrValue::to_text)
}

fn count(attribute: &Attribute, key: &str) -> AslResult<Option<u32>> {
    match attribute.named(key) {
        None => Ok(None),
        Some(AttrValue::Int(n)) => u32::try_from(*n).map(Some).map_err(|_| {
            AslError::Attribute(format!("{} = {} is out of range on '{}'", key, n, attribute.name))
        }),
        Some(other) => Err(AslError::Attribute(format!(
            "{} on '{}' must be an integer, found '{}'",
            key,
            attribute.name,
            other.to_text()
        ))),
    }
}

/// Normalized primitive name, checked against `allowed`.
fn primitive(attribute: &Attribute, allowed: &[&str]) -> AslResult<String> {
    let value = first_text(attribute).map(|v| layout::normalize_key(&v)).ok_or_else(|| {
        AslError::Attribute(format!("'{}' requires a primitive type", attribute.name))
    })?;
    if !allowed.contains(&value.as_str()) {
        return Err(AslError::Attribute(format!(
            "'{}' is not a valid primitive for '{}'; expected one of: {}",
            value,
            attribute.name,
            allowed.join(", ")
        )));
    }
    Ok(value)
}

fn reflect_unit(class: &ClassDecl, stage: Stage, config: &AslConfig) -> AslResult<ShaderUnit> {
    let mut version = None;
    let mut extensions: Vec<String> = Vec::new();
    let mut debug = config.compile.debug;
    let mut geometry_input = None;
    let mut geometry_output = None;
    let mut tess_control = None;
    let mut tess_evaluation = None;
    let target = format!("shader class '{}'", class.name);

    for attribute in &class.attributes {
        let stage_only = |expected: Stage| {
            if stage == expected {
                Ok(())
            } else {
                Err(AslError::Attribute(format!(
                    "'{}' is only valid on {} shaders, not on {} shader '{}'",
                    attribute.name, expected, stage, class.name
                )))
            }
        };
        match attribute.name.as_str() {
            "Version" => version = first_text(attribute),
            "Extension" => {
                let name = first_text(attribute)
                    .ok_or_else(|| AslError::Attribute("'Extension' requires a name".into()))?;
                extensions.push(name);
            }
            "Debug" => {
                debug = !matches!(attribute.positional().next(), Some(AttrValue::Bool(false)));
            }
            "GeometryInput" => {
                stage_only(Stage::Geometry)?;
                geometry_input = Some((
                    primitive(attribute, GEOMETRY_INPUTS)?,
                    count(attribute, "Invocations")?,
                ));
            }
            "GeometryOutput" => {
                stage_only(Stage::Geometry)?;
                geometry_output = Some((
                    primitive(attribute, GEOMETRY_OUTPUTS)?,
                    count(attribute, "MaxVertices")?,
                ));
            }
            "TessControl" => {
                stage_only(Stage::TessControl)?;
                let vertices = match (count(attribute, "Vertices")?, attribute.positional().next()) {
                    (Some(n), _) => n,
                    (None, Some(AttrValue::Int(n))) => u32::try_from(*n).map_err(|_| {
                        AslError::Attribute(format!("vertex count {} is out of range", n))
                    })?,
                    _ => {
                        return Err(AslError::Attribute(
                            "'TessControl' requires Vertices = n".into(),
                        ))
                    }
                };
                tess_control = Some(vertices);
            }
            "TessEvaluation" => {
                stage_only(Stage::TessEvaluation)?;
                tess_evaluation = Some(tess_evaluation_layout(attribute)?);
            }
            _ => return Err(attribute_error(attribute, &target)),
        }
    }

    for extension in &config.glsl.extensions {
        if !extensions.contains(extension) {
            extensions.push(extension.clone());
        }
    }
    let mut seen = Vec::with_capacity(extensions.len());
    extensions.retain(|e| {
        let fresh = !seen.contains(e);
        if fresh {
            seen.push(e.clone());
        }
        fresh
    });

    let missing = |what: &str| {
        AslError::Attribute(format!("{} shader '{}' requires a '{}' attribute", stage, class.name, what))
    };
    let stage_layout = match stage {
        Stage::Geometry => {
            let (input, invocations) = geometry_input.ok_or_else(|| missing("GeometryInput"))?;
            let (output, max_vertices) = geometry_output.ok_or_else(|| missing("GeometryOutput"))?;
            StageLayout::Geometry {
                input,
                invocations,
                output,
                max_vertices,
            }
        }
        Stage::TessControl => StageLayout::TessControl {
            vertices: tess_control.ok_or_else(|| missing("TessControl"))?,
        },
        Stage::TessEvaluation => tess_evaluation.ok_or_else(|| missing("TessEvaluation"))?,
        Stage::Vertex | Stage::Fragment => StageLayout::None,
    };

    Ok(ShaderUnit {
        name: class.name.clone(),
        stage,
        version: version.unwrap_or_else(|| config.glsl.default_version.clone()),
        debug,
        extensions,
        stage_layout,
    })
}

fn tess_evaluation_layout(attribute: &Attribute) -> AslResult<StageLayout> {
    let mut primitive = None;
    let mut spacing = None;
    let mut winding = None;
    for value in attribute.positional() {
        let value = layout::normalize_key(&value.to_text());
        let slot = if TESS_PRIMITIVES.contains(&value.as_str()) {
            &mut primitive
        } else if TESS_SPACINGS.contains(&value.as_str()) {
            &mut spacing
        } else if TESS_WINDINGS.contains(&value.as_str()) {
            &mut winding
        } else {
            return Err(AslError::Attribute(format!(
                "'{}' is not a tessellation primitive, spacing or winding",
                value
            )));
        };
        if slot.replace(value).is_some() {
            return Err(AslError::Attribute(
                "'TessEvaluation' repeats a primitive, spacing or winding".into(),
            ));
        }
    }
    let primitive = primitive.ok_or_else(|| {
        AslError::Attribute(format!(
            "'TessEvaluation' requires a primitive: {}",
            TESS_PRIMITIVES.join(", ")
        ))
    })?;
    Ok(StageLayout::TessEvaluation {
        primitive,
        spacing,
        winding,
    })
}

/// Attributes collected from one field or struct declaration.
#[derive(Default)]
struct Meta {
    qualifiers: Vec<Qualifier>,
    layout: Layout,
    array_size: Option<String>,
    comment: Option<String>,
    instance_name: Option<String>,
}

fn layout_from(attribute: &Attribute, layout: &mut Layout) {
    for arg in &attribute.args {
        match arg {
            AttributeArg::Positional(value) => layout.push(layout::normalize_key(&value.to_text()), None),
            AttributeArg::Named(key, value) => {
                layout.push(layout::normalize_key(key), Some(value.to_text()))
            }
        }
    }
}

/// Collect attributes, rejecting any name not in `allowed`.
fn collect(attributes: &[Attribute], allowed: &[&str], target: &str) -> AslResult<Meta> {
    let mut meta = Meta::default();
    for attribute in attributes {
        if !allowed.contains(&attribute.name.as_str()) {
            return Err(attribute_error(attribute, target));
        }
        if let Some(qualifier) = Qualifier::from_attribute(&attribute.name) {
            meta.qualifiers.push(qualifier);
            continue;
        }
        match attribute.name.as_str() {
            "Layout" => layout_from(attribute, &mut meta.layout),
            "ArraySize" => {
                meta.array_size = Some(first_text(attribute).ok_or_else(|| {
                    AslError::Attribute(format!("'ArraySize' on {} requires a size", target))
                })?)
            }
            "Comment" => meta.comment = first_text(attribute),
            "InstanceName" => meta.instance_name = first_text(attribute),
            _ => return Err(attribute_error(attribute, target)),
        }
    }
    Ok(meta)
}

struct Reflector<'a> {
    class: &'a str,
    stage: Stage,
    ctx: &'a ClassContext,
    debug: bool,
    require_locations: bool,
    interface: ShaderInterface,
}

impl Reflector<'_> {
    fn variable(&self, field: &FieldDecl, meta: &Meta, owner: &str) -> AslResult<ShaderVariable> {
        if field.ty.pointer {
            return Err(AslError::unsupported(
                Construct::Pointers,
                format!("in field {} at line {}", owner, field.span.line),
            ));
        }
        let mut var = ShaderVariable::new(self.ctx.resolve_type(&field.ty.name)?, field.name.clone());
        var.array_size = match (field.ty.array, &meta.array_size) {
            (true, Some(size)) => Some(size.clone()),
            (true, None) => match field.init.as_ref().and_then(codegen::initializer_len) {
                Some(n) => Some(n.to_string()),
                None => {
                    return Err(AslError::MissingArraySize(format!(
                        "array field {} needs an ArraySize attribute or an initializer",
                        owner
                    )))
                }
            },
            (false, Some(_)) => {
                return Err(AslError::Attribute(format!(
                    "'ArraySize' on {} which is not an array",
                    owner
                )))
            }
            (false, None) => None,
        };
        var.layout = meta.layout.clone();
        var.comment = meta.comment.clone();
        if self.debug {
            var.debug_comment = Some(owner.to_string());
        }
        var.is_const = field.is_const;
        Ok(var)
    }

    fn render_initializer(&self, field: &FieldDecl, var: &mut ShaderVariable, owner: &str) -> AslResult<()> {
        if let Some(init) = &field.init {
            let ty = ValueType::from_type_ref(&field.ty);
            var.initializer = Some(codegen::initializer(init, &ty, self.ctx, owner)?);
        }
        Ok(())
    }

    fn field(&mut self, field: &FieldDecl) -> AslResult<()> {
        let owner = format!("{}.{}", self.class, field.name);
        let meta = collect(
            &field.attributes,
            &["Uniform", "In", "Out", "BuiltIn", "ArraySize", "Comment", "Layout"],
            &format!("field '{}'", owner),
        )?;
        if meta.qualifiers.len() > 1 {
            return Err(AslError::Attribute(format!(
                "field '{}' carries more than one of Uniform, In, Out, BuiltIn",
                owner
            )));
        }
        let qualifier = meta.qualifiers.first().copied();

        if field.is_const {
            if qualifier.is_some() || !meta.layout.is_empty() {
                return Err(AslError::Attribute(format!(
                    "constant '{}' cannot carry a qualifier or layout",
                    owner
                )));
            }
            let mut var = self.variable(field, &meta, &owner)?;
            self.render_initializer(field, &mut var, &owner)?;
            self.interface.constants.push(var);
            return Ok(());
        }

        match qualifier {
            Some(Qualifier::Uniform) => {
                layout::validate(self.stage, LayoutRole::Uniform, &meta.layout, &owner, false)?;
                let mut var = self.variable(field, &meta, &owner)?;
                var.qualifier = Some(Qualifier::Uniform);
                self.render_initializer(field, &mut var, &owner)?;
                self.interface.uniforms.push(var);
            }
            Some(q @ (Qualifier::Input | Qualifier::Output)) => {
                let role = if q == Qualifier::Input {
                    LayoutRole::Input
                } else {
                    LayoutRole::Output
                };
                layout::validate(self.stage, role, &meta.layout, &owner, false)?;
                if field.init.is_some() {
                    return Err(AslError::InvalidArgument(format!(
                        "{} '{}' cannot have an initializer",
                        q, owner
                    )));
                }
                let needs_location = matches!(
                    (self.stage, q),
                    (Stage::Vertex, Qualifier::Input) | (Stage::Fragment, Qualifier::Output)
                );
                if needs_location && self.require_locations && !meta.layout.has("location") {
                    return Err(AslError::MissingAttributeLocation(format!(
                        "{} {} '{}' needs Layout(location = n)",
                        self.stage, q, owner
                    )));
                }
                let mut var = self.variable(field, &meta, &owner)?;
                var.qualifier = Some(q);
                if q == Qualifier::Input {
                    self.interface.inputs.push(var);
                } else {
                    self.interface.outputs.push(var);
                }
            }
            Some(Qualifier::BuiltIn) => {
                if meta.layout.is_empty() {
                    tracing::trace!(field = %owner, "skipping built-in");
                    return Ok(());
                }
                let frag_coord = field.name == "gl_FragCoord";
                layout::validate(self.stage, LayoutRole::Input, &meta.layout, &owner, frag_coord)?;
                let mut var = self.variable(field, &meta, &owner)?;
                var.qualifier = Some(Qualifier::BuiltIn);
                self.interface.inputs.push(var);
            }
            None => {
                if !meta.layout.is_empty() {
                    return Err(AslError::Attribute(format!(
                        "'Layout' on '{}' requires Uniform, In, Out or BuiltIn",
                        owner
                    )));
                }
                let mut var = self.variable(field, &meta, &owner)?;
                self.render_initializer(field, &mut var, &owner)?;
                self.interface.globals.push(var);
            }
        }
        Ok(())
    }

    fn structure(&self, decl: &StructDecl) -> AslResult<ShaderStruct> {
        let owner = format!("{}.{}", self.class, decl.name);
        let meta = collect(
            &decl.attributes,
            &["Uniform", "In", "Out", "Layout", "InstanceName", "Comment"],
            &format!("struct '{}'", owner),
        )?;
        if meta.qualifiers.len() > 1 {
            return Err(AslError::InterfaceBlock(format!(
                "struct '{}' carries more than one of Uniform, In, Out",
                owner
            )));
        }
        let block = meta.qualifiers.first().copied();
        if block.is_none() && (!meta.layout.is_empty() || meta.instance_name.is_some()) {
            return Err(AslError::InterfaceBlock(format!(
                "struct '{}' has a layout or instance name but no Uniform, In or Out qualifier",
                owner
            )));
        }
        let illegal_block = matches!(
            (self.stage, block),
            (Stage::Vertex, Some(Qualifier::Input)) | (Stage::Fragment, Some(Qualifier::Output))
        );
        if illegal_block {
            return Err(AslError::InterfaceBlock(format!(
                "{} shaders cannot declare {} block '{}'",
                self.stage,
                block.map(|q| q.to_string()).unwrap_or_default(),
                owner
            )));
        }
        if let Some(qualifier) = block {
            let role = match qualifier {
                Qualifier::Uniform => LayoutRole::UniformBlock,
                Qualifier::Input => LayoutRole::InputBlock,
                _ => LayoutRole::OutputBlock,
            };
            layout::validate(self.stage, role, &meta.layout, &owner, false)?;
        }

        let mut members = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            let member_owner = format!("{}.{}", owner, field.name);
            let member_meta = collect(
                &field.attributes,
                &["Uniform", "In", "Out", "ArraySize", "Comment"],
                &format!("member '{}'", member_owner),
            )?;
            for qualifier in &member_meta.qualifiers {
                match block {
                    Some(b) if b == *qualifier => {}
                    Some(b) => {
                        return Err(AslError::InterfaceBlock(format!(
                            "member '{}' is {} but its block is {}",
                            member_owner, qualifier, b
                        )))
                    }
                    None => {
                        return Err(AslError::InterfaceBlock(format!(
                            "member '{}' of plain struct cannot be {}",
                            member_owner, qualifier
                        )))
                    }
                }
            }
            if field.init.is_some() {
                return Err(AslError::InvalidArgument(format!(
                    "struct member '{}' cannot have an initializer",
                    member_owner
                )));
            }
            members.push(self.variable(field, &member_meta, &member_owner)?);
        }

        let instance_name = block.map(|_| {
            meta.instance_name
                .clone()
                .unwrap_or_else(|| default_instance_name(&decl.name))
        });
        Ok(ShaderStruct {
            name: decl.name.clone(),
            block,
            instance_name,
            members,
            layout: meta.layout,
            comment: meta.comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asl_lang::parse_source;

    fn reflect_src(src: &str) -> AslResult<Reflection> {
        reflect_with(src, &AslConfig::default())
    }

    fn reflect_with(src: &str, config: &AslConfig) -> AslResult<Reflection> {
        let source = parse_source(src, "r.asl")?;
        let class = &source.classes[0];
        let ctx = ClassContext::from_class(class);
        reflect(class, &ctx, config)
    }

    #[test]
    fn test_vertex_interface_in_declaration_order() {
        let r = reflect_src(
            r#"[Version("330"), Extension("GL_ARB_explicit_attrib_location")]
            class Basic : VertexShader {
                const int MAX_LIGHTS = 4;
                [Uniform] mat4 viewProjection;
                [In, Layout(location = 0)] vec3 position;
                [In, Layout(location = 1)] vec2 uv;
                [Out, Comment("to fragment")] vec2 vUv;
                [Uniform, ArraySize(MAX_LIGHTS)] vec3[] lights;
                float time = 0.5;
                void main() { }
            }"#,
        )
        .unwrap();
        assert_eq!(r.unit.version, "330");
        assert_eq!(r.unit.extensions, vec!["GL_ARB_explicit_attrib_location".to_string()]);
        assert_eq!(r.unit.stage_layout, StageLayout::None);

        let i = &r.interface;
        assert_eq!(i.constants[0].initializer.as_deref(), Some("4"));
        let uniforms: Vec<_> = i.uniforms.iter().map(|v| v.declarator()).collect();
        assert_eq!(uniforms, vec!["viewProjection", "lights[MAX_LIGHTS]"]);
        let inputs: Vec<_> = i.inputs.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(inputs, vec!["position", "uv"]);
        assert_eq!(i.inputs[0].layout.to_string(), "layout(location = 0)");
        assert_eq!(i.outputs[0].comment.as_deref(), Some("to fragment"));
        assert_eq!(i.globals[0].initializer.as_deref(), Some("0.5f"));
        assert!(i.uniforms[0].debug_comment.is_none());
    }

    #[test]
    fn test_default_version_and_config_extensions() {
        let mut config = AslConfig::default();
        config.glsl.extensions = vec!["GL_EXT_a".into(), "GL_EXT_b".into()];
        config.compile.debug = true;
        let r = reflect_with(
            r#"[Extension("GL_EXT_b")] class F : FragmentShader { [Uniform] float gain; void main() { } }"#,
            &config,
        )
        .unwrap();
        assert_eq!(r.unit.version, "430");
        assert_eq!(r.unit.extensions, vec!["GL_EXT_b".to_string(), "GL_EXT_a".to_string()]);
        assert!(r.unit.debug);
        assert_eq!(r.interface.uniforms[0].debug_comment.as_deref(), Some("F.gain"));
    }

    #[test]
    fn test_vertex_input_without_location() {
        let src = "class V : VertexShader { [In] vec3 position; void main() { } }";
        assert!(matches!(reflect_src(src), Err(AslError::MissingAttributeLocation(_))));

        let mut config = AslConfig::default();
        config.compile.require_locations = false;
        assert!(reflect_with(src, &config).is_ok());
    }

    #[test]
    fn test_illegal_layout_key() {
        let err = reflect_src(
            "class V : VertexShader { [In, Layout(location = 0, index = 1)] vec3 p; void main() { } }",
        )
        .unwrap_err();
        assert!(matches!(err, AslError::Layout(ref m) if m.contains("index")));
    }

    #[test]
    fn test_frag_coord_redeclaration() {
        let r = reflect_src(
            r#"class F : FragmentShader {
                [BuiltIn, Layout(OriginUpperLeft)] vec4 gl_FragCoord;
                [BuiltIn] vec4 gl_Position;
                [Out, Layout(location = 0)] vec4 color;
                void main() { }
            }"#,
        )
        .unwrap();
        assert_eq!(r.interface.inputs.len(), 1);
        assert_eq!(r.interface.inputs[0].qualifier, Some(Qualifier::BuiltIn));
        assert_eq!(r.interface.inputs[0].layout.to_string(), "layout(origin_upper_left)");

        let err = reflect_src(
            "class F : FragmentShader { [In, Layout(origin_upper_left)] vec4 p; void main() { } }",
        )
        .unwrap_err();
        assert!(matches!(err, AslError::Layout(_)));
    }

    #[test]
    fn test_interface_blocks() {
        let r = reflect_src(
            r#"class V : VertexShader {
                [Uniform, Layout(std140, binding = 0)]
                struct Camera { mat4 view; mat4 projection; }
                [Uniform, Layout(std140), InstanceName("lights")]
                struct LightBlock { [Uniform] vec4 color; }
                struct Plain { float a; }
                void main() { }
            }"#,
        )
        .unwrap();
        let s = &r.interface.structs;
        assert_eq!(s[0].instance_name.as_deref(), Some("camera"));
        assert_eq!(s[0].layout.to_string(), "layout(std140, binding = 0)");
        assert_eq!(s[1].instance_name.as_deref(), Some("lights"));
        assert!(!s[2].is_interface_block());
        assert!(s[2].instance_name.is_none());
    }

    #[test]
    fn test_interface_block_errors() {
        let two = "class V : VertexShader { [Uniform, Out] struct B { float a; } void main() { } }";
        assert!(matches!(reflect_src(two), Err(AslError::InterfaceBlock(_))));

        let mismatch = "class V : VertexShader { [Uniform] struct B { [Out] float a; } void main() { } }";
        assert!(matches!(reflect_src(mismatch), Err(AslError::InterfaceBlock(_))));

        let plain = "class V : VertexShader { struct B { [Uniform] float a; } void main() { } }";
        assert!(matches!(reflect_src(plain), Err(AslError::InterfaceBlock(_))));

        let layout_only = "class V : VertexShader { [Layout(std140)] struct B { float a; } void main() { } }";
        assert!(matches!(reflect_src(layout_only), Err(AslError::InterfaceBlock(_))));
    }

    #[test]
    fn test_array_sizes() {
        let missing = "class V : VertexShader { [Uniform] float[] w; void main() { } }";
        assert!(matches!(reflect_src(missing), Err(AslError::MissingArraySize(_))));

        let not_array = "class V : VertexShader { [Uniform, ArraySize(2)] float w; void main() { } }";
        assert!(matches!(reflect_src(not_array), Err(AslError::Attribute(_))));

        let r = reflect_src("class V : VertexShader { float[] w = { 1, 2, 3 }; void main() { } }").unwrap();
        assert_eq!(r.interface.globals[0].declarator(), "w[3]");
        assert_eq!(
            r.interface.globals[0].initializer.as_deref(),
            Some("float[3](1.0f, 2.0f, 3.0f)")
        );
    }

    #[test]
    fn test_attribute_misuse() {
        let unknown = "class V : VertexShader { [Uniform, Serializable] float w; void main() { } }";
        assert!(matches!(reflect_src(unknown), Err(AslError::Attribute(_))));

        let const_uniform = "class V : VertexShader { [Uniform] const float K = 1.0; void main() { } }";
        assert!(matches!(reflect_src(const_uniform), Err(AslError::Attribute(_))));

        let class_attr = "[Cached] class V : VertexShader { void main() { } }";
        assert!(matches!(reflect_src(class_attr), Err(AslError::Attribute(_))));
    }

    #[test]
    fn test_geometry_stage_layout() {
        let r = reflect_src(
            r#"[GeometryInput(Triangles, Invocations = 2), GeometryOutput(TriangleStrip, MaxVertices = 3)]
            class G : GeometryShader { void main() { } }"#,
        )
        .unwrap();
        assert_eq!(
            r.unit.stage_layout,
            StageLayout::Geometry {
                input: "triangles".into(),
                invocations: Some(2),
                output: "triangle_strip".into(),
                max_vertices: Some(3),
            }
        );

        let missing = "[GeometryInput(points)] class G : GeometryShader { void main() { } }";
        assert!(matches!(reflect_src(missing), Err(AslError::Attribute(_))));

        let wrong_stage = "[GeometryInput(points)] class V : VertexShader { void main() { } }";
        assert!(matches!(reflect_src(wrong_stage), Err(AslError::Attribute(_))));
    }

    #[test]
    fn test_tessellation_stage_layouts() {
        let tc = reflect_src("[TessControl(Vertices = 3)] class C : TessControlShader { void main() { } }").unwrap();
        assert_eq!(tc.unit.stage_layout, StageLayout::TessControl { vertices: 3 });

        let te = reflect_src(
            "[TessEvaluation(Triangles, EqualSpacing, ccw)] class E : TessEvaluationShader { void main() { } }",
        )
        .unwrap();
        assert_eq!(
            te.unit.stage_layout,
            StageLayout::TessEvaluation {
                primitive: "triangles".into(),
                spacing: Some("equal_spacing".into()),
                winding: Some("ccw".into()),
            }
        );
    }

    #[test]
    fn test_library_class_rejected() {
        let err = reflect_src("static class L { static float f() { return 1.0; } }").unwrap_err();
        assert!(matches!(err, AslError::InvalidArgument(_)));
    }
}
