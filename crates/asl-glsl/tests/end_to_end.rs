use asl_core::{AslConfig, AslError, Construct, Stage};
use asl_glsl::{CompiledShader, Compiler, CompilerCache, Linker, LookupSource};
use asl_lang::ast::build::*;
use asl_lang::ast::{BinaryOp, ClassDecl};
use asl_lang::{parse_source, ClassBuilder, MethodBuilder};

const BASIC: &str = r#"
    class Basic : VertexShader {
        [Uniform] mat4 viewProjection;
        [In, Layout(location = 0)] vec3 position;
        void main() {
            gl_Position = viewProjection * new vec4(position, 1);
        }
    }
"#;

fn first_class(src: &str) -> ClassDecl {
    parse_source(src, "test.asl")
        .expect("source should parse")
        .classes
        .remove(0)
}

fn compile(src: &str) -> Result<CompiledShader, AslError> {
    Compiler::default().compile(&first_class(src))
}

fn fragment_main(body: &str) -> String {
    let src = format!(
        r#"class Frag : FragmentShader {{
            [Uniform] float x;
            [Uniform] float y;
            [Out, Layout(location = 0)] vec4 color;
            void main() {{ {} }}
        }}"#,
        body
    );
    compile(&src).expect("fragment shader should compile").source()
}

#[test]
fn test_vertex_scenario_in_order() {
    let text = compile(BASIC).unwrap().source();
    let version = text.find("#version 430").unwrap();
    let uniform = text.find("uniform mat4 viewProjection;").unwrap();
    let input = text.find("layout(location = 0) in vec3 position;").unwrap();
    let main = text.find("void main() {").unwrap();
    let assignment = text
        .find("gl_Position = viewProjection * vec4(position, 1.0f);")
        .unwrap();
    assert!(version < uniform && uniform < input && input < main && main < assignment);
}

#[test]
fn test_builder_and_parser_agree() {
    let built = ClassBuilder::shader("Basic", Stage::Vertex)
        .uniform("mat4", "viewProjection")
        .input("vec3", "position", Some(0))
        .method(
            MethodBuilder::entry_point()
                .stmt(expr_stmt(assign(
                    ident("gl_Position"),
                    binary(
                        BinaryOp::Mul,
                        ident("viewProjection"),
                        new_object("vec4", vec![ident("position"), int(1)]),
                    ),
                )))
                .build(),
        )
        .build();
    let from_builder = Compiler::default().compile(&built).unwrap();
    let from_text = compile(BASIC).unwrap();
    assert_eq!(from_builder.source(), from_text.source());
}

#[test]
fn test_second_compile_is_served_from_cache() {
    let compiler = Compiler::default();
    let cache = CompilerCache::new();
    let class = first_class(BASIC);

    let first = cache.get_or_compile(&compiler, &class).unwrap();
    let recoveries = compiler.stats().recoveries();
    let generations = compiler.stats().generations();
    assert_eq!(first.source, LookupSource::Compiled);

    let second = cache.get_or_compile(&compiler, &class).unwrap();
    assert_eq!(second.source, LookupSource::Memory);
    assert_eq!(first.shader().source(), second.shader().source());
    assert_eq!(compiler.stats().recoveries(), recoveries);
    assert_eq!(compiler.stats().generations(), generations);
}

#[test]
fn test_literal_rendering() {
    let text = fragment_main(
        "float a = 1; float b = 1.5; uint c = 3; bool t = true; bool f = false; color = new vec4(a, b, 0, 1);",
    );
    assert!(text.contains("float local0 = 1.0f;"));
    assert!(text.contains("float local1 = 1.5f;"));
    assert!(text.contains("uint local2 = 3u;"));
    assert!(text.contains("bool local3 = true;"));
    assert!(text.contains("bool local4 = false;"));
}

#[test]
fn test_floating_remainder_uses_mod() {
    let text = fragment_main("float r = x % y; color = new vec4(r);");
    assert!(text.contains("float local0 = mod(x, y);"));
    assert!(!text.contains(" % "));
}

#[test]
fn test_local_names_do_not_leak() {
    let shade = |local: &str| {
        let src = format!(
            r#"class Frag : FragmentShader {{
                [Out, Layout(location = 0)] vec4 color;
                float shade(float k) {{ float {l} = k * 2.0; {l} += 1.0; return {l}; }}
                void main() {{ color = new vec4(shade(0.5)); }}
            }}"#,
            l = local
        );
        compile(&src).unwrap().functions[0].text.clone()
    };
    let a = shade("intensity");
    let b = shade("brightness");
    assert_eq!(a, b);
    assert!(a.contains("float local0 = k * 2.0f;"));
}

#[test]
fn test_renamed_locals_never_shadow_fields() {
    let text = compile(
        r#"class Frag : FragmentShader {
            [Uniform] float local0;
            [Out, Layout(location = 0)] vec4 color;
            void main() { float a = 2.0; color = new vec4(local0 + a); }
        }"#,
    )
    .unwrap()
    .source();
    assert!(text.contains("uniform float local0;"));
    assert!(text.contains("float local1 = 2.0f;"));
    assert!(text.contains("color = vec4(local0 + local1);"));
}

#[test]
fn test_interface_block_qualifier_consistency() {
    let bad = r#"class V : VertexShader {
        [Uniform] struct Camera { mat4 view; [Out] mat4 projection; }
        void main() { }
    }"#;
    assert!(matches!(compile(bad), Err(AslError::InterfaceBlock(_))));

    let good = r#"class V : VertexShader {
        [Uniform, Layout(std140)] struct Camera { mat4 view; [Uniform] mat4 projection; }
        [In, Layout(location = 0)] vec4 position;
        void main() { gl_Position = camera.projection * camera.view * position; }
    }"#;
    let text = compile(good).unwrap().source();
    assert!(text.contains("layout(std140) uniform Camera {\n    mat4 view;\n    mat4 projection;\n} camera;"));
    assert!(text.contains("gl_Position = camera.projection * camera.view * position;"));
}

#[test]
fn test_unsupported_constructs_fail_without_output() {
    let compiler = Compiler::default();
    let cache = CompilerCache::new();

    let with_try = first_class(
        "class T : VertexShader { void main() { try { gl_Position = new vec4(0); } catch (Exception e) { } } }",
    );
    let err = cache.get_or_compile(&compiler, &with_try).unwrap_err();
    assert_eq!(err.construct(), Some(Construct::Exceptions));
    assert!(err.to_string().contains("exceptions"));
    assert!(cache.get("T").is_none());

    let with_foreach = first_class(
        "class T : VertexShader { void main() { foreach (var v in items) { gl_Position = v; } } }",
    );
    let err = cache.get_or_compile(&compiler, &with_foreach).unwrap_err();
    assert_eq!(err.construct(), Some(Construct::Foreach));
    assert!(cache.is_empty());
}

#[test]
fn test_geometry_shader_pragmas() {
    let src = r#"
        [Version("450"), GeometryInput(triangles), GeometryOutput(triangle_strip, MaxVertices = 3)]
        class Passthrough : GeometryShader {
            void main() {
                for (int i = 0; i < 3; i++) {
                    gl_Position = gl_in[i].gl_Position;
                    EmitVertex();
                }
                EndPrimitive();
            }
        }
    "#;
    let shader = compile(src).unwrap();
    let text = shader.source();
    assert!(text.starts_with("#version 450\n\nlayout(triangles) in;\nlayout(triangle_strip, max_vertices = 3) out;\n"));
    assert!(text.contains("        EmitVertex();\n"));
    assert!(shader.dependencies.is_empty());
    assert_eq!(shader.file_name(), "Passthrough.geom");
}

#[test]
fn test_helpers_precede_main() {
    let src = r#"class Frag : FragmentShader {
        [Out, Layout(location = 0)] vec4 color;
        void main() { color = tonemap(new vec4(0.25)); }
        vec4 tonemap(vec4 c) { return c / (c + exposure()); }
        float exposure() { return 1; }
    }"#;
    let shader = compile(src).unwrap();
    let names: Vec<_> = shader.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["exposure", "tonemap", "main"]);
    assert!(shader.source().contains("return 1.0f;"));
}

#[test]
fn test_overloaded_helpers_keep_argument_types() {
    let text = compile(
        r#"class Frag : FragmentShader {
            [Out, Layout(location = 0)] vec4 color;
            float f(float a) { return a * 2; }
            int f(int a) { return a + 1; }
            void main() { int k = f(1); float h = f(0.5); color = new vec4(h); }
        }"#,
    )
    .unwrap()
    .source();
    assert!(text.contains("float f(float a) {"));
    assert!(text.contains("int f(int a) {"));
    assert!(text.contains("int local0 = f(1);"));
    assert!(text.contains("float local1 = f(0.5f);"));
}

#[test]
fn test_link_with_library() {
    let source = parse_source(
        r#"
        static class Lighting {
            static float lambert(vec3 n, vec3 l) { return max(dot(n, l), 0.0); }
        }
        class Lit : FragmentShader {
            [In, Layout(location = 0)] vec3 normal;
            [Uniform] vec3 lightDir;
            [Out, Layout(location = 0)] vec4 color;
            void main() { color = new vec4(new vec3(Lighting.lambert(normal, lightDir)), 1); }
        }
        "#,
        "lit.asl",
    )
    .unwrap();
    let compiler = Compiler::default();
    let shader = compiler.compile(source.class("Lit").unwrap()).unwrap();
    assert_eq!(shader.dependencies.len(), 1);
    assert!(!shader.source().contains("float lambert("));

    let linked = Linker::from_source(&source)
        .unwrap()
        .link(&compiler, &shader)
        .unwrap();
    let lambert = linked.find("float lambert(vec3 n, vec3 l) {").unwrap();
    assert!(lambert < linked.find("void main() {").unwrap());
    assert!(linked.contains("return max(dot(n, l), 0.0f);"));
}

#[test]
fn test_debug_comments_from_config() {
    let mut config = AslConfig::default();
    config.compile.debug = true;
    let shader = Compiler::new(config).compile(&first_class(BASIC)).unwrap();
    assert!(shader
        .source()
        .contains("uniform mat4 viewProjection; // Basic.viewProjection"));
}
