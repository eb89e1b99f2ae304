//! # asl-glsl
//!
//! ASL back end: reflects shader classes, recovers and normalizes method
//! bodies, generates GLSL and assembles complete shader units.

pub mod assemble;
pub mod codegen;
pub mod compiler;
pub mod intrinsics;
pub mod layout;
pub mod link;
pub mod model;
pub mod normalize;
pub mod recover;
pub mod reflect;
pub mod typing;

pub use codegen::GeneratedFunction;
pub use compiler::{CacheLookup, CacheState, CompileStats, CompiledShader, Compiler, CompilerCache, LookupSource};
pub use link::Linker;
pub use model::{FunctionDependency, Qualifier, ShaderInterface, ShaderUnit};

use asl_core::{AslConfig, AslResult};

/// Parse `src` and compile every shader class in it, in source order.
pub fn compile_source(src: &str, file: &str, config: AslConfig) -> AslResult<Vec<CompiledShader>> {
    let source = asl_lang::parse_source(src, file)?;
    let compiler = Compiler::new(config);
    source.shaders().map(|class| compiler.compile(class)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_source_skips_libraries() {
        let src = r#"
            static class Util { static float halve(float x) { return x * 0.5; } }
            class Pass : VertexShader {
                [In, Layout(location = 0)] vec4 position;
                void main() { gl_Position = position * Util.halve(2); }
            }
            class Flat : FragmentShader {
                [Out, Layout(location = 0)] vec4 color;
                void main() { color = new vec4(1); }
            }
        "#;
        let shaders = compile_source(src, "pass.asl", AslConfig::default()).unwrap();
        let names: Vec<_> = shaders.iter().map(|s| s.file_name()).collect();
        assert_eq!(names, vec!["Pass.vert", "Flat.frag"]);
        assert_eq!(shaders[0].dependencies[0].to_string(), "Util.halve/1");
        assert!(shaders[1].source().starts_with("#version 430\n"));
    }
}
