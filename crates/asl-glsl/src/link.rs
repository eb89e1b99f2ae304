//! Dependency linking against library classes.
//!
//! A compiled shader lists the non-intrinsic functions it calls. The linker
//! finds each in a `static class`, compiles it once, follows the library
//! function's own calls, and places everything it needs ahead of the
//! shader's functions.

use std::collections::HashMap;

use asl_core::{AslError, AslResult, Construct};
use asl_lang::ast::{ClassDecl, ClassKind, MethodDecl, SourceFile};
use parking_lot::Mutex;

use crate::assemble;
use crate::codegen::{self, GeneratedFunction};
use crate::compiler::{CompiledShader, Compiler};
use crate::model::{FunctionDependency, ShaderVariable};
use crate::typing::{ClassContext, ValueType};

/// `(library index, method index)`
type FunctionKey = (usize, usize);

struct Library {
    class: ClassDecl,
    ctx: ClassContext,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Active,
    Done,
}

/// Resolves and compiles library functions; compiled functions are kept
/// for the lifetime of the linker.
#[derive(Default)]
pub struct Linker {
    libraries: Vec<Library>,
    compiled: Mutex<HashMap<FunctionKey, GeneratedFunction>>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A linker over every library class in `source`.
    pub fn from_source(source: &SourceFile) -> AslResult<Self> {
        let mut linker = Self::new();
        for class in source.libraries() {
            linker.add_library(class.clone())?;
        }
        Ok(linker)
    }

    pub fn add_library(&mut self, class: ClassDecl) -> AslResult<()> {
        if class.kind != ClassKind::Library {
            return Err(AslError::InvalidArgument(format!(
                "'{}' is a shader class, not a library",
                class.name
            )));
        }
        if let Some(field) = class.fields.iter().find(|f| !f.is_const) {
            return Err(AslError::InvalidArgument(format!(
                "library field '{}.{}' must be const",
                class.name, field.name
            )));
        }
        if self.libraries.iter().any(|l| l.class.name == class.name) {
            return Err(AslError::InvalidArgument(format!(
                "library '{}' is already registered",
                class.name
            )));
        }
        tracing::debug!(library = %class.name, functions = class.methods.len(), "registered library");
        let ctx = ClassContext::from_class(&class);
        self.libraries.push(Library { class, ctx });
        Ok(())
    }

    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(|l| l.class.name.as_str())
    }

    fn candidates<'a>(&'a self, library: usize, name: &'a str) -> impl Iterator<Item = (usize, &'a MethodDecl)> + 'a {
        self.libraries[library]
            .class
            .methods
            .iter()
            .enumerate()
            .filter(move |(_, m)| !m.is_constructor && m.name == name)
    }

    /// Find the library function a dependency names.
    pub fn resolve(&self, dep: &FunctionDependency) -> AslResult<(&str, &MethodDecl)> {
        let (library, method) = self.resolve_key(dep)?;
        let class = &self.libraries[library].class;
        Ok((class.name.as_str(), &class.methods[method]))
    }

    fn resolve_key(&self, dep: &FunctionDependency) -> AslResult<FunctionKey> {
        let libraries: Vec<usize> = match dep.owner() {
            Some(owner) => self
                .libraries
                .iter()
                .position(|l| l.class.name == owner)
                .into_iter()
                .collect(),
            None => (0..self.libraries.len()).collect(),
        };
        let mut found = Vec::new();
        for library in libraries {
            for (index, method) in self.candidates(library, &dep.name) {
                if method.params.len() == dep.arity {
                    found.push((library, index));
                }
            }
        }
        match found.as_slice() {
            [key] => Ok(*key),
            [] => Err(AslError::UnresolvedDependency(format!(
                "no library function matches {}",
                dep
            ))),
            _ => Err(AslError::UnresolvedDependency(format!(
                "{} is ambiguous; qualify it with its library class",
                dep
            ))),
        }
    }

    fn compile_function(&self, compiler: &Compiler, key: FunctionKey) -> AslResult<GeneratedFunction> {
        if let Some(function) = self.compiled.lock().get(&key) {
            return Ok(function.clone());
        }
        let library = &self.libraries[key.0];
        let function = compiler.compile_method(&library.ctx, &library.class.methods[key.1])?;
        tracing::debug!(
            library = %library.class.name,
            function = %function.name,
            "compiled library function"
        );
        self.compiled.lock().entry(key).or_insert_with(|| function.clone());
        Ok(function)
    }

    fn visit(
        &self,
        compiler: &Compiler,
        key: FunctionKey,
        states: &mut HashMap<FunctionKey, Visit>,
        order: &mut Vec<(FunctionKey, GeneratedFunction)>,
    ) -> AslResult<()> {
        match states.get(&key) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::Active) => {
                let library = &self.libraries[key.0].class;
                return Err(AslError::unsupported(
                    Construct::Recursion,
                    format!(
                        "library function '{}.{}' calls itself, directly or indirectly",
                        library.name, library.methods[key.1].name
                    ),
                ));
            }
            None => {}
        }
        states.insert(key, Visit::Active);
        let function = self.compile_function(compiler, key)?;
        for call in &function.calls {
            let callees: Vec<usize> = self.candidates(key.0, call).map(|(i, _)| i).collect();
            for callee in callees {
                self.visit(compiler, (key.0, callee), states, order)?;
            }
        }
        for dep in &function.dependencies {
            let callee = self.resolve_key(dep)?;
            self.visit(compiler, callee, states, order)?;
        }
        states.insert(key, Visit::Done);
        order.push((key, function));
        Ok(())
    }

    /// Resolve and compile everything `shader` needs, callees first.
    fn ordered(&self, compiler: &Compiler, shader: &CompiledShader) -> AslResult<Vec<(FunctionKey, GeneratedFunction)>> {
        let mut states = HashMap::new();
        let mut order = Vec::new();
        for dep in &shader.dependencies {
            let key = self.resolve_key(dep)?;
            self.visit(compiler, key, &mut states, &mut order)?;
        }

        let mut signatures: HashMap<(String, usize), String> = HashMap::new();
        for f in &shader.functions {
            signatures.insert((f.name.clone(), f.arity), shader.name.clone());
        }
        for ((library, _), function) in &order {
            let owner = &self.libraries[*library].class.name;
            let signature = (function.name.clone(), function.arity);
            if let Some(existing) = signatures.insert(signature, owner.clone()) {
                return Err(AslError::InvalidArgument(format!(
                    "function '{}' with {} parameter(s) is defined by both '{}' and '{}'",
                    function.name, function.arity, existing, owner
                )));
            }
        }
        Ok(order)
    }

    /// Library functions `shader` needs, callees first.
    pub fn link_functions(&self, compiler: &Compiler, shader: &CompiledShader) -> AslResult<Vec<GeneratedFunction>> {
        Ok(self
            .ordered(compiler, shader)?
            .into_iter()
            .map(|(_, f)| f)
            .collect())
    }

    /// Constants of the libraries the linked functions come from.
    fn constants(&self, keys: &[usize]) -> AslResult<String> {
        let mut vars = Vec::new();
        for &library in keys {
            let lib = &self.libraries[library];
            for field in &lib.class.fields {
                let owner = format!("{}.{}", lib.class.name, field.name);
                let mut var = ShaderVariable::new(lib.ctx.resolve_type(&field.ty.name)?, field.name.clone());
                var.is_const = true;
                if field.ty.array {
                    var.array_size = field.init.as_ref().and_then(codegen::initializer_len).map(|n| n.to_string());
                }
                if let Some(init) = &field.init {
                    var.initializer = Some(codegen::initializer(
                        init,
                        &ValueType::from_type_ref(&field.ty),
                        &lib.ctx,
                        &owner,
                    )?);
                }
                vars.push(var);
            }
        }
        Ok(assemble::variables(&vars))
    }

    /// The shader's source with every dependency resolved and inlined.
    pub fn link(&self, compiler: &Compiler, shader: &CompiledShader) -> AslResult<String> {
        let order = self.ordered(compiler, shader)?;
        let mut used: Vec<usize> = Vec::new();
        for ((library, _), _) in &order {
            if !used.contains(library) {
                used.push(*library);
            }
        }
        let constants = self.constants(&used)?;
        tracing::debug!(
            shader = %shader.name,
            linked = order.len(),
            "linked dependencies"
        );

        let sections = [shader.declarations.as_str(), constants.as_str()]
            .into_iter()
            .chain(order.iter().map(|(_, f)| f.text.as_str()))
            .chain(shader.functions.iter().map(|f| f.text.as_str()));
        Ok(assemble::render_source(sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asl_lang::parse_source;

    const SOURCE: &str = r#"
        static class Lighting {
            const float AMBIENT = 0.1;
            static float lambert(vec3 n, vec3 l) { return max(dot(n, l), 0.0) + bias(); }
            static float bias() { return AMBIENT; }
            static float unused() { return 1.0; }
        }

        static class Tone {
            static vec3 grade(vec3 c) { return c * Lighting.bias(); }
        }

        class Lit : FragmentShader {
            [In, Layout(location = 0)] vec3 normal;
            [Out, Layout(location = 0)] vec4 color;
            void main() {
                float d = Lighting.lambert(normal, new vec3(0, 1, 0));
                color = new vec4(grade(new vec3(d)), 1);
            }
        }
    "#;

    fn setup() -> (Compiler, Linker, CompiledShader) {
        let source = parse_source(SOURCE, "lit.asl").unwrap();
        let compiler = Compiler::default();
        let shader = compiler.compile(source.class("Lit").unwrap()).unwrap();
        let linker = Linker::from_source(&source).unwrap();
        (compiler, linker, shader)
    }

    #[test]
    fn test_dependencies_recorded() {
        let (_, _, shader) = setup();
        assert_eq!(
            shader.dependencies,
            vec![
                FunctionDependency::new("Lighting.lambert", "lambert", 2),
                FunctionDependency::new("grade", "grade", 1),
            ]
        );
    }

    #[test]
    fn test_link_orders_callees_first() {
        let (compiler, linker, shader) = setup();
        let text = linker.link(&compiler, &shader).unwrap();
        let bias = text.find("float bias()").unwrap();
        let lambert = text.find("float lambert(vec3 n, vec3 l)").unwrap();
        let grade = text.find("vec3 grade(vec3 c)").unwrap();
        let main = text.find("void main()").unwrap();
        assert!(bias < lambert && lambert < main && bias < grade && grade < main);
        assert!(text.contains("const float AMBIENT = 0.1f;"));
        assert!(!text.contains("unused"));
    }

    #[test]
    fn test_each_dependency_compiled_once() {
        let (compiler, linker, shader) = setup();
        let before = compiler.stats().generations();
        linker.link(&compiler, &shader).unwrap();
        let after_first = compiler.stats().generations();
        assert_eq!(after_first - before, 3);
        linker.link(&compiler, &shader).unwrap();
        assert_eq!(compiler.stats().generations(), after_first);
    }

    #[test]
    fn test_unresolved_dependency() {
        let source = parse_source(
            r#"class F : FragmentShader {
                [Out, Layout(location = 0)] vec4 color;
                void main() { color = new vec4(Noise.perlin(1.0)); }
            }"#,
            "f.asl",
        )
        .unwrap();
        let compiler = Compiler::default();
        let shader = compiler.compile(&source.classes[0]).unwrap();
        let err = Linker::new().link(&compiler, &shader).unwrap_err();
        assert!(matches!(err, AslError::UnresolvedDependency(ref m) if m.contains("Noise.perlin")));
    }

    #[test]
    fn test_wrong_arity_does_not_resolve() {
        let (_, linker, _) = setup();
        let dep = FunctionDependency::new("Lighting.lambert", "lambert", 3);
        assert!(matches!(linker.resolve(&dep), Err(AslError::UnresolvedDependency(_))));
        let (owner, method) = linker.resolve(&FunctionDependency::new("bias", "bias", 0)).unwrap();
        assert_eq!((owner, method.name.as_str()), ("Lighting", "bias"));
    }

    #[test]
    fn test_library_recursion_rejected() {
        let source = parse_source(
            r#"static class Loop {
                static float a(float x) { return b(x); }
                static float b(float x) { return a(x); }
            }
            class F : FragmentShader {
                [Out, Layout(location = 0)] vec4 color;
                void main() { color = new vec4(Loop.a(1.0)); }
            }"#,
            "loop.asl",
        )
        .unwrap();
        let compiler = Compiler::default();
        let shader = compiler.compile(source.class("F").unwrap()).unwrap();
        let linker = Linker::from_source(&source).unwrap();
        let err = linker.link(&compiler, &shader).unwrap_err();
        assert_eq!(err.construct(), Some(Construct::Recursion));
    }

    #[test]
    fn test_only_libraries_register() {
        let source = parse_source("class V : VertexShader { void main() { } }", "v.asl").unwrap();
        let mut linker = Linker::new();
        assert!(linker.add_library(source.classes[0].clone()).is_err());
        assert_eq!(linker.library_names().count(), 0);
    }
}
