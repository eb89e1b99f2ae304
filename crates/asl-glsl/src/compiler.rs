//! Compiler façade and the compiled-shader cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use asl_core::{hash_source, AslConfig, AslError, AslResult, ContentHash, Stage};
use asl_lang::ast::{ClassDecl, MethodDecl, Stmt};
use parking_lot::Mutex;

use crate::assemble;
use crate::codegen::{self, GeneratedFunction};
use crate::model::FunctionDependency;
use crate::normalize::normalize;
use crate::recover::{recover, SyntaxTree};
use crate::reflect::{reflect, Reflection};
use crate::typing::ClassContext;

/// Invocation counters for the pipeline phases.
#[derive(Debug, Default)]
pub struct CompileStats {
    reflections: AtomicUsize,
    recoveries: AtomicUsize,
    generations: AtomicUsize,
}

impl CompileStats {
    pub fn reflections(&self) -> usize {
        self.reflections.load(Ordering::Relaxed)
    }

    pub fn recoveries(&self) -> usize {
        self.recoveries.load(Ordering::Relaxed)
    }

    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::Relaxed)
    }
}

/// A finished shader unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    pub name: String,
    pub stage: Stage,
    pub reflection: Reflection,
    /// Everything above the first function.
    pub declarations: String,
    /// Functions in emission order, entry point last.
    pub functions: Vec<GeneratedFunction>,
    /// Functions the embedder (or a [`Linker`](crate::link::Linker)) must supply.
    pub dependencies: Vec<FunctionDependency>,
}

impl CompiledShader {
    /// The complete GLSL source.
    pub fn source(&self) -> String {
        let sections = std::iter::once(self.declarations.as_str())
            .chain(self.functions.iter().map(|f| f.text.as_str()));
        assemble::render_source(sections)
    }

    pub fn content_hash(&self) -> ContentHash {
        hash_source(&self.source())
    }

    /// `Basic.vert`, `Lit.frag`, ...
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.stage.file_extension())
    }
}

/// Orchestrates reflection, recovery, normalization, generation and assembly.
#[derive(Debug, Default)]
pub struct Compiler {
    config: AslConfig,
    stats: CompileStats,
}

impl Compiler {
    pub fn new(config: AslConfig) -> Self {
        Self {
            config,
            stats: CompileStats::default(),
        }
    }

    pub fn config(&self) -> &AslConfig {
        &self.config
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    fn recover(&self, method: &MethodDecl) -> AslResult<SyntaxTree> {
        self.stats.recoveries.fetch_add(1, Ordering::Relaxed);
        recover(method)
    }

    fn generate(&self, mut tree: SyntaxTree, ctx: &ClassContext) -> AslResult<GeneratedFunction> {
        normalize(&mut tree);
        self.stats.generations.fetch_add(1, Ordering::Relaxed);
        codegen::generate(&tree, ctx, &self.config.glsl.indent)
    }

    /// Compile one method of `ctx`'s class in isolation.
    pub fn compile_method(&self, ctx: &ClassContext, method: &MethodDecl) -> AslResult<GeneratedFunction> {
        let tree = self.recover(method)?;
        self.generate(tree, ctx)
    }

    /// Compile a shader class into a complete shader unit.
    pub fn compile(&self, class: &ClassDecl) -> AslResult<CompiledShader> {
        let ctx = ClassContext::from_class(class);
        self.stats.reflections.fetch_add(1, Ordering::Relaxed);
        let reflection = reflect(class, &ctx, &self.config)?;
        let stage = reflection.unit.stage;

        // Every method is recovered before anything is assembled, so the
        // order of constructor and entry point in the class never matters.
        let mut trees = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            trees.push(self.recover(method)?);
        }
        let (constructors, mut trees): (Vec<_>, Vec<_>) = trees.into_iter().partition(|t| t.is_constructor);

        let mut prologue: Vec<Stmt> = Vec::new();
        for ctor in constructors {
            if !ctor.params.is_empty() {
                return Err(AslError::InvalidArgument(format!(
                    "constructor of '{}' takes parameters; shader constructors must be parameterless",
                    class.name
                )));
            }
            if !ctor.is_trivial() {
                prologue.extend(ctor.body.stmts);
            }
        }

        let mut entries = trees.iter_mut().filter(|t| t.is_entry_point());
        let main = entries.next().ok_or_else(|| {
            AslError::Recovery(format!("shader class '{}' has no main() entry point", class.name))
        })?;
        if entries.next().is_some() {
            return Err(AslError::InvalidArgument(format!(
                "shader class '{}' declares main() more than once",
                class.name
            )));
        }
        if !prologue.is_empty() {
            tracing::debug!(class = %class.name, statements = prologue.len(), "splicing constructor into main");
            main.splice_front(prologue);
        }

        let mut functions = Vec::with_capacity(trees.len());
        for tree in trees {
            functions.push(self.generate(tree, &ctx)?);
        }
        let functions = assemble::order_functions(functions, &class.name)?;

        let mut dependencies: Vec<FunctionDependency> = Vec::new();
        for dep in functions.iter().flat_map(|f| &f.dependencies) {
            if !dependencies.contains(dep) {
                dependencies.push(dep.clone());
            }
        }

        let declarations =
            assemble::declarations(&reflection.unit, &reflection.interface, &self.config.glsl.indent)?;
        tracing::debug!(
            class = %class.name,
            %stage,
            functions = functions.len(),
            dependencies = dependencies.len(),
            "compiled shader class"
        );
        Ok(CompiledShader {
            name: class.name.clone(),
            stage,
            reflection,
            declarations,
            functions,
            dependencies,
        })
    }
}

/// Lifecycle of one class in a [`CompilerCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uncompiled,
    Compiling,
    Cached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    /// The shader was already in the cache.
    Memory,
    /// The compiler ran and the result was inserted.
    Compiled,
}

#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub source: LookupSource,
    shader: Arc<CompiledShader>,
}

impl CacheLookup {
    pub fn shader(&self) -> Arc<CompiledShader> {
        Arc::clone(&self.shader)
    }
}

impl std::ops::Deref for CacheLookup {
    type Target = CompiledShader;

    fn deref(&self) -> &Self::Target {
        &self.shader
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Arc<CompiledShader>>,
    /// Class name → compiles currently in flight.
    compiling: HashMap<String, usize>,
}

/// Compiled shaders keyed by class name.
///
/// Entries are never evicted. A failed compile leaves no entry, so the next
/// lookup retries from scratch. The lock is not held while compiling.
#[derive(Default)]
pub struct CompilerCache {
    inner: Mutex<CacheInner>,
}

impl CompilerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, class: &str) -> CacheState {
        let inner = self.inner.lock();
        if inner.entries.contains_key(class) {
            CacheState::Cached
        } else if inner.compiling.contains_key(class) {
            CacheState::Compiling
        } else {
            CacheState::Uncompiled
        }
    }

    pub fn get(&self, class: &str) -> Option<Arc<CompiledShader>> {
        self.inner.lock().entries.get(class).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_or_compile(&self, compiler: &Compiler, class: &ClassDecl) -> AslResult<CacheLookup> {
        if let Some(shader) = self.begin(&class.name) {
            return Ok(CacheLookup {
                source: LookupSource::Memory,
                shader,
            });
        }
        let result = compiler.compile(class);
        self.finish(&class.name, result).map(|shader| CacheLookup {
            source: LookupSource::Compiled,
            shader,
        })
    }

    /// The cached shader, or `None` after registering one more in-flight compile.
    fn begin(&self, class: &str) -> Option<Arc<CompiledShader>> {
        let mut inner = self.inner.lock();
        if let Some(shader) = inner.entries.get(class) {
            return Some(Arc::clone(shader));
        }
        *inner.compiling.entry(class.to_string()).or_insert(0) += 1;
        None
    }

    fn finish(&self, class: &str, result: AslResult<CompiledShader>) -> AslResult<Arc<CompiledShader>> {
        let mut inner = self.inner.lock();
        if let Some(count) = inner.compiling.get_mut(class) {
            *count -= 1;
            if *count == 0 {
                inner.compiling.remove(class);
            }
        }
        let compiled = result?;
        // A concurrent compile of the same class may have finished first.
        let shader = Arc::clone(
            inner
                .entries
                .entry(class.to_string())
                .or_insert_with(|| Arc::new(compiled)),
        );
        tracing::info!(class = %class, cached = inner.entries.len(), "cached compiled shader");
        Ok(shader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asl_lang::parse_source;

    const BASIC: &str = r#"
        class Basic : VertexShader {
            [Uniform] mat4 viewProjection;
            [In, Layout(location = 0)] vec3 position;
            [Out] vec3 tint;
            float scale;
            Basic() { scale = 2; }
            void main() {
                tint = new vec3(scale);
                gl_Position = viewProjection * new vec4(position, 1);
            }
        }
    "#;

    fn class(src: &str) -> ClassDecl {
        parse_source(src, "c.asl").unwrap().classes.remove(0)
    }

    #[test]
    fn test_constructor_spliced_into_main() {
        let shader = Compiler::default().compile(&class(BASIC)).unwrap();
        let main = shader.functions.last().unwrap();
        assert_eq!(main.name, "main");
        let ctor = main.text.find("scale = 2.0f;").unwrap();
        let body = main.text.find("tint = vec3(scale);").unwrap();
        assert!(ctor < body);
        assert!(!shader.source().contains("Basic("));
    }

    #[test]
    fn test_constructor_after_main_in_source() {
        let src = r#"class C : FragmentShader {
            [Out, Layout(location = 0)] vec4 color;
            void main() { color = new vec4(0.5); }
            C() { color = new vec4(1); }
        }"#;
        let shader = Compiler::default().compile(&class(src)).unwrap();
        let text = &shader.functions[0].text;
        assert!(text.find("vec4(1.0f)").unwrap() < text.find("vec4(0.5f)").unwrap());
    }

    #[test]
    fn test_constructor_parameters_rejected() {
        let src = "class C : VertexShader { C(float x) { } void main() { } }";
        let err = Compiler::default().compile(&class(src)).unwrap_err();
        assert!(matches!(err, AslError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_main() {
        let src = "class C : VertexShader { void helper() { } }";
        let err = Compiler::default().compile(&class(src)).unwrap_err();
        assert!(matches!(err, AslError::Recovery(_)));
    }

    #[test]
    fn test_cache_short_circuits() {
        let compiler = Compiler::default();
        let cache = CompilerCache::new();
        let basic = class(BASIC);
        assert_eq!(cache.state("Basic"), CacheState::Uncompiled);

        let first = cache.get_or_compile(&compiler, &basic).unwrap();
        assert_eq!(first.source, LookupSource::Compiled);
        assert_eq!(cache.state("Basic"), CacheState::Cached);
        let reflections = compiler.stats().reflections();
        let recoveries = compiler.stats().recoveries();
        let generations = compiler.stats().generations();

        let second = cache.get_or_compile(&compiler, &basic).unwrap();
        assert_eq!(second.source, LookupSource::Memory);
        assert_eq!(first.source(), second.source());
        assert_eq!(compiler.stats().reflections(), reflections);
        assert_eq!(compiler.stats().recoveries(), recoveries);
        assert_eq!(compiler.stats().generations(), generations);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_compile_is_not_cached() {
        let compiler = Compiler::default();
        let cache = CompilerCache::new();
        let broken = class("class Broken : VertexShader { void main() { throw new Exception(); } }");
        assert!(cache.get_or_compile(&compiler, &broken).is_err());
        assert_eq!(cache.state("Broken"), CacheState::Uncompiled);
        assert!(cache.is_empty());
        assert!(cache.get_or_compile(&compiler, &broken).is_err());
        assert_eq!(compiler.stats().reflections(), 2);
    }

    #[test]
    fn test_state_tracks_overlapping_compiles() {
        let compiler = Compiler::default();
        let cache = CompilerCache::new();
        let basic = class(BASIC);
        assert!(cache.begin("Basic").is_none());
        assert!(cache.begin("Basic").is_none());
        assert_eq!(cache.state("Basic"), CacheState::Compiling);

        let first = compiler.compile(&basic);
        let shader = cache.finish("Basic", first).unwrap();
        assert_eq!(cache.state("Basic"), CacheState::Cached);

        let second = cache.finish("Basic", compiler.compile(&basic)).unwrap();
        assert!(Arc::ptr_eq(&shader, &second));
        assert!(cache.inner.lock().compiling.is_empty());
    }

    #[test]
    fn test_failed_overlapping_compile_keeps_state() {
        let cache = CompilerCache::new();
        cache.begin("Broken");
        cache.begin("Broken");
        let failed = Err(AslError::Recovery("no body".into()));
        assert!(cache.finish("Broken", failed).is_err());
        assert_eq!(cache.state("Broken"), CacheState::Compiling);
        assert!(cache.finish("Broken", Err(AslError::Recovery("no body".into()))).is_err());
        assert_eq!(cache.state("Broken"), CacheState::Uncompiled);
    }

    #[test]
    fn test_recompiling_is_deterministic() {
        let a = Compiler::default().compile(&class(BASIC)).unwrap();
        let b = Compiler::default().compile(&class(BASIC)).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.file_name(), "Basic.vert");
    }
}
