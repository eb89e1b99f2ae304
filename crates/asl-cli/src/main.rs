use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use asl_core::types::{self, TypeShape};
use asl_core::AslConfig;
use asl_glsl::{CompiledShader, Compiler, FunctionDependency, Linker};
use asl_lang::{ClassDecl, ClassKind, SourceFile};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "aslc",
    version,
    about = "ASL shader compiler: C#-style shader classes to GLSL"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the shader classes of an ASL file to GLSL
    Compile {
        /// Path to the .asl source file
        #[arg()]
        file: PathBuf,

        /// Only compile the shader class with this name
        #[arg(short, long)]
        class: Option<String>,

        /// Directory to write `<Class>.<stage>` files into (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Annotate declarations with their source member
        #[arg(long)]
        debug: bool,

        /// Inline library functions from the same file
        #[arg(long)]
        link: bool,

        /// Print each shader's unresolved dependencies as JSON instead of source
        #[arg(long)]
        deps: bool,
    },

    /// Parse and compile every shader class, reporting errors
    Check {
        /// Path to the .asl source file
        #[arg()]
        file: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the type vocabulary
    Types,

    /// Print the default configuration as TOML
    Config,
}

#[derive(Serialize)]
struct DependencyReport<'a> {
    shader: &'a str,
    file: String,
    dependencies: &'a [FunctionDependency],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compile {
            file,
            class,
            out,
            config,
            debug,
            link,
            deps,
        } => {
            let mut config = load_config(config.as_deref())?;
            config.compile.debug |= debug;
            cmd_compile(&file, class.as_deref(), out.as_deref(), config, link, deps)
        }
        Commands::Check { file, config } => cmd_check(&file, load_config(config.as_deref())?),
        Commands::Types => cmd_types(),
        Commands::Config => {
            print!("{}", AslConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AslConfig> {
    match path {
        Some(path) => AslConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => Ok(AslConfig::default()),
    }
}

fn parse_file(file: &Path) -> Result<SourceFile> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read file: {}", file.display()))?;
    let name = file.file_name().unwrap_or_default().to_string_lossy();
    asl_lang::parse_source(&source, &name).with_context(|| format!("failed to parse {}", file.display()))
}

fn select_shaders<'a>(source: &'a SourceFile, class: Option<&str>) -> Result<Vec<&'a ClassDecl>> {
    match class {
        Some(name) => {
            let decl = source
                .class(name)
                .with_context(|| format!("no class named '{}'", name))?;
            if decl.kind == ClassKind::Library {
                anyhow::bail!("'{}' is a library class; compile a shader that uses it with --link", name);
            }
            Ok(vec![decl])
        }
        None => Ok(source.shaders().collect()),
    }
}

fn cmd_compile(
    file: &Path,
    class: Option<&str>,
    out: Option<&Path>,
    config: AslConfig,
    link: bool,
    deps: bool,
) -> Result<()> {
    let start = Instant::now();
    let source = parse_file(file)?;
    let classes = select_shaders(&source, class)?;
    if classes.is_empty() {
        anyhow::bail!("{} contains no shader classes", file.display());
    }

    let compiler = Compiler::new(config);
    let linker = if link {
        Some(Linker::from_source(&source).context("failed to register library classes")?)
    } else {
        None
    };

    let mut shaders = Vec::with_capacity(classes.len());
    for decl in classes {
        let shader = compiler
            .compile(decl)
            .with_context(|| format!("failed to compile '{}'", decl.name))?;
        shaders.push(shader);
    }

    if deps {
        let reports: Vec<_> = shaders
            .iter()
            .map(|s| DependencyReport {
                shader: &s.name,
                file: s.file_name(),
                dependencies: &s.dependencies,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    }

    for shader in &shaders {
        let text = render(&compiler, linker.as_ref(), shader)?;
        match out {
            Some(dir) => {
                let path = dir.join(shader.file_name());
                std::fs::write(&path, &text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(
                    shader = %shader.name,
                    path = %path.display(),
                    hash = %shader.content_hash().to_hex(),
                    "wrote shader"
                );
            }
            None => {
                println!("// {}", shader.file_name());
                print!("{}", text);
            }
        }
        if !link && !shader.dependencies.is_empty() {
            let names: Vec<String> = shader.dependencies.iter().map(|d| d.to_string()).collect();
            tracing::warn!(
                shader = %shader.name,
                "unresolved dependencies: {} (use --link to inline library functions)",
                names.join(", ")
            );
        }
    }

    tracing::info!(
        shaders = shaders.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "compile finished"
    );
    Ok(())
}

fn render(compiler: &Compiler, linker: Option<&Linker>, shader: &CompiledShader) -> Result<String> {
    match linker {
        Some(linker) => linker
            .link(compiler, shader)
            .with_context(|| format!("failed to link '{}'", shader.name)),
        None => Ok(shader.source()),
    }
}

fn cmd_check(file: &Path, config: AslConfig) -> Result<()> {
    println!("Checking {}", file.display());
    let source = parse_file(file)?;
    println!("   ✓ Parse OK ({} classes)", source.classes.len());

    let compiler = Compiler::new(config);
    let linker = Linker::from_source(&source);
    let mut failures = Vec::new();
    for decl in source.shaders() {
        let result = compiler.compile(decl).and_then(|shader| match &linker {
            Ok(linker) => linker.link(&compiler, &shader).map(|_| shader),
            Err(_) => Ok(shader),
        });
        match result {
            Ok(shader) => println!("   ✓ {} -> {}", decl.name, shader.file_name()),
            Err(e) => {
                println!("   ✗ {}: {}", decl.name, e);
                failures.push(decl.name.clone());
            }
        }
    }
    if let Err(e) = &linker {
        println!("   ✗ libraries: {}", e);
        failures.push("libraries".to_string());
    }

    if !failures.is_empty() {
        anyhow::bail!("{} class(es) failed: {}", failures.len(), failures.join(", "));
    }
    println!("   ✓ All shader classes compile");
    Ok(())
}

fn cmd_types() -> Result<()> {
    for ty in types::vocabulary() {
        let shape = match ty.shape {
            TypeShape::Void => "void".to_string(),
            TypeShape::Scalar => "scalar".to_string(),
            TypeShape::Vector(n) => format!("vector of {}", n),
            TypeShape::Matrix { columns, rows } => format!("matrix {}x{}", columns, rows),
            TypeShape::Sampler => "sampler".to_string(),
        };
        match ty.kind {
            Some(kind) => println!("{:<18} {:<14} {}", ty.name, shape, kind.scalar_name()),
            None => println!("{:<18} {}", ty.name, shape),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        static class Util { static float halve(float x) { return x * 0.5; } }
        class Pass : VertexShader {
            [In, Layout(location = 0)] vec4 position;
            void main() { gl_Position = position * Util.halve(2); }
        }
    "#;

    #[test]
    fn test_cli_parses_compile_flags() {
        let cli = Cli::try_parse_from(["aslc", "compile", "a.asl", "--class", "Pass", "--link", "--debug"]).unwrap();
        match cli.command {
            Commands::Compile {
                file,
                class,
                link,
                debug,
                deps,
                ..
            } => {
                assert_eq!(file, PathBuf::from("a.asl"));
                assert_eq!(class.as_deref(), Some("Pass"));
                assert!(link && debug && !deps);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_select_rejects_library_class() {
        let source = asl_lang::parse_source(SOURCE, "a.asl").unwrap();
        assert!(select_shaders(&source, Some("Util")).is_err());
        assert!(select_shaders(&source, Some("Missing")).is_err());
        assert_eq!(select_shaders(&source, None).unwrap().len(), 1);
    }

    #[test]
    fn test_render_links_when_requested() {
        let source = asl_lang::parse_source(SOURCE, "a.asl").unwrap();
        let compiler = Compiler::default();
        let shader = compiler.compile(source.class("Pass").unwrap()).unwrap();
        let linker = Linker::from_source(&source).unwrap();
        let linked = render(&compiler, Some(&linker), &shader).unwrap();
        assert!(linked.contains("float halve(float x) {"));
        let plain = render(&compiler, None, &shader).unwrap();
        assert!(!plain.contains("float halve("));
    }

    #[test]
    fn test_dependency_report_json() {
        let dependencies = vec![FunctionDependency::new("Util.halve", "halve", 1)];
        let report = DependencyReport {
            shader: "Pass",
            file: "Pass.vert".to_string(),
            dependencies: &dependencies,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dependencies"][0]["qualified_name"], "Util.halve");
        assert_eq!(json["dependencies"][0]["arity"], 1);
    }
}
