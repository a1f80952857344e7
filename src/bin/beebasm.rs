use std::{
    error::Error,
    fs,
    io,
    path::PathBuf,
    process::ExitCode,
};

use beebasm::{
    assemble,
    config::{Config, ConfigError},
    symtab,
    CancelToken, FileSystemProvider, Options,
};
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Assembly source file
    source: PathBuf,

    /// Filename for SAVE directives that do not name one
    #[arg(short, long)]
    output: Option<String>,

    /// Directory that saved files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Project settings (default: beebasm.toml beside the source)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pre-defined symbols (repeatable)
    #[arg(short = 'D', long, value_name="KEY1=val", value_parser = beebasm::parse_defines::<String, f64>)]
    define: Vec<(String, f64)>,

    /// Search directories for included files
    #[arg(short = 'I', long)]
    include: Vec<PathBuf>,

    /// 0 for the 6502, 1 for the 65C02
    #[arg(long)]
    cpu: Option<u8>,

    /// Print the symbol table after assembling
    #[arg(short = 'v', long)]
    symbols: bool,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = main_real(args) {
        tracing::error!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn load_config(args: &Args) -> Result<Config, ConfigError> {
    match &args.config {
        Some(path) => Config::load(path),
        None => Ok(Config::discover(&args.source)?.unwrap_or_default()),
    }
}

fn main_real(args: Args) -> Result<(), Box<dyn Error>> {
    let source = fs::canonicalize(&args.source).map_err(|e| format!("cant open file: {e}"))?;
    let config = load_config(&args)?;

    // command line settings win over the project file
    let mut defines: Vec<(String, f64)> = config.defines.into_iter().collect();
    for (name, value) in args.define {
        defines.retain(|(existing, _)| *existing != name);
        defines.push((name, value));
    }
    let options = Options {
        defines,
        cpu: args.cpu.or(config.cpu).unwrap_or(0),
        default_output: args.output.or(config.output),
    };
    if options.cpu > 1 {
        return Err(format!("unsupported cpu: {}", options.cpu).into());
    }

    let mut includes = args.include;
    includes.extend(config.include);
    let provider = FileSystemProvider::new(includes);

    tracing::trace!("assembling {}", source.display());
    let assembly = assemble(&source, &provider, options, &CancelToken::never())?;

    for (path, diags) in assembly.diagnostics() {
        for diag in diags {
            tracing::error!("{}:{diag}", path.display());
        }
    }
    if assembly.has_errors() {
        return Err("assembly failed".into());
    }

    if args.symbols {
        for (name, sym) in assembly.symbols().iter() {
            let base = symtab::base_name(name);
            if base == name {
                println!("{name} = {}", sym.value);
            } else {
                println!("{base} = {} ({name})", sym.value);
            }
        }
    }

    for save in assembly.saves() {
        let path = args.out_dir.join(&save.name);
        tracing::info!(
            "saving {} &{:04X}-&{:04X} exec &{:04X}",
            path.display(),
            save.start,
            save.end,
            save.exec
        );
        fs::write(&path, assembly.memory(save.start..save.end))
            .map_err(|e| format!("cant write {}: {e}", path.display()))?;
    }

    tracing::debug!("used {} bytes", assembly.objcode().used_bytes());
    Ok(())
}
