use sismograph_core::load_statechart_file;
use sismograph_render::{OutputSyntax, RenderOptions, render};
use std::path::PathBuf;

mod html;
mod raster;
mod server;
mod session;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Model(sismograph_core::Error),
    Render(sismograph_render::Error),
    Raster(raster::RasterError),
    Serve(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Model(err) => write!(f, "{err}"),
            CliError::Render(err) => write!(f, "{err}"),
            CliError::Raster(err) => write!(f, "{err}"),
            CliError::Serve(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<sismograph_core::Error> for CliError {
    fn from(value: sismograph_core::Error) -> Self {
        Self::Model(value)
    }
}

impl From<sismograph_render::Error> for CliError {
    fn from(value: sismograph_render::Error) -> Self {
        Self::Render(value)
    }
}

impl From<raster::RasterError> for CliError {
    fn from(value: raster::RasterError) -> Self {
        Self::Raster(value)
    }
}

#[derive(Debug, Default)]
struct Args {
    input: Option<String>,
    interactive: bool,
    out: Option<String>,
    file_type: Option<String>,
    include_guards: bool,
    include_actions: bool,
    edge_fontsize: u32,
}

const DEFAULT_ADDR: &str = "127.0.0.1:5000";

fn usage() -> &'static str {
    "sismograph\n\
\n\
USAGE:\n\
  sismograph-cli <statechart.yaml> -o <output> [-T dot|plantuml|png|svg|pdf|...] [--no-guards] [--no-actions] [--trans-font-size <n>]\n\
  sismograph-cli <statechart.yaml> -it [--no-guards] [--no-actions] [--trans-font-size <n>]\n\
\n\
NOTES:\n\
  - Exactly one of -o/--output and -it/--interactive is required.\n\
  - -T defaults to dot for -o; types other than dot/plantuml are passed to Graphviz `dot -T<type>`.\n\
  - -it serves an interactive interpreter page on http://127.0.0.1:5000/.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        include_guards: true,
        include_actions: true,
        edge_fontsize: 14,
        ..Default::default()
    };

    let mut it = argv.iter().skip(1).peekable();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "-it" | "--interactive" => args.interactive = true,
            "-o" | "--output" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "-T" | "--file-type" => {
                let Some(ty) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.file_type = Some(ty.trim().to_ascii_lowercase());
            }
            "--no-guards" => args.include_guards = false,
            "--no-actions" => args.include_actions = false,
            "--trans-font-size" => {
                let Some(size) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.edge_fontsize = size.parse::<u32>().map_err(|_| CliError::Usage(usage()))?;
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.input.is_none() {
        return Err(CliError::Usage(usage()));
    }
    if args.interactive == args.out.is_some() {
        // Neither or both of the two modes.
        return Err(CliError::Usage(usage()));
    }

    Ok(args)
}

fn run(args: Args) -> Result<(), CliError> {
    let input = PathBuf::from(args.input.as_deref().unwrap_or_default());
    let options = RenderOptions {
        include_guards: args.include_guards,
        include_actions: args.include_actions,
        edge_fontsize: args.edge_fontsize,
    };

    if args.interactive {
        let session = session::Session::open(&input, options)?;
        return server::serve(session, DEFAULT_ADDR).map_err(CliError::Serve);
    }

    let out = PathBuf::from(args.out.as_deref().unwrap_or_default());
    let chart = load_statechart_file(&input)?;
    let configuration = indexmap::IndexSet::new();
    let file_type = args.file_type.as_deref().unwrap_or("dot");

    match file_type.parse::<OutputSyntax>() {
        Ok(syntax) => {
            let text = render(&chart, &configuration, &options, syntax)?;
            std::fs::write(&out, text)?;
        }
        Err(_) => {
            // Anything else is a Graphviz output format.
            let dot_source = render(&chart, &configuration, &options, OutputSyntax::Dot)?;
            raster::rasterize_to_file(&dot_source, file_type, &out)?;
        }
    }
    Ok(())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
