mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{call::CallOptions, exit_code_for, Context};
use octave_bridge_core::install_signal_handler;
use octave_bridge_runtime::BridgeConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "octave-bridge",
    version,
    about = "Call GNU Octave functions from the host, in a container or locally"
)]
struct Cli {
    /// Workspace directory shared with the interpreter.
    #[arg(long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging and echo generated scripts.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check which Octave runtimes are usable.
    Doctor,
    /// Start a runtime and describe it.
    Info {
        /// Prefer a local interpreter over the container.
        #[arg(long, default_value_t = false)]
        local: bool,
    },
    /// Call an Octave function and print its result as JSON.
    Call {
        /// Function name, e.g. `plus` or `pkg.func`.
        function: String,
        /// Arguments; each is parsed as JSON, falling back to text.
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
        /// Number of outputs to request.
        #[arg(long, default_value_t = 1)]
        nout: usize,
        /// Name to store a single output under.
        #[arg(long)]
        store_as: Option<String>,
        /// Directory to add to the Octave path.
        #[arg(long = "path")]
        paths: Vec<String>,
        /// Directory whose whole tree is added to the Octave path.
        #[arg(long = "genpath")]
        genpaths: Vec<String>,
        /// Statement evaluated before the call.
        #[arg(long = "eval")]
        evals: Vec<String>,
        /// Prefer a local interpreter over the container.
        #[arg(long, default_value_t = false)]
        local: bool,
    },
    /// List Octave processes still running in the runtime.
    Ps {
        #[arg(long, default_value_t = false)]
        local: bool,
    },
    /// Kill Octave processes still running in the runtime.
    Kill {
        #[arg(long, default_value_t = false)]
        local: bool,
    },
    /// Stop and remove the container.
    Stop,
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages.
    ManPages {
        /// Output directory.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn load_context(cli: &Cli) -> Result<Context, String> {
    let workspace = cli.workspace.canonicalize().map_err(|e| {
        format!(
            "failed to resolve workspace {}: {e}",
            cli.workspace.display()
        )
    })?;
    let mut config = BridgeConfig::load(&workspace).map_err(|e| format!("config error: {e}"))?;
    if cli.verbose {
        config.verbose = true;
    }
    tracing::debug!(
        "workspace {}, container {}, image {}",
        config.workspace.display(),
        config.container_name,
        config.image_tag
    );
    Ok(Context {
        config,
        json: cli.json,
    })
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OCTAVE_BRIDGE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    match dispatch(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn dispatch(cli: &Cli) -> Result<u8, String> {
    let ctx = || load_context(cli);
    match &cli.command {
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(dir),
        Commands::Doctor => commands::doctor::run(&ctx()?),
        Commands::Info { local } => commands::info::run(&ctx()?, *local),
        Commands::Call {
            function,
            args,
            nout,
            store_as,
            paths,
            genpaths,
            evals,
            local,
        } => commands::call::run(
            &ctx()?,
            &CallOptions {
                function,
                args,
                nout: *nout,
                store_as: store_as.as_deref(),
                paths,
                genpaths,
                evals,
                local: *local,
            },
        ),
        Commands::Ps { local } => commands::hygiene::ps(&ctx()?, *local),
        Commands::Kill { local } => commands::hygiene::kill(&ctx()?, *local),
        Commands::Stop => commands::stop::run(&ctx()?),
    }
}
