#![forbid(unsafe_code)]

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, WrapErr, miette};
use polyguard_core::{
    advise, check_for_orphaned_user_hardware_axes, check_variants, filter_variants,
};
use polyguard_kernel::{AffineAnalysis, Kernel};
use polyguard_verify::{check_implemented_domains, load_implemented};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, parse_param};

#[derive(Parser, Debug)]
#[command(name = "polyguard", version, about = "Static checks for generated accelerator kernels")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Validate kernel snapshots and run the full check suite on each
    Check {
        /// Kernel snapshot(s) in JSON
        #[arg(required = true)]
        kernels: Vec<PathBuf>,
    },

    /// Check that every requested local axis has an iname bound to it
    Orphans {
        kernel: PathBuf,
    },

    /// Compare the domains generated code iterates against the desired ones
    VerifyDomains {
        kernel: PathBuf,

        /// JSON object mapping instruction ids to lists of domain pieces
        implemented: PathBuf,

        /// Generated code, shown alongside a mismatch
        #[arg(long)]
        code: Option<PathBuf>,
    },

    /// Judge whether kernel variants fit the configured device
    Advise {
        #[arg(required = true)]
        kernels: Vec<PathBuf>,

        /// Config file (default: ./polyguard.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Parameter value, overriding `[parameters]` (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, i64)>,
    },
}

fn read(path: &Path) -> miette::Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

fn load_kernel(path: &Path) -> miette::Result<Kernel> {
    let kernel = Kernel::from_json(&read(path)?)?;
    Ok(kernel)
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Check { kernels } => {
            let loaded = kernels
                .iter()
                .map(|p| load_kernel(p))
                .collect::<miette::Result<Vec<_>>>()?;
            let verdicts = check_variants(&loaded);
            let mut failed = 0usize;
            for (kernel, verdict) in loaded.iter().zip(verdicts) {
                match verdict {
                    Ok(()) => println!("{}: ok", kernel.name),
                    Err(err) => {
                        failed += 1;
                        println!("{}: {:?} check failed", kernel.name, err.kind());
                        eprintln!("{:?}", miette::Report::new(err));
                    }
                }
            }
            if failed > 0 {
                return Err(miette!("{failed} of {} kernels failed", loaded.len()));
            }
            Ok(())
        }
        Cmd::Orphans { kernel } => {
            let kernel = load_kernel(&kernel)?;
            check_for_orphaned_user_hardware_axes(&kernel, &AffineAnalysis)?;
            println!("{}: ok", kernel.name);
            Ok(())
        }
        Cmd::VerifyDomains {
            kernel,
            implemented,
            code,
        } => {
            let kernel = load_kernel(&kernel)?;
            let records = load_implemented(&read(&implemented)?)?;
            let code = code.as_deref().map(read).transpose()?;
            check_implemented_domains(&kernel, &records, code.as_deref())?;
            println!(
                "{}: {} implemented domains match",
                kernel.name,
                records.len()
            );
            Ok(())
        }
        Cmd::Advise {
            kernels,
            config,
            params,
        } => {
            let cfg = load_config(config.as_deref())?.with_overrides(&params);
            let device = cfg
                .device
                .ok_or_else(|| miette!("no [device] section in the configuration"))?;
            let loaded = kernels
                .iter()
                .map(|p| load_kernel(p))
                .collect::<miette::Result<Vec<_>>>()?;

            for kernel in &loaded {
                let advisory = advise(kernel, &device, &cfg.parameters);
                println!("{}: max severity {}", kernel.name, advisory.max_severity);
                for problem in &advisory.messages {
                    println!("  [{}] {}", problem.severity, problem.message);
                }
            }

            let total = loaded.len();
            let kept = filter_variants(loaded, &device, &cfg.parameters, cfg.advisory).count();
            info!(kept, total, "advisory filter applied");
            if kept < total {
                return Err(miette!(
                    "{} of {total} kernels reach severity {} or above",
                    total - kept,
                    cfg.advisory.kill_level_min
                ));
            }
            Ok(())
        }
    }
}
