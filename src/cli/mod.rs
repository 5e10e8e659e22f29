use clap::Parser;
use std::path::PathBuf;

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// Builds the colour-aware help text at runtime.
fn build_help_string() -> &'static str {
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// siteshell: run site administration commands locally or on the site's host.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Extra alias locations, searched before the default ones.
    #[arg(long = "alias-path", value_name = "PATHS")]
    pub alias_path: Vec<String>,

    /// Root of the site to bootstrap.
    #[arg(short = 'r', long, value_name = "PATH")]
    pub root: Option<String>,

    /// URI of the site to bootstrap.
    #[arg(short = 'l', long, value_name = "URI")]
    pub uri: Option<String>,

    /// Print external commands instead of running them.
    #[arg(short = 's', long)]
    pub simulate: bool,

    /// Assume "yes" for every confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print one JSON result line at the end of the output.
    #[arg(long)]
    pub backend: bool,

    /// Time limit for remote commands, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Settings file to use instead of the default one.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// `[@alias] <command> [args...] [--option=value...]`
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Whether backend mode was requested, before or after the command.
    pub fn wants_backend(&self) -> bool {
        self.backend || self.args.iter().any(|arg| arg == crate::constants::BACKEND_FLAG)
    }
}
