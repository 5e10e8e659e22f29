use anyhow::{Result, anyhow};
use clap::CommandFactory;
use rayon::prelude::*;

use crate::{
    CancellationToken,
    cli::{
        Cli,
        args::{self, CommandLine, GlobalFlags},
        handlers::{self, commons::{self, Session}},
    },
    models::{DispatchResult, LocalCall},
    system::backend::{self, CommandOutput, CommandTable},
};

// --- Command Definition and Registry ---

/// How a command gets to its site.
#[derive(Debug, Clone, Copy)]
pub enum CommandScope {
    /// Runs against a site record; forwarded over ssh when the record is remote.
    Site(fn(&LocalCall) -> Result<CommandOutput>),
    /// Always runs here and drives external programs itself.
    Session(fn(&mut Session, &CommandLine) -> Result<DispatchResult>),
}

/// A command, its aliases, and its handler.
#[derive(Debug)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub scope: CommandScope,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "browse",
        aliases: &[],
        scope: CommandScope::Session(handlers::browse::handle),
    },
    CommandDefinition {
        name: "core-rsync",
        aliases: &["rsync"],
        scope: CommandScope::Session(handlers::rsync::handle),
    },
    CommandDefinition {
        name: "site-alias",
        aliases: &["sa"],
        scope: CommandScope::Session(handlers::site_alias::handle),
    },
    CommandDefinition {
        name: "site-ssh",
        aliases: &["ssh"],
        scope: CommandScope::Session(handlers::ssh::handle),
    },
    CommandDefinition {
        name: "sql-conf",
        aliases: &["sqlc"],
        scope: CommandScope::Site(handlers::sql_conf::handle),
    },
    CommandDefinition {
        name: "status",
        aliases: &["st"],
        scope: CommandScope::Site(handlers::status::handle),
    },
    CommandDefinition {
        name: "version",
        aliases: &[],
        scope: CommandScope::Site(handlers::version::handle),
    },
];

/// Finds a command definition in the registry by its name or alias.
pub fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// The in-process side of the backend protocol: site-scoped commands by name.
#[derive(Debug, Clone, Copy)]
pub struct Registry;

impl CommandTable for Registry {
    fn run_local(&self, call: &LocalCall) -> Result<CommandOutput> {
        match find_command(&call.command).map(|def| def.scope) {
            Some(CommandScope::Site(handler)) => handler(call),
            Some(CommandScope::Session(_)) => Err(anyhow!(
                t!("dispatch.error.not_site_scoped"),
                command = call.command
            )),
            None => Err(anyhow!(t!("dispatch.error.unknown_command"), command = call.command)),
        }
    }
}

/// The main application dispatcher. Returns the process exit status.
pub fn dispatch(cli: Cli, cancellation_token: CancellationToken) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut flags = GlobalFlags::from(&cli);
    let mut line = args::parse_command_line(&cli.args)?;
    flags.absorb(&mut line.options);

    let Some(command) = line.command.clone() else {
        if flags.backend {
            return Err(anyhow!(t!("dispatch.error.no_command")));
        }
        Cli::command().print_help()?;
        return Ok(0);
    };

    let backend_mode = flags.backend;
    let mut session = Session::new(flags, cancellation_token)?;
    let definition = find_command(&command);

    let result = match definition.map(|def| def.scope) {
        Some(CommandScope::Session(handler)) => handler(&mut session, &line)?,
        Some(CommandScope::Site(_)) | None => {
            let targets = session.targets(line.token.as_ref())?;
            if definition.is_none() && targets.iter().all(|site| !crate::core::dispatch::is_remote(site)) {
                return Err(anyhow!(t!("dispatch.error.unknown_command"), command = command));
            }

            if let [site] = targets.as_slice() {
                session.run_on_site(site, definition, &command, &line.args, &line.options)
            } else {
                log::debug!("Fanning '{}' out to {} sites", command, targets.len());
                let session = &session;
                let results: Vec<(String, DispatchResult)> = targets
                    .par_iter()
                    .map(|site| {
                        let result = session.run_on_site(site, definition, &command, &line.args, &line.options);
                        (site.name.clone(), result)
                    })
                    .collect();
                commons::aggregate(results)
            }
        }
    };

    if backend_mode {
        println!("{}", backend::backend_wire_line(result.clone()));
    } else {
        commons::render(&result);
    }
    Ok(result.error_status)
}
