//! Configuration loading helpers for the `drover` CLI.
//!
//! Configuration flags precede the command token. The leading run of
//! recognised flags is handed to `ortho_config`; the remainder is parsed by
//! `clap` into a subcommand.

use std::ffi::{OsStr, OsString};

use drover_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the program name plus configuration flags.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_args(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if text.starts_with("--") {
        let (flag, inline_value) = match text.split_once('=') {
            Some((flag, _)) => (flag, true),
            None => (text.as_ref(), false),
        };
        if super::CONFIG_CLI_FLAGS.contains(&flag) {
            return FlagAction::Include {
                needs_value: !inline_value,
            };
        }
        return FlagAction::Stop;
    }
    if super::CONFIG_SHORT_FLAGS.contains(&text.as_ref()) {
        return FlagAction::Include { needs_value: true };
    }
    FlagAction::Stop
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Splits `args` into `argv[0]` plus configuration flags, and `argv[0]` plus
/// the command tokens.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut remaining = rest.iter();
    let mut command_arguments = vec![program.clone()];
    while let Some(argument) = remaining.next() {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                if needs_value && let Some(value) = remaining.next() {
                    config_arguments.push(value.clone());
                }
            }
            FlagAction::Stop => {
                command_arguments.push(argument.clone());
                command_arguments.extend(remaining.cloned());
                break;
            }
        }
    }

    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
