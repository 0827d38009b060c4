//! Configuration loading with layered precedence.
//!
//! Layers are merged lowest to highest: application defaults, configuration
//! file, environment variables, command-line arguments.
//!
//! The layers are composed with `MergeComposer` directly rather than through
//! the derived `load()`, because subcommand arguments live on [`Cli`] and
//! typed environment variables must fail fast instead of being ignored.
//!
//! # Environment Variable Handling
//!
//! String fields (e.g. `CONDUCTOR_ENGINE_SOCKET`) are always accepted. Typed
//! fields such as `CONDUCTOR_CONDUCTOR_REMOVE_INTERMEDIATE` must hold a valid
//! value or loading fails with `ConfigError::InvalidValue`.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::{DefaultEnv, Env};
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli, Commands};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Boolean value (`true`/`false`). Invalid values return an error.
    Bool,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "CONDUCTOR_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CONDUCTOR_PROJECT_NAME",
        path: &["project_name"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CONDUCTOR_CONDUCTOR_BASE_IMAGE",
        path: &["conductor", "base_image"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CONDUCTOR_CONDUCTOR_ASSETS_DIR",
        path: &["conductor", "assets_dir"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CONDUCTOR_CONDUCTOR_REMOVE_INTERMEDIATE",
        path: &["conductor", "remove_intermediate"],
        var_type: EnvVarType::Bool,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `CONDUCTOR_*` variable before loading.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    tracing::debug!(path = %path, "loaded configuration file");
    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration with full layer precedence from the process
/// environment.
///
/// # Errors
///
/// Returns the errors of [`load_config_with_env`].
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &DefaultEnv::new())
}

/// Load configuration with full layer precedence.
///
/// 1. Application defaults
/// 2. Configuration file (`--config`, `CONDUCTOR_CONFIG_PATH`, or discovery)
/// 3. `CONDUCTOR_*` environment variables read through `env`
/// 4. Command-line arguments
///
/// # Errors
///
/// Returns `ConfigError` if a configuration file is malformed, a typed
/// environment variable holds an invalid value, or the merge fails.
pub fn load_config_with_env<E: Env>(cli: &Cli, env: &E) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(ref path) = resolve_config_path(cli, env) {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    Ok(config)
}

fn resolve_config_path<E: Env>(cli: &Cli, env: &E) -> Option<Utf8PathBuf> {
    if let Some(path) = cli.config.clone().filter(|p| p.exists()) {
        return Some(path);
    }
    if let Some(path) = env
        .string("CONDUCTOR_CONFIG_PATH")
        .map(Utf8PathBuf::from)
        .filter(|p| p.exists())
    {
        return Some(path);
    }

    let discovery = ConfigDiscovery::builder("conductor-engine")
        .config_file_name("config.toml")
        .dotfile_name(".conductor-engine.toml")
        .build();
    discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok())
}

/// Collect `CONDUCTOR_*` environment variables into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed variable cannot be parsed.
fn collect_env_vars<E: Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::Bool => match raw_value.parse::<bool>() {
                Ok(b) => Value::Bool(b),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected bool (true/false), got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref socket) = cli.engine_socket {
        overrides.insert("engine_socket".to_owned(), Value::String(socket.clone()));
    }
    if let Some(ref project) = cli.project {
        overrides.insert("project_name".to_owned(), Value::String(project.clone()));
    }

    if let Commands::BuildConductor(ref args) = cli.command {
        if let Some(ref base_image) = args.base_image {
            insert_at_path(
                &mut overrides,
                &["conductor", "base_image"],
                Value::String(base_image.clone()),
            );
        }
        if let Some(ref assets_dir) = args.assets_dir {
            insert_at_path(
                &mut overrides,
                &["conductor", "assets_dir"],
                Value::String(assets_dir.to_string()),
            );
        }
        if args.keep_intermediate {
            insert_at_path(
                &mut overrides,
                &["conductor", "remove_intermediate"],
                Value::Bool(false),
            );
        }
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
