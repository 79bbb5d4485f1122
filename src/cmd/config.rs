//! Configuration view and validation commands: `synapse config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use synapse::studio_config::SynapseToml;

    let synapse_dir = project_dir.join(".synapse");
    let config_path = synapse_dir.join("synapse.toml");

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Synapse Configuration");
            println!("=====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();

                let toml = SynapseToml::load(&config_path)?;
                print_sections(&toml);

                println!("Effective values (with env/CLI overrides):");
                let config =
                    synapse::config::Config::new(project_dir.to_path_buf(), false, false, None)?;
                println!("  claude_cmd = \"{}\"", config.claude_cmd);
                println!("  offline = {}", config.offline);
                println!("  store_dir = {}", config.store_dir.display());
                println!();
            } else {
                println!("No synapse.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_sections(&SynapseToml::default());
                println!("Run 'synapse config init' to create a synapse.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No synapse.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = SynapseToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("synapse.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !synapse_dir.exists() {
                std::fs::create_dir_all(&synapse_dir)?;
            }

            let toml = SynapseToml::default();
            toml.save(&config_path)?;

            println!("Created synapse.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [project] name");
            println!("  - [workflow] max_parallel, time_scale, stages_file");
            println!("  - [generation] claude_cmd, offline");
            println!("  - [server] host, port");
            println!("  - [storage] store_dir, debounce_ms");
            println!();
        }
    }

    Ok(())
}

fn print_sections(toml: &synapse::studio_config::SynapseToml) {
    if let Some(name) = &toml.project.name {
        println!("[project]");
        println!("  name = \"{}\"", name);
        println!();
    }

    println!("[workflow]");
    println!("  max_parallel = {}", toml.workflow.max_parallel);
    println!("  time_scale = {}", toml.workflow.time_scale);
    if let Some(stages_file) = &toml.workflow.stages_file {
        println!("  stages_file = \"{}\"", stages_file.display());
    }
    println!();

    println!("[generation]");
    if let Some(cmd) = &toml.generation.claude_cmd {
        println!("  claude_cmd = \"{}\"", cmd);
    }
    println!("  offline = {}", toml.generation.offline);
    println!();

    println!("[server]");
    println!("  host = \"{}\"", toml.server.host);
    println!("  port = {}", toml.server.port);
    println!();

    println!("[storage]");
    if let Some(store_dir) = &toml.storage.store_dir {
        println!("  store_dir = \"{}\"", store_dir.display());
    }
    println!("  debounce_ms = {}", toml.storage.debounce_ms);
    println!();
}
