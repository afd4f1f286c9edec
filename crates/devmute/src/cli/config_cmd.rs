//! `config` subcommand — show effective configuration and file path.

use devmute_lib::policy::Policy;

use super::{
    Config, ConfigOutput, GlobalOpts, Result, effective_config, kv, kv_indent, kv_width,
    print_json,
};

pub(super) fn cmd_config(opts: &GlobalOpts) -> Result<()> {
    let config = effective_config(opts);
    let config_path = opts.config.clone().or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if opts.json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        });
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "devcon_path:",
            "command_timeout_secs:",
            "disable_webcams:",
            "disable_microphones:",
            "disable_network_devices:",
            "disable_bluetooth_devices:",
            "mute_microphone:",
            "devices:",
            "Classes:",
            "Patterns:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("devcon_path:", &config.devcon_path, w);
    kv_indent("command_timeout_secs:", config.command_timeout_secs, w);
    kv_indent("disable_webcams:", config.disable_webcams, w);
    kv_indent("disable_microphones:", config.disable_microphones, w);
    kv_indent("disable_network_devices:", config.disable_network_devices, w);
    kv_indent("disable_bluetooth_devices:", config.disable_bluetooth_devices, w);
    kv_indent("mute_microphone:", config.mute_microphone, w);
    let devices = if config.devices.is_empty() {
        "(default policy)".to_string()
    } else {
        config.devices.join(", ")
    };
    kv_indent("devices:", devices, w);
    println!();

    let policy: Policy = config.policy();
    println!("Default selection:");
    kv_indent("Classes:", policy.candidate_classes().join(", "), w);
    kv_indent("Patterns:", policy.candidate_patterns().join(", "), w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
