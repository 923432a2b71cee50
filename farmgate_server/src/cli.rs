use std::{env, env::VarError};

/// The server has no command line options. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "FG_HOST",
        "FG_PORT",
        "FG_DATABASE_URL",
        "FG_RUN_MIGRATIONS",
        "FG_PAYMENT_SIGNATURE_TOLERANCE",
        "FG_DELIVERY_FEE_FARM",
        "FG_DELIVERY_FEE_COURIER",
        "FG_PLATFORM_FEE_BPS",
        "FG_INQUIRY_TTL",
        "FG_UNPAID_ORDER_TIMEOUT",
        "FG_EXPIRY_SWEEP_INTERVAL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    });
    let secret = match env::var("FG_PAYMENT_WEBHOOK_SECRET") {
        Ok(s) if !s.is_empty() => "Set",
        _ => "Not set. Payment notifications will be rejected",
    };
    println!("  {:<35} {secret:<15}", "FG_PAYMENT_WEBHOOK_SECRET");
}
