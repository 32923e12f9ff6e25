use anyhow::Result;
use clap::{Parser, Subcommand};
use co2mon_core::protocol::{CO2_MINI_PRODUCT_ID, DEFAULT_DEVICE_PATH, HOLTEK_VENDOR_ID};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run the monitor, passing any extra arguments through
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run all tests
    Test,
    /// Print the udev rule that grants access and creates the device symlink
    UdevRule {
        /// Group allowed to read the sensor
        #[arg(long, default_value = "plugdev")]
        group: String,
    },
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{what} failed");
    }
    Ok(())
}

/// Symlink name the rule creates, without the trailing index.
fn symlink_stem() -> &'static str {
    let name = DEFAULT_DEVICE_PATH.trim_start_matches("/dev/");
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

fn udev_rule(group: &str) -> String {
    format!(
        "SUBSYSTEM==\"hidraw\", ATTRS{{idVendor}}==\"{:04x}\", ATTRS{{idProduct}}==\"{:04x}\", \
         MODE=\"0660\", GROUP=\"{}\", SYMLINK+=\"{}%n\"",
        HOLTEK_VENDOR_ID,
        CO2_MINI_PRODUCT_ID,
        group,
        symlink_stem()
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Run { args } => {
            println!("Running co2mon...");
            let mut cmd = vec!["run", "-p", "co2mon-cli", "--"];
            cmd.extend(args.iter().map(String::as_str));
            cargo(&cmd, "Run")?;
        }
        Commands::Test => {
            println!("Running tests...");
            cargo(&["test", "--workspace"], "Tests")?;
        }
        Commands::UdevRule { group } => {
            println!("# /etc/udev/rules.d/90-co2mini.rules");
            println!("{}", udev_rule(group));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udev_rule_matches_shipped_file() {
        let shipped = include_str!("../../contrib/90-co2mini.rules");
        let rule = udev_rule("plugdev");
        assert!(shipped.lines().any(|line| line == rule), "{rule}");
    }
}
