use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "flanker-task", version, about = "Car-flanker reaction-time task")]
pub struct Args {
    /// Experiment configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Participant identifier, used in result and log file names
    #[arg(short, long, value_parser = parse_participant)]
    pub participant: String,

    /// Seed for trial randomization; drawn from entropy when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the refresh-rate check before the session
    #[arg(long)]
    pub skip_frame_check: bool,
}

fn parse_participant(s: &str) -> Result<String, String> {
    let id = s.trim();
    if id.is_empty() {
        return Err("participant id must not be empty".into());
    }
    if id.contains(['/', '\\']) || id.starts_with('.') {
        return Err(format!("participant id '{id}' cannot be used as a file name"));
    }
    Ok(id.to_string())
}
