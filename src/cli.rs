use clap::Parser;
use numag_experiment::conditions::DEFAULT_CONDITIONS_PATH;
use numag_experiment::ParticipantForm;
use std::path::PathBuf;
use tracing::Level;

/// numerosity comparison task: which cluster has more dots?
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// participant name, pre-filled in the prompt
    #[clap(long)]
    pub name: Option<String>,

    /// participant age, pre-filled in the prompt
    #[clap(long)]
    pub age: Option<String>,

    /// participant gender (male, female, other), pre-filled in the prompt
    #[clap(long)]
    pub gender: Option<String>,

    /// seed for a reproducible trial order and stimuli
    #[clap(long)]
    pub seed: Option<u64>,

    /// configuration file; numag.toml is used when present
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// condition table with lDots, rDots, lColor, rColor columns
    #[clap(long, default_value = DEFAULT_CONDITIONS_PATH)]
    pub conditions: PathBuf,

    /// directory for the trial log, summary, session dump and log file
    #[clap(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// TrueType/OpenType font for instructions and feedback
    #[clap(long)]
    pub font: Option<PathBuf>,

    /// level written to the session log file
    #[clap(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// validate the configuration and try a worst-case dot layout, then exit
    #[clap(long)]
    pub check: bool,
}

impl Cli {
    /// Prompt defaults, with flags replacing the built-in ones
    pub fn participant_form(&self) -> ParticipantForm {
        let defaults = ParticipantForm::default();
        ParticipantForm {
            name: self.name.clone().unwrap_or(defaults.name),
            age: self.age.clone().unwrap_or(defaults.age),
            gender: self.gender.clone().unwrap_or(defaults.gender),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_prefill_the_form() {
        let cli = Cli::parse_from(["numag", "--name", "ana", "--age", "30"]);
        let form = cli.participant_form();
        assert_eq!(form.name, "ana");
        assert_eq!(form.age, "30");
        assert_eq!(form.gender, "male");
        assert_eq!(cli.log_level, Level::INFO);
        assert_eq!(cli.conditions, PathBuf::from("conds/trialTypes.csv"));
    }

    #[test]
    fn log_level_parses() {
        let cli = Cli::parse_from(["numag", "--log-level", "debug", "--seed", "9"]);
        assert_eq!(cli.log_level, Level::DEBUG);
        assert_eq!(cli.seed, Some(9));
    }
}
