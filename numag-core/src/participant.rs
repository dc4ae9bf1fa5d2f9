use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    /// Accepts the full label or a short form
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "mas" => Some(Gender::Male),
            "female" | "f" | "fem" => Some(Gender::Female),
            "other" | "o" => Some(Gender::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        })
    }
}

/// Session metadata attached to every trial record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub date: String,
    pub exp_name: String,
}

impl ParticipantInfo {
    /// File stem shared by every output of the session
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.name, self.exp_name, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_accepts_short_forms() {
        assert_eq!(Gender::parse("M"), Some(Gender::Male));
        assert_eq!(Gender::parse(" fem "), Some(Gender::Female));
        assert_eq!(Gender::parse("other"), Some(Gender::Other));
        assert_eq!(Gender::parse("x"), None);
        for g in Gender::ALL {
            assert_eq!(Gender::parse(&g.to_string()), Some(g));
        }
    }

    #[test]
    fn stem_joins_name_experiment_and_date() {
        let info = ParticipantInfo {
            name: "ana".into(),
            age: 30,
            gender: Gender::Female,
            date: "2026_Oct_16_1015".into(),
            exp_name: "numMagExp".into(),
        };
        assert_eq!(info.file_stem(), "ana_numMagExp_2026_Oct_16_1015");
    }
}
