use numag_core::{Gender, ParticipantInfo};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name {0:?} looks like a number")]
    NumericName(String),

    #[error("name {0:?} cannot be part of a file name")]
    UnsafeName(String),

    #[error("age {0:?} is not a positive whole number")]
    InvalidAge(String),

    #[error("gender {0:?} is not one of male, female, other")]
    UnknownGender(String),
}

/// Raw participant fields as typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantForm {
    pub name: String,
    pub age: String,
    pub gender: String,
}

impl Default for ParticipantForm {
    fn default() -> Self {
        Self {
            name: "jwp".to_string(),
            age: "12".to_string(),
            gender: "male".to_string(),
        }
    }
}

/// Characters that would split or escape the output file stem
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn is_file_safe(name: &str) -> bool {
    !name.starts_with('.')
        && !name
            .chars()
            .any(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(&c))
}

impl ParticipantForm {
    pub fn validate(&self, exp_name: &str, date: &str) -> Result<ParticipantInfo, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.parse::<i64>().is_ok() {
            return Err(ValidationError::NumericName(name.to_string()));
        }
        if !is_file_safe(name) {
            return Err(ValidationError::UnsafeName(name.to_string()));
        }
        let age = match self.age.trim().parse::<u32>() {
            Ok(age) if age > 0 => age,
            _ => return Err(ValidationError::InvalidAge(self.age.clone())),
        };
        let gender = Gender::parse(&self.gender)
            .ok_or_else(|| ValidationError::UnknownGender(self.gender.clone()))?;
        Ok(ParticipantInfo {
            name: name.to_string(),
            age,
            gender,
            date: date.to_string(),
            exp_name: exp_name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Accepted(ParticipantInfo),
    Cancelled,
}

pub const CANCEL_INPUT: &str = ":q";

/// Timestamp attached to a session, e.g. `2026_Oct_16_1015`
pub fn session_date() -> String {
    chrono::Local::now().format("%Y_%b_%d_%H%M").to_string()
}

/// Asks for each field until the form validates. An empty answer keeps the
/// shown value; end of input or `:q` cancels.
pub fn prompt_participant<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    mut form: ParticipantForm,
    exp_name: &str,
    date: &str,
) -> io::Result<PromptOutcome> {
    writeln!(output, "{exp_name}: participant information ({CANCEL_INPUT} to cancel)")?;
    loop {
        for (label, field) in [
            ("name", &mut form.name),
            ("age", &mut form.age),
            ("gender (male/female/other)", &mut form.gender),
        ] {
            write!(output, "{label} [{field}]: ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(PromptOutcome::Cancelled);
            }
            let answer = line.trim();
            if answer == CANCEL_INPUT {
                return Ok(PromptOutcome::Cancelled);
            }
            if !answer.is_empty() {
                *field = answer.to_string();
            }
        }

        match form.validate(exp_name, date) {
            Ok(info) => return Ok(PromptOutcome::Accepted(info)),
            Err(err) => {
                writeln!(output, "Please enter the information correctly: {err}")?;
                writeln!(output, "Example: name = jpma, age = 12, gender = female")?;
                writeln!(output, "Try again.")?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn form(name: &str, age: &str, gender: &str) -> ParticipantForm {
        ParticipantForm {
            name: name.into(),
            age: age.into(),
            gender: gender.into(),
        }
    }

    fn run(input: &str, start: ParticipantForm) -> (PromptOutcome, String) {
        let mut out = Vec::new();
        let outcome =
            prompt_participant(&mut Cursor::new(input), &mut out, start, "numMagExp", "d").unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn valid_form_becomes_participant() {
        let info = form(" ana ", "30", "f").validate("exp", "date").unwrap();
        assert_eq!(info.name, "ana");
        assert_eq!(info.age, 30);
        assert_eq!(info.gender, Gender::Female);
        assert_eq!(info.exp_name, "exp");
    }

    #[test]
    fn each_field_is_checked() {
        assert_matches!(form("", "3", "m").validate("e", "d"), Err(ValidationError::EmptyName));
        assert_matches!(
            form("42", "3", "m").validate("e", "d"),
            Err(ValidationError::NumericName(_))
        );
        for name in ["ana/b", "../x", "a\\b", "c:d", ".hidden"] {
            assert_matches!(
                form(name, "3", "m").validate("e", "d"),
                Err(ValidationError::UnsafeName(_)),
                "{}", name
            );
        }
        assert_matches!(form("a", "0", "m").validate("e", "d"), Err(ValidationError::InvalidAge(_)));
        assert_matches!(form("a", "-4", "m").validate("e", "d"), Err(ValidationError::InvalidAge(_)));
        assert_matches!(form("a", "ten", "m").validate("e", "d"), Err(ValidationError::InvalidAge(_)));
        assert_matches!(
            form("a", "3", "x").validate("e", "d"),
            Err(ValidationError::UnknownGender(_))
        );
    }

    #[test]
    fn empty_answers_keep_defaults() {
        let (outcome, _) = run("\n\n\n", ParticipantForm::default());
        assert_matches!(outcome, PromptOutcome::Accepted(info) if info.name == "jwp" && info.age == 12);
    }

    #[test]
    fn invalid_answers_reprompt_until_valid() {
        let (outcome, out) = run("7\nabc\n\nmaria\n25\nfemale\n", ParticipantForm::default());
        assert_matches!(
            outcome,
            PromptOutcome::Accepted(info) if info.name == "maria" && info.age == 25 && info.gender == Gender::Female
        );
        assert!(out.contains("Try again."));
        assert_eq!(out.matches("name [").count(), 2);
    }

    #[test]
    fn path_like_name_is_asked_again() {
        let (outcome, out) = run("../x\n\n\nana\n\n\n", ParticipantForm::default());
        assert_matches!(outcome, PromptOutcome::Accepted(info) if info.name == "ana");
        assert!(out.contains("cannot be part of a file name"));
    }

    #[test]
    fn end_of_input_cancels() {
        let (outcome, _) = run("bob\n", ParticipantForm::default());
        assert_eq!(outcome, PromptOutcome::Cancelled);
    }

    #[test]
    fn quit_marker_cancels() {
        let (outcome, _) = run(":q\n", ParticipantForm::default());
        assert_eq!(outcome, PromptOutcome::Cancelled);
    }

    #[test]
    fn session_date_has_expected_shape() {
        let date = session_date();
        assert_eq!(date.split('_').count(), 4);
    }
}
