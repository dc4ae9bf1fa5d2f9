use crate::config::ExperimentConfig;
use crate::dots::{pick_counts, random_color};
use crate::error::{ConditionsError, ConfigError};
use numag_core::{DotCounts, Rgb};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_CONDITIONS_PATH: &str = "conds/trialTypes.csv";

/// One condition. Missing counts and colors are drawn on first presentation
/// and kept for every repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialTemplate {
    pub index: usize,
    pub counts: Option<DotCounts>,
    pub colors: Option<(Rgb, Rgb)>,
}

impl TrialTemplate {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            counts: None,
            colors: None,
        }
    }
}

/// Extra columns such as `name`, `age` or `gender` are ignored
#[derive(Debug, Deserialize)]
struct ConditionRow {
    #[serde(rename = "lDots")]
    l_dots: Option<u32>,
    #[serde(rename = "rDots")]
    r_dots: Option<u32>,
    #[serde(rename = "lColor")]
    l_color: Option<Rgb>,
    #[serde(rename = "rColor")]
    r_color: Option<Rgb>,
}

impl ConditionRow {
    fn into_template(
        self,
        index: usize,
        count_range: &RangeInclusive<u32>,
    ) -> Result<TrialTemplate, ConditionsError> {
        let invalid = |reason: &str| ConditionsError::Invalid {
            row: index + 1,
            reason: reason.to_string(),
        };
        let counts = match (self.l_dots, self.r_dots) {
            (Some(left), Some(right))
                if count_range.contains(&left) && count_range.contains(&right) =>
            {
                Some(DotCounts { left, right })
            }
            (Some(left), Some(right)) => {
                return Err(invalid(&format!(
                    "dot counts {left} and {right} must lie in {}..={}",
                    count_range.start(),
                    count_range.end()
                )));
            }
            (None, None) => None,
            _ => return Err(invalid("lDots and rDots must be given together")),
        };
        let colors = match (self.l_color, self.r_color) {
            (Some(l), Some(r)) => Some((l, r)),
            (None, None) => None,
            _ => return Err(invalid("lColor and rColor must be given together")),
        };
        Ok(TrialTemplate {
            index,
            counts,
            colors,
        })
    }
}

/// Reads the condition table. Rows whose counts fall outside `count_range`
/// reject the whole table.
pub fn load_conditions(
    path: &Path,
    count_range: RangeInclusive<u32>,
) -> Result<Vec<TrialTemplate>, ConditionsError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut templates = Vec::new();
    for (index, row) in reader.deserialize::<ConditionRow>().enumerate() {
        templates.push(row?.into_template(index, &count_range)?);
    }
    if templates.is_empty() {
        return Err(ConditionsError::Empty);
    }
    Ok(templates)
}

pub fn synthesize_templates(n_trials: usize) -> Vec<TrialTemplate> {
    (0..n_trials).map(TrialTemplate::empty).collect()
}

/// Templates plus the shuffled presentation order
#[derive(Debug, Clone)]
pub struct TrialList {
    templates: Vec<TrialTemplate>,
    order: Vec<usize>,
}

impl TrialList {
    /// Repeats every template `n_reps` times and shuffles the whole list once
    pub fn new<R: Rng + ?Sized>(templates: Vec<TrialTemplate>, n_reps: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..n_reps)
            .flat_map(|_| 0..templates.len())
            .collect();
        order.shuffle(rng);
        Self { templates, order }
    }

    /// Loads the condition table, falling back to `n_trials` empty templates
    pub fn build<R: Rng + ?Sized>(config: &ExperimentConfig, path: &Path, rng: &mut R) -> Self {
        let templates = match load_conditions(path, config.min_dots..=config.max_dots) {
            Ok(templates) => {
                info!(
                    "Loaded {} conditions from {}",
                    templates.len(),
                    path.display()
                );
                templates
            }
            Err(err) => {
                warn!(
                    "No usable condition table at {} ({err}); synthesizing {} trials",
                    path.display(),
                    config.n_trials
                );
                synthesize_templates(config.n_trials)
            }
        };
        Self::new(templates, config.n_reps, rng)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn templates(&self) -> &[TrialTemplate] {
        &self.templates
    }

    /// Stimulus parameters for the trial at `position`, filling the template
    /// on first use.
    pub fn resolve<R: Rng + ?Sized>(
        &mut self,
        position: usize,
        config: &ExperimentConfig,
        rng: &mut R,
    ) -> Result<(usize, DotCounts, (Rgb, Rgb)), ConfigError> {
        let index = self.order[position];
        let template = &mut self.templates[index];
        let counts = match template.counts {
            Some(counts) => counts,
            None => *template
                .counts
                .insert(pick_counts(config.min_dots, config.max_dots, rng)?),
        };
        let colors = *template
            .colors
            .get_or_insert_with(|| (random_color(rng), random_color(rng)));
        Ok((index, counts, colors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_table(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_and_partial_rows() {
        let file = write_table(
            "name,age,gender,lDots,rDots,lColor,rColor\n\
             jwp,12,male,3,5,#ff0000,#0000ff\n\
             jwp,12,male,,,,\n",
        );
        let templates = load_conditions(file.path(), 1..=10).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].counts, Some(DotCounts { left: 3, right: 5 }));
        assert_eq!(
            templates[0].colors,
            Some((Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)))
        );
        assert_eq!(templates[1], TrialTemplate::empty(1));
    }

    #[test]
    fn half_specified_counts_are_rejected() {
        let file = write_table("lDots,rDots,lColor,rColor\n3,,,\n");
        assert_matches!(
            load_conditions(file.path(), 1..=10),
            Err(ConditionsError::Invalid { row: 1, .. })
        );
    }

    #[test]
    fn counts_outside_the_configured_range_are_rejected() {
        let file = write_table("lDots,rDots,lColor,rColor\n3,4,,\n50,2,,\n");
        assert_matches!(
            load_conditions(file.path(), 1..=10),
            Err(ConditionsError::Invalid { row: 2, .. })
        );
        let file = write_table("lDots,rDots,lColor,rColor\n0,4,,\n");
        assert_matches!(
            load_conditions(file.path(), 1..=10),
            Err(ConditionsError::Invalid { row: 1, .. })
        );
    }

    #[test]
    fn out_of_range_table_falls_back_to_synthesized_trials() {
        let file = write_table("lDots,rDots,lColor,rColor\n50,2,,\n");
        let config = ExperimentConfig {
            n_trials: 4,
            n_reps: 1,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(8);
        let list = TrialList::build(&config, file.path(), &mut rng);
        assert_eq!(list.templates().len(), 4);
        assert!(list.templates().iter().all(|t| t.counts.is_none()));
    }

    #[test]
    fn degenerate_count_range_is_a_config_error() {
        let config = ExperimentConfig {
            min_dots: 5,
            max_dots: 5,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut list = TrialList::new(synthesize_templates(1), 1, &mut rng);
        assert_matches!(
            list.resolve(0, &config, &mut rng),
            Err(ConfigError::Invalid(_))
        );
        assert_eq!(list.templates()[0].counts, None);
    }

    #[test]
    fn bad_color_is_a_csv_error() {
        let file = write_table("lDots,rDots,lColor,rColor\n3,4,red,blue\n");
        assert_matches!(load_conditions(file.path(), 1..=10), Err(ConditionsError::Csv(_)));
    }

    #[test]
    fn header_only_table_is_empty() {
        let file = write_table("lDots,rDots,lColor,rColor\n");
        assert_matches!(load_conditions(file.path(), 1..=10), Err(ConditionsError::Empty));
    }

    #[test]
    fn missing_table_falls_back_to_synthesized_trials() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExperimentConfig {
            n_trials: 3,
            n_reps: 2,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let list = TrialList::build(&config, &dir.path().join("missing.csv"), &mut rng);
        assert_eq!(list.templates().len(), 3);
        assert_eq!(list.len(), 6);
        assert!(list.templates().iter().all(|t| t.counts.is_none()));
    }

    #[test]
    fn order_repeats_every_template_n_reps_times() {
        let mut rng = StdRng::seed_from_u64(11);
        let list = TrialList::new(synthesize_templates(4), 3, &mut rng);
        let mut sorted = list.order().to_vec();
        sorted.sort();
        assert_eq!(sorted, vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn repetitions_share_lazily_drawn_stimulus() {
        let config = ExperimentConfig {
            min_dots: 1,
            max_dots: 10,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(21);
        let mut list = TrialList::new(synthesize_templates(1), 4, &mut rng);
        let first = list.resolve(0, &config, &mut rng).unwrap();
        for position in 1..4 {
            assert_eq!(list.resolve(position, &config, &mut rng).unwrap(), first);
        }
        assert_ne!(first.1.left, first.1.right);
        assert_eq!(list.templates()[0].counts, Some(first.1));
    }

    #[test]
    fn given_parameters_are_not_redrawn() {
        let config = ExperimentConfig::default();
        let fixed = TrialTemplate {
            index: 0,
            counts: Some(DotCounts { left: 2, right: 1 }),
            colors: Some((Rgb::WHITE, Rgb::BLACK)),
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut list = TrialList::new(vec![fixed], 1, &mut rng);
        let (index, counts, colors) = list.resolve(0, &config, &mut rng).unwrap();
        assert_eq!(index, 0);
        assert_eq!(counts, DotCounts { left: 2, right: 1 });
        assert_eq!(colors, (Rgb::WHITE, Rgb::BLACK));
    }
}
