use crate::error::ExperimentError;
use numag_core::{ParticipantInfo, Rgb, TrialRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for trial records
pub trait ResultSink {
    /// Called once per trial, as soon as the response outcome is known
    fn append(&mut self, record: &TrialRecord) -> Result<(), ExperimentError>;

    /// Called once after the last trial. Not called on abort.
    fn finish(
        &mut self,
        participant: &ParticipantInfo,
        records: &[TrialRecord],
    ) -> Result<(), ExperimentError>;
}

impl ResultSink for Vec<TrialRecord> {
    fn append(&mut self, record: &TrialRecord) -> Result<(), ExperimentError> {
        self.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, _: &ParticipantInfo, _: &[TrialRecord]) -> Result<(), ExperimentError> {
        Ok(())
    }
}

/// Per-condition aggregate row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "lDots")]
    pub l_dots: u32,
    #[serde(rename = "rDots")]
    pub r_dots: u32,
    #[serde(rename = "lColor")]
    pub l_color: Rgb,
    #[serde(rename = "rColor")]
    pub r_color: Rgb,
    pub correct_raw: String,
    #[serde(rename = "respTime_raw")]
    pub resp_time_raw: String,
    #[serde(rename = "respTime_mean")]
    pub resp_time_mean: Option<f64>,
    #[serde(rename = "respTime_std")]
    pub resp_time_std: Option<f64>,
    pub order_raw: String,
}

const NONE: &str = "none";

fn raw_list<T: ToString>(values: impl Iterator<Item = Option<T>>) -> String {
    values
        .map(|v| v.map_or_else(|| NONE.to_string(), |v| v.to_string()))
        .collect::<Vec<_>>()
        .join(";")
}

/// Mean and population standard deviation
fn mean_std(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (Some(mean), Some(var.sqrt()))
}

/// One row per condition, raw values in presentation order
pub fn summarize(records: &[TrialRecord]) -> Vec<SummaryRow> {
    let mut by_trial: BTreeMap<usize, Vec<&TrialRecord>> = BTreeMap::new();
    for record in records {
        by_trial.entry(record.trial).or_default().push(record);
    }

    by_trial
        .into_values()
        .map(|mut group| {
            group.sort_by_key(|r| r.order);
            let first = group[0];
            let times: Vec<f64> = group.iter().filter_map(|r| r.resp_time).collect();
            let (mean, std) = mean_std(&times);
            SummaryRow {
                l_dots: first.l_dots,
                r_dots: first.r_dots,
                l_color: first.l_color,
                r_color: first.r_color,
                correct_raw: raw_list(group.iter().map(|r| r.correct)),
                resp_time_raw: raw_list(group.iter().map(|r| r.resp_time)),
                resp_time_mean: mean,
                resp_time_std: std,
                order_raw: raw_list(group.iter().map(|r| Some(r.order))),
            }
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDump {
    pub participant: ParticipantInfo,
    pub records: Vec<TrialRecord>,
}

/// Writes `<stem>.csv` incrementally, `<stem>_summary.csv` and `<stem>.json`
/// when the session finishes.
pub struct CsvResultSink {
    trial_log: csv::Writer<File>,
    trial_log_path: PathBuf,
    summary_path: PathBuf,
    dump_path: PathBuf,
}

impl CsvResultSink {
    pub fn create(dir: &Path, participant: &ParticipantInfo) -> Result<Self, ExperimentError> {
        fs::create_dir_all(dir)?;
        let stem = participant.file_stem();
        let trial_log_path = dir.join(format!("{stem}.csv"));
        let trial_log = csv::Writer::from_path(&trial_log_path)?;
        info!("Recording trials to {}", trial_log_path.display());
        Ok(Self {
            trial_log,
            trial_log_path,
            summary_path: dir.join(format!("{stem}_summary.csv")),
            dump_path: dir.join(format!("{stem}.json")),
        })
    }

    pub fn trial_log_path(&self) -> &Path {
        &self.trial_log_path
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }
}

impl ResultSink for CsvResultSink {
    fn append(&mut self, record: &TrialRecord) -> Result<(), ExperimentError> {
        self.trial_log.serialize(record)?;
        self.trial_log.flush()?;
        debug!("Appended trial {} to {}", record.order, self.trial_log_path.display());
        Ok(())
    }

    fn finish(
        &mut self,
        participant: &ParticipantInfo,
        records: &[TrialRecord],
    ) -> Result<(), ExperimentError> {
        let mut summary = csv::Writer::from_path(&self.summary_path)?;
        for row in summarize(records) {
            summary.serialize(row)?;
        }
        summary.flush()?;

        let dump = SessionDump {
            participant: participant.clone(),
            records: records.to_vec(),
        };
        serde_json::to_writer_pretty(File::create(&self.dump_path)?, &dump)?;

        info!(
            "Saved summary to {} and session to {}",
            self.summary_path.display(),
            self.dump_path.display()
        );
        Ok(())
    }
}

pub fn read_trial_log(path: &Path) -> Result<Vec<TrialRecord>, ExperimentError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<TrialRecord>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use numag_core::{DotCounts, Gender, Side};

    fn participant() -> ParticipantInfo {
        ParticipantInfo {
            name: "ana".into(),
            age: 30,
            gender: Gender::Female,
            date: "2026_Oct_16_1015".into(),
            exp_name: "numMagExp".into(),
        }
    }

    fn record(order: usize, trial: usize, response: Option<Side>, resp_time: Option<f64>) -> TrialRecord {
        let counts = DotCounts { left: 2, right: 1 };
        let mut r = TrialRecord::pending(
            order,
            trial,
            &participant(),
            counts,
            (Rgb::new(10, 20, 30), Rgb::new(200, 100, 0)),
        );
        r.response = response;
        r.resp_time = resp_time;
        r.correct = response.and_then(|side| numag_core::judge(side, counts));
        r
    }

    #[test]
    fn trial_log_round_trips_with_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvResultSink::create(dir.path(), &participant()).unwrap();
        let written = vec![
            record(0, 0, Some(Side::Left), Some(0.4321)),
            record(1, 1, None, None),
            record(2, 0, Some(Side::Right), Some(1.25)),
        ];
        for r in &written {
            sink.append(r).unwrap();
        }

        let read = read_trial_log(sink.trial_log_path()).unwrap();
        assert_eq!(read, written);
        assert_eq!(read[1].correct, None);
        assert_eq!(read[0].correct, Some(true));
    }

    #[test]
    fn appends_are_visible_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvResultSink::create(dir.path(), &participant()).unwrap();
        sink.append(&record(0, 0, Some(Side::Left), Some(0.5))).unwrap();

        let text = fs::read_to_string(sink.trial_log_path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "order,trial,name,age,gender,date,lDots,rDots,lColor,rColor,response,respTime,correct"
        );
        assert_eq!(
            lines.next().unwrap(),
            "0,0,ana,30,female,2026_Oct_16_1015,2,1,#0a141e,#c86400,left,0.5,true"
        );
        assert!(!sink.summary_path().exists());
    }

    #[test]
    fn summary_aggregates_repetitions() {
        let records = vec![
            record(0, 0, Some(Side::Left), Some(0.5)),
            record(1, 1, None, None),
            record(2, 0, Some(Side::Right), Some(1.5)),
            record(3, 1, None, None),
        ];
        let rows = summarize(&records);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].correct_raw, "true;false");
        assert_eq!(rows[0].resp_time_raw, "0.5;1.5");
        assert_eq!(rows[0].resp_time_mean, Some(1.0));
        assert_eq!(rows[0].resp_time_std, Some(0.5));
        assert_eq!(rows[0].order_raw, "0;2");

        assert_eq!(rows[1].correct_raw, "none;none");
        assert_eq!(rows[1].resp_time_mean, None);
        assert_eq!(rows[1].order_raw, "1;3");
    }

    #[test]
    fn finish_writes_summary_and_dump() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvResultSink::create(dir.path(), &participant()).unwrap();
        let records = vec![record(0, 0, Some(Side::Left), Some(0.5))];
        sink.append(&records[0]).unwrap();
        sink.finish(&participant(), &records).unwrap();

        let summary = fs::read_to_string(sink.summary_path()).unwrap();
        assert!(summary.starts_with(
            "lDots,rDots,lColor,rColor,correct_raw,respTime_raw,respTime_mean,respTime_std,order_raw"
        ));
        let dump: SessionDump =
            serde_json::from_reader(File::open(sink.dump_path()).unwrap()).unwrap();
        assert_eq!(dump.participant, participant());
        assert_eq!(dump.records, records);
    }

    #[test]
    fn output_files_share_the_participant_stem() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvResultSink::create(dir.path(), &participant()).unwrap();
        assert!(sink
            .trial_log_path()
            .ends_with("ana_numMagExp_2026_Oct_16_1015.csv"));
        assert!(sink
            .summary_path()
            .ends_with("ana_numMagExp_2026_Oct_16_1015_summary.csv"));
    }
}
