//! Built-in sample board used by `dayboard init` and tests.
//!
//! The anchor date (2024-08-06) is irrelevant; templates are projected onto
//! whatever date is requested.

use crate::types::{BoardDate, DailyStatus, TaskId, TemplateRecord};

const ANCHOR: &str = "2024-08-06";

pub fn sample_templates() -> Vec<TemplateRecord> {
    vec![
        record(1, "08:00", "09:00", &[], "否"),
        record(2, "08:10", "08:45", &[], "否"),
        record(3, "08:15", "08:55", &[], "是"),
        record(4, "09:20", "09:50", &["T1", "T3", "T2"], "否"),
        record(5, "10:00", "10:40", &["T4"], "是"),
    ]
}

fn record(id: u32, start: &str, end: &str, predecessors: &[&str], must_review: &str) -> TemplateRecord {
    TemplateRecord {
        id: TaskId(id),
        name: format!("T{id}"),
        start: format!("{ANCHOR} {start}"),
        end: format!("{ANCHOR} {end}"),
        predecessor: serde_json::to_string(predecessors).ok(),
        must_review: must_review.to_owned(),
    }
}

pub fn sample_statuses() -> Vec<DailyStatus> {
    let Ok(date) = ANCHOR.parse::<BoardDate>() else {
        return Vec::new();
    };
    [(1, true, true), (2, true, false), (3, false, false), (4, true, true), (5, false, false)]
        .into_iter()
        .map(|(id, completed, reviewed)| DailyStatus {
            date,
            task_id: TaskId(id),
            completed,
            reviewed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskTemplate;

    #[test]
    fn sample_templates_all_parse() {
        for record in sample_templates() {
            TaskTemplate::try_from(&record).expect("sample template parses");
        }
    }

    #[test]
    fn sample_statuses_reference_sample_templates() {
        let ids: Vec<_> = sample_templates().iter().map(|r| r.id).collect();
        for status in sample_statuses() {
            assert!(ids.contains(&status.task_id));
        }
    }
}
