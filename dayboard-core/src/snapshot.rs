//! Baseline snapshots: every template joined with its status on one date.

use std::collections::HashMap;

use crate::types::{BoardDate, DailyStatus, DaySnapshot, DayStats, StatusEntry, TaskTemplate};

/// Join `templates` with the stored `rows` for `date`.
///
/// Templates without a row are reported as not completed and not reviewed.
/// Rows for other dates or unknown task ids are ignored.
pub fn build_snapshot(
    templates: &[TaskTemplate],
    rows: &[DailyStatus],
    date: &BoardDate,
) -> DaySnapshot {
    let by_task: HashMap<_, _> = rows
        .iter()
        .filter(|row| row.date == *date)
        .map(|row| (row.task_id, row))
        .collect();

    let mut list: Vec<StatusEntry> = templates
        .iter()
        .map(|template| {
            let (completed, reviewed) = by_task
                .get(&template.id)
                .map(|row| (row.completed, row.reviewed))
                .unwrap_or((false, false));
            StatusEntry {
                id: template.id,
                name: template.name.clone(),
                must_review: template.must_review,
                completed,
                reviewed,
            }
        })
        .collect();
    list.sort_by_key(|entry| entry.id);

    let stats = compute_stats(&list);
    DaySnapshot {
        date: *date,
        list,
        stats,
    }
}

pub fn compute_stats(list: &[StatusEntry]) -> DayStats {
    DayStats {
        total: list.len(),
        done_reviewed: list.iter().filter(|e| e.completed && e.reviewed).count(),
        done_unreviewed: list.iter().filter(|e| e.completed && !e.reviewed).count(),
        undone: list.iter().filter(|e| !e.completed).count(),
        must_review_undone: list
            .iter()
            .filter(|e| e.must_review && !e.completed && !e.reviewed)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::TimeOfDay;
    use crate::types::TaskId;

    fn template(id: u32, must_review: bool) -> TaskTemplate {
        TaskTemplate {
            id: TaskId(id),
            name: format!("T{id}"),
            start: TimeOfDay::parse("08:00").expect("start"),
            end: TimeOfDay::parse("09:00").expect("end"),
            predecessors: vec![],
            must_review,
        }
    }

    fn row(date: BoardDate, id: u32, completed: bool, reviewed: bool) -> DailyStatus {
        DailyStatus {
            date,
            task_id: TaskId(id),
            completed,
            reviewed,
        }
    }

    #[test]
    fn missing_rows_default_to_open() {
        let date: BoardDate = "2025-01-01".parse().expect("date");
        let snapshot = build_snapshot(&[template(1, false), template(2, true)], &[], &date);

        assert_eq!(snapshot.list.len(), 2);
        assert!(snapshot.list.iter().all(|e| !e.completed && !e.reviewed));
        assert_eq!(snapshot.stats.undone, 2);
        assert_eq!(snapshot.stats.must_review_undone, 1);
    }

    #[test]
    fn stats_follow_flag_combinations() {
        let date: BoardDate = "2024-08-06".parse().expect("date");
        let templates: Vec<_> = (1..=5).map(|id| template(id, id == 3 || id == 5)).collect();
        let rows = vec![
            row(date, 1, true, true),
            row(date, 2, true, false),
            row(date, 3, false, false),
            row(date, 4, true, true),
            row(date, 5, false, false),
        ];

        let stats = build_snapshot(&templates, &rows, &date).stats;
        assert_eq!(
            stats,
            DayStats {
                total: 5,
                done_reviewed: 2,
                done_unreviewed: 1,
                undone: 2,
                must_review_undone: 2,
            }
        );
    }

    #[test]
    fn rows_for_other_dates_are_ignored() {
        let date: BoardDate = "2025-01-01".parse().expect("date");
        let other: BoardDate = "2025-01-02".parse().expect("date");
        let snapshot = build_snapshot(&[template(1, false)], &[row(other, 1, true, true)], &date);
        assert!(!snapshot.list[0].completed);
    }
}
