//! CSV renderings of the stored templates and of one day's status rows.

use std::fmt::Write as _;

use crate::types::{BoardDate, DailyStatus, TemplateRecord};

/// `id,name,start,end,predecessor,must_review`, raw stored values.
pub fn templates_csv(records: &[TemplateRecord]) -> String {
    let mut out = String::from("id,name,start,end,predecessor,must_review\n");
    for record in records {
        let id = record.id.to_string();
        let fields = [
            id.as_str(),
            record.name.as_str(),
            record.start.as_str(),
            record.end.as_str(),
            record.predecessor.as_deref().unwrap_or(""),
            record.must_review.as_str(),
        ];
        push_row(&mut out, &fields);
    }
    out
}

/// `date,task_id,completed,reviewed` for the stored rows of `date`, flags as `1`/`0`.
pub fn state_csv(date: &BoardDate, rows: &[DailyStatus]) -> String {
    let mut rows: Vec<&DailyStatus> = rows.iter().filter(|r| r.date == *date).collect();
    rows.sort_by_key(|r| r.task_id);

    let mut out = String::from("date,task_id,completed,reviewed\n");
    let date = date.to_string();
    for row in rows {
        let _ = writeln!(
            out,
            "{date},{},{},{}",
            row.task_id,
            u8::from(row.completed),
            u8::from(row.reviewed)
        );
    }
    out
}

/// Default download name for a state export.
pub fn state_file_name(date: &BoardDate) -> String {
    format!("state_{date}.csv")
}

pub const TEMPLATES_FILE_NAME: &str = "fixed_tasks.csv";

fn push_row(out: &mut String, fields: &[&str]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{sample_statuses, sample_templates};

    #[test]
    fn templates_csv_quotes_json_predecessors() {
        let csv = templates_csv(&sample_templates());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,name,start,end,predecessor,must_review");
        assert_eq!(lines[1], "1,T1,2024-08-06 08:00,2024-08-06 09:00,[],否");
        assert_eq!(
            lines[4],
            r#"4,T4,2024-08-06 09:20,2024-08-06 09:50,"[""T1"",""T3"",""T2""]",否"#
        );
    }

    #[test]
    fn state_csv_uses_numeric_flags() {
        let date: BoardDate = "2024-08-06".parse().expect("date");
        let csv = state_csv(&date, &sample_statuses());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "2024-08-06,1,1,1");
        assert_eq!(lines[2], "2024-08-06,2,1,0");
        assert_eq!(state_file_name(&date), "state_2024-08-06.csv");
    }
}
