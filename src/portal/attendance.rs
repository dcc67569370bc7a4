use crate::{
    error::{AppError, Result},
    models::attendance::AttendanceRecord,
    portal::html::{cell_text, element_by_id, has_class, open_tag, tag_blocks},
};

const TABLE_ID: &str = "tblsubjectwiseattendence";
/// Header and total rows carry one of these classes.
const SKIPPED_ROW_CLASSES: [&str; 2] = ["trboder", "trodd2"];
const MIN_CELLS: usize = 8;

// Sl No | Subject | Type | Conducted | Present | Absent | Co-Curricular | Percentage
const SUBJECT_CELL: usize = 1;
const CONDUCTED_CELL: usize = 3;
const PRESENT_CELL: usize = 4;
const PERCENTAGE_CELL: usize = 7;

/// Reads the subject-wise attendance table. Never fails; a page without the table yields nothing.
pub fn parse_attendance_html(html: &str) -> Vec<AttendanceRecord> {
    let Some(table) = element_by_id(html, "table", TABLE_ID) else {
        tracing::warn!("Attendance page has no #{} table", TABLE_ID);
        return Vec::new();
    };
    let rows_scope = tag_blocks(table, "<tbody", "</tbody>")
        .into_iter()
        .next()
        .unwrap_or(table);

    let mut records = Vec::new();
    for row in tag_blocks(rows_scope, "<tr", "</tr>") {
        let tag = open_tag(row);
        if SKIPPED_ROW_CLASSES.iter().any(|c| has_class(tag, c)) {
            continue;
        }
        let cells: Vec<String> = tag_blocks(row, "<td", "</td>").into_iter().map(cell_text).collect();
        if cells.len() < MIN_CELLS {
            continue;
        }
        match parse_row(&cells) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => tracing::debug!("Skipping attendance row: {}", e),
        }
    }

    tracing::info!("Parsed {} attendance records", records.len());
    records
}

fn parse_row(cells: &[String]) -> Result<Option<AttendanceRecord>> {
    let subject = cells[SUBJECT_CELL].clone();
    let conducted = parse_count(&cells[CONDUCTED_CELL], "conducted")?;
    let present = parse_count(&cells[PRESENT_CELL], "present")?;
    let percentage_text = cells[PERCENTAGE_CELL].trim_end_matches('%').trim();
    let percentage: f64 = percentage_text
        .parse()
        .ok()
        .filter(|p: &f64| p.is_finite() && (0.0..=100.0).contains(p))
        .ok_or_else(|| AppError::Parse(format!("percentage {:?}", cells[PERCENTAGE_CELL])))?;

    if subject.is_empty() || conducted == 0 {
        return Ok(None);
    }

    Ok(Some(AttendanceRecord {
        subject,
        total_classes: conducted,
        attended_classes: present,
        percentage,
        month: None,
    }))
}

fn parse_count(text: &str, what: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| AppError::Parse(format!("{} count {:?}", what, text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<div class="card"><table id="tblsubjectwiseattendence" class="table">
<thead><tr><th>Sl No</th><th>Subject</th></tr></thead>
<tbody>{}</tbody></table></div>"#,
            rows
        )
    }

    const PHYSICS: &str = "<tr><td>1</td><td>Physics</td><td>Theory</td><td>30</td><td>27</td><td>3</td><td>0</td><td>90.00%</td></tr>";

    #[test]
    fn test_physics_row() {
        let records = parse_attendance_html(&page(PHYSICS));
        assert_eq!(
            records,
            vec![AttendanceRecord {
                subject: "Physics".into(),
                total_classes: 30,
                attended_classes: 27,
                percentage: 90.0,
                month: None,
            }]
        );
    }

    #[test]
    fn test_header_total_and_short_rows_skipped() {
        let rows = format!(
            r#"<tr class="trboder"><td>Sl</td><td>Subject</td><td>T</td><td>C</td><td>P</td><td>A</td><td>CC</td><td>%</td></tr>
{PHYSICS}
<tr class="trodd2"><td></td><td>Total</td><td></td><td>30</td><td>27</td><td>3</td><td>0</td><td>90</td></tr>
<tr><td>2</td><td>Chemistry</td><td>30</td></tr>"#
        );
        let records = parse_attendance_html(&page(&rows));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject, "Physics");
    }

    #[test]
    fn test_zero_conducted_and_bad_numbers_skipped() {
        let rows = format!(
            "<tr><td>2</td><td>Maths</td><td>Theory</td><td>0</td><td>0</td><td>0</td><td>0</td><td>0%</td></tr>\
             <tr><td>3</td><td>English</td><td>Theory</td><td>n/a</td><td>4</td><td>0</td><td>0</td><td>100%</td></tr>\
             {PHYSICS}"
        );
        let records = parse_attendance_html(&page(&rows));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_classes, 30);
    }

    #[test]
    fn test_non_finite_or_out_of_range_percentages_skipped() {
        let row = |subject: &str, percentage: &str| {
            format!(
                "<tr><td>1</td><td>{subject}</td><td>Theory</td><td>10</td><td>9</td><td>1</td><td>0</td><td>{percentage}</td></tr>"
            )
        };
        let rows = [
            row("NotANumber", "NaN"),
            row("Infinite", "inf%"),
            row("Negative", "-5%"),
            row("Over", "100.5%"),
            row("Full", "100%"),
            PHYSICS.to_string(),
        ]
        .concat();

        let subjects: Vec<String> = parse_attendance_html(&page(&rows))
            .into_iter()
            .map(|r| r.subject)
            .collect();
        assert_eq!(subjects, vec!["Full", "Physics"]);
    }

    #[test]
    fn test_cell_markup_is_normalized() {
        let row = "<tr><td>1</td><td>\n  <span>Data&nbsp;Structures</span> </td><td>Lab</td><td> 12 </td><td>9</td><td>3</td><td>0</td><td> 75 </td></tr>";
        let records = parse_attendance_html(&page(row));
        assert_eq!(records[0].subject, "Data Structures");
        assert_eq!(records[0].percentage, 75.0);
    }

    #[test]
    fn test_missing_table_is_empty() {
        assert!(parse_attendance_html("<html><body>Session expired</body></html>").is_empty());
        assert!(parse_attendance_html("").is_empty());
    }
}
