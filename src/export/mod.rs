//! Dataset export
//!
//! Produces the analysis bundle: a flat one-row-per-participant CSV with a
//! fixed column order, a companion SPSS import syntax file, and the nested
//! JSON record used as the local-download fallback when the remote export
//! path fails.

use serde_json::Value;

use crate::db::schemas::ParticipantDoc;
use crate::study::content::{FOCAL_POSTS, POST_IDS};
use crate::study::interactions::ItemInteractions;
use crate::types::Result;

/// Fixed leading columns of the flat table
pub const BASE_COLUMNS: [&str; 18] = [
    "id",
    "PROLIFIC_PID",
    "STUDY_ID",
    "SESSION_ID",
    "assignmentId",
    "projectId",
    "Condition",
    "Time_Sec",
    "Is_Bot",
    "Is_Verified",
    "Q1_Agree",
    "Q2_Credible",
    "Slider_Engage",
    "Total_Real_Likes",
    "Total_Real_Shares",
    "Total_Real_CommViews",
    "Total_Real_DwellAvg",
    "User_Agent",
];

/// CSV filename referenced by the SPSS syntax
pub const CSV_FILENAME: &str = "simulation_data.csv";

/// Full header row: base columns then per-post L/S/V/Dwell/Text blocks
pub fn csv_header() -> Vec<String> {
    let mut headers: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for pid in POST_IDS {
        for suffix in ["L", "S", "V", "Dwell", "Text"] {
            headers.push(format!("{}_{}", pid, suffix));
        }
    }
    headers
}

fn survey_value(map: &serde_json::Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Quote a free-text cell: double quotes become apostrophes, newlines spaces
fn text_cell(raw: &str) -> String {
    let clean = raw.replace('"', "'").replace('\n', " ");
    format!("\"{}\"", clean)
}

fn dwell_avg_sec(item: &ItemInteractions) -> String {
    if item.dwell_times.is_empty() {
        "0".to_string()
    } else {
        let sum: u64 = item.dwell_times.iter().sum();
        format!("{:.2}", sum as f64 / item.dwell_times.len() as f64 / 1000.0)
    }
}

fn comment_text(item: &ItemInteractions) -> String {
    item.user_comments
        .iter()
        .map(|c| format!("[TO:{}] {}", c.target, c.text))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Flatten one participant into a CSV row
///
/// Missing or partial data renders as zero/empty, never errors. Focal
/// totals are computed over the five focal posts only.
pub fn participant_row(doc: &ParticipantDoc) -> Vec<String> {
    let empty = ItemInteractions::default();

    let mut real_likes = 0u32;
    let mut real_shares = 0u32;
    let mut real_views = 0u32;
    let mut dwell_sum = 0u64;
    let mut dwell_count = 0usize;

    for pid in FOCAL_POSTS {
        let item = doc.interactions.get(pid).unwrap_or(&empty);
        if item.liked {
            real_likes += 1;
        }
        if item.reposted {
            real_shares += 1;
        }
        if item.viewed_comments {
            real_views += 1;
        }
        dwell_sum += item.dwell_times.iter().sum::<u64>();
        dwell_count += item.dwell_times.len();
    }

    let dwell_avg = if dwell_count > 0 {
        format!("{:.2}", dwell_sum as f64 / dwell_count as f64 / 1000.0)
    } else {
        "0".to_string()
    };

    let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());

    let mut row = vec![
        doc.participant_id.clone(),
        na(&doc.platform.prolific_pid),
        na(&doc.platform.study_id),
        na(&doc.platform.session_id),
        na(&doc.platform.assignment_id),
        na(&doc.platform.project_id),
        doc.condition
            .map(|c| c.label())
            .unwrap_or_else(|| "neutral".to_string()),
        format!(
            "{:.2}",
            doc.total_simulation_time_ms.unwrap_or(0) as f64 / 1000.0
        ),
        if doc.is_bot { "1" } else { "0" }.to_string(),
        if doc.is_verified { "1" } else { "0" }.to_string(),
        survey_value(&doc.surveys.post_1, "q1"),
        survey_value(&doc.surveys.post_1, "q2"),
        survey_value(&doc.surveys.post_2, "slider1"),
        real_likes.to_string(),
        real_shares.to_string(),
        real_views.to_string(),
        dwell_avg,
        text_cell(doc.user_agent.as_deref().unwrap_or("Unknown")),
    ];

    for pid in POST_IDS {
        let item = doc.interactions.get(pid).unwrap_or(&empty);
        row.push(if item.liked { "1" } else { "0" }.to_string());
        row.push(if item.reposted { "1" } else { "0" }.to_string());
        row.push(if item.viewed_comments { "1" } else { "0" }.to_string());
        row.push(dwell_avg_sec(item));
        row.push(text_cell(&comment_text(item)));
    }

    row
}

/// Assemble the full CSV document
pub fn csv_export(docs: &[ParticipantDoc]) -> String {
    let mut lines = vec![csv_header().join(",")];
    for doc in docs {
        lines.push(participant_row(doc).join(","));
    }
    lines.join("\n")
}

/// SPSS import syntax matching the CSV layout
pub fn spss_syntax() -> String {
    let post_vars = POST_IDS
        .iter()
        .map(|pid| {
            format!(
                "{pid}_L F1.0 {pid}_S F1.0 {pid}_V F1.0 {pid}_Dwell F8.2 {pid}_Text A1000",
                pid = pid
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "GET DATA /TYPE=TXT /FILE=\"{file}\" /DELIMITERS=\",\" /QUALIFIER='\"' /FIRSTCASE=2\n\
         /VARIABLES= id A30 PROLIFIC_PID A30 STUDY_ID A30 SESSION_ID A30 assignmentId A30 projectId A30 \
         Condition A20 Time_Sec F8.2 Is_Bot F1.0 Is_Verified F1.0 Q1_Agree F2.0 Q2_Credible F2.0 \
         Slider_Engage F3.0 Total_Real_Likes F4.0 Total_Real_Shares F4.0 Total_Real_CommViews F4.0 \
         Total_Real_DwellAvg F8.2 User_Agent A200\n\
         {post_vars}.\n\
         VARIABLE LABELS Is_Bot 'Caught by Honeypot' Is_Verified 'Passed Consent'.\n\
         EXECUTE.\n",
        file = CSV_FILENAME,
        post_vars = post_vars,
    )
}

/// The nested JSON participant record (local-download fallback payload)
pub fn nested_json(doc: &ParticipantDoc) -> Result<Value> {
    serde_json::to_value(doc).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PlatformParams;
    use crate::study::interactions::UserComment;

    fn bare_doc() -> ParticipantDoc {
        ParticipantDoc::new(
            "sub-001".to_string(),
            PlatformParams::default(),
            None,
            0,
        )
    }

    #[test]
    fn header_order_is_fixed() {
        let header = csv_header();
        assert_eq!(&header[..18], &BASE_COLUMNS.map(|c| c.to_string()));
        assert_eq!(header[18], "p1_L");
        assert_eq!(header[19], "p1_S");
        assert_eq!(header[20], "p1_V");
        assert_eq!(header[21], "p1_Dwell");
        assert_eq!(header[22], "p1_Text");
        assert_eq!(header.len(), 18 + 8 * 5);
    }

    #[test]
    fn bare_record_renders_zeros_and_defaults() {
        let row = participant_row(&bare_doc());
        assert_eq!(row.len(), csv_header().len());
        assert_eq!(row[0], "sub-001");
        assert_eq!(row[1], "N/A");
        assert_eq!(row[6], "neutral");
        assert_eq!(row[7], "0.00");
        assert_eq!(row[8], "0");
        assert_eq!(row[17], "\"Unknown\"");
    }

    #[test]
    fn comments_flatten_with_target_markers() {
        let mut doc = bare_doc();
        let item = ItemInteractions {
            liked: true,
            user_comments: vec![
                UserComment {
                    text: "so sad".to_string(),
                    target: "p1".to_string(),
                    timestamp: 1,
                },
                UserComment {
                    text: "agree \"fully\"".to_string(),
                    target: "p1c3".to_string(),
                    timestamp: 2,
                },
            ],
            ..Default::default()
        };
        doc.interactions.insert("p1".to_string(), item);

        let row = participant_row(&doc);
        let p1_text = &row[18 + 4];
        assert_eq!(p1_text, "\"[TO:p1] so sad | [TO:p1c3] agree 'fully'\"");
        // p1_L reflects the like
        assert_eq!(row[18], "1");
    }

    #[test]
    fn focal_totals_exclude_filler_posts() {
        let mut doc = bare_doc();
        doc.interactions.insert(
            "p1".to_string(),
            ItemInteractions {
                liked: true,
                ..Default::default()
            },
        );
        doc.interactions.insert(
            "p2".to_string(),
            ItemInteractions {
                liked: true,
                ..Default::default()
            },
        );

        let row = participant_row(&doc);
        // Total_Real_Likes counts only p1
        assert_eq!(row[13], "1");
    }

    #[test]
    fn dwell_averages_in_seconds() {
        let mut doc = bare_doc();
        doc.interactions.insert(
            "p1".to_string(),
            ItemInteractions {
                dwell_times: vec![1_000, 3_000],
                ..Default::default()
            },
        );
        let row = participant_row(&doc);
        assert_eq!(row[16], "2.00");
    }

    #[test]
    fn spss_syntax_names_every_column() {
        let syntax = spss_syntax();
        assert!(syntax.starts_with("GET DATA /TYPE=TXT"));
        assert!(syntax.contains("Slider_Engage F3.0"));
        assert!(syntax.contains("p8_Text A1000"));
        assert!(syntax.contains("VARIABLE LABELS Is_Bot 'Caught by Honeypot'"));
        assert!(syntax.trim_end().ends_with("EXECUTE."));
    }

    #[test]
    fn csv_export_has_one_line_per_participant() {
        let docs = vec![bare_doc(), bare_doc()];
        let csv = csv_export(&docs);
        assert_eq!(csv.lines().count(), 3);
    }
}
