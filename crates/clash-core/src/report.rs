//! Results log and CSV export.
//!
//! One [`ResultRow`] is recorded per accepted message, written by the first
//! successful poll after it. The export is pipe-separated with a `sep=|`
//! preamble so spreadsheet tools pick the right delimiter.

use core::fmt::Write as _;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use clash_types::{AlignmentStats, Potency, Team};

/// Header line of the export.
pub const CSV_HEADER: &str = "Turn|Team|Message|Potency|Red Alignment|Blue Alignment|Neutral Alignment|Red Influence|Blue Energy";

/// One line of the results log.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Debate round (Red and Blue share a round number).
    pub turn: u32,
    /// Team of the message.
    pub team: Option<Team>,
    /// Message text.
    pub message: String,
    /// Its potency.
    pub potency: Option<Potency>,
    /// Alignment stats reported by the poll.
    pub stats: AlignmentStats,
    /// Remaining influence after the poll.
    pub influence_remaining: u32,
    /// Remaining energy after the poll.
    pub energy_remaining: Decimal,
}

/// Shared append-only results log.
///
/// The simulation sync appends; readers clone the handle and never touch
/// the session.
#[derive(Debug, Clone, Default)]
pub struct ResultsLog(Arc<RwLock<Vec<ResultRow>>>);

impl ResultsLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows in order.
    pub async fn extend(&self, rows: Vec<ResultRow>) {
        self.0.write().await.extend(rows);
    }

    /// A copy of every row.
    pub async fn rows(&self) -> Vec<ResultRow> {
        self.0.read().await.clone()
    }

    /// The log as CSV, `None` when empty.
    pub async fn csv(&self) -> Option<String> {
        render_csv(&self.0.read().await)
    }
}

/// Render the log as CSV.
///
/// Returns `None` for an empty log.
pub fn render_csv(rows: &[ResultRow]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }

    let mut out = String::from("sep=|\n");
    out.push_str(CSV_HEADER);
    out.push('\n');

    for row in rows {
        let stats = &row.stats;
        let total = stats.total();
        let team = row.team.map_or("", Team::as_str);
        let potency = row.potency.map(|p| p.to_string()).unwrap_or_default();
        let influence_pct = 100.0 - stats.alienated_percentage;

        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{turn}|{team}|{message}|{potency}|{red}/{total} ({red_pct:.1}%)|{blue}/{total} ({blue_pct:.1}%)|{neutral}/{total} ({neutral_pct:.1}%)|{influence}/{total} ({influence_pct:.1}%)|{energy}",
            turn = row.turn,
            message = sanitize(&row.message),
            red = stats.red,
            red_pct = stats.red_percentage,
            blue = stats.blue,
            blue_pct = stats.blue_percentage,
            neutral = stats.neutral,
            neutral_pct = stats.neutral_percentage,
            influence = row.influence_remaining,
            energy = row.energy_remaining,
        );
    }

    Some(out)
}

/// Keep a message on one line and out of the delimiter's way.
fn sanitize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(turn: u32, team: Team, message: &str) -> ResultRow {
        ResultRow {
            turn,
            team: Some(team),
            message: message.to_owned(),
            potency: Potency::from_hundredths(73),
            stats: AlignmentStats::from_counts(4, 3, 1, 10),
            influence_remaining: 9,
            energy_remaining: Decimal::new(5747, 2),
        }
    }

    #[test]
    fn empty_log_has_nothing_to_download() {
        assert!(render_csv(&[]).is_none());
    }

    #[test]
    fn renders_preamble_header_and_rows() {
        let csv = render_csv(&[row(1, Team::Red, "First"), row(1, Team::Blue, "Second")])
            .unwrap_or_default();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.first().copied(), Some("sep=|"));
        assert_eq!(lines.get(1).copied(), Some(CSV_HEADER));
        assert_eq!(
            lines.get(2).copied(),
            Some("1|Red|First|0.73|4/10 (40.0%)|3/10 (30.0%)|3/10 (30.0%)|9/10 (90.0%)|57.47")
        );
    }

    #[test]
    fn messages_stay_on_one_line() {
        let csv = render_csv(&[row(2, Team::Blue, "a | b\nc")]).unwrap_or_default();
        assert!(csv.contains("|a / b c|"));
        assert_eq!(csv.lines().count(), 3);
    }
}
