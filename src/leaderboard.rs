use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::info;
use std::io::Write;
use time_humanize::{Accuracy, HumanTime, Tense};

use crate::clock::Millis;
use crate::engine::FinishReport;
use crate::error::Result;
use crate::game::GameKind;
use crate::store::{ResultRecord, ResultStore};

/// Persist a finished session. A score is a new high score when it beats the
/// previous best, or is the first positive score for the game.
pub fn record_result<S: ResultStore>(
    store: &mut S,
    report: &FinishReport,
    at: DateTime<Utc>,
) -> Result<ResultRecord> {
    let previous = store.high_score(report.kind)?;
    let record = ResultRecord {
        game: report.kind,
        score: report.score,
        elapsed_ms: report.elapsed_ms,
        timestamp: at,
        is_new_high_score: report.score > previous.unwrap_or(0),
    };
    store.append(&record)?;
    if record.is_new_high_score {
        info!("new high score for {}: {}", record.game, record.score);
    }
    Ok(record)
}

/// Best `limit` results for a game, highest score first, faster runs first on ties
pub fn top_results<S: ResultStore>(
    store: &S,
    game: GameKind,
    limit: usize,
) -> Result<Vec<ResultRecord>> {
    Ok(store
        .results(Some(game))?
        .into_iter()
        .sorted_by(|a, b| b.score.cmp(&a.score).then(a.elapsed_ms.cmp(&b.elapsed_ms)))
        .take(limit)
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameStats {
    pub game: GameKind,
    pub plays: usize,
    pub high_score: i64,
    pub best_time_ms: Millis,
    pub average_score: f64,
}

/// Per-game standings, in catalog order; games never played are left out
pub fn game_stats<S: ResultStore>(store: &S) -> Result<Vec<GameStats>> {
    let grouped = store.results(None)?.into_iter().into_group_map_by(|r| r.game);

    Ok(GameKind::ALL
        .iter()
        .filter_map(|game| {
            let records = grouped.get(game)?;
            let total: i64 = records.iter().map(|r| r.score).sum();
            Some(GameStats {
                game: *game,
                plays: records.len(),
                high_score: records.iter().map(|r| r.score).max()?,
                best_time_ms: records.iter().map(|r| r.elapsed_ms).min()?,
                average_score: total as f64 / records.len() as f64,
            })
        })
        .collect())
}

/// Write every result as CSV, oldest first. Returns the number of rows.
pub fn export_csv<S: ResultStore, W: Write>(store: &S, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for record in store.results(None)?.iter().rev() {
        wtr.serialize(record)?;
        rows += 1;
    }
    wtr.flush()?;
    Ok(rows)
}

/// "3 hours ago" style label for when a result was recorded
pub fn played_ago(record: &ResultRecord, now: DateTime<Utc>) -> String {
    let secs = (now - record.timestamp).num_seconds().max(0);
    HumanTime::from_seconds(secs).to_text_en(Accuracy::Rough, Tense::Past)
}
