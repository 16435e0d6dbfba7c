//! Daily challenge and play streak, kept in the key-value store.

use chrono::NaiveDate;
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::game::GameKind;
use crate::store::KvStore;

const CHALLENGE_DATE: &str = "daily_challenge_date";
const CHALLENGE_GAME: &str = "daily_challenge";
const STREAK: &str = "streak";
const STREAK_LAST_PLAYED: &str = "streak_last_played";

fn read_date<S: KvStore>(store: &S, key: &str) -> Result<Option<NaiveDate>> {
    Ok(store.get(key)?.and_then(|raw| match raw.parse::<NaiveDate>() {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("ignoring unreadable {key} {raw:?}: {e}");
            None
        }
    }))
}

/// Today's game. Picked at random on the first request of a day and
/// returned unchanged for the rest of it.
pub fn daily_challenge<S: KvStore, R: Rng>(
    store: &mut S,
    today: NaiveDate,
    rng: &mut R,
) -> Result<GameKind> {
    if read_date(store, CHALLENGE_DATE)? == Some(today) {
        if let Some(raw) = store.get(CHALLENGE_GAME)? {
            match GameKind::from_key(&raw) {
                Some(game) => return Ok(game),
                None => warn!("ignoring unknown daily challenge {raw:?}"),
            }
        }
    }

    let game = *GameKind::ALL.choose(rng).unwrap_or(&GameKind::ColorChange);
    store.set(CHALLENGE_DATE, &today.to_string())?;
    store.set(CHALLENGE_GAME, &game.to_string())?;
    Ok(game)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streak {
    pub count: u32,
    pub last_played: Option<NaiveDate>,
}

pub fn streak<S: KvStore>(store: &S) -> Result<Streak> {
    let count = match store.get(STREAK)? {
        Some(raw) => raw.parse::<u32>().unwrap_or_else(|e| {
            warn!("ignoring unreadable streak {raw:?}: {e}");
            0
        }),
        None => 0,
    };
    Ok(Streak {
        count,
        last_played: read_date(store, STREAK_LAST_PLAYED)?,
    })
}

/// Count a daily challenge play on `today`
pub fn record_daily_play<S: KvStore>(store: &mut S, today: NaiveDate) -> Result<Streak> {
    let current = streak(store)?;
    let count = match current.last_played {
        Some(last) if last == today => current.count.max(1),
        Some(last) if last.succ_opt() == Some(today) => current.count + 1,
        _ => 1,
    };
    store.set(STREAK, &count.to_string())?;
    store.set(STREAK_LAST_PLAYED, &today.to_string())?;
    Ok(Streak {
        count,
        last_played: Some(today),
    })
}

pub fn reset_streak<S: KvStore>(store: &mut S) -> Result<()> {
    store.remove(STREAK)?;
    store.remove(STREAK_LAST_PLAYED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn challenge_is_stable_within_a_day() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let first = daily_challenge(&mut store, day(1), &mut rng).unwrap();
        for _ in 0..20 {
            assert_eq!(daily_challenge(&mut store, day(1), &mut rng).unwrap(), first);
        }
        assert_eq!(
            store.get("daily_challenge_date").unwrap().as_deref(),
            Some("2026-03-01")
        );
    }

    #[test]
    fn new_day_picks_again() {
        let mut store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        daily_challenge(&mut store, day(1), &mut rng).unwrap();
        daily_challenge(&mut store, day(2), &mut rng).unwrap();
        assert_eq!(
            store.get("daily_challenge_date").unwrap().as_deref(),
            Some("2026-03-02")
        );
    }

    #[test]
    fn corrupt_challenge_is_replaced() {
        let mut store = MemoryStore::new();
        store.set("daily_challenge_date", "2026-03-01").unwrap();
        store.set("daily_challenge", "tetris").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let game = daily_challenge(&mut store, day(1), &mut rng).unwrap();
        assert_eq!(
            store.get("daily_challenge").unwrap(),
            Some(game.to_string())
        );
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let mut store = MemoryStore::new();
        assert_eq!(record_daily_play(&mut store, day(1)).unwrap().count, 1);
        assert_eq!(record_daily_play(&mut store, day(2)).unwrap().count, 2);
        assert_eq!(record_daily_play(&mut store, day(2)).unwrap().count, 2);
        assert_eq!(record_daily_play(&mut store, day(3)).unwrap().count, 3);
        assert_eq!(record_daily_play(&mut store, day(6)).unwrap().count, 1);
        assert_eq!(streak(&store).unwrap().last_played, Some(day(6)));
    }

    #[test]
    fn reset_and_garbage_start_over() {
        let mut store = MemoryStore::new();
        record_daily_play(&mut store, day(1)).unwrap();
        reset_streak(&mut store).unwrap();
        assert_eq!(streak(&store).unwrap(), Streak::default());

        store.set("streak", "lots").unwrap();
        store.set("streak_last_played", "yesterday").unwrap();
        assert_eq!(streak(&store).unwrap(), Streak::default());
        assert_eq!(record_daily_play(&mut store, day(9)).unwrap().count, 1);
    }
}
