//! Pomodoro statistics
//!
//! Aggregates completed sessions into the numbers shown next to the timer:
//! - today's progress against the daily goal
//! - week (Monday start) and month totals
//! - the current streak of days with at least one completed session
//! - the best day so far
//! - totals and completion rate over a window of recent days
//!
//! All dates are UTC calendar days, matching how sessions are stored.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::session::{TimerSession, TimerStatus};

/// Completed count and minutes for a period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub completed: u32,
    pub total_mins: u32,
}

impl PeriodTotals {
    fn add(&mut self, session: &TimerSession) {
        self.completed = self.completed.saturating_add(1);
        self.total_mins = self.total_mins.saturating_add(session.duration_mins);
    }

    /// Hours and minutes as a tuple
    pub fn total_time(&self) -> (u32, u32) {
        (self.total_mins / 60, self.total_mins % 60)
    }
}

/// The day with the most completed sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestDay {
    pub date: NaiveDate,
    pub count: u32,
}

/// Aggregated pomodoro statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomodoroStats {
    pub today: PeriodTotals,
    pub this_week: PeriodTotals,
    /// Completed sessions per weekday, Monday first
    pub week_by_day: [u32; 7],
    pub this_month: PeriodTotals,
    /// Consecutive days with at least one completed session
    pub streak: u32,
    pub best_day: Option<BestDay>,
}

impl PomodoroStats {
    /// Calculate statistics as of `today` from any mix of sessions
    pub fn from_sessions(sessions: &[TimerSession], today: NaiveDate) -> Self {
        let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let month_start = today.with_day(1).unwrap_or(today);

        let mut stats = Self::default();
        let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();

        for session in sessions.iter().filter(|s| s.status == TimerStatus::Completed) {
            let date = session.started_at.date_naive();
            count_day(&mut by_date, date);

            if date > today {
                continue;
            }
            if date == today {
                stats.today.add(session);
            }
            if date >= week_start {
                stats.this_week.add(session);
                let slot = &mut stats.week_by_day[date.weekday().num_days_from_monday() as usize];
                *slot = slot.saturating_add(1);
            }
            if date >= month_start {
                stats.this_month.add(session);
            }
        }

        stats.streak = streak(&by_date, today);
        stats.best_day = best_day(&by_date);
        stats
    }
}

/// Totals over the last `days` calendar days, today included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub days: u32,
    /// Completed plus cancelled sessions
    pub finished: u32,
    pub completed: PeriodTotals,
    /// Completed share of finished sessions (0-100)
    pub completion_rate: u32,
    pub best_day: Option<BestDay>,
}

impl WindowStats {
    /// Calculate totals for the `days` days ending on `today` (at least one)
    pub fn from_sessions(sessions: &[TimerSession], today: NaiveDate, days: u32) -> Self {
        let days = days.max(1);
        let first = today
            .checked_sub_signed(Duration::days(days as i64 - 1))
            .unwrap_or(NaiveDate::MIN);

        let mut stats = Self {
            days,
            ..Self::default()
        };
        let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();

        for session in sessions.iter().filter(|s| s.is_terminal()) {
            let date = session.started_at.date_naive();
            if date < first || date > today {
                continue;
            }

            stats.finished = stats.finished.saturating_add(1);
            if session.status == TimerStatus::Completed {
                stats.completed.add(session);
                count_day(&mut by_date, date);
            }
        }

        if stats.finished > 0 {
            stats.completion_rate =
                (stats.completed.completed as u64 * 100 / stats.finished as u64) as u32;
        }
        stats.best_day = best_day(&by_date);
        stats
    }
}

fn count_day(by_date: &mut BTreeMap<NaiveDate, u32>, date: NaiveDate) {
    let count = by_date.entry(date).or_default();
    *count = count.saturating_add(1);
}

// BTreeMap iterates oldest first, so ties keep the earliest date
fn best_day(by_date: &BTreeMap<NaiveDate, u32>) -> Option<BestDay> {
    by_date
        .iter()
        .fold(None, |best: Option<BestDay>, (date, count)| match best {
            Some(b) if b.count >= *count => Some(b),
            _ => Some(BestDay {
                date: *date,
                count: *count,
            }),
        })
}

fn streak(by_date: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> u32 {
    // A day without sessions yet does not break yesterday's streak
    let mut day = if by_date.contains_key(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while by_date.contains_key(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}

/// Today's completed sessions against the daily goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyProgress {
    pub completed: u32,
    pub goal: u32,
}

impl DailyProgress {
    pub fn new(completed: u32, goal: u32) -> Self {
        Self { completed, goal }
    }

    pub fn remaining(&self) -> u32 {
        self.goal.saturating_sub(self.completed)
    }

    pub fn is_met(&self) -> bool {
        self.completed >= self.goal
    }

    /// One marker per goal slot, filled for completed sessions
    pub fn dots(&self) -> String {
        (0..self.goal)
            .map(|i| if i < self.completed { '\u{25cf}' } else { '\u{25cb}' })
            .collect()
    }
}
