//! Timesheet service
//!
//! Builds a per-project report of a user's tracked time over an inclusive
//! date range. Aggregation is a pure function over the entries; the service
//! only turns dates into instants and reads the entries in one query.

use crate::db::repositories::TimeEntryRepository;
use crate::models::{ProjectSummary, Timesheet, TrackedEntry};
use crate::services::error::TimeTrackingError;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Longest range a single timesheet may cover
pub const MAX_RANGE_DAYS: i64 = 366;

/// Round to two decimals, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Minutes expressed as hours, rounded to two decimals
pub fn minutes_to_hours(minutes: i64) -> f64 {
    round2(minutes as f64 / 60.0)
}

/// Group entries by project and compute totals.
///
/// Running entries are excluded from every total; the first one found is
/// reported as `running_entry`. Groups are ordered by total duration
/// descending, then project id; entries by start time, then id.
pub fn aggregate(
    user_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    entries: Vec<TrackedEntry>,
) -> Timesheet {
    let (running, mut stopped): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|e| e.entry.is_running());
    stopped.sort_by_key(|e| (e.entry.start_time, e.entry.id));

    let mut groups: BTreeMap<i64, ProjectSummary> = BTreeMap::new();
    for tracked in &stopped {
        let minutes = tracked.entry.duration.unwrap_or(0);
        let group = groups
            .entry(tracked.project_id())
            .or_insert_with(|| ProjectSummary {
                project_id: tracked.project_id(),
                project_name: tracked.task.project_name.clone(),
                total_duration: 0,
                total_hours: 0.0,
                percentage: 0.0,
                entries: Vec::new(),
            });
        group.total_duration += minutes;
        group.entries.push(tracked.clone());
    }

    let total_duration: i64 = groups.values().map(|g| g.total_duration).sum();

    // BTreeMap yields ascending project ids; the stable sort keeps that for ties
    let mut by_project: Vec<ProjectSummary> = groups
        .into_values()
        .map(|mut group| {
            group.total_hours = minutes_to_hours(group.total_duration);
            group.percentage = if total_duration > 0 {
                round2(group.total_duration as f64 / total_duration as f64 * 100.0)
            } else {
                0.0
            };
            group
        })
        .collect();
    by_project.sort_by(|a, b| b.total_duration.cmp(&a.total_duration));

    Timesheet {
        user_id,
        start_date,
        end_date,
        total_duration,
        total_hours: minutes_to_hours(total_duration),
        by_project,
        entries: stopped,
        running_entry: running.into_iter().next(),
    }
}

/// Timesheet service
pub struct TimesheetService {
    entries: Arc<dyn TimeEntryRepository>,
    offset: FixedOffset,
}

impl TimesheetService {
    /// Create a timesheet service whose day boundaries fall at midnight in `offset`
    pub fn new(entries: Arc<dyn TimeEntryRepository>, offset: FixedOffset) -> Self {
        Self { entries, offset }
    }

    /// Instants bounding `[start_date 00:00, end_date + 1 day 00:00)` in the reference offset
    pub fn range_bounds(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), TimeTrackingError> {
        if end_date < start_date {
            return Err(TimeTrackingError::validation("endDate must not be before startDate"));
        }
        let days = (end_date - start_date).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(TimeTrackingError::validation(format!(
                "a timesheet may cover at most {} days",
                MAX_RANGE_DAYS
            )));
        }

        let day_after = end_date
            .succ_opt()
            .ok_or_else(|| TimeTrackingError::validation("endDate is out of range"))?;

        Ok((self.midnight(start_date)?, self.midnight(day_after)?))
    }

    fn midnight(&self, date: NaiveDate) -> Result<DateTime<Utc>, TimeTrackingError> {
        date.and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(self.offset).single())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| TimeTrackingError::validation(format!("date {} is out of range", date)))
    }

    /// Build the user's timesheet for an inclusive date range
    ///
    /// # Errors
    /// - `Validation` if `end_date` precedes `start_date` or the range exceeds
    ///   [`MAX_RANGE_DAYS`]
    /// - `Storage` if the entries cannot be read; no partial report is produced
    pub async fn build_timesheet(
        &self,
        user_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Timesheet, TimeTrackingError> {
        let (from, to) = self.range_bounds(start_date, end_date)?;
        let entries = self.entries.list_in_range(user_id, from, to).await?;

        tracing::debug!(user_id, %start_date, %end_date, entries = entries.len(), "Building timesheet");
        Ok(aggregate(user_id, start_date, end_date, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxTaskRepository, SqlxTimeEntryRepository, TaskRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewTimeEntry, TaskRef, TimeEntry};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn tracked(id: i64, project_id: i64, start: DateTime<Utc>, minutes: Option<i64>) -> TrackedEntry {
        TrackedEntry {
            entry: TimeEntry {
                id,
                user_id: 1,
                task_id: project_id * 10,
                description: None,
                start_time: start,
                end_time: minutes.map(|m| start + Duration::minutes(m)),
                duration: minutes,
                created_at: start,
                updated_at: start,
            },
            task: TaskRef {
                task_id: project_id * 10,
                task_title: format!("task {}", project_id),
                project_id,
                project_name: format!("project {}", project_id),
            },
        }
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_aggregate_two_projects() {
        let entries = vec![
            tracked(1, 1, at(3, 9), Some(30)),
            tracked(2, 2, at(3, 10), Some(45)),
            tracked(3, 1, at(4, 9), Some(25)),
        ];

        let sheet = aggregate(1, date(3), date(4), entries);
        assert_eq!(sheet.total_duration, 100);
        assert_eq!(sheet.total_hours, 1.67);
        assert_eq!(sheet.by_project.len(), 2);

        let a = &sheet.by_project[0];
        assert_eq!(a.project_id, 1);
        assert_eq!(a.total_duration, 55);
        assert_eq!(a.percentage, 55.0);
        assert_eq!(a.total_hours, 0.92);
        assert_eq!(a.entries.iter().map(|e| e.entry.id).collect::<Vec<_>>(), vec![1, 3]);

        let b = &sheet.by_project[1];
        assert_eq!(b.project_id, 2);
        assert_eq!(b.total_duration, 45);
        assert_eq!(b.percentage, 45.0);
        assert_eq!(b.total_hours, 0.75);

        assert_eq!(sheet.entries.len(), 3);
        assert!(sheet.running_entry.is_none());
    }

    #[test]
    fn test_aggregate_empty() {
        let sheet = aggregate(1, date(1), date(7), Vec::new());
        assert_eq!(sheet.total_duration, 0);
        assert_eq!(sheet.total_hours, 0.0);
        assert!(sheet.by_project.is_empty());
        assert!(sheet.entries.is_empty());
    }

    #[test]
    fn test_zero_total_gives_zero_percentages() {
        let sheet = aggregate(1, date(1), date(1), vec![tracked(1, 4, at(1, 9), Some(0))]);
        assert_eq!(sheet.by_project.len(), 1);
        assert_eq!(sheet.by_project[0].percentage, 0.0);
    }

    #[test]
    fn test_running_entry_is_reported_but_not_counted() {
        let entries = vec![
            tracked(1, 1, at(3, 9), Some(60)),
            tracked(2, 2, at(3, 11), None),
        ];
        let sheet = aggregate(1, date(3), date(3), entries);

        assert_eq!(sheet.total_duration, 60);
        assert_eq!(sheet.by_project.len(), 1);
        assert_eq!(sheet.entries.len(), 1);
        assert_eq!(sheet.running_entry.map(|e| e.entry.id), Some(2));
    }

    #[test]
    fn test_ties_sorted_by_project_id() {
        let entries = vec![
            tracked(1, 9, at(3, 9), Some(20)),
            tracked(2, 3, at(3, 10), Some(20)),
            tracked(3, 5, at(3, 11), Some(40)),
        ];
        let sheet = aggregate(1, date(3), date(3), entries);
        let order: Vec<i64> = sheet.by_project.iter().map(|g| g.project_id).collect();
        assert_eq!(order, vec![5, 3, 9]);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.666_666), 1.67);
        assert_eq!(round2(33.333_333), 33.33);
        assert_eq!(minutes_to_hours(100), 1.67);
        assert_eq!(minutes_to_hours(90), 1.5);
    }

    async fn setup_service(offset_minutes: i32) -> (TimesheetService, SqlxTimeEntryRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let tasks = SqlxTaskRepository::new(pool.clone());
        let alpha = tasks.create_project("Alpha").await.unwrap();
        let beta = tasks.create_project("Beta").await.unwrap();
        let task_a = tasks.create_task(alpha, "Research").await.unwrap();
        let task_b = tasks.create_task(beta, "Code").await.unwrap();

        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
        let service = TimesheetService::new(SqlxTimeEntryRepository::boxed(pool.clone()), offset);
        (service, SqlxTimeEntryRepository::new(pool), task_a, task_b)
    }

    #[tokio::test]
    async fn test_build_timesheet_from_store() {
        let (service, repo, task_a, task_b) = setup_service(0).await;

        for (task, start, minutes) in [
            (task_a, at(3, 9), 30),
            (task_b, at(3, 10), 45),
            (task_a, at(4, 9), 25),
            // outside the range
            (task_b, at(6, 9), 500),
        ] {
            repo.create_closed(&NewTimeEntry::closed(1, task, None, start, minutes, start))
                .await
                .unwrap();
        }
        // another user's time never shows up
        repo.create_closed(&NewTimeEntry::closed(2, task_a, None, at(3, 9), 999, at(3, 9)))
            .await
            .unwrap();
        repo.create_running(&NewTimeEntry::running(1, task_b, None, at(4, 15)))
            .await
            .unwrap()
            .unwrap();

        let sheet = service.build_timesheet(1, date(3), date(4)).await.unwrap();
        assert_eq!(sheet.total_duration, 100);
        assert_eq!(sheet.total_hours, 1.67);
        assert_eq!(sheet.by_project[0].project_name, "Alpha");
        assert_eq!(sheet.by_project[0].total_duration, 55);
        assert_eq!(sheet.by_project[1].project_name, "Beta");
        assert_eq!(sheet.by_project[1].percentage, 45.0);
        assert_eq!(sheet.running_entry.map(|e| e.entry.start_time), Some(at(4, 15)));
    }

    #[tokio::test]
    async fn test_range_uses_reference_offset() {
        // UTC+2: June 3 starts at 2024-06-02T22:00Z
        let (service, repo, task_a, _) = setup_service(120).await;

        let late_utc = Utc.with_ymd_and_hms(2024, 6, 2, 23, 0, 0).unwrap();
        let early_utc = Utc.with_ymd_and_hms(2024, 6, 2, 21, 0, 0).unwrap();
        for start in [late_utc, early_utc] {
            repo.create_closed(&NewTimeEntry::closed(1, task_a, None, start, 10, start))
                .await
                .unwrap();
        }

        let sheet = service.build_timesheet(1, date(3), date(3)).await.unwrap();
        assert_eq!(sheet.entries.len(), 1);
        assert_eq!(sheet.entries[0].entry.start_time, late_utc);
    }

    #[tokio::test]
    async fn test_range_validation() {
        let (service, _, _, _) = setup_service(0).await;

        let err = service.build_timesheet(1, date(5), date(4)).await.unwrap_err();
        assert!(matches!(err, TimeTrackingError::Validation(_)));

        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(service.build_timesheet(1, start, end).await.is_ok());

        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = service.build_timesheet(1, start, end).await.unwrap_err();
        assert!(matches!(err, TimeTrackingError::Validation(_)));

        let (from, to) = service.range_bounds(date(4), date(4)).unwrap();
        assert_eq!(to - from, Duration::days(1));
    }

    fn arb_entries() -> impl Strategy<Value = Vec<TrackedEntry>> {
        prop::collection::vec((1i64..6, 0u32..72, prop::option::weighted(0.9, 0i64..600)), 0..40).prop_map(
            |rows| {
                let base = at(1, 0);
                rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, (project, hour, minutes))| {
                        tracked(i as i64 + 1, project, base + Duration::hours(hour as i64), minutes)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_group_totals_sum_to_grand_total(entries in arb_entries()) {
            let stopped_total: i64 = entries
                .iter()
                .filter_map(|e| e.entry.duration)
                .sum();
            let sheet = aggregate(1, date(1), date(3), entries);

            prop_assert_eq!(sheet.total_duration, stopped_total);
            prop_assert_eq!(
                sheet.by_project.iter().map(|g| g.total_duration).sum::<i64>(),
                sheet.total_duration
            );
            prop_assert_eq!(
                sheet.by_project.iter().map(|g| g.entries.len()).sum::<usize>(),
                sheet.entries.len()
            );
        }

        #[test]
        fn prop_percentages_sum_to_hundred(entries in arb_entries()) {
            let sheet = aggregate(1, date(1), date(3), entries);
            let sum: f64 = sheet.by_project.iter().map(|g| g.percentage).sum();
            if sheet.total_duration == 0 {
                prop_assert_eq!(sum, 0.0);
            } else {
                let tolerance = 0.005 * sheet.by_project.len() as f64 + 1e-9;
                prop_assert!((sum - 100.0).abs() <= tolerance, "sum = {}", sum);
            }
        }

        #[test]
        fn prop_groups_and_entries_are_ordered(entries in arb_entries()) {
            let sheet = aggregate(1, date(1), date(3), entries);

            for pair in sheet.by_project.windows(2) {
                prop_assert!(
                    pair[0].total_duration > pair[1].total_duration
                        || (pair[0].total_duration == pair[1].total_duration
                            && pair[0].project_id < pair[1].project_id)
                );
            }
            for pair in sheet.entries.windows(2) {
                prop_assert!(
                    (pair[0].entry.start_time, pair[0].entry.id) < (pair[1].entry.start_time, pair[1].entry.id)
                );
            }
            prop_assert!(sheet.entries.iter().all(|e| !e.entry.is_running()));
        }
    }
}
