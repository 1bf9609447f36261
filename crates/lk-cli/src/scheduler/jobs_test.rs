use super::*;
use chrono::Duration as ChronoDuration;
use lk_core::{RunOutcome, RunStatus, SourceName, TableStats};
use lk_meta::collection::record_run;
use lk_meta::gaps::open_gaps;
use lk_meta::health::current_health;

struct FixedFeed(Vec<TableStats>);

#[async_trait]
impl TableStatsSource for FixedFeed {
    fn describe(&self) -> String {
        "fixed".to_string()
    }

    async fn fetch(&self) -> Result<Vec<TableStats>> {
        Ok(self.0.clone())
    }
}

fn outcome() -> RunOutcome {
    RunOutcome {
        status: RunStatus::Success,
        records_collected: 100,
        records_valid: 95,
        records_invalid: 5,
        confidence_score: 0.9,
        avg_response_ms: None,
        max_response_ms: None,
        error_message: None,
    }
}

#[tokio::test]
async fn health_job_snapshots_every_source() {
    let db = MonitorDb::open_memory().unwrap();
    let now = Utc::now();
    let sbd = SourceName::parse("sbd").unwrap();
    record_run(&db, &sbd, now - ChronoDuration::minutes(3), &outcome(), now - ChronoDuration::minutes(1)).unwrap();

    let config = Arc::new(Config::default());
    let job = HealthRefreshJob::new(Arc::clone(&config));
    assert_eq!(job.interval(), Duration::from_secs(300));

    let records = job.run(db.try_clone().unwrap(), now).await.unwrap();
    assert_eq!(records, config.sources.len() as u64);
    assert_eq!(current_health(db.conn(), None).unwrap().len(), config.sources.len());
}

#[tokio::test]
async fn gap_job_opens_gap_for_silent_source() {
    let db = MonitorDb::open_memory().unwrap();
    let now = Utc::now();
    let vsin = SourceName::parse("vsin").unwrap();
    record_run(&db, &vsin, now - ChronoDuration::hours(7), &outcome(), now - ChronoDuration::hours(6)).unwrap();

    let job = GapDetectionJob::new(Arc::new(Config::default()));
    assert_eq!(job.run(db.try_clone().unwrap(), now).await.unwrap(), 1);
    assert_eq!(open_gaps(db.conn(), &vsin).unwrap().len(), 1);

    // A second pass extends the same gap
    assert_eq!(job.run(db.try_clone().unwrap(), now).await.unwrap(), 1);
    assert_eq!(open_gaps(db.conn(), &vsin).unwrap().len(), 1);
}

#[tokio::test]
async fn dead_tuple_job_samples_feed() {
    let db = MonitorDb::open_memory().unwrap();
    let feed = Arc::new(FixedFeed(vec![
        TableStats {
            schema: "curated".to_string(),
            table: "games".to_string(),
            live_tuples: 100,
            dead_tuples: 120,
        },
        TableStats {
            schema: "lk_meta".to_string(),
            table: "alerts".to_string(),
            live_tuples: 50,
            dead_tuples: 1,
        },
    ]));
    let job = DeadTupleSweepJob::new(Arc::new(Config::default()), feed);
    assert_eq!(job.run(db.try_clone().unwrap(), Utc::now()).await.unwrap(), 2);

    let samples = lk_meta::dead_tuples::list_samples(db.conn(), None, true).unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].sample.table_name, "games");
}

#[tokio::test]
async fn expired_deadline_rolls_back() {
    let db = MonitorDb::open_memory().unwrap();
    let now = Utc::now();
    let vsin = SourceName::parse("vsin").unwrap();
    record_run(&db, &vsin, now - ChronoDuration::hours(7), &outcome(), now - ChronoDuration::hours(6)).unwrap();

    let expired = db
        .try_clone()
        .unwrap()
        .with_deadline(std::time::Instant::now() - Duration::from_millis(1));
    let err = GapDetectionJob::new(Arc::new(Config::default()))
        .run(expired, now)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<lk_meta::MetaError>(), Some(lk_meta::MetaError::Timeout(_))));
    assert!(open_gaps(db.conn(), &vsin).unwrap().is_empty());
}
