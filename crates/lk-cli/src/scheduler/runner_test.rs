use super::*;
use async_trait::async_trait;
use chrono::DateTime;
use lk_meta::jobs::list_job_runs;

/// What a test job does when it runs
#[derive(Clone, Copy)]
enum Behavior {
    Succeed(u64),
    Fail,
    Sleep(Duration),
    MissDeadline,
}

struct TestJob {
    name: &'static str,
    behavior: Behavior,
}

impl TestJob {
    fn arc(name: &'static str, behavior: Behavior) -> Arc<dyn Job> {
        Arc::new(Self { name, behavior })
    }
}

#[async_trait]
impl Job for TestJob {
    fn name(&self) -> &'static str {
        self.name
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn run(&self, _db: MonitorDb, _now: DateTime<Utc>) -> Result<u64> {
        match self.behavior {
            Behavior::Succeed(n) => Ok(n),
            Behavior::Fail => anyhow::bail!("feed unavailable"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(1)
            }
            Behavior::MissDeadline => {
                Err(MetaError::Timeout("transaction body finished after the job deadline".into()).into())
            }
        }
    }
}

fn db() -> MonitorDb {
    MonitorDb::open_memory().unwrap()
}

#[tokio::test]
async fn successful_run_is_recorded() {
    let db = db();
    let run = execute_job(
        TestJob::arc("ok", Behavior::Succeed(7)),
        db.try_clone().unwrap(),
        Duration::from_secs(5),
        None,
    )
    .await
    .unwrap();
    assert_eq!(run.status, JobStatus::Success);
    assert_eq!(run.records_affected, 7);
    assert!(run.error_message.is_none());

    let logged = list_job_runs(db.conn(), Some("ok"), 10).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].invocation_id, run.invocation_id);
    assert_eq!(logged[0].records_affected, 7);
    assert_eq!(logged[0].status, JobStatus::Success);
}

#[tokio::test]
async fn failed_run_keeps_error() {
    let db = db();
    let run = execute_job(
        TestJob::arc("bad", Behavior::Fail),
        db.try_clone().unwrap(),
        Duration::from_secs(5),
        None,
    )
    .await
    .unwrap();
    assert_eq!(run.status, JobStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("feed unavailable"));
    assert_eq!(list_job_runs(db.conn(), None, 10).unwrap()[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn slow_run_times_out() {
    let db = db();
    let run = execute_job(
        TestJob::arc("slow", Behavior::Sleep(Duration::from_secs(30))),
        db.try_clone().unwrap(),
        Duration::from_millis(50),
        None,
    )
    .await
    .unwrap();
    assert_eq!(run.status, JobStatus::TimedOut);
    assert_eq!(run.records_affected, 0);
}

#[tokio::test]
async fn deadline_rollback_counts_as_timeout() {
    let db = db();
    let run = execute_job(
        TestJob::arc("late", Behavior::MissDeadline),
        db.try_clone().unwrap(),
        Duration::from_secs(5),
        None,
    )
    .await
    .unwrap();
    assert_eq!(run.status, JobStatus::TimedOut);
}

#[tokio::test]
async fn run_once_runs_every_job_in_order() {
    let mut scheduler = Scheduler::new(db(), Duration::from_secs(5));
    scheduler.register(TestJob::arc("first", Behavior::Succeed(1)));
    scheduler.register(TestJob::arc("second", Behavior::Fail));
    assert_eq!(scheduler.job_names(), vec!["first", "second"]);

    let runs = scheduler.run_once().await.unwrap();
    let statuses: Vec<(&str, JobStatus)> = runs.iter().map(|r| (r.job_name.as_str(), r.status)).collect();
    assert_eq!(statuses, vec![("first", JobStatus::Success), ("second", JobStatus::Failed)]);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_runs() {
    let db = db();
    let mut scheduler = Scheduler::new(db.try_clone().unwrap(), Duration::from_secs(5));
    scheduler.register(TestJob::arc("quick", Behavior::Succeed(2)));
    scheduler.register(TestJob::arc("slower", Behavior::Sleep(Duration::from_millis(100))));

    // Shutdown is already complete, so exactly one tick fires.
    scheduler.run_until(async {}).await.unwrap();

    let mut names: Vec<String> = list_job_runs(db.conn(), None, 10)
        .unwrap()
        .into_iter()
        .map(|r| r.job_name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["quick", "slower"]);
}

#[tokio::test]
async fn running_job_is_not_started_again() {
    let mut scheduler = Scheduler::new(db(), Duration::from_secs(5));
    scheduler.register(TestJob::arc("busy", Behavior::Succeed(1)));
    scheduler.register(TestJob::arc("idle", Behavior::Succeed(1)));
    scheduler.jobs[0].is_running.store(true, Ordering::Release);

    let mut in_flight = JoinSet::new();
    scheduler.tick(&mut in_flight);
    assert_eq!(in_flight.len(), 1);
    assert!(scheduler.jobs[0].last_run.is_none());
    assert!(scheduler.jobs[1].last_run.is_some());

    // Not due again until the interval elapses
    scheduler.tick(&mut in_flight);
    assert_eq!(in_flight.len(), 1);
    while in_flight.join_next().await.is_some() {}
    assert!(!scheduler.jobs[1].is_running.load(Ordering::Acquire));
}

#[tokio::test]
async fn timed_out_job_stays_running_until_it_ends() {
    let db = db();
    let mut scheduler = Scheduler::new(db.try_clone().unwrap(), Duration::from_millis(50));
    scheduler.register(TestJob::arc("stuck", Behavior::Sleep(Duration::from_millis(400))));

    let mut in_flight = JoinSet::new();
    scheduler.tick(&mut in_flight);
    while in_flight.join_next().await.is_some() {}

    let logged = list_job_runs(db.conn(), Some("stuck"), 10).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, JobStatus::TimedOut);
    assert!(scheduler.jobs[0].is_running.load(Ordering::Acquire));

    // Due again, but the abandoned run has not finished
    scheduler.jobs[0].last_run = None;
    scheduler.tick(&mut in_flight);
    assert!(in_flight.is_empty());
    assert!(scheduler.jobs[0].last_run.is_none());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!scheduler.jobs[0].is_running.load(Ordering::Acquire));
}
