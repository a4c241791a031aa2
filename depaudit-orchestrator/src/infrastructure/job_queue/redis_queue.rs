//! Redis-backed job queue shared by the server and worker processes
//!
//! Key layout under the configured prefix `<p>`:
//!
//! | Key | Type | Content |
//! |-----|------|---------|
//! | `<p>:id` | string | id counter (`INCR`) |
//! | `<p>:job:<id>` | hash | job record |
//! | `<p>:wait` | list | waiting ids, pushed left, consumed right |
//! | `<p>:active` | list | claimed ids |
//! | `<p>:completed`, `<p>:failed` | zset | finished ids scored by finish time (ms) |
//! | `<p>:lock:<id>` | string | lease token with a `PX` TTL |
//!
//! Every state change that needs an ownership check runs as a Lua script.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::{debug, error, info, instrument};

use depaudit_core::config::QueueConfig;
use depaudit_core::domain::{Job, JobCounts, JobId, JobState, Manifest};

use super::{JobQueue, JobQueueError, Lease, WorkerId};

/// Upper bound on the gap between claim attempts while waiting
const CLAIM_POLL_INTERVAL: Duration = Duration::from_millis(200);

const CLAIM_SCRIPT: &str = r#"
local id = redis.call('RPOP', KEYS[1])
if not id then
  return false
end
redis.call('LPUSH', KEYS[2], id)
local job = ARGV[1] .. ':job:' .. id
redis.call('HSET', job, 'state', 'active', 'started_at', ARGV[4])
redis.call('HINCRBY', job, 'attempts', 1)
redis.call('SET', ARGV[1] .. ':lock:' .. id, ARGV[2], 'PX', ARGV[3])
return id
"#;

const RENEW_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

// Returns 1 on success, 0 when the lease is gone, -1 when the job is not active.
const FINISH_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) ~= ARGV[1] then
  return 0
end
if redis.call('HGET', KEYS[2], 'state') ~= 'active' then
  return -1
end
redis.call('HSET', KEYS[2], 'state', ARGV[2], 'finished_at', ARGV[3])
if ARGV[6] ~= '' then
  redis.call('HSET', KEYS[2], 'failed_reason', ARGV[6])
end
redis.call('LREM', KEYS[3], 0, ARGV[5])
redis.call('ZADD', KEYS[4], ARGV[4], ARGV[5])
redis.call('DEL', KEYS[1])
return 1
"#;

const REQUEUE_STALLED_SCRIPT: &str = r#"
local ids = redis.call('LRANGE', KEYS[1], 0, -1)
local moved = {}
for _, id in ipairs(ids) do
  if redis.call('EXISTS', ARGV[1] .. ':lock:' .. id) == 0 then
    local job = ARGV[1] .. ':job:' .. id
    redis.call('LREM', KEYS[1], 0, id)
    redis.call('HSET', job, 'state', 'waiting')
    redis.call('HDEL', job, 'started_at')
    redis.call('RPUSH', KEYS[2], id)
    table.insert(moved, id)
  end
end
return moved
"#;

/// Redis job queue
#[derive(Clone)]
pub struct RedisJobQueue {
    connection: ConnectionManager,
    prefix: String,
    lease_ttl: Duration,
    claim_script: Script,
    renew_script: Script,
    finish_script: Script,
    requeue_script: Script,
}

impl RedisJobQueue {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(config: &QueueConfig) -> Result<Self, JobQueueError> {
        let client = Client::open(config.redis_url.as_str()).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            JobQueueError::Unavailable(format!("invalid Redis URL: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            unavailable(e)
        })?;

        let queue = Self {
            connection,
            prefix: config.key_prefix.clone(),
            lease_ttl: config.lease_ttl(),
            claim_script: Script::new(CLAIM_SCRIPT),
            renew_script: Script::new(RENEW_SCRIPT),
            finish_script: Script::new(FINISH_SCRIPT),
            requeue_script: Script::new(REQUEUE_STALLED_SCRIPT),
        };
        queue.ping().await?;

        info!(prefix = %queue.prefix, "Connected to Redis job queue");
        Ok(queue)
    }

    pub async fn ping(&self) -> Result<(), JobQueueError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    fn job_key(&self, id: JobId) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn lock_key(&self, id: JobId) -> String {
        format!("{}:lock:{}", self.prefix, id)
    }

    fn terminal_key(&self, state: JobState) -> String {
        self.key(state.as_str())
    }

    fn lease_ttl_ms(&self) -> u64 {
        u64::try_from(self.lease_ttl.as_millis()).unwrap_or(u64::MAX)
    }

    async fn load(&self, id: JobId) -> Result<Option<Job>, JobQueueError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        job_from_hash(id, &fields)
    }

    async fn load_many(&self, ids: &[JobId]) -> Result<Vec<Job>, JobQueueError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.cmd("HGETALL").arg(self.job_key(*id));
        }
        let mut conn = self.connection.clone();
        let records: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.map_err(unavailable)?;

        let mut jobs = Vec::with_capacity(ids.len());
        for (id, fields) in ids.iter().zip(records.iter()) {
            if let Some(job) = job_from_hash(*id, fields)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn ids_in(&self, state: JobState) -> Result<Vec<JobId>, JobQueueError> {
        let mut conn = self.connection.clone();
        let ids: Vec<u64> = match state {
            JobState::Waiting | JobState::Active => {
                let key = if state == JobState::Waiting {
                    self.key("wait")
                } else {
                    self.key("active")
                };
                redis::cmd("LRANGE")
                    .arg(key)
                    .arg(0)
                    .arg(-1)
                    .query_async(&mut conn)
                    .await
            }
            JobState::Completed | JobState::Failed => {
                redis::cmd("ZRANGE")
                    .arg(self.terminal_key(state))
                    .arg(0)
                    .arg(-1)
                    .query_async(&mut conn)
                    .await
            }
        }
        .map_err(unavailable)?;
        Ok(ids.into_iter().map(JobId::new).collect())
    }

    async fn try_claim(&self, worker_id: &WorkerId) -> Result<Option<Lease>, JobQueueError> {
        let token = uuid::Uuid::new_v4().to_string();
        let mut conn = self.connection.clone();
        let claimed: Option<u64> = self
            .claim_script
            .key(self.key("wait"))
            .key(self.key("active"))
            .arg(&self.prefix)
            .arg(&token)
            .arg(self.lease_ttl_ms())
            .arg(Utc::now().to_rfc3339())
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let Some(id) = claimed.map(JobId::new) else {
            return Ok(None);
        };
        let job = self.load(id).await?.ok_or(JobQueueError::NotFound(id))?;

        let mut lease = Lease::new(job, worker_id.clone());
        lease.token = token;
        debug!(job_id = %id, worker_id = %worker_id, "Job claimed");
        Ok(Some(lease))
    }

    async fn finish(
        &self,
        lease: &Lease,
        target: JobState,
        reason: &str,
    ) -> Result<Job, JobQueueError> {
        let id = lease.job_id();
        let now = Utc::now();
        let mut conn = self.connection.clone();
        let outcome: i64 = self
            .finish_script
            .key(self.lock_key(id))
            .key(self.job_key(id))
            .key(self.key("active"))
            .key(self.terminal_key(target))
            .arg(&lease.token)
            .arg(target.as_str())
            .arg(now.to_rfc3339())
            .arg(now.timestamp_millis())
            .arg(id.value())
            .arg(reason)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        match outcome {
            1 => self.load(id).await?.ok_or(JobQueueError::NotFound(id)),
            0 => Err(JobQueueError::LeaseLost(id)),
            _ => {
                let from = self
                    .load(id)
                    .await?
                    .map(|job| job.state)
                    .ok_or(JobQueueError::NotFound(id))?;
                Err(JobQueueError::InvalidTransition {
                    job: id,
                    from,
                    to: target,
                })
            }
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    #[instrument(skip(self, manifest))]
    async fn submit(&self, manifest: Manifest) -> Result<JobId, JobQueueError> {
        let data = serde_json::to_string(&manifest)?;
        let mut conn = self.connection.clone();

        let id: u64 = redis::cmd("INCR")
            .arg(self.key("id"))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        let id = JobId::new(id);

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(self.job_key(id))
            .arg("data")
            .arg(data)
            .arg("state")
            .arg(JobState::Waiting.as_str())
            .arg("attempts")
            .arg(0)
            .arg("created_at")
            .arg(Utc::now().to_rfc3339())
            .ignore()
            .cmd("LPUSH")
            .arg(self.key("wait"))
            .arg(id.value())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(unavailable)?;

        debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobQueueError> {
        self.load(job_id).await
    }

    async fn list(&self, states: &[JobState]) -> Result<Vec<Job>, JobQueueError> {
        let mut ids = Vec::new();
        for state in JobState::ALL {
            if states.contains(&state) {
                ids.extend(self.ids_in(state).await?);
            }
        }
        ids.sort();
        ids.dedup();
        let jobs = self.load_many(&ids).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| states.contains(&job.state))
            .collect())
    }

    async fn counts_by_state(&self) -> Result<JobCounts, JobQueueError> {
        let mut conn = self.connection.clone();
        let (waiting, active, completed, failed): (u64, u64, u64, u64) = redis::pipe()
            .cmd("LLEN")
            .arg(self.key("wait"))
            .cmd("LLEN")
            .arg(self.key("active"))
            .cmd("ZCARD")
            .arg(self.terminal_key(JobState::Completed))
            .cmd("ZCARD")
            .arg(self.terminal_key(JobState::Failed))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(JobCounts {
            waiting,
            active,
            completed,
            failed,
        })
    }

    async fn claim(
        &self,
        worker_id: &WorkerId,
        wait: Duration,
    ) -> Result<Option<Lease>, JobQueueError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(lease) = self.try_claim(worker_id).await? {
                return Ok(Some(lease));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(CLAIM_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn renew(&self, lease: &Lease) -> Result<(), JobQueueError> {
        let id = lease.job_id();
        let mut conn = self.connection.clone();
        let renewed: i64 = self
            .renew_script
            .key(self.lock_key(id))
            .arg(&lease.token)
            .arg(self.lease_ttl_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        if renewed == 1 {
            Ok(())
        } else {
            Err(JobQueueError::LeaseLost(id))
        }
    }

    async fn complete(&self, lease: &Lease) -> Result<Job, JobQueueError> {
        self.finish(lease, JobState::Completed, "").await
    }

    async fn fail(&self, lease: &Lease, reason: &str) -> Result<Job, JobQueueError> {
        self.finish(lease, JobState::Failed, reason).await
    }

    async fn requeue_stalled(&self) -> Result<Vec<JobId>, JobQueueError> {
        let mut conn = self.connection.clone();
        let moved: Vec<u64> = self
            .requeue_script
            .key(self.key("active"))
            .key(self.key("wait"))
            .arg(&self.prefix)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let moved: Vec<JobId> = moved.into_iter().map(JobId::new).collect();
        for id in &moved {
            info!(job_id = %id, "Requeued stalled job");
        }
        Ok(moved)
    }
}

fn unavailable(err: redis::RedisError) -> JobQueueError {
    JobQueueError::Unavailable(err.to_string())
}

fn optional_timestamp(
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<Option<DateTime<Utc>>, JobQueueError> {
    match fields.get(name).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => parse_timestamp(name, raw).map(Some),
    }
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, JobQueueError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| JobQueueError::Serialization(format!("{}: {}", name, e)))
}

/// Rebuild a job from its hash; an empty hash means the job does not exist.
fn job_from_hash(id: JobId, fields: &HashMap<String, String>) -> Result<Option<Job>, JobQueueError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let required = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| JobQueueError::Serialization(format!("job {} missing {}", id, name)))
    };

    let data: Manifest = serde_json::from_str(required("data")?)?;
    let state = required("state")?
        .parse::<JobState>()
        .map_err(JobQueueError::Serialization)?;
    let attempts = required("attempts")?
        .parse::<u32>()
        .map_err(|e| JobQueueError::Serialization(format!("attempts: {}", e)))?;
    let created_at = parse_timestamp("created_at", required("created_at")?)?;

    Ok(Some(Job {
        id,
        state,
        data,
        attempts,
        created_at,
        started_at: optional_timestamp(fields, "started_at")?,
        finished_at: optional_timestamp(fields, "finished_at")?,
        failed_reason: fields.get("failed_reason").filter(|r| !r.is_empty()).cloned(),
    }))
}
