//! Snowflake identifiers: 41 bits of milliseconds since a custom epoch, a
//! 10-bit worker id and a 12-bit per-millisecond sequence.

use std::sync::Mutex;
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use warden_core::{Error, IdGenerator, Result};

/// 2025-01-01T00:00:00Z in milliseconds.
const EPOCH_MILLIS: u64 = 1_735_689_600_000;
const WORKER_ID_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;

#[derive(Debug)]
struct SnowflakeState {
    last_timestamp: u64,
    sequence: u16,
}

/// Thread-safe snowflake [`IdGenerator`]; ids are rendered as decimal strings.
#[derive(Debug)]
pub struct SnowflakeIdGenerator {
    worker_id: u16,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator {
    pub fn new(worker_id: u16) -> Result<Self> {
        if worker_id > MAX_WORKER_ID {
            return Err(Error::invalid_argument(format!(
                "worker id must be at most {MAX_WORKER_ID}"
            )));
        }
        Ok(Self {
            worker_id,
            state: Mutex::new(SnowflakeState {
                last_timestamp: 0,
                sequence: 0,
            }),
        })
    }

    fn next_raw(&self) -> Result<u64> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::internal("id generator lock poisoned"))?;
        loop {
            let mut timestamp = current_millis()?;
            if timestamp < state.last_timestamp {
                sleep(Duration::from_millis(state.last_timestamp - timestamp));
                continue;
            }

            if timestamp == state.last_timestamp {
                state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
                if state.sequence == 0 {
                    timestamp = wait_next_millis(state.last_timestamp)?;
                }
            } else {
                state.sequence = 0;
            }

            state.last_timestamp = timestamp;
            let elapsed = timestamp.saturating_sub(EPOCH_MILLIS);
            return Ok((elapsed << (WORKER_ID_BITS + SEQUENCE_BITS))
                | ((self.worker_id as u64) << SEQUENCE_BITS)
                | state.sequence as u64);
        }
    }
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> Result<String> {
        self.next_raw().map(|id| id.to_string())
    }
}

fn current_millis() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| Error::internal("system time before unix epoch"))
}

fn wait_next_millis(last_timestamp: u64) -> Result<u64> {
    loop {
        let timestamp = current_millis()?;
        if timestamp > last_timestamp {
            return Ok(timestamp);
        }
        sleep(Duration::from_micros(100));
    }
}
