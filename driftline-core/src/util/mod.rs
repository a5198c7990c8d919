mod id;

pub use id::*;

use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Milliseconds since the unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}
