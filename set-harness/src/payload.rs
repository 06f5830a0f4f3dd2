//! Request bodies sent to the deployed function.

use bytes::Bytes;
use rand::Rng;
use serde::Serialize;
use set_bencher::Job;

/// Produces the serialized [`Job`] for every request.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PayloadGenerator {
    /// Every request carries the same job.
    Constant {
        /// The job sent with every request.
        job: Job,
        /// `job` serialized once up front.
        #[serde(skip)]
        body: Bytes,
    },
    /// Every request carries a fresh prime candidate.
    Prime {
        /// Exclusive upper bound of both random draws.
        upper_bound: u32,
    },
}

impl PayloadGenerator {
    /// Creates a generator that serializes `job` once and repeats it.
    pub fn constant(job: Job) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(&job)?.into();
        Ok(Self::Constant { job, body })
    }

    /// Creates a generator of prime jobs with candidates below `2 * upper_bound`.
    pub fn prime(upper_bound: u32) -> Self {
        Self::Prime { upper_bound }
    }

    /// Returns the body of the next request.
    pub fn next_body(&self) -> serde_json::Result<Bytes> {
        self.next_body_with(&mut rand::rng())
    }

    /// Like [`next_body`](Self::next_body), drawing randomness from `rng`.
    pub fn next_body_with<R: Rng>(&self, rng: &mut R) -> serde_json::Result<Bytes> {
        match self {
            Self::Constant { body, .. } => Ok(body.clone()),
            Self::Prime { upper_bound } => {
                let job = Job::prime(prime_candidate(*upper_bound, rng));
                serde_json::to_vec(&job).map(Bytes::from)
            }
        }
    }
}

/// Draws two values from `[0, upper_bound)` and returns their sum minus one.
///
/// Two zero draws wrap around to `u32::MAX`.
pub fn prime_candidate<R: Rng>(upper_bound: u32, rng: &mut R) -> u32 {
    let bound = upper_bound.max(1);
    let a = i64::from(rng.random_range(0..bound));
    let b = i64::from(rng.random_range(0..bound));
    (a + b - 1) as u32
}
