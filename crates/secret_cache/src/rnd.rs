// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Source of the jitter applied to expiry deadlines and backoff delays.
///
/// Jitter only spreads refreshes and retries over time, so `fastrand` is
/// enough. Tests pin the source to a constant.
#[derive(Debug, Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Fastrand,

    #[cfg(test)]
    Fixed(f64),
}

impl Rnd {
    #[cfg(test)]
    pub fn new_fixed(value: f64) -> Self {
        Self::Fixed(value)
    }

    /// Returns a value in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        match self {
            Self::Fastrand => fastrand::f64(),
            #[cfg(test)]
            Self::Fixed(value) => *value,
        }
    }
}
