//! Bead identifiers: `<prefix>-<suffix>` with a short random base36 suffix.
//!
//! Suffixes start at [`MIN_SUFFIX_LEN`] characters. When a freshly sampled id
//! collides too often with the tenant's existing keys the generator widens by
//! one character, up to [`MAX_SUFFIX_LEN`]. Widening is sticky for the life of
//! the generator.

use rand::RngCore;

use crate::error::{ErrorCode, StoreError, StoreResult};

pub const DEFAULT_PREFIX: &str = "bd";
pub const MIN_SUFFIX_LEN: usize = 4;
pub const MAX_SUFFIX_LEN: usize = 8;

const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ATTEMPTS_PER_WIDTH: usize = 8;

#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    width: usize,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            width: MIN_SUFFIX_LEN,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Current suffix width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// The literal that precedes every suffix, e.g. `bd-`.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("{}-", self.prefix)
    }

    /// Allocate an id for which `taken` returns false.
    pub fn generate(&mut self, taken: impl Fn(&str) -> bool) -> StoreResult<String> {
        self.generate_with(&mut rand::thread_rng(), taken)
    }

    /// Same as [`generate`](Self::generate) with an explicit random source.
    pub fn generate_with<R: RngCore>(
        &mut self,
        rng: &mut R,
        taken: impl Fn(&str) -> bool,
    ) -> StoreResult<String> {
        loop {
            for _ in 0..ATTEMPTS_PER_WIDTH {
                let candidate = self.sample(rng);
                if !taken(&candidate) {
                    return Ok(candidate);
                }
            }
            if self.width >= MAX_SUFFIX_LEN {
                return Err(StoreError::Invalid {
                    code: ErrorCode::IdSpaceExhausted,
                    message: format!(
                        "no free id after {ATTEMPTS_PER_WIDTH} attempts at width {MAX_SUFFIX_LEN}"
                    ),
                });
            }
            self.width += 1;
            tracing::debug!(width = self.width, "widening id suffix after collisions");
        }
    }

    fn sample<R: RngCore>(&self, rng: &mut R) -> String {
        let mut bytes = [0u8; MAX_SUFFIX_LEN];
        rng.fill_bytes(&mut bytes[..self.width]);
        let suffix: String = bytes[..self.width]
            .iter()
            .map(|b| char::from(ALPHABET[usize::from(*b) % ALPHABET.len()]))
            .collect();
        format!("{}-{suffix}", self.prefix)
    }

    #[cfg(test)]
    fn is_well_formed(&self, id: &str) -> bool {
        id.strip_prefix(&self.marker()).is_some_and(|suffix| {
            (MIN_SUFFIX_LEN..=MAX_SUFFIX_LEN).contains(&suffix.len())
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
    }

    /// Resolve a full id or a prefix of one against the current keyset.
    ///
    /// The prefix may be given with or without the marker (`bd-ab`, `ab`).
    /// An exact full-id match always wins.
    pub fn resolve<'a>(
        &self,
        input: &str,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> StoreResult<String> {
        let needle = input.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(StoreError::not_found(input));
        }
        let marker = self.marker();
        let bare = needle.strip_prefix(&marker).unwrap_or(&needle);

        let mut candidates: Vec<String> = Vec::new();
        for id in ids {
            if id == needle {
                return Ok(id.to_string());
            }
            let suffix = id.strip_prefix(&marker).unwrap_or(id);
            if suffix.starts_with(bare) || id.starts_with(&needle) {
                candidates.push(id.to_string());
            }
        }

        candidates.sort();
        candidates.dedup();
        match candidates.len() {
            0 => Err(StoreError::not_found(input)),
            1 => Ok(candidates.remove(0)),
            _ => Err(StoreError::Ambiguous {
                prefix: input.to_string(),
                candidates,
            }),
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
