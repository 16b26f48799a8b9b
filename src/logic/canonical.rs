//! Canonical court templates: one representative per relabeling class of a 2v2 court layout.
//!
//! A template is a flat list of `4 * courts` local indices in `[0, playing_count)`; court `c`
//! occupies slots `4c..4c + 4` as `(a1, a2)` vs `(b1, b2)`. Every emitted template satisfies:
//!
//! 1. `a1 < a2` and `b1 < b2`,
//! 2. `a1 < b1`,
//! 3. `a1` of court `c` is smaller than `a1` of court `c + 1`.
//!
//! Templates are built directly (never generated and filtered): the smallest free index always
//! opens the next court, every other free index may be its partner, and every 2-combination of
//! what remains forms the opposing pair. For `n = 4c` players this yields `n! / (2^(3c) * c!)`
//! templates, e.g. 315 for two courts instead of 40 320 permutations.

use crate::models::ScheduleError;
use std::collections::HashMap;
use std::sync::Arc;

/// Court layout over local indices; map through a playing-player list to get real ids.
pub type Template = Vec<usize>;

/// Number of canonical templates for `courts` full courts, saturating at `u64::MAX`.
pub fn canonical_count(courts: usize) -> u64 {
    let mut total: u64 = 1;
    for level in 1..=courts as u64 {
        let free = 4 * level;
        // partner choices for the smallest free index, times opposing pairs from the rest
        let choices = (free - 1) * ((free - 2) * (free - 3) / 2);
        total = total.saturating_mul(choices);
    }
    total
}

/// True if `template` obeys all three ordering rules.
pub fn is_canonical(template: &[usize]) -> bool {
    if template.len() % 4 != 0 {
        return false;
    }
    let courts: Vec<&[usize]> = template.chunks_exact(4).collect();
    let courts_ok = courts
        .iter()
        .all(|c| c[0] < c[1] && c[2] < c[3] && c[0] < c[2]);
    courts_ok && courts.windows(2).all(|w| w[0][0] < w[1][0])
}

/// Choice state for one court while streaming: the free indices on entry and the current
/// `(partner, opposing pair)` selection.
#[derive(Clone, Debug)]
struct Level {
    free: Vec<usize>,
    /// Position of pair A's second slot in `free`.
    i: usize,
    /// Positions of pair B in `free` minus `free[0]` and `free[i]`.
    j: usize,
    k: usize,
}

impl Level {
    fn new(free: Vec<usize>) -> Self {
        Self { free, i: 1, j: 0, k: 1 }
    }

    fn rest(&self) -> Vec<usize> {
        self.free
            .iter()
            .enumerate()
            .skip(1)
            .filter(|&(idx, _)| idx != self.i)
            .map(|(_, &p)| p)
            .collect()
    }

    /// Write this court's four slots and return the indices left for later courts.
    fn write(&self, slots: &mut [usize]) -> Vec<usize> {
        let rest = self.rest();
        slots[0] = self.free[0];
        slots[1] = self.free[self.i];
        slots[2] = rest[self.j];
        slots[3] = rest[self.k];
        rest.into_iter()
            .enumerate()
            .filter(|&(idx, _)| idx != self.j && idx != self.k)
            .map(|(_, p)| p)
            .collect()
    }

    /// Step to the next selection; false once every selection has been used.
    fn advance(&mut self) -> bool {
        let m = self.free.len() - 2;
        self.k += 1;
        if self.k < m {
            return true;
        }
        self.j += 1;
        self.k = self.j + 1;
        if self.k < m {
            return true;
        }
        self.i += 1;
        self.j = 0;
        self.k = 1;
        self.i < self.free.len()
    }
}

/// Lazy, non-restartable stream of canonical templates.
///
/// The yielded slice is a view into an internal buffer that is overwritten by the next call to
/// [`TemplateStream::next_template`]; copy it (`to_vec`) to keep it. The borrow checker enforces
/// this: the slice borrows the stream.
#[derive(Clone, Debug)]
pub struct TemplateStream {
    courts: usize,
    levels: Vec<Level>,
    buf: Vec<usize>,
    started: bool,
    done: bool,
}

impl TemplateStream {
    pub fn new(courts: usize) -> Self {
        Self {
            courts,
            levels: Vec::with_capacity(courts),
            buf: vec![0; courts * 4],
            started: false,
            done: courts == 0,
        }
    }

    pub fn next_template(&mut self) -> Option<&[usize]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            self.levels.push(Level::new((0..self.courts * 4).collect()));
            self.descend_from(0);
            return Some(self.buf.as_slice());
        }
        let mut depth = self.courts;
        while depth > 0 {
            depth -= 1;
            if self.levels[depth].advance() {
                self.descend_from(depth);
                return Some(self.buf.as_slice());
            }
        }
        self.done = true;
        None
    }

    /// Materialize everything that is left.
    pub fn collect_all(mut self) -> Vec<Template> {
        let mut out = Vec::new();
        while let Some(t) = self.next_template() {
            out.push(t.to_vec());
        }
        out
    }

    /// Write `levels[depth]` into the buffer and reset every deeper court to its first selection.
    fn descend_from(&mut self, depth: usize) {
        let mut d = depth;
        loop {
            let next_free = self.levels[d].write(&mut self.buf[d * 4..d * 4 + 4]);
            d += 1;
            if d == self.courts {
                break;
            }
            self.levels.truncate(d);
            self.levels.push(Level::new(next_free));
        }
    }
}

#[derive(Clone, Debug)]
enum Source {
    Cached(Arc<Vec<Template>>),
    Lazy(TemplateStream),
}

/// One pass over the templates for a `(courts, playing_count)` size, cached or streamed.
#[derive(Clone, Debug)]
pub struct TemplateCursor {
    source: Source,
    pos: usize,
}

impl TemplateCursor {
    /// Next template; same copy-to-retain contract as [`TemplateStream::next_template`].
    pub fn next_template(&mut self) -> Option<&[usize]> {
        match &mut self.source {
            Source::Cached(list) => {
                let t = list.get(self.pos)?;
                self.pos += 1;
                Some(t.as_slice())
            }
            Source::Lazy(stream) => stream.next_template(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.source, Source::Lazy(_))
    }
}

/// Template sets keyed by `(courts, playing_count)`, shared by every player subset of that size.
/// Entries are never evicted.
#[derive(Debug)]
pub struct TemplateCache {
    materialize_limit: u64,
    entries: HashMap<(usize, usize), Arc<Vec<Template>>>,
}

impl TemplateCache {
    pub fn new(materialize_limit: u64) -> Self {
        Self {
            materialize_limit,
            entries: HashMap::new(),
        }
    }

    /// Start a pass over the canonical templates. `playing_count` must be `4 * courts`.
    pub fn templates(&mut self, courts: usize, playing_count: usize) -> Result<TemplateCursor, ScheduleError> {
        if courts == 0 || playing_count != courts * 4 {
            return Err(ScheduleError::InvalidParameters(format!(
                "{playing_count} playing players cannot fill {courts} court(s) exactly"
            )));
        }
        let count = canonical_count(courts);
        if count > self.materialize_limit {
            return Ok(TemplateCursor {
                source: Source::Lazy(TemplateStream::new(courts)),
                pos: 0,
            });
        }
        let list = self
            .entries
            .entry((courts, playing_count))
            .or_insert_with(|| {
                log::trace!("Materializing {count} templates for {courts} court(s)");
                Arc::new(TemplateStream::new(courts).collect_all())
            })
            .clone();
        Ok(TemplateCursor {
            source: Source::Cached(list),
            pos: 0,
        })
    }

    /// Number of cached template sets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().materialize_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_walks_every_selection_once() {
        let mut level = Level::new((0..8).collect());
        let mut seen = 1;
        while level.advance() {
            seen += 1;
        }
        assert_eq!(seen, 7 * 15);
    }

    #[test]
    fn single_court_templates_in_emission_order() {
        let all = TemplateStream::new(1).collect_all();
        assert_eq!(all, vec![vec![0, 1, 2, 3], vec![0, 2, 1, 3], vec![0, 3, 1, 2]]);
    }
}
