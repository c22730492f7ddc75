/// Fixed-capacity circular buffer retaining the most recent items.
///
/// `start`/`end` walk the slot array modulo its length; `full`
/// disambiguates the empty and full cases where `start == end`.
#[derive(Debug)]
pub struct Ring<T> {
    items: Vec<Option<T>>,
    start: usize,
    end: usize,
    full: bool,
}

impl<T: Clone> Ring<T> {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Ring {
            items: vec![None; capacity],
            start: 0,
            end: 0,
            full: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.start == self.end
    }

    pub fn len(&self) -> usize {
        let cap = self.items.len();
        if self.full {
            cap
        } else if self.end >= self.start {
            self.end - self.start
        } else {
            cap - self.start + self.end
        }
    }

    /// Appends an item in O(1), evicting the single oldest one when at
    /// capacity.
    pub fn add(&mut self, item: T) {
        let cap = self.items.len();
        if self.full {
            // start == end here; the slot at start holds the oldest item.
            self.items[self.start] = Some(item);
            self.start = (self.start + 1) % cap;
            self.end = self.start;
        } else {
            self.items[self.end] = Some(item);
            self.end = (self.end + 1) % cap;
            if self.end == self.start {
                self.full = true;
            }
        }
    }

    /// Returns the retained items oldest to newest, walking across the
    /// wraparound boundary when `end <= start`.
    pub fn get(&self) -> Vec<T> {
        let cap = self.items.len();
        let mut out = Vec::with_capacity(self.len());
        let mut idx = self.start;
        for _ in 0..self.len() {
            if let Some(item) = &self.items[idx] {
                out.push(item.clone());
            }
            idx = (idx + 1) % cap;
        }
        out
    }
}
