//! Fixed-size sample windows

/// A fixed-size circular buffer; the oldest sample is overwritten when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T: Copy, const N: usize> {
    data: [Option<T>; N],
    index: usize,
    count: usize,
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self {
            data: [None; N],
            index: 0,
            count: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        self.data[self.index] = Some(value);
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        self.data[(self.index + N - 1) % N]
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + '_ {
        let start = (self.index + N - self.count) % N;
        (0..self.count).filter_map(move |i| self.data[(start + i) % N])
    }

    pub fn clear(&mut self) {
        self.data = [None; N];
        self.index = 0;
        self.count = 0;
    }
}

impl<const N: usize> RingBuffer<f32, N> {
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.count as f32
    }

    /// Difference between the mean of the newer half and the older half.
    /// Negative when values are falling.
    pub fn trend(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        let half = self.count / 2;
        let older: f32 = self.iter().take(half).sum::<f32>() / half as f32;
        let newer: f32 = self.iter().skip(self.count - half).sum::<f32>() / half as f32;
        newer - older
    }
}
