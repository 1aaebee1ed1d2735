use scil_core::Result;

/// Double-buffered scratch space for running a chain.
///
/// The first stage reads the caller's source slice. Every stage then writes
/// into the region the previous stage did not write, and the two regions
/// swap roles. A stage never reads and writes the same region.
pub struct StageBuffers<'a> {
    source: &'a [u8],
    front: Vec<u8>,
    back: Vec<u8>,
    loaded: bool,
}

impl<'a> StageBuffers<'a> {
    /// Both regions are preallocated with `capacity` bytes.
    pub fn new(source: &'a [u8], capacity: usize) -> Self {
        Self {
            source,
            front: Vec::with_capacity(capacity),
            back: Vec::with_capacity(capacity),
            loaded: false,
        }
    }

    /// Output of the last stage, or the source before any stage ran.
    pub fn current(&self) -> &[u8] {
        if self.loaded {
            &self.front
        } else {
            self.source
        }
    }

    /// Run one stage from the current region into the other one.
    pub fn run<R, F>(&mut self, stage: F) -> Result<R>
    where
        F: FnOnce(&[u8], &mut Vec<u8>) -> Result<R>,
    {
        let Self { source, front, back, loaded } = self;
        back.clear();
        let input: &[u8] = if *loaded { front.as_slice() } else { *source };
        let out = stage(input, back)?;
        std::mem::swap(front, back);
        *loaded = true;
        Ok(out)
    }

    /// Append `bytes` to the current region.
    pub fn append(&mut self, bytes: &[u8]) {
        if !self.loaded {
            self.front.clear();
            self.front.extend_from_slice(self.source);
            self.loaded = true;
        }
        self.front.extend_from_slice(bytes);
    }

    pub fn into_output(self) -> Vec<u8> {
        if self.loaded {
            self.front
        } else {
            self.source.to_vec()
        }
    }
}
