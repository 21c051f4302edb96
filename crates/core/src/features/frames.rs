/// Lazy sequence of fixed-length analysis frames over a signal.
///
/// Yields borrowed views starting at `0, hop, 2*hop, ...` for as long as a full frame fits.
/// A trailing partial frame is dropped, so a signal shorter than one frame yields nothing.
#[derive(Clone, Debug)]
pub struct Frames<'a> {
    signal: &'a [f32],
    frame_len: usize,
    hop: usize,
    offset: usize,
}

impl<'a> Frames<'a> {
    pub fn new(signal: &'a [f32], frame_len: usize, hop: usize) -> Self {
        Self {
            signal,
            frame_len,
            hop: hop.max(1),
            offset: 0,
        }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame_len == 0 {
            return None;
        }
        let end = self.offset.checked_add(self.frame_len)?;
        if end > self.signal.len() {
            return None;
        }
        let frame = &self.signal[self.offset..end];
        self.offset += self.hop;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.signal.len().saturating_sub(self.offset);
        let n = frame_count(remaining, self.frame_len, self.hop);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Frames<'_> {}

pub fn frame_count(signal_len: usize, frame_len: usize, hop: usize) -> usize {
    if frame_len == 0 || signal_len < frame_len {
        return 0;
    }
    (signal_len - frame_len) / hop.max(1) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorter_than_one_frame_yields_nothing() {
        let signal = vec![0.5f32; 2047];
        assert_eq!(Frames::new(&signal, 2048, 512).count(), 0);
        assert_eq!(frame_count(signal.len(), 2048, 512), 0);
        assert_eq!(Frames::new(&[], 2048, 512).count(), 0);
    }

    #[test]
    fn exact_frame_yields_one() {
        let signal = vec![0.0f32; 2048];
        let frames: Vec<_> = Frames::new(&signal, 2048, 512).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 2048);
    }

    #[test]
    fn offsets_advance_by_hop_and_partial_tail_is_dropped() {
        let signal: Vec<f32> = (0..4000).map(|i| i as f32).collect();
        let frames: Vec<_> = Frames::new(&signal, 2048, 512).collect();
        // offsets 0, 512, 1024, 1536; 2048 + 2048 > 4000
        assert_eq!(frames.len(), 4);
        assert_eq!(frame_count(4000, 2048, 512), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame[0], (i * 512) as f32);
            assert_eq!(frame.len(), 2048);
        }
    }

    #[test]
    fn size_hint_matches_count() {
        let signal = vec![0.0f32; 16_000];
        let frames = Frames::new(&signal, 2048, 512);
        assert_eq!(frames.len(), frames.clone().count());
    }
}
