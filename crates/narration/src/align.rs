//! Segment alignment.
//!
//! Given N narration texts spoken as one continuous audio file, the N-1
//! longest detected silences become segment boundaries (at their
//! midpoints). When detection finds fewer silences than boundaries needed,
//! alignment falls back to proportional splitting by text length.

use crate::silence::SilenceSpan;

/// One aligned narration segment window within the full audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentWindow {
    pub index: usize,
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl SegmentWindow {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// How the segment boundaries were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMethod {
    /// Midpoints of the N-1 longest silences.
    Silence,
    /// Proportional split by text length (insufficient silences).
    Proportional,
}

/// Align `texts` over a `total_ms` audio file using detected silences.
pub fn align_segments(
    texts: &[String],
    total_ms: i64,
    silences: &[SilenceSpan],
) -> (Vec<SegmentWindow>, AlignmentMethod) {
    let n = texts.len();
    if n == 0 {
        return (Vec::new(), AlignmentMethod::Silence);
    }
    if n == 1 {
        return (
            vec![SegmentWindow {
                index: 0,
                text: texts[0].clone(),
                start_ms: 0,
                end_ms: total_ms,
            }],
            AlignmentMethod::Silence,
        );
    }

    let needed = n - 1;
    if silences.len() < needed {
        return (
            proportional_split(texts, total_ms),
            AlignmentMethod::Proportional,
        );
    }

    // Longest N-1 silences, then back in temporal order.
    let mut by_length: Vec<SilenceSpan> = silences.to_vec();
    by_length.sort_by(|a, b| b.duration_ms().cmp(&a.duration_ms()));
    let mut chosen: Vec<SilenceSpan> = by_length.into_iter().take(needed).collect();
    chosen.sort_by_key(|s| s.start_ms);

    let mut windows = Vec::with_capacity(n);
    let mut prev_boundary = 0i64;
    for (index, text) in texts.iter().enumerate() {
        let end_ms = if index < needed {
            chosen[index].midpoint_ms()
        } else {
            total_ms
        };
        windows.push(SegmentWindow {
            index,
            text: text.clone(),
            start_ms: prev_boundary,
            end_ms,
        });
        prev_boundary = end_ms;
    }
    (windows, AlignmentMethod::Silence)
}

fn proportional_split(texts: &[String], total_ms: i64) -> Vec<SegmentWindow> {
    let total_chars: usize = texts.iter().map(|t| t.chars().count().max(1)).sum();
    let mut windows = Vec::with_capacity(texts.len());
    let mut cursor = 0i64;
    let mut consumed_chars = 0usize;

    for (index, text) in texts.iter().enumerate() {
        consumed_chars += text.chars().count().max(1);
        let end_ms = if index == texts.len() - 1 {
            total_ms
        } else {
            (total_ms as i128 * consumed_chars as i128 / total_chars as i128) as i64
        };
        windows.push(SegmentWindow {
            index,
            text: text.clone(),
            start_ms: cursor,
            end_ms,
        });
        cursor = end_ms;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn three_texts_two_silences_split_at_midpoints() {
        // Three segments over 6000 ms with silences at (1800,2100) and
        // (3900,4200): windows [0,1950), [1950,4050), [4050,6000).
        let silences = vec![
            SilenceSpan {
                start_ms: 1800,
                end_ms: 2100,
            },
            SilenceSpan {
                start_ms: 3900,
                end_ms: 4200,
            },
        ];
        let (windows, method) =
            align_segments(&texts(&["Alpha", "Bravo", "Charlie"]), 6000, &silences);

        assert_eq!(method, AlignmentMethod::Silence);
        assert_eq!(windows.len(), 3);
        assert_eq!((windows[0].start_ms, windows[0].end_ms), (0, 1950));
        assert_eq!((windows[1].start_ms, windows[1].end_ms), (1950, 4050));
        assert_eq!((windows[2].start_ms, windows[2].end_ms), (4050, 6000));
        assert_eq!(windows[1].duration_ms(), 2100);
    }

    #[test]
    fn longest_silences_win_then_resort_by_time() {
        // Four silences, two boundaries needed: the two longest are the
        // first and last; they must be used in temporal order.
        let silences = vec![
            SilenceSpan {
                start_ms: 1000,
                end_ms: 1600,
            },
            SilenceSpan {
                start_ms: 2500,
                end_ms: 2600,
            },
            SilenceSpan {
                start_ms: 3000,
                end_ms: 3100,
            },
            SilenceSpan {
                start_ms: 4000,
                end_ms: 4500,
            },
        ];
        let (windows, method) = align_segments(&texts(&["a", "b", "c"]), 6000, &silences);
        assert_eq!(method, AlignmentMethod::Silence);
        assert_eq!(windows[0].end_ms, 1300);
        assert_eq!(windows[1].end_ms, 4250);
        assert_eq!(windows[2].end_ms, 6000);
    }

    #[test]
    fn insufficient_silences_fall_back_to_proportional() {
        let silences = vec![SilenceSpan {
            start_ms: 1000,
            end_ms: 1200,
        }];
        // 10 and 30 chars over 4000 ms: boundary at 1000.
        let (windows, method) = align_segments(
            &texts(&["aaaaaaaaaa", "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "c"]),
            4100,
            &silences,
        );
        assert_eq!(method, AlignmentMethod::Proportional);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].end_ms, 1000);
        assert_eq!(windows[1].end_ms, 4000);
        assert_eq!(windows[2].end_ms, 4100);
    }

    #[test]
    fn single_text_spans_whole_audio() {
        let (windows, _) = align_segments(&texts(&["solo"]), 2500, &[]);
        assert_eq!(windows.len(), 1);
        assert_eq!((windows[0].start_ms, windows[0].end_ms), (0, 2500));
    }

    #[test]
    fn windows_partition_the_audio_exactly() {
        let silences = vec![
            SilenceSpan {
                start_ms: 900,
                end_ms: 1100,
            },
            SilenceSpan {
                start_ms: 2900,
                end_ms: 3300,
            },
        ];
        let (windows, _) = align_segments(&texts(&["x", "y", "z"]), 5000, &silences);
        assert_eq!(windows[0].start_ms, 0);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(windows.last().unwrap().end_ms, 5000);
    }
}
