//! Audio track mixing
//!
//! Combines the system-output and microphone tracks into one stereo track
//! with per-source gain, resampling and channel-folding as needed.

/// PCM samples captured from one source, interleaved by channel
#[derive(Debug, Clone, Default)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioTrack {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame count (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Target sample rate for the mixed output
pub const MIX_SAMPLE_RATE: u32 = 48_000;
/// Mixed output is always stereo
pub const MIX_CHANNELS: u16 = 2;

/// Mix system and microphone tracks into one stereo track.
///
/// Either input may be empty. Both tracks are converted to 48kHz stereo
/// before the gain-weighted sum; the shorter track pads with silence so the
/// mix covers the full call. Output samples are clamped to [-1, 1].
pub fn mix_tracks(
    system: &AudioTrack,
    microphone: &AudioTrack,
    system_gain: f32,
    microphone_gain: f32,
) -> AudioTrack {
    let sys = to_stereo_48k(system);
    let mic = to_stereo_48k(microphone);

    let len = sys.len().max(mic.len());
    let mut mixed = Vec::with_capacity(len);

    for i in 0..len {
        let a = sys.get(i).copied().unwrap_or(0.0) * system_gain;
        let b = mic.get(i).copied().unwrap_or(0.0) * microphone_gain;
        mixed.push((a + b).clamp(-1.0, 1.0));
    }

    AudioTrack {
        samples: mixed,
        sample_rate: MIX_SAMPLE_RATE,
        channels: MIX_CHANNELS,
    }
}

fn to_stereo_48k(track: &AudioTrack) -> Vec<f32> {
    if track.is_empty() || track.channels == 0 || track.sample_rate == 0 {
        return Vec::new();
    }

    // Fold to mono per frame, then resample, then duplicate to stereo.
    // Folding first keeps the resampler a single linear pass.
    let channels = track.channels as usize;
    let mono: Vec<f32> = track
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    let resampled = if track.sample_rate == MIX_SAMPLE_RATE {
        mono
    } else {
        resample_linear(&mono, track.sample_rate, MIX_SAMPLE_RATE)
    };

    let mut stereo = Vec::with_capacity(resampled.len() * 2);
    for s in resampled {
        stereo.push(s);
        stereo.push(s);
    }
    stereo
}

fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() {
        return Vec::new();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = input[idx.min(input.len() - 1)];
        let b = input[(idx + 1).min(input.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(samples: Vec<f32>, sample_rate: u32, channels: u16) -> AudioTrack {
        AudioTrack {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn mixes_with_gains() {
        let sys = track(vec![0.1, 0.1], 48_000, 2);
        let mic = track(vec![0.1, 0.1], 48_000, 2);
        let mixed = mix_tracks(&sys, &mic, 2.0, 1.5);
        assert_eq!(mixed.channels, 2);
        assert_eq!(mixed.sample_rate, 48_000);
        // 0.1 * 2.0 + 0.1 * 1.5 = 0.35
        assert!((mixed.samples[0] - 0.35).abs() < 1e-6);
    }

    #[test]
    fn clamps_hot_signal() {
        let sys = track(vec![0.9, 0.9], 48_000, 2);
        let mic = track(vec![0.9, 0.9], 48_000, 2);
        let mixed = mix_tracks(&sys, &mic, 2.0, 1.5);
        assert!(mixed.samples.iter().all(|s| *s <= 1.0));
    }

    #[test]
    fn shorter_track_pads_with_silence() {
        let sys = track(vec![0.2; 8], 48_000, 2);
        let mic = track(vec![0.2; 4], 48_000, 2);
        let mixed = mix_tracks(&sys, &mic, 1.0, 1.0);
        assert_eq!(mixed.samples.len(), 8);
        assert!((mixed.samples[6] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_produce_empty_mix() {
        let mixed = mix_tracks(&AudioTrack::empty(), &AudioTrack::empty(), 2.0, 1.5);
        assert!(mixed.is_empty());
    }

    #[test]
    fn mono_source_folds_to_stereo() {
        let mic = track(vec![0.5, 0.5, 0.5, 0.5], 48_000, 1);
        let mixed = mix_tracks(&AudioTrack::empty(), &mic, 2.0, 1.0);
        // 4 mono frames become 4 stereo frames
        assert_eq!(mixed.samples.len(), 8);
        assert!((mixed.samples[0] - 0.5).abs() < 1e-6);
        assert!((mixed.samples[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn resamples_lower_rate_source() {
        let mic = track(vec![0.25; 24_000], 24_000, 1);
        let mixed = mix_tracks(&AudioTrack::empty(), &mic, 1.0, 1.0);
        // Half-rate input roughly doubles in frame count
        let frames = mixed.frames();
        assert!(frames > 47_000 && frames < 49_000, "frames = {}", frames);
    }
}
