//! Reverb send — procedural impulse response through FFT convolution.
//!
//! The hall character comes from a synthesized stereo impulse response
//! (white noise shaped by a `(1-t)^decay` envelope) instead of a bundled
//! audio asset. Convolution runs as uniformly partitioned overlap-save with
//! a frequency-domain delay line, so impulse responses of a few seconds
//! stay affordable per block.

use std::collections::VecDeque;
use std::sync::Arc;

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// Partition (hop) size in samples. FFT frames are twice this.
const PARTITION: usize = 256;

/// Synthesize one channel of a hall impulse response: white noise under an
/// exponential-style decay envelope, normalized to unit energy.
pub fn hall_impulse_response(
    sample_rate: f64,
    seconds: f64,
    decay: f64,
    seed: u64,
) -> Vec<f32> {
    let len = ((sample_rate * seconds) as usize).max(1);
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut ir: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f64 / len as f64;
            let envelope = (1.0 - t).powf(decay);
            ((rng.f64() * 2.0 - 1.0) * envelope) as f32
        })
        .collect();

    // Unit-energy normalization keeps the wet level independent of IR length.
    let energy: f32 = ir.iter().map(|s| s * s).sum();
    if energy > 0.0 {
        let scale = 1.0 / energy.sqrt();
        for s in ir.iter_mut() {
            *s *= scale;
        }
    }
    ir
}

/// Mono partitioned convolver.
struct Convolver {
    fft_size: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    /// FFT of each zero-padded IR partition.
    ir_partitions: Vec<Vec<Complex<f32>>>,
    /// Spectra of recent input frames, newest first (frequency-domain
    /// delay line, one slot per partition).
    history: VecDeque<Vec<Complex<f32>>>,
    /// Previous input block, for the overlap-save frame.
    prev_block: Vec<f32>,
    /// Input samples accumulated toward the next hop.
    pending: Vec<f32>,
    /// Rendered output samples not yet consumed.
    ready: VecDeque<f32>,
    // Scratch buffers reused across hops.
    frame: Vec<f32>,
    spectrum_sum: Vec<Complex<f32>>,
    time_out: Vec<f32>,
}

impl Convolver {
    fn new(impulse_response: &[f32]) -> Self {
        let fft_size = PARTITION * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);
        let bins = fft_size / 2 + 1;

        let num_partitions = impulse_response.len().div_ceil(PARTITION).max(1);
        let mut ir_partitions = Vec::with_capacity(num_partitions);
        let mut scratch = r2c.make_scratch_vec();
        for p in 0..num_partitions {
            let start = p * PARTITION;
            let end = (start + PARTITION).min(impulse_response.len());
            let mut padded = vec![0.0_f32; fft_size];
            padded[..end - start].copy_from_slice(&impulse_response[start..end]);
            let mut spectrum = vec![Complex::new(0.0, 0.0); bins];
            // Forward FFT of a finite buffer cannot fail.
            let _ = r2c.process_with_scratch(&mut padded, &mut spectrum, &mut scratch);
            ir_partitions.push(spectrum);
        }

        let history = (0..num_partitions)
            .map(|_| vec![Complex::new(0.0, 0.0); bins])
            .collect();

        Convolver {
            fft_size,
            r2c,
            c2r,
            ir_partitions,
            history,
            prev_block: vec![0.0; PARTITION],
            pending: Vec::with_capacity(PARTITION),
            ready: VecDeque::with_capacity(PARTITION * 2),
            frame: vec![0.0; fft_size],
            spectrum_sum: vec![Complex::new(0.0, 0.0); bins],
            time_out: vec![0.0; fft_size],
        }
    }

    /// Push one dry sample, pull one wet sample (one hop of latency).
    fn process(&mut self, input: f32) -> f32 {
        let out = self.ready.pop_front().unwrap_or(0.0);
        self.pending.push(input);
        if self.pending.len() == PARTITION {
            self.hop();
        }
        out
    }

    /// Run one partition hop: FFT the overlap-save frame, multiply-accumulate
    /// against every IR partition via the delay line, IFFT, keep the valid
    /// half.
    fn hop(&mut self) {
        self.frame[..PARTITION].copy_from_slice(&self.prev_block);
        self.frame[PARTITION..].copy_from_slice(&self.pending);
        self.prev_block.copy_from_slice(&self.pending);
        self.pending.clear();

        // Newest spectrum reuses the oldest slot.
        let mut newest = self
            .history
            .pop_back()
            .unwrap_or_else(|| vec![Complex::new(0.0, 0.0); self.fft_size / 2 + 1]);
        let mut scratch = self.r2c.make_scratch_vec();
        let _ = self
            .r2c
            .process_with_scratch(&mut self.frame, &mut newest, &mut scratch);
        self.history.push_front(newest);

        for bin in self.spectrum_sum.iter_mut() {
            *bin = Complex::new(0.0, 0.0);
        }
        for (frame_spectrum, ir_spectrum) in self.history.iter().zip(&self.ir_partitions) {
            for ((sum, &x), &h) in self
                .spectrum_sum
                .iter_mut()
                .zip(frame_spectrum)
                .zip(ir_spectrum)
            {
                *sum += x * h;
            }
        }

        let mut scratch = self.c2r.make_scratch_vec();
        let mut spectrum = self.spectrum_sum.clone();
        let _ = self
            .c2r
            .process_with_scratch(&mut spectrum, &mut self.time_out, &mut scratch);

        // Overlap-save: the first half is circular wraparound; the second
        // half is valid. realfft's inverse is unnormalized.
        let norm = 1.0 / self.fft_size as f32;
        for &s in &self.time_out[PARTITION..] {
            self.ready.push_back(s * norm);
        }
    }

    fn clear(&mut self) {
        for spectrum in self.history.iter_mut() {
            for bin in spectrum.iter_mut() {
                *bin = Complex::new(0.0, 0.0);
            }
        }
        self.prev_block.fill(0.0);
        self.pending.clear();
        self.ready.clear();
    }
}

/// Stereo convolution reverb with a procedurally generated hall response.
pub struct ConvolutionReverb {
    left: Convolver,
    right: Convolver,
}

impl ConvolutionReverb {
    /// The default hall: two seconds of decaying noise, decorrelated
    /// between channels by independent seeds.
    pub fn hall(sample_rate: f64) -> Self {
        ConvolutionReverb::with_character(sample_rate, 2.0, 2.5)
    }

    pub fn with_character(sample_rate: f64, seconds: f64, decay: f64) -> Self {
        let ir_l = hall_impulse_response(sample_rate, seconds, decay, 0x7a11_0001);
        let ir_r = hall_impulse_response(sample_rate, seconds, decay, 0x7a11_0002);
        ConvolutionReverb {
            left: Convolver::new(&ir_l),
            right: Convolver::new(&ir_r),
        }
    }

    /// Process one wet sample pair. The caller owns dry/wet routing.
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }

    /// Drop all tail state (teardown / transport stop).
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
