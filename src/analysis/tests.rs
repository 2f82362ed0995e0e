use super::*;
use std::sync::Arc;
use std::thread;

const SAMPLE_RATE: u32 = 16000;

/// Generate pure sine wave for testing
fn generate_sine_wave(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Seeded low-level white noise
fn generate_white_noise(amplitude: f32, len: usize, seed: u64) -> Vec<f32> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

fn analyzer() -> CryAnalyzer {
    CryAnalyzer::new(SAMPLE_RATE, PipelineConfig::default()).unwrap()
}

fn frame_vector(f0: f32, energy: f32, degenerate: Option<DegenerateKind>) -> FeatureVector {
    let mut vector = FeatureVector::silent(13, 3, 8);
    vector.degenerate = degenerate;
    vector.energy = energy;
    vector.rms = energy.sqrt();
    vector.fundamental_frequency = f0;
    vector.mfcc = (0..13).map(|i| i as f32 * 0.5).collect();
    vector.formants = vec![f0 * 2.0, f0 * 4.0, f0 * 6.0];
    vector.harmonics = vec![energy; 8];
    vector.harmonic_ratio = 0.5;
    vector
}

#[test]
fn test_sine_round_trip() {
    let analyzer = analyzer();
    let samples = generate_sine_wave(400.0, 0.5, 16000);

    let frames = analyzer.analyze_frames(&samples).unwrap();
    assert_eq!(frames.len(), 29);

    let vector = analyzer.aggregate(&frames);
    println!(
        "f0={:.1} rms={:.4} centroid={:.1} confidence={:.3}",
        vector.fundamental_frequency, vector.rms, vector.spectral_centroid, vector.confidence
    );

    assert_eq!(vector.frame_count, 29);
    assert_eq!(vector.degenerate, None);
    assert!(
        (vector.fundamental_frequency - 400.0).abs() < 20.0,
        "f0 {}",
        vector.fundamental_frequency
    );
    assert!((vector.rms - 0.354).abs() < 0.02, "rms {}", vector.rms);
    assert_eq!(vector.mfcc.len(), 13);
    assert_eq!(vector.formants.len(), 3);
    assert_eq!(vector.harmonics.len(), 8);
    assert!(vector.harmonics[0] > 0.0);
    assert!((0.0..=1.0).contains(&vector.confidence));
}

#[test]
fn test_spectra_have_half_window_bins() {
    let analyzer = analyzer();
    let samples = generate_sine_wave(400.0, 0.5, 4096);
    let frame = analyzer.framer.frames(&samples).next().unwrap();

    let suppressed = analyzer.suppressor().suppress(&frame.samples).unwrap();
    let spectrum = analyzer.fft.magnitude_spectrum(&suppressed).unwrap();
    assert_eq!(spectrum.len(), 1024);
}

#[test]
fn test_silence_yields_zero_confidence() {
    let analyzer = analyzer();
    let vector = analyzer.analyze(&vec![0.0; 16000]).unwrap();

    assert!(vector.is_silent());
    assert_eq!(vector.confidence, 0.0);
    assert_eq!(vector.frame_count, 29);
    assert_eq!(vector.mfcc, vec![0.0; 13]);
}

#[test]
fn test_insufficient_samples() {
    let analyzer = analyzer();
    assert_eq!(
        analyzer.analyze(&[0.1; 4]),
        Err(AnalysisError::InsufficientSamples {
            required: 5,
            available: 4
        })
    );
    assert!(analyzer.analyze(&[]).is_err());
}

#[test]
fn test_short_input_is_padded_to_one_frame() {
    let analyzer = analyzer();
    let samples = generate_sine_wave(400.0, 0.5, 600);
    let frames = analyzer.analyze_frames(&samples).unwrap();
    assert_eq!(frames.len(), 1);
}

#[test]
fn test_non_finite_sample_rejected() {
    let analyzer = analyzer();
    let mut samples = generate_sine_wave(400.0, 0.5, 4096);
    samples[100] = f32::NAN;
    assert!(matches!(
        analyzer.analyze(&samples),
        Err(AnalysisError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_buffer_sample_rate_mismatch() {
    let analyzer = analyzer();
    let buffer = AudioBuffer::new(generate_sine_wave(400.0, 0.5, 4096), 44100).unwrap();
    assert!(matches!(
        analyzer.analyze_buffer(&buffer),
        Err(AnalysisError::InvalidConfiguration { .. })
    ));

    let buffer = AudioBuffer::new(generate_sine_wave(400.0, 0.5, 4096), SAMPLE_RATE).unwrap();
    assert!(analyzer.analyze_buffer(&buffer).is_ok());
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = PipelineConfig::default();
    config.window_size = 1000;
    assert!(CryAnalyzer::new(SAMPLE_RATE, config).is_err());

    let mut config = PipelineConfig::default();
    config.hop_size = 4096;
    assert!(CryAnalyzer::new(SAMPLE_RATE, config).is_err());
}

#[test]
fn test_clipped_section_marks_window() {
    let analyzer = analyzer();
    let mut samples = generate_white_noise(0.01, 8000, 3);
    // 400 Hz full-scale square wave
    samples.extend(
        generate_sine_wave(400.0, 1.0, 8000)
            .into_iter()
            .map(|x| if x >= 0.0 { 1.0 } else { -1.0 }),
    );

    let vector = analyzer.analyze(&samples).unwrap();
    assert_eq!(vector.degenerate, Some(DegenerateKind::Clipped));
    assert_eq!(vector.confidence, 0.0);
}

#[test]
fn test_noise_profile_learns_and_resets() {
    let analyzer = analyzer();
    let mut samples = generate_white_noise(0.005, 8000, 5);
    samples.extend(generate_sine_wave(400.0, 0.5, 8000));
    analyzer.analyze(&samples).unwrap();

    let profile = analyzer.noise_profile().snapshot().unwrap();
    assert!(profile.has_floor());
    assert_eq!(profile.floor_updates(), 1);

    analyzer.reset_noise_profile().unwrap();
    let profile = analyzer.noise_profile().snapshot().unwrap();
    assert!(!profile.has_floor());
    assert!(profile.noise_spectrum().is_none());
}

#[test]
fn test_quiet_cry_after_loud_cry_is_heard() {
    let analyzer = analyzer();
    analyzer
        .analyze(&generate_sine_wave(400.0, 0.5, 16000))
        .unwrap();

    // -20 dBFS follow-ups must not be gated against the loud cry's level
    for _ in 0..5 {
        let vector = analyzer
            .analyze(&generate_sine_wave(400.0, 0.1, 16000))
            .unwrap();
        assert!(!vector.is_silent());
        assert!(
            (vector.fundamental_frequency - 400.0).abs() < 20.0,
            "f0 {}",
            vector.fundamental_frequency
        );
        assert!((vector.rms - 0.0707).abs() < 0.01, "rms {}", vector.rms);
    }
    assert!(!analyzer.noise_profile().snapshot().unwrap().has_floor());
}

#[test]
fn test_silence_prefixed_tone_keeps_level() {
    let analyzer = analyzer();
    let mut samples = vec![0.0f32; 8000];
    samples.extend(generate_sine_wave(1500.0, 0.5, 8000));

    let frames = analyzer.analyze_frames(&samples).unwrap();
    let profile = analyzer.noise_profile().snapshot().unwrap();
    assert!(profile.has_floor());
    assert_eq!(profile.floor_linear(), 0.0);

    // Frame 16 spans samples 8192..10240, all tone; the median filter
    // trims the peaks a little but the Wiener stage must pass it untouched
    let frame = &frames[16];
    assert!((frame.rms - 0.354).abs() < 0.04, "rms {}", frame.rms);
}

#[test]
fn test_aggregate_median_fundamental() {
    let analyzer = analyzer();
    let frames = vec![
        frame_vector(380.0, 0.1, None),
        frame_vector(400.0, 0.3, None),
        frame_vector(520.0, 0.2, None),
        frame_vector(0.0, 0.05, None),
        FeatureVector::silent(13, 3, 8),
    ];

    let vector = analyzer.aggregate(&frames);
    assert_eq!(vector.frame_count, 5);
    assert_eq!(vector.fundamental_frequency, 400.0);
    // Formants come from the loudest voiced frame
    assert_eq!(vector.formants, vec![800.0, 1600.0, 2400.0]);
    assert_eq!(vector.harmonics, vec![0.3; 8]);
    // Silent frame is excluded from the means
    assert!((vector.energy - 0.1625).abs() < 1e-6);
    assert!((vector.harmonic_ratio - 0.5).abs() < 1e-6);
    assert_eq!(vector.degenerate, None);
}

#[test]
fn test_aggregate_unvoiced_window() {
    let analyzer = analyzer();
    let frames = vec![frame_vector(0.0, 0.1, None), frame_vector(0.0, 0.4, None)];

    let vector = analyzer.aggregate(&frames);
    assert_eq!(vector.fundamental_frequency, 0.0);
    assert_eq!(vector.harmonics, vec![0.0; 8]);
    assert_eq!(vector.harmonic_ratio, 0.0);
    assert_eq!(vector.formants, vec![0.0; 3]);
}

#[test]
fn test_aggregate_clipped_frame_zeroes_confidence() {
    let analyzer = analyzer();
    let frames = vec![
        frame_vector(400.0, 0.2, None),
        frame_vector(400.0, 0.9, Some(DegenerateKind::Clipped)),
    ];

    let vector = analyzer.aggregate(&frames);
    assert_eq!(vector.degenerate, Some(DegenerateKind::Clipped));
    assert_eq!(vector.confidence, 0.0);
}

#[test]
fn test_aggregate_all_silent() {
    let analyzer = analyzer();
    let frames = vec![FeatureVector::silent(13, 3, 8); 4];
    let vector = analyzer.aggregate(&frames);
    assert!(vector.is_silent());
    assert_eq!(vector.frame_count, 4);
}

#[test]
fn test_median_helper() {
    assert_eq!(median(vec![]), 0.0);
    assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
    assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), 2.5);
}

#[test]
fn test_analyzer_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CryAnalyzer>();
}

#[test]
fn test_parallel_analysis_shares_profile() {
    let profile = SharedNoiseProfile::new();
    let analyzer = Arc::new(
        CryAnalyzer::with_profile(SAMPLE_RATE, PipelineConfig::default(), profile.clone()).unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let analyzer = Arc::clone(&analyzer);
            thread::spawn(move || {
                // Silent lead-in so every buffer counts as background for the floor
                let mut samples = vec![0.0f32; 2000];
                samples.extend(generate_sine_wave(350.0 + 25.0 * i as f32, 0.5, 8000));
                analyzer.analyze(&samples)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let vector = handle.join().unwrap().unwrap();
        let expected = 350.0 + 25.0 * i as f32;
        assert!(
            (vector.fundamental_frequency - expected).abs() < expected * 0.05,
            "thread {}: f0 {} expected {}",
            i,
            vector.fundamental_frequency,
            expected
        );
    }

    assert_eq!(profile.snapshot().unwrap().floor_updates(), 4);
}
