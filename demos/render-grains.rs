//! Records a test signal, then plays a short scripted performance on the granular synth and
//! renders it offline into a wav file.

use std::path::PathBuf;

use hound::{SampleFormat, WavSpec, WavWriter};

use grainscope::{granular_node, Config, ControlSession, Error, SampleBuffer, WaveRecorder};

// -------------------------------------------------------------------------------------------------

// Common demo code
#[path = "./common/arguments.rs"]
mod arguments;

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 44100;
const BLOCK_SIZE: usize = 512;
const RENDER_SECONDS: f64 = 6.0;

/// Control events of the performance: time in seconds and the action to run.
#[derive(Debug, Clone, Copy)]
enum Action {
    ToggleLoop,
    NoteOn(i32),
    NoteOff(i32),
    Selection(usize, usize),
    DurationCoeff(f32),
    FilterCutoff(u8),
}

const SCRIPT: &[(f64, Action)] = &[
    (0.0, Action::Selection(20, 8)),
    (0.0, Action::ToggleLoop),
    (1.0, Action::NoteOn(60)),
    (1.5, Action::NoteOn(67)),
    (2.0, Action::DurationCoeff(4.0)),
    (2.5, Action::Selection(64, 3)),
    (3.0, Action::NoteOff(60)),
    (3.0, Action::FilterCutoff(60)),
    (3.5, Action::NoteOn(55)),
    (4.0, Action::FilterCutoff(90)),
    (4.0, Action::NoteOff(67)),
    (4.5, Action::NoteOff(55)),
    (4.5, Action::FilterCutoff(127)),
    (5.0, Action::ToggleLoop),
];

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = arguments::parse();
    let config = Config::default();

    // record the input, as if it would come from a microphone
    let input = match &args.input_path {
        Some(path) => SampleBuffer::from_wav_file(path)?.to_vec(),
        None => test_signal(config.wave_len_samples(SAMPLE_RATE)),
    };
    let (mut recorder, chunk_events) = WaveRecorder::new(&config, SAMPLE_RATE)?;
    recorder.start();
    let silence = [0.0; BLOCK_SIZE];
    for block in input.chunks(BLOCK_SIZE) {
        recorder.write(block);
    }
    while recorder.is_recording() {
        recorder.write(&silence);
    }

    let (mut node, handle) = granular_node(recorder.sample_buffer()?, SAMPLE_RATE, &config)?;
    let mut session =
        ControlSession::new(handle, &config, SAMPLE_RATE)?.with_chunk_events(chunk_events);
    session.update();
    let peak = session
        .overview()
        .chunks()
        .iter()
        .fold(0.0_f32, |peak, point| peak.max(point.max).max(-point.min));
    log::info!("Recorded {} chunks with a peak of {peak:.2}", config.num_chunks);

    // render
    let output_path = args
        .output_path
        .unwrap_or_else(|| PathBuf::from("render-grains.wav"));
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(&output_path, spec).map_err(|e| Error::OutputDeviceError(Box::new(e)))?;

    let total_samples = (RENDER_SECONDS * SAMPLE_RATE as f64) as usize;
    let mut script = SCRIPT.iter().peekable();
    let mut output = vec![0.0; BLOCK_SIZE];
    let mut position = 0;
    while position < total_samples {
        let time = position as f64 / SAMPLE_RATE as f64;
        while let Some((_, action)) = script.next_if(|(at, _)| *at <= time) {
            log::debug!("{time:.2}s: {action:?}");
            match *action {
                Action::ToggleLoop => {
                    session.toggle_loop()?;
                }
                Action::NoteOn(note) => session.note_on(note)?,
                Action::NoteOff(note) => session.note_off(note)?,
                Action::Selection(start, size) => session.set_selection_chunks(start, size),
                Action::DurationCoeff(coeff) => session.set_duration_coeff(coeff),
                Action::FilterCutoff(value) => session.set_filter_cutoff_from_cc(value),
            }
        }

        node.process(&mut output);
        for sample in &output {
            writer
                .write_sample(*sample)
                .map_err(|e| Error::OutputDeviceError(Box::new(e)))?;
        }
        session.update();
        position += BLOCK_SIZE;
    }

    writer
        .finalize()
        .map_err(|e| Error::OutputDeviceError(Box::new(e)))?;
    log::info!("Rendered {RENDER_SECONDS} seconds into '{}'", output_path.display());
    Ok(())
}

// -------------------------------------------------------------------------------------------------

/// A few seconds of plucked, slowly detuning tones.
fn test_signal(len: usize) -> Vec<f32> {
    let note_len = SAMPLE_RATE as usize / 4;
    (0..len)
        .map(|i| {
            let note = (i / note_len) % 5;
            let t = (i % note_len) as f32 / SAMPLE_RATE as f32;
            let freq = 220.0 * 2.0_f32.powf([0.0, 3.0, 7.0, 10.0, 12.0][note] / 12.0);
            let decay = (-t * 6.0).exp();
            (std::f32::consts::TAU * freq * t).sin() * decay * 0.8
        })
        .collect()
}
