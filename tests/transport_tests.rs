// Host-side tests for the lookahead transport and the piano-roll sequencer.
// The main crate is wasm-only, so we include the pure-Rust modules directly.

#![allow(dead_code)]
mod constants {
    include!("../src/core/constants.rs");
}
mod instruments {
    include!("../src/core/instruments.rs");
}
mod transport {
    include!("../src/core/transport.rs");
}
mod sequencer {
    include!("../src/core/sequencer.rs");
}

use constants::*;
use instruments::*;
use sequencer::*;
use std::cell::RefCell;
use std::rc::Rc;
use transport::*;

fn recording_transport() -> (Transport, Rc<RefCell<Vec<StepEvent>>>) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let mut t = Transport::default();
    t.set_on_step(move |ev| sink.borrow_mut().push(ev));
    (t, events)
}

#[test]
fn default_step_duration_is_a_sixteenth_at_120() {
    let t = Transport::default();
    assert_eq!(t.tempo_bpm(), 120.0);
    assert_eq!(t.steps_per_beat(), 4);
    assert!((t.step_duration() - 0.125).abs() < 1e-12);
    assert_eq!(t.loop_bounds(), (0, STEPS_PER_BAR));
}

#[test]
fn start_is_idempotent_and_sets_margin() {
    let mut t = Transport::default();
    assert!(t.start(3.0));
    assert!(t.is_running());
    assert!((t.next_event_time() - (3.0 + TRANSPORT_START_MARGIN_SEC)).abs() < 1e-12);
    assert!(!t.start(10.0));
    assert!((t.next_event_time() - (3.0 + TRANSPORT_START_MARGIN_SEC)).abs() < 1e-12);
}

#[test]
fn stopped_transport_emits_nothing() {
    let (mut t, events) = recording_transport();
    assert_eq!(t.tick(5.0), 0);
    assert!(events.borrow().is_empty());
}

#[test]
fn loop_wraps_back_after_sixteen_steps() {
    let (mut t, events) = recording_transport();
    t.start(0.0);
    // Steps land at 0.05 + k * 0.125; a horizon of 2.0 covers exactly k = 0..=15.
    assert_eq!(t.tick(1.8), 16);
    assert_eq!(t.current_step(), 0);
    let steps: Vec<usize> = events.borrow().iter().map(|e| e.step).collect();
    assert_eq!(steps, (0..16).collect::<Vec<_>>());
}

#[test]
fn delayed_tick_catches_up_without_skipping() {
    let (mut t, events) = recording_transport();
    t.start(0.0);
    let first = t.tick(0.0);
    assert_eq!(first, 2);
    // The next check should have come at 0.1 but arrives 400ms late.
    let late_now = 0.5;
    let caught_up = t.tick(late_now);
    assert_eq!(caught_up, 4);

    let events = events.borrow();
    for pair in events.windows(2) {
        assert_eq!(pair[1].step, pair[0].step + 1, "skipped a step");
        assert!(pair[1].time > pair[0].time);
        assert!((pair[1].time - pair[0].time - 0.125).abs() < 1e-9);
    }
    let horizon = late_now + SCHEDULE_AHEAD_SEC;
    assert!(events.iter().all(|e| e.time < horizon));
    assert!(t.next_event_time() >= horizon);
}

#[test]
fn stop_keeps_step_and_is_idempotent() {
    let (mut t, _events) = recording_transport();
    t.start(0.0);
    t.tick(0.3);
    let step = t.current_step();
    assert!(step > 0);
    t.stop();
    t.stop();
    assert_eq!(t.status(), TransportStatus::Stopped);
    assert_eq!(t.current_step(), step);

    // Resume continues where it left off.
    t.start(10.0);
    let mut seen = Vec::new();
    t.set_on_step(move |ev| seen.push(ev.step));
    t.tick(10.0);
    assert_eq!(t.current_step(), step + 2);
}

#[test]
fn reset_stops_and_rewinds_to_loop_start() {
    let (mut t, _events) = recording_transport();
    t.set_loop(4, 12);
    t.start(0.0);
    t.tick(0.5);
    t.reset();
    assert!(!t.is_running());
    assert_eq!(t.current_step(), 4);
}

#[test]
fn tempo_change_applies_from_next_step() {
    let (mut t, events) = recording_transport();
    t.start(0.0);
    t.tick(0.0);
    t.set_tempo(60.0);
    t.tick(0.6);
    let events = events.borrow();
    let gap = events[2].time - events[1].time;
    assert!((gap - 0.125).abs() < 1e-9, "already-scheduled step moved");
    let gap = events[3].time - events[2].time;
    assert!((gap - 0.25).abs() < 1e-9);
    assert!((events[3].duration - 0.25).abs() < 1e-9);
}

#[test]
fn tempo_and_loop_inputs_are_clamped() {
    let mut t = Transport::default();
    t.set_tempo(0.0);
    assert_eq!(t.tempo_bpm(), MIN_TEMPO_BPM);
    t.set_tempo(f64::NAN);
    assert_eq!(t.tempo_bpm(), DEFAULT_TEMPO_BPM);
    t.set_steps_per_beat(0);
    assert_eq!(t.steps_per_beat(), 1);
    t.set_loop(8, 2);
    assert_eq!(t.loop_bounds(), (8, 9));
    assert_eq!(t.current_step(), 8);
}

#[test]
fn last_registered_callback_wins() {
    let first = Rc::new(RefCell::new(0));
    let second = Rc::new(RefCell::new(0));
    let mut t = Transport::default();
    let f = first.clone();
    t.set_on_step(move |_| *f.borrow_mut() += 1);
    let s = second.clone();
    t.set_on_step(move |_| *s.borrow_mut() += 1);
    t.start(0.0);
    t.tick(0.0);
    assert_eq!(*first.borrow(), 0);
    assert_eq!(*second.borrow(), 2);
}

#[test]
fn loop_start_at_the_top_of_the_range_is_clamped() {
    let mut t = Transport::default();
    t.set_loop(usize::MAX, 4);
    let (start, end) = t.loop_bounds();
    assert!(start < end);
    assert_eq!((start, end), (usize::MAX - 1, usize::MAX));
    assert_eq!(t.current_step(), start);

    // Stepping inside the one-step loop stays put.
    t.start(0.0);
    assert_eq!(t.tick(0.0), 2);
    assert_eq!(t.current_step(), start);
}

#[test]
fn shared_tick_lets_the_callback_retune_the_transport() {
    let transport = Rc::new(RefCell::new(Transport::default()));
    let events = Rc::new(RefCell::new(Vec::new()));
    let (handle, sink) = (Rc::downgrade(&transport), events.clone());
    transport.borrow_mut().set_on_step(move |ev: StepEvent| {
        sink.borrow_mut().push(ev);
        if let Some(t) = handle.upgrade() {
            let mut t = t.borrow_mut();
            assert!(t.is_running());
            if ev.step == 0 {
                t.set_tempo(60.0);
                t.set_loop(0, 4);
            }
        }
    });
    transport.borrow_mut().start(0.0);

    // Steps at 0.05 and 0.175 were already due at the old tempo.
    assert_eq!(tick_shared(&transport, 0.0), 2);
    assert_eq!(transport.borrow().tempo_bpm(), 60.0);
    assert_eq!(transport.borrow().loop_bounds(), (0, 4));

    tick_shared(&transport, 0.5);
    let events = events.borrow();
    assert!((events[1].duration - 0.125).abs() < 1e-9);
    assert!((events[2].duration - 0.25).abs() < 1e-9);
    assert!((events[2].time - 0.3).abs() < 1e-9);
}

#[test]
fn callback_replaced_during_dispatch_keeps_the_replacement() {
    let transport = Rc::new(RefCell::new(Transport::default()));
    let replaced = Rc::new(RefCell::new(0));
    let (handle, counter) = (Rc::downgrade(&transport), replaced.clone());
    transport.borrow_mut().set_on_step(move |_| {
        if let Some(t) = handle.upgrade() {
            let counter = counter.clone();
            t.borrow_mut()
                .set_on_step(move |_| *counter.borrow_mut() += 1);
        }
    });
    transport.borrow_mut().start(0.0);
    tick_shared(&transport, 0.0);
    assert_eq!(*replaced.borrow(), 0);
    tick_shared(&transport, 0.25);
    assert_eq!(*replaced.borrow(), 2);
}

#[test]
fn shared_tick_while_borrowed_is_skipped() {
    let transport = RefCell::new(Transport::default());
    transport.borrow_mut().start(0.0);
    let held = transport.borrow();
    assert_eq!(tick_shared(&transport, 0.0), 0);
    drop(held);
    assert_eq!(tick_shared(&transport, 0.0), 2);
}

// ---------------- Sequencer ----------------

#[test]
fn toggle_flips_only_the_requested_cell() {
    let mut seq = StepSequencer::default();
    assert_eq!(seq.toggle(60, 3), Some(true));
    assert!(seq.get_step(60, 3));
    for step in (0..16).filter(|s| *s != 3) {
        assert!(!seq.get_step(60, step), "step {step} changed");
    }
    assert_eq!(seq.toggle(60, 3), Some(false));
    assert!(seq.grid().row(60).unwrap().iter().all(|c| !c));
}

#[test]
fn toggle_outside_grid_is_ignored() {
    let mut seq = StepSequencer::default();
    assert_eq!(seq.toggle(30, 0), None);
    assert_eq!(seq.toggle(60, 16), None);
    assert!(!seq.get_step(30, 0));
}

#[test]
fn piano_roll_covers_two_octaves_from_c3() {
    let grid = SequenceGrid::piano_roll();
    assert_eq!(grid.pitches().len(), 24);
    assert_eq!(grid.pitches().first(), Some(&71));
    assert_eq!(grid.pitches().last(), Some(&48));
    assert_eq!(grid.steps_per_bar(), 16);
    assert_eq!(note_label(48), "C3");
    assert_eq!(note_label(61), "C#4");
}

#[test]
fn step_triggers_notes_at_event_time_with_selected_voice() {
    let mut seq = StepSequencer::default();
    seq.toggle(60, 2);
    seq.toggle(67, 2);
    seq.toggle(64, 5);
    seq.select_instrument("808s");
    let mut notes = Vec::new();
    seq.on_step(
        StepEvent {
            step: 2,
            time: 4.25,
            duration: 0.125,
        },
        &mut notes,
    );
    let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![67, 60]);
    assert!(notes.iter().all(|n| n.time == 4.25));
    assert_eq!(notes[1].voice.waveform, Waveform::Sine);
    assert!((notes[1].frequency_hz - midi_to_hz(60.0)).abs() < 1e-4);
}

#[test]
fn steps_past_the_grid_wrap() {
    let mut seq = StepSequencer::default();
    seq.toggle(50, 1);
    let mut notes = Vec::new();
    seq.on_step(
        StepEvent {
            step: 17,
            time: 0.0,
            duration: 0.125,
        },
        &mut notes,
    );
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].pitch, 50);
}

#[test]
fn unknown_instrument_uses_default_voice() {
    let mut seq = StepSequencer::default();
    seq.select_instrument("Theremin");
    assert_eq!(seq.selected_instrument(), "Theremin");
    seq.toggle(71, 0);
    let mut notes = Vec::new();
    seq.on_step(
        StepEvent {
            step: 0,
            time: 1.0,
            duration: 0.125,
        },
        &mut notes,
    );
    assert_eq!(notes[0].voice, DEFAULT_VOICE);
}

#[test]
fn clear_empties_the_grid() {
    let mut seq = StepSequencer::default();
    seq.toggle(48, 0);
    seq.toggle(71, 15);
    seq.clear();
    assert!(!seq.get_step(48, 0));
    assert!(!seq.get_step(71, 15));
}

// ---------------- Instruments ----------------

#[test]
fn midi_to_hz_matches_a4_and_octave() {
    assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-4);
    assert!((midi_to_hz(81.0) - 880.0).abs() < 1e-3);
    assert!((midi_to_hz(60.0) - 261.6256).abs() < 1e-3);
}

#[test]
fn instrument_table_lists_piano_roll_voices_in_order() {
    let table = InstrumentTable::piano_roll();
    let names: Vec<&str> = table.names().collect();
    assert_eq!(
        names,
        vec![
            "Guitar",
            "Orchestra",
            "Piano",
            "808s",
            "Percussion",
            "Snare",
            "Synth",
            "High Hats"
        ]
    );
    assert_eq!(table.lookup("Orchestra").waveform, Waveform::Square);
    assert_eq!(*table.lookup("nope"), DEFAULT_VOICE);
}

#[test]
fn pluck_envelope_decays_exponentially_from_event_time() {
    let voice = *InstrumentTable::piano_roll().lookup("Guitar");
    let plan = voice.envelope.plan(0.0, 1.0, voice.stop_after_sec);
    assert_eq!(
        plan.as_slice(),
        &[
            Automation::SetValue { value: 0.3, at: 0.0 },
            Automation::ExponentialRamp {
                value: ENVELOPE_FLOOR,
                at: 0.8
            },
        ]
    );
    assert_eq!(voice.stop_after_sec, SEQUENCER_VOICE_STOP_SEC);
}

#[test]
fn synth_voice_fades_linearly_to_floor() {
    let voice = *InstrumentTable::piano_roll().lookup("Synth");
    let plan = voice.envelope.plan(0.0, 1.0, 0.0);
    assert_eq!(plan[1], Automation::LinearRamp { value: 0.1, at: 0.7 });
}

#[test]
fn adsr_plan_follows_attack_decay_then_release() {
    let params = SynthParams::default();
    let plan = params.envelope().plan(1.0, 0.8, 0.5);
    assert_eq!(plan.len(), 4);
    assert_eq!(plan[0], Automation::SetValue { value: 0.0, at: 1.0 });
    assert!(matches!(plan[1], Automation::LinearRamp { value, at } if value == 0.8 && (at - 1.005).abs() < 1e-12));
    assert!(matches!(plan[2], Automation::LinearRamp { value, at } if (value - 0.56).abs() < 1e-6 && (at - 1.085).abs() < 1e-12));
    assert!(matches!(plan[3], Automation::Target { value, at, time_constant } if value == 0.0 && at == 1.5 && time_constant == 0.15));
    assert_eq!(SynthParams::stop_time(1.0, 0.5), 3.5);
}

#[test]
fn waveform_names_parse() {
    assert_eq!(Waveform::from_name("sawtooth"), Some(Waveform::Saw));
    assert_eq!(Waveform::from_name("triangle"), Some(Waveform::Triangle));
    assert_eq!(Waveform::from_name("noise"), None);
}
