use nes_apu_driver::envelope::Envelope;
use nes_apu_driver::{
    ChannelSet, ChannelType, DriverConfig, EnvelopeCursor, EnvelopeKind, Instrument, LinearSong,
    Note, RegisterLog,
};

fn lead() -> std::sync::Arc<Instrument> {
    Instrument::apu("lead")
        .with_envelope(EnvelopeKind::Volume, Envelope::from_values(vec![15, 12, 8]))
        .shared()
}

fn frame(set: &mut ChannelSet, bus: &mut RegisterLog) {
    bus.next_frame();
    set.update(bus);
}

fn square_writes(bus: &RegisterLog) -> Vec<(u16, u8)> {
    bus.frame_writes()
        .filter(|w| (0x4000..=0x4003).contains(&w.register))
        .map(|w| (w.register, w.value))
        .collect()
}

#[test]
fn basic_attack_reads_note_table() -> anyhow::Result<()> {
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();

    set.play_note(&mut bus, ChannelType::Square(0), Note::musical(40).with_instrument(lead()));
    frame(&mut set, &mut bus);

    let state = set.channel(ChannelType::Square(0)).unwrap().state();
    let period = state.tuning().table[40];
    assert_eq!(state.period(), period);
    assert_eq!(state.volume(), 15);
    assert_eq!(
        square_writes(&bus),
        vec![
            (0x4000, 0x3F),
            (0x4002, (period & 0xFF) as u8),
            (0x4003, (period >> 8) as u8),
        ]
    );

    frame(&mut set, &mut bus);
    // high byte unchanged: only duty/volume and low byte
    assert_eq!(
        square_writes(&bus),
        vec![(0x4000, 0x3C), (0x4002, (period & 0xFF) as u8)]
    );
    Ok(())
}

#[test]
fn delayed_note_is_forced_by_next_row() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let song = LinearSong::new(16, 1).with_note(
        ch,
        0,
        Note::musical(40)
            .with_instrument(lead())
            .with_note_delay(5)
            .with_speed(3),
    );
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();
    let mut speed = 6;

    set.advance(&mut bus, &song, song.location(0), &mut speed);
    assert_eq!(speed, 3);
    let state = set.channel(ch).unwrap().state();
    assert!(state.delayed_note().is_some());
    assert!(!state.note().is_musical());

    frame(&mut set, &mut bus);
    frame(&mut set, &mut bus);
    assert!(set.channel(ch).unwrap().state().delayed_note().is_some());

    set.advance(&mut bus, &song, song.location(1), &mut speed);
    let state = set.channel(ch).unwrap().state();
    assert!(state.delayed_note().is_none());
    assert_eq!(state.delay_counter(), 0);
    assert_eq!(state.note().musical_value(), Some(40));
    assert!(state.attack_pending());
    Ok(())
}

#[test]
fn delayed_note_fires_after_its_frames() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let song = LinearSong::new(16, 1)
        .with_note(ch, 0, Note::musical(40).with_instrument(lead()).with_note_delay(2));
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();
    let mut speed = 6;

    set.advance(&mut bus, &song, song.location(0), &mut speed);
    frame(&mut set, &mut bus);
    frame(&mut set, &mut bus);
    assert!(!set.channel(ch).unwrap().state().note().is_musical());
    frame(&mut set, &mut bus);
    assert_eq!(set.channel(ch).unwrap().state().note().musical_value(), Some(40));
    assert_eq!(square_writes(&bus)[0], (0x4000, 0x3F));
    Ok(())
}

#[test]
fn slide_reaches_target_period() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let song = LinearSong::new(16, 1)
        .with_note(ch, 0, Note::musical(40).with_instrument(lead()).with_slide_to(52))
        .with_note(ch, 2, Note::stop());
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();
    let mut speed = 6;

    set.advance(&mut bus, &song, song.location(0), &mut speed);
    let state = set.channel(ch).unwrap().state();
    let table = state.tuning().table.clone();
    assert_eq!(state.note().musical_value(), Some(52));
    assert_eq!(state.slide_source_note(), Some(40));
    assert_eq!(state.slide_pitch(), ((table[40] as i32 - table[52] as i32) << 4));

    let mut previous = u16::MAX;
    for _ in 0..13 {
        frame(&mut set, &mut bus);
        let period = set.channel(ch).unwrap().state().period();
        assert!(period <= previous);
        previous = period;
    }
    let state = set.channel(ch).unwrap().state();
    assert_eq!(state.slide_pitch(), 0);
    assert_eq!(state.slide_step(), 0);
    assert_eq!(state.period(), table[52]);
    Ok(())
}

#[test]
fn volume_slide_converges_without_overshoot() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let song = LinearSong::new(16, 1)
        .with_note(
            ch,
            0,
            Note::musical(40)
                .with_instrument(lead())
                .with_volume(15)
                .with_volume_slide(3),
        )
        .with_note(ch, 1, Note::stop());
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();
    let mut speed = 4;

    set.advance(&mut bus, &song, song.location(0), &mut speed);
    let mut volumes = Vec::new();
    for _ in 0..4 {
        frame(&mut set, &mut bus);
        volumes.push(set.channel(ch).unwrap().state().volume_slide().get());
    }
    assert_eq!(volumes, vec![12, 9, 6, 3]);
    frame(&mut set, &mut bus);
    assert_eq!(set.channel(ch).unwrap().state().volume_slide().get(), 3);
    Ok(())
}

#[test]
fn release_row_redirects_envelope() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let inst = Instrument::apu("pad")
        .with_envelope(EnvelopeKind::Volume, Envelope::parse("15 | 10 / 4")?)
        .shared();
    let song = LinearSong::new(16, 1)
        .with_note(ch, 0, Note::musical(40).with_instrument(inst).with_release(2));
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();
    let mut speed = 3;

    for row in 0..2 {
        set.advance(&mut bus, &song, song.location(row), &mut speed);
        for _ in 0..speed {
            frame(&mut set, &mut bus);
        }
    }
    let state = set.channel(ch).unwrap().state();
    assert!(!state.is_released());
    assert_eq!(state.envelope_value(EnvelopeKind::Volume), 10);

    set.advance(&mut bus, &song, song.location(2), &mut speed);
    let state = set.channel(ch).unwrap().state();
    assert!(state.is_released());
    assert_eq!(state.envelope_cursor(EnvelopeKind::Volume), EnvelopeCursor::Active(2));
    frame(&mut set, &mut bus);
    assert_eq!(set.channel(ch).unwrap().state().envelope_value(EnvelopeKind::Volume), 4);
    Ok(())
}

#[test]
fn cut_delay_stops_the_channel() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();

    set.play_note(&mut bus, ch, Note::musical(40).with_instrument(lead()).with_cut_delay(2));
    frame(&mut set, &mut bus);
    frame(&mut set, &mut bus);
    assert!(set.channel(ch).unwrap().state().note().is_musical());
    frame(&mut set, &mut bus);
    assert!(set.channel(ch).unwrap().state().note().is_stop());
    assert_eq!(square_writes(&bus), vec![(0x4000, 0x30)]);
    Ok(())
}

#[test]
fn volume_never_rounds_to_silence() -> anyhow::Result<()> {
    let ch = ChannelType::Square(0);
    let quiet = Instrument::apu("quiet")
        .with_envelope(EnvelopeKind::Volume, Envelope::from_values(vec![1]))
        .shared();
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();

    set.play_note(&mut bus, ch, Note::musical(40).with_instrument(quiet).with_volume(1));
    frame(&mut set, &mut bus);
    assert_eq!(set.channel(ch).unwrap().state().volume(), 1);
    assert_eq!(square_writes(&bus)[0], (0x4000, 0x31));
    Ok(())
}

#[test]
fn unclamped_periods_are_deterministic() -> anyhow::Result<()> {
    let config = DriverConfig {
        clamp_periods: false,
        ..DriverConfig::default()
    };
    let high = Instrument::apu("high")
        .with_envelope(EnvelopeKind::Arpeggio, Envelope::from_values(vec![12]))
        .shared();

    let run = || -> anyhow::Result<Vec<(u16, u8)>> {
        let mut set = ChannelSet::new(0, &[], config.clone())?;
        let mut bus = RegisterLog::new();
        set.play_note(
            &mut bus,
            ChannelType::Square(0),
            Note::musical(90).with_instrument(high.clone()),
        );
        for _ in 0..3 {
            frame(&mut set, &mut bus);
        }
        let state = set.channel(ChannelType::Square(0)).unwrap().state();
        assert_eq!(state.period(), state.tuning().lookup(102, false) & 0x7FF);
        Ok(bus.pairs())
    };
    assert_eq!(run()?, run()?);
    Ok(())
}

#[test]
fn register_log_exports_csv() -> anyhow::Result<()> {
    let mut set = ChannelSet::new(0, &[], DriverConfig::default())?;
    let mut bus = RegisterLog::new();
    set.play_note(&mut bus, ChannelType::Square(0), Note::musical(40).with_instrument(lead()));
    frame(&mut set, &mut bus);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("writes.csv");
    bus.write_csv(&path)?;
    let text = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "frame,apu,register,value,cycles,metadata");
    assert_eq!(lines.len(), bus.writes().len() + 1);
    assert_eq!(lines[1], "1,0,16384,63,4,0");
    Ok(())
}

#[test]
fn config_loads_from_json_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("driver.json");
    std::fs::write(&path, r#"{ "machine": "pal", "smooth_vibrato": false }"#)?;

    let config = DriverConfig::from_json_file(&path)?;
    assert_eq!(config.machine, nes_apu_driver::Machine::Pal);
    assert!(!config.smooth_vibrato);
    assert!(config.clamp_periods);

    let json = config.to_json_string()?;
    assert_eq!(DriverConfig::from_json_str(&json)?, config);
    Ok(())
}
