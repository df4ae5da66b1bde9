use pianola::{Pitch, Player, PlayerConfig, Timeline, Transport};
use std::env;
use std::process;
use std::thread;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "Usage: pianola <score.xml> [--config player.yaml] [--json] [--play]";

fn main() {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut input_path: Option<&String> = None;
    let mut config_path: Option<&String> = None;
    let mut json = false;
    let mut play = false;

    // Parse flags
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--play" => play = true,
            "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => {
                    eprintln!("{}", USAGE);
                    process::exit(1);
                }
            },
            _ if input_path.is_none() && !arg.starts_with("--") => input_path = Some(arg),
            _ => {
                eprintln!("Unknown argument '{}'", arg);
                eprintln!("{}", USAGE);
                process::exit(1);
            }
        }
    }

    let Some(input_path) = input_path else {
        eprintln!("{}", USAGE);
        process::exit(1);
    };

    let config = match config_path {
        Some(path) => match PlayerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading config '{}': {}", path, e);
                process::exit(1);
            }
        },
        None => PlayerConfig::default(),
    };

    let timeline = match pianola::parse_file(input_path) {
        Ok(timeline) => timeline,
        Err(e) => {
            eprintln!("Error reading score '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    // Output
    if json {
        match serde_json::to_string_pretty(&timeline) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error serializing timeline: {}", e);
                process::exit(1);
            }
        }
    } else {
        print_summary(&timeline);
    }

    if play {
        play_through(timeline, config);
    }
}

fn print_summary(timeline: &Timeline) {
    println!("Length: {} ticks", timeline.length);
    println!("Measures: {}", timeline.measures.len());
    println!("Notes: {}", timeline.notes.len());
    for track in pianola::derive_tracks(timeline) {
        let count = timeline
            .notes
            .iter()
            .filter(|n| n.part.part_id == track.id)
            .count();
        println!("  {} ({}): {} notes", track.id, track.name, count);
    }
    for warning in &timeline.warnings {
        println!("Warning: {}", warning);
    }
}

/// Play the whole score in real time, logging every sounded pitch.
fn play_through(timeline: Timeline, config: PlayerConfig) {
    let (tx, rx) = crossbeam_channel::unbounded::<Pitch>();
    let listener = thread::spawn(move || {
        for pitch in rx {
            info!(%pitch, midi = pitch.midi_number(), "note");
        }
    });

    let mut transport = Transport::new(Player::new(timeline, config, tx));
    transport.toggle_play();
    transport.wait_until_stopped();
    let position = transport.with_player(|player| player.position());
    info!(position, "playback finished");

    // Dropping the transport drops the sender and ends the listener
    drop(transport);
    if listener.join().is_err() {
        eprintln!("Note listener failed");
    }
}
