use rodio::{Decoder, OutputStream, Sink};
use std::thread;

/// Play the attention chime for a new critical notification.
/// Plays asynchronously so it doesn't block the UI.
pub fn play_attention_chime() {
    thread::spawn(|| {
        if let Err(e) = play_chime_internal() {
            // Best-effort: audio problems must never take the session down
            eprintln!("Audio notification failed: {}", e);
        }
    });
}

fn play_chime_internal() -> anyhow::Result<()> {
    let (_stream, stream_handle) = OutputStream::try_default()?;
    let sink = Sink::try_new(&stream_handle)?;

    // Custom chime if the user dropped one in, terminal bell otherwise
    let chime_path = dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("canopy")
        .join("sounds")
        .join("attention.mp3");

    if chime_path.exists() {
        let file = std::fs::File::open(&chime_path)?;
        let source = Decoder::new(std::io::BufReader::new(file))?;
        sink.append(source);
        sink.sleep_until_end();
    } else {
        print!("\x07");
    }

    Ok(())
}
