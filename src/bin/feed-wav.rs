//! Streams a WAV file at a running relay and prints what comes back.
//!
//! ```text
//! feed-wav recording.wav --url ws://127.0.0.1:8000/ws/pipeline --target French
//! ```
//!
//! Chunks are paced at real time so the session's silence gating and
//! interim recognition behave as they would with a live microphone.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use voxrelay::session::protocol::{ClientMessage, ServerMessage};

/// Samples per audio message.
const CHUNK_SAMPLES: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "feed-wav", version, about = "Stream a WAV file at a voxrelay server")]
struct Args {
    /// WAV file to stream (16-bit PCM)
    wav: PathBuf,

    /// Relay session endpoint
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws/pipeline")]
    url: String,

    /// Target language sent in the initial config message
    #[arg(long, value_name = "LANGUAGE")]
    target: Option<String>,

    /// Stream as fast as possible instead of real-time pacing
    #[arg(long)]
    no_pacing: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (samples, sample_rate) = read_wav_mono(&args.wav)?;
    eprintln!(
        "streaming {} ({:.1}s at {} Hz) to {}",
        args.wav.display(),
        samples.len() as f32 / sample_rate as f32,
        sample_rate,
        args.url
    );

    let (mut socket, _response) =
        tungstenite::connect(args.url.as_str()).context("failed to connect to relay")?;

    // Short read timeout so server messages interleave with streaming
    if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
        stream
            .set_read_timeout(Some(Duration::from_millis(10)))
            .context("failed to set read timeout")?;
    }

    if let Some(target) = &args.target {
        let config = ClientMessage::Config {
            target_language: Some(target.clone()),
            source_language: None,
            asr_mode: None,
        };
        send(&mut socket, &config)?;
    }

    let chunk_duration = Duration::from_secs_f32(CHUNK_SAMPLES as f32 / sample_rate as f32);
    for chunk in samples.chunks(CHUNK_SAMPLES) {
        let mut bytes = Vec::with_capacity(chunk.len() * 2);
        for &sample in chunk {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let message = ClientMessage::Audio {
            data: STANDARD.encode(&bytes),
        };
        send(&mut socket, &message)?;

        drain_incoming(&mut socket)?;
        if !args.no_pacing {
            std::thread::sleep(chunk_duration);
        }
    }

    // Give trailing silence and the idle refine a moment to land
    for _ in 0..400 {
        drain_incoming(&mut socket)?;
        std::thread::sleep(Duration::from_millis(10));
    }

    send(&mut socket, &ClientMessage::Stop)?;
    let _ = socket.close(None);
    Ok(())
}

fn read_wav_mono(path: &PathBuf) -> Result<(Vec<i16>, u32)> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        bail!("expected 16-bit integer PCM, got {:?}", spec);
    }

    let channels = spec.channels as usize;
    let mut samples = Vec::new();
    for (i, sample) in reader.into_samples::<i16>().enumerate() {
        // Keep channel 0 only
        if i % channels == 0 {
            samples.push(sample.context("failed to read sample")?);
        }
    }
    Ok((samples, spec.sample_rate))
}

fn send(
    socket: &mut tungstenite::WebSocket<MaybeTlsStream<std::net::TcpStream>>,
    message: &ClientMessage,
) -> Result<()> {
    let json = message.to_json().context("failed to serialize message")?;
    socket
        .send(tungstenite::Message::Text(json.into()))
        .context("failed to send message")?;
    Ok(())
}

/// Reads any pending server messages, printing them; returns on timeout.
fn drain_incoming(
    socket: &mut tungstenite::WebSocket<MaybeTlsStream<std::net::TcpStream>>,
) -> Result<()> {
    loop {
        match socket.read() {
            Ok(tungstenite::Message::Text(text)) => print_server_message(text.as_str()),
            Ok(tungstenite::Message::Close(_)) => bail!("server closed the session"),
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                return Ok(());
            }
            Err(e) => return Err(e).context("websocket read failed"),
        }
    }
}

fn print_server_message(raw: &str) {
    match ServerMessage::from_json(raw) {
        Ok(ServerMessage::Status { data }) => println!("-- status: {:?}", data),
        Ok(ServerMessage::SourceTextInterim { data }) => println!("~  {}", data),
        Ok(ServerMessage::SourceText { data }) => println!(">  {}", data),
        Ok(ServerMessage::TranslatedTextDraft { data }) => {
            if !data.trim().is_empty() {
                println!(".. {}", data)
            }
        }
        Ok(ServerMessage::TranslatedText { data }) => println!("=> {}", data),
        Ok(ServerMessage::TranslatedTextFinal { data }) => println!("== {}", data),
        Ok(ServerMessage::Audio { data, sample_rate }) => {
            println!("<< audio: {} b64 chars at {} Hz", data.len(), sample_rate)
        }
        Ok(ServerMessage::Error { message }) => eprintln!("!! {}", message),
        Err(_) => eprintln!("?? {}", raw),
    }
}
