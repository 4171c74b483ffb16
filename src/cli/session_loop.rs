use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::app::{SessionController, SpeechSource, Waveform, FRAME_INTERVAL};
use crate::domain::language::SUPPORTED_LANGUAGES;
use crate::domain::{DomainError, Language};

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionCommand {
    Record,
    Stop,
    Load(PathBuf),
    Transcribe,
    Translate(Option<Language>),
    Speak,
    SpeakTranslated,
    SetLanguage(Language),
    Languages,
    Devices,
    Status,
    Reset,
    Help,
    Quit,
}

/// Run the interactive session until `quit` or end of input.
///
/// While a recording is active the loop animates the waveform between
/// input lines; a pipeline call prints its busy message, runs to
/// completion, and reports either the result or the error before the
/// next prompt.
pub async fn run_session(controller: Arc<SessionController>) -> Result<(), DomainError> {
    println!("voicerelay - type 'help' for commands, 'quit' to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut waveform = Waveform::new();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.map_err(|e| DomainError::Io(e.to_string()))? else {
                    break;
                };
                if controller.is_recording() {
                    clear_line();
                }
                match parse_command(&line) {
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        debug!(?command, "Executing");
                        if let Err(e) = execute(&controller, command, &mut waveform).await {
                            // Busy state is already cleared and the session
                            // untouched; all that is left is telling the user.
                            eprintln!("Error: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", message),
                }
                if !controller.is_recording() {
                    prompt();
                }
            }
            _ = frames.tick(), if controller.is_recording() => {
                waveform.tick();
                draw_waveform(
                    &waveform,
                    controller.current_level(),
                    controller.current_duration(),
                );
            }
        }
    }

    if controller.is_recording() {
        clear_line();
        let _ = controller.stop_capture().await;
    }
    Ok(())
}

async fn execute(
    controller: &SessionController,
    command: SessionCommand,
    waveform: &mut Waveform,
) -> Result<(), DomainError> {
    match command {
        SessionCommand::Record => {
            controller.start_capture().await?;
            waveform.reset();
            println!("Recording... type 'stop' to finish");
        }
        SessionCommand::Stop => {
            let result = controller.stop_capture().await;
            waveform.reset();
            let summary = result?;
            println!("Captured {:.1}s of audio", summary.duration_secs);
        }
        SessionCommand::Load(path) => {
            let bytes = controller.load_file(&path)?;
            println!("Loaded {} ({} bytes)", path.display(), bytes);
        }
        SessionCommand::Transcribe => {
            println!("Transcribing...");
            let text = controller.transcribe().await?;
            println!("Transcript: {}", text);
        }
        SessionCommand::Translate(language) => {
            let target = language.unwrap_or_else(|| controller.target_language());
            println!("Translating to {}...", target.name());
            let text = controller.translate(Some(target)).await?;
            println!("Translation ({}): {}", target.code(), text);
        }
        SessionCommand::Speak => {
            println!("Generating speech ({})...", Language::default().code());
            let output = controller.synthesize(SpeechSource::Original).await?;
            println!("Speech saved to {}", output.path.display());
        }
        SessionCommand::SpeakTranslated => {
            println!("Generating speech ({})...", controller.target_language().code());
            let output = controller.synthesize(SpeechSource::Translated).await?;
            println!("Speech saved to {}", output.path.display());
        }
        SessionCommand::SetLanguage(language) => {
            controller.set_target_language(language);
            println!("Target language set to {} ({})", language.name(), language.code());
        }
        SessionCommand::Languages => {
            print_languages(controller.target_language());
        }
        SessionCommand::Devices => {
            print_devices(controller)?;
        }
        SessionCommand::Status => {
            print_status(controller);
        }
        SessionCommand::Reset => {
            controller.reset().await;
            waveform.reset();
            println!("Session reset");
        }
        SessionCommand::Help => {
            print_help();
        }
        SessionCommand::Quit => {}
    }
    Ok(())
}

/// Parse one input line. `Ok(None)` is a blank line; `Err` carries the
/// message to show the user.
fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let no_args = |command: SessionCommand| {
        if rest.is_empty() {
            Ok(Some(command))
        } else {
            Err(format!("'{}' takes no arguments", word))
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "record" | "r" => no_args(SessionCommand::Record),
        "stop" | "s" => no_args(SessionCommand::Stop),
        "load" | "l" => {
            if rest.is_empty() {
                Err("Usage: load <path>".to_string())
            } else {
                Ok(Some(SessionCommand::Load(PathBuf::from(rest))))
            }
        }
        "transcribe" | "t" => no_args(SessionCommand::Transcribe),
        "translate" | "tr" => {
            if rest.is_empty() {
                Ok(Some(SessionCommand::Translate(None)))
            } else {
                let language = Language::from_code(rest).map_err(|e| e.to_string())?;
                Ok(Some(SessionCommand::Translate(Some(language))))
            }
        }
        "speak" => no_args(SessionCommand::Speak),
        "speak-translated" | "st" => no_args(SessionCommand::SpeakTranslated),
        "language" | "lang" => {
            if rest.is_empty() {
                Err("Usage: language <code>".to_string())
            } else {
                let language = Language::from_code(rest).map_err(|e| e.to_string())?;
                Ok(Some(SessionCommand::SetLanguage(language)))
            }
        }
        "languages" => no_args(SessionCommand::Languages),
        "devices" => no_args(SessionCommand::Devices),
        "status" => no_args(SessionCommand::Status),
        "reset" => no_args(SessionCommand::Reset),
        "help" | "?" => no_args(SessionCommand::Help),
        "quit" | "q" | "exit" => no_args(SessionCommand::Quit),
        other => Err(format!("Unknown command '{}' - type 'help'", other)),
    }
}

fn print_languages(current: Language) {
    println!("Supported languages:");
    for language in SUPPORTED_LANGUAGES {
        let marker = if *language == current { "*" } else { " " };
        println!("  {} {}  {}", marker, language.code(), language.name());
    }
}

fn print_devices(controller: &SessionController) -> Result<(), DomainError> {
    let devices = controller.list_input_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
        return Ok(());
    }
    println!("Input devices:");
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("  {} {}", marker, device.name);
    }
    Ok(())
}

fn print_status(controller: &SessionController) {
    let snapshot = controller.snapshot();
    println!("Stage:       {}", snapshot.stage.label());
    match snapshot.sample_name {
        Some(name) => println!("Sample:      {} ({} bytes)", name, snapshot.sample_bytes),
        None => println!("Sample:      none"),
    }
    println!(
        "Transcript:  {}",
        if snapshot.transcript.is_empty() { "none" } else { &snapshot.transcript }
    );
    println!(
        "Translation: {}",
        if snapshot.translation.is_empty() { "none" } else { &snapshot.translation }
    );
    println!("Target lang: {}", snapshot.target_language);
    match snapshot.speech_path {
        Some(path) => println!("Speech:      {}", path),
        None => println!("Speech:      none"),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  record            start microphone capture");
    println!("  stop              stop capture and keep the recording");
    println!("  load <path>       use an audio file instead (mp3/wav/m4a/ogg/webm)");
    println!("  transcribe        send the audio for transcription");
    println!("  translate [lang]  translate the transcript (default: session target)");
    println!("  speak             generate speech from the transcript");
    println!("  speak-translated  generate speech from the translation");
    println!("  language <code>   set the translation target language");
    println!("  languages         list supported languages");
    println!("  devices           list audio input devices");
    println!("  status            show the session state");
    println!("  reset             discard everything and start over");
    println!("  quit              exit");
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn draw_waveform(waveform: &Waveform, level: f32, duration_secs: f32) {
    print!(
        "\r{} {:3.0}% {:5.1}s",
        waveform.render(),
        level * 100.0,
        duration_secs
    );
    let _ = std::io::stdout().flush();
}

fn clear_line() {
    print!("\r\x1b[2K");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn simple_commands_parse() {
        assert_eq!(parse_command("record"), Ok(Some(SessionCommand::Record)));
        assert_eq!(parse_command("STOP"), Ok(Some(SessionCommand::Stop)));
        assert_eq!(parse_command("q"), Ok(Some(SessionCommand::Quit)));
        assert_eq!(parse_command("?"), Ok(Some(SessionCommand::Help)));
    }

    #[test]
    fn load_takes_a_path_with_spaces() {
        assert_eq!(
            parse_command("load /tmp/my clip.wav"),
            Ok(Some(SessionCommand::Load(PathBuf::from("/tmp/my clip.wav"))))
        );
        assert!(parse_command("load").is_err());
    }

    #[test]
    fn translate_accepts_an_optional_language() {
        assert_eq!(
            parse_command("translate"),
            Ok(Some(SessionCommand::Translate(None)))
        );
        assert_eq!(
            parse_command("translate fr"),
            Ok(Some(SessionCommand::Translate(Some(
                Language::from_code("fr").unwrap()
            ))))
        );
        assert!(parse_command("translate xx").is_err());
    }

    #[test]
    fn set_language_requires_a_supported_code() {
        assert_eq!(
            parse_command("language ja"),
            Ok(Some(SessionCommand::SetLanguage(
                Language::from_code("ja").unwrap()
            )))
        );
        assert!(parse_command("language").is_err());
        assert!(parse_command("language klingon").is_err());
    }

    #[test]
    fn unknown_commands_point_at_help() {
        let err = parse_command("frobnicate").unwrap_err();
        assert!(err.contains("help"));
    }

    #[test]
    fn stray_arguments_are_rejected() {
        assert!(parse_command("record now").is_err());
        assert!(parse_command("status please").is_err());
    }
}
