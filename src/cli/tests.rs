use crate::cli::{CliApp, Commands, ConfigAction, ParseError, PlaylistAction, SessionCommand};
use crate::models::QualityHint;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_parse_command_play() {
    assert_eq!(
        CliApp::parse_command("play").unwrap(),
        SessionCommand::Play { index: None }
    );
    assert_eq!(
        CliApp::parse_command("play 3").unwrap(),
        SessionCommand::Play { index: Some(2) }
    );
    assert_eq!(
        CliApp::parse_command("  p   1 ").unwrap(),
        SessionCommand::Play { index: Some(0) }
    );
}

#[test]
fn test_parse_command_song_number_must_be_positive() {
    for input in ["play 0", "play -1", "play abc", "remove 0"] {
        match CliApp::parse_command(input).unwrap_err() {
            ParseError::InvalidArgument { argument, .. } => assert_eq!(argument, "song number"),
            other => panic!("Expected InvalidArgument for '{}', got {:?}", input, other),
        }
    }
}

#[test]
fn test_parse_command_basic_controls() {
    let cases = [
        ("pause", SessionCommand::Pause),
        ("resume", SessionCommand::Resume),
        ("toggle", SessionCommand::Toggle),
        ("next", SessionCommand::Next),
        ("prev", SessionCommand::Prev),
        ("previous", SessionCommand::Prev),
        ("status", SessionCommand::Status),
        ("list", SessionCommand::List),
        ("locate", SessionCommand::Locate),
        ("help", SessionCommand::Help),
        ("quit", SessionCommand::Exit),
        ("exit", SessionCommand::Exit),
    ];

    for (input, expected) in cases {
        assert_eq!(CliApp::parse_command(input).unwrap(), expected, "input '{}'", input);
    }
}

#[test]
fn test_parse_command_seek() {
    assert_eq!(
        CliApp::parse_command("seek 1:30").unwrap(),
        SessionCommand::Seek {
            position: Duration::from_secs(90)
        }
    );

    match CliApp::parse_command("seek").unwrap_err() {
        ParseError::MissingArgument { command, argument } => {
            assert_eq!(command, "seek");
            assert_eq!(argument, "position");
        }
        other => panic!("Expected MissingArgument error, got {:?}", other),
    }

    assert!(matches!(
        CliApp::parse_command("seek soon"),
        Err(ParseError::InvalidTimeFormat { .. })
    ));
}

#[test]
fn test_parse_command_remove_and_move() {
    assert_eq!(
        CliApp::parse_command("remove 2").unwrap(),
        SessionCommand::Remove { index: 1 }
    );
    assert_eq!(
        CliApp::parse_command("move 1 4").unwrap(),
        SessionCommand::Move { from: 0, to: 3 }
    );

    match CliApp::parse_command("move 1").unwrap_err() {
        ParseError::MissingArgument { command, argument } => {
            assert_eq!(command, "move");
            assert_eq!(argument, "to");
        }
        other => panic!("Expected MissingArgument error, got {:?}", other),
    }
}

#[test]
fn test_parse_command_errors() {
    assert!(matches!(CliApp::parse_command(""), Err(ParseError::EmptyCommand)));
    assert!(matches!(CliApp::parse_command("   "), Err(ParseError::EmptyCommand)));

    match CliApp::parse_command("volume 50").unwrap_err() {
        ParseError::UnknownCommand { command } => assert_eq!(command, "volume"),
        other => panic!("Expected UnknownCommand error, got {:?}", other),
    }
}

#[test]
fn test_parse_time_formats() {
    assert_eq!(CliApp::parse_time("90").unwrap(), Duration::from_secs(90));
    assert_eq!(CliApp::parse_time("90s").unwrap(), Duration::from_secs(90));
    assert_eq!(CliApp::parse_time("2:05").unwrap(), Duration::from_secs(125));
    assert_eq!(CliApp::parse_time("0:30.5").unwrap(), Duration::from_millis(30_500));
    assert_eq!(CliApp::parse_time(" 45 ").unwrap(), Duration::from_secs(45));
}

#[test]
fn test_parse_time_rejects_invalid() {
    for input in ["", "1:60", "1:2:3", "-5", "abc", "1:xx", "inf"] {
        assert!(
            matches!(CliApp::parse_time(input), Err(ParseError::InvalidTimeFormat { .. })),
            "input '{}' should be rejected",
            input
        );
    }
}

#[test]
fn test_format_duration() {
    assert_eq!(CliApp::format_duration(Duration::ZERO), "00:00");
    assert_eq!(CliApp::format_duration(Duration::from_secs(65)), "01:05");
    assert_eq!(CliApp::format_duration(Duration::from_millis(59_999)), "00:59");
}

#[test]
fn test_expand_path() {
    let expanded = CliApp::expand_path("~/music/config.toml");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("music/config.toml"));

    assert_eq!(CliApp::expand_path("/etc/poolplay.toml"), PathBuf::from("/etc/poolplay.toml"));
    assert_eq!(CliApp::expand_path("relative.toml"), PathBuf::from("relative.toml"));
}

#[test]
fn test_clap_play_arguments() {
    let cli = CliApp::try_parse_from(["poolplay", "play", "evening", "--index", "3", "--paused"]).unwrap();

    match cli.command {
        Commands::Play {
            playlist,
            index,
            paused,
        } => {
            assert_eq!(playlist, "evening");
            assert_eq!(index, Some(3));
            assert!(paused);
        }
        other => panic!("Expected Play command, got {:?}", other),
    }
    assert_eq!(cli.config, None);
}

#[test]
fn test_clap_global_config_flag() {
    let cli = CliApp::try_parse_from(["poolplay", "playlist", "show", "mix", "--config", "/tmp/p.toml"]).unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
    assert!(matches!(
        cli.command,
        Commands::Playlist {
            action: PlaylistAction::Show { ref name }
        } if name == "mix"
    ));
}

#[test]
fn test_clap_config_and_playlist_actions() {
    let cli = CliApp::try_parse_from(["poolplay", "config", "reset"]).unwrap();
    assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Reset }));

    let cli = CliApp::try_parse_from(["poolplay", "playlist", "list"]).unwrap();
    assert!(matches!(cli.command, Commands::Playlist { action: PlaylistAction::List }));

    let cli = CliApp::try_parse_from(["poolplay", "config", "fade", "--in", "300", "--offset", "2000", "--out", "1000"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Fade {
                fade_in: 300,
                offset: 2000,
                fade_out: 1000
            }
        }
    ));

    let cli = CliApp::try_parse_from(["poolplay", "config", "quality", "lossless"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Quality {
                quality: QualityHint::Lossless
            }
        }
    ));
    assert!(CliApp::try_parse_from(["poolplay", "config", "quality", "ultra"]).is_err());
    assert!(CliApp::try_parse_from(["poolplay", "config", "retries", "3"]).is_err());

    assert!(CliApp::try_parse_from(["poolplay"]).is_err());
    assert!(CliApp::try_parse_from(["poolplay", "play"]).is_err());
}
